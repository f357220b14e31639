//! # VXLVIEW Formats
//!
//! Decoders for voxel model assets and the CPU-side math that every
//! renderer shares.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on:
//! - `wgpu`
//! - Any GPU or window-related crate
//!
//! If you need graphics types, put them in `vxlview_rendering`.
//!
//! ## Failure model
//!
//! Decoders fail closed per file: either a whole model comes back or a
//! [`FormatError`]. Inside one VXL column the run stream is decoded
//! leniently and damage is counted in [`DecodeDiagnostics`].

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod asset;
pub mod error;
pub mod hva;
pub mod lighting;
pub mod math;
pub mod normals;
pub mod palette;
mod reader;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transform;
pub mod vpl;
pub mod vxl;

pub use asset::{Asset, AssetKind};
pub use error::{FormatError, FormatResult};
pub use hva::AnimationSet;
pub use lighting::{LightRig, DEFAULT_LIGHT_DIRECTION};
pub use math::{Mat4, Matrix3x4, Vec3};
pub use normals::NormalEncoding;
pub use palette::{Color, Palette};
pub use transform::{LimbPose, LimbTransform};
pub use vpl::LightingTable;
pub use vxl::{Column, DecodeDiagnostics, Limb, LimbHeader, LimbTailer, Voxel, VoxelModel, VxlHeader};
