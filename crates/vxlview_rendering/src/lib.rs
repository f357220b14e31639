//! # VXLVIEW Rendering
//!
//! Synchronous GPU pipeline for decoded voxel models.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Renderer                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │  VoxelModel ─▶ pack_limb ─▶ transfer ─▶ voxel buffer (1/limb) │
//! │  AnimationSet ─▶ compose ─▶ LimbConstants ─▶ Shade kernel     │
//! │                                   ↓                           │
//! │                  canvas ─▶ Resolve kernel ─▶ target ring (3)  │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ResourceSet (arena) │ SubmissionEngine (1 batch, 1 fence)    │
//! ├──────────────────────────────────────────────────────────────┤
//! │           GpuDevice: WgpuDevice │ HeadlessDevice              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//!
//! - At most one batch in flight. `wait` always precedes the next `begin`.
//! - Resource state tags change only through `SubmissionEngine::transition`.
//! - Every limb owns exactly one voxel buffer.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod device;
pub mod error;
pub mod headless;
pub mod renderer;
pub mod resource;
pub mod shaders;
pub mod submission;
pub mod upload;
pub mod wgpu_device;

pub use device::{GpuDevice, Kernel, ResourceDesc, ResourceId, ResourceKind, ResourceState, WaitStatus};
pub use error::{DeviceError, RenderError, RenderResult};
pub use headless::HeadlessDevice;
pub use renderer::{AnimationPose, Renderer, RendererConfig, TARGET_COUNT};
pub use resource::{ResourceHandle, ResourceSet};
pub use shaders::{decode_canvas, CanvasSample};
pub use submission::{EngineState, SubmissionEngine, SubmitMode};
pub use upload::{pack_limb, VoxelRecord};
pub use wgpu_device::WgpuDevice;
