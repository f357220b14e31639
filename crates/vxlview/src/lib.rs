//! # VXLVIEW
//!
//! Voxel unit viewer built on [`vxlview_rendering`].
//!
//! ## Flow
//!
//! ```text
//! settings.toml ─▶ Settings ─▶ RendererConfig
//! voxels.vpl + unittem.pal ─▶ SharedAssets ─▶ build_renderer
//! <name>.vxl/.hva (+tur, +barl) ─▶ Unit ─▶ load_into
//!                                           ↓
//!                     write_sequence / write_preview ─▶ PNG
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod screenshot;
pub mod unit;
pub mod viewer;

pub use config::{Settings, ShotSettings, DEFAULT_SETTINGS_FILE};
pub use error::{AppError, AppResult};
pub use screenshot::{composite, write_preview, write_sequence, PreviewLayout, PreviewViews, ShotOptions};
pub use unit::{Part, Unit, UnitModel};
pub use viewer::{build_renderer, SharedAssets};
