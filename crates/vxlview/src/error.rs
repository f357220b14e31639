//! # Application Error Types
//!
//! Everything the viewer can fail on above the renderer.

use std::path::Path;

use thiserror::Error;
use vxlview_formats::FormatError;
use vxlview_rendering::{DeviceError, RenderError};

/// Errors raised by settings, unit loading and export.
#[derive(Error, Debug)]
pub enum AppError {
    /// An asset failed to decode.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The renderer rejected an operation.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// No device could be created.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Filesystem failure.
    #[error("i/o error on {path}: {reason}")]
    Io {
        /// File or directory path.
        path: String,
        /// OS error text.
        reason: String,
    },

    /// The settings file exists but is malformed.
    #[error("invalid settings file {path}: {reason}")]
    Config {
        /// Settings path.
        path: String,
        /// Parser message.
        reason: String,
    },

    /// Image encode or decode failure.
    #[error("image error on {path}: {reason}")]
    Image {
        /// Image path.
        path: String,
        /// Codec message.
        reason: String,
    },

    /// A required model file is missing.
    #[error("missing model file: {0}")]
    MissingModel(String),

    /// The named remap color is not in the settings.
    #[error("unknown remap color: {0}")]
    UnknownColor(String),

    /// Readback size does not match the canvas.
    #[error("readback returned {actual} bytes, expected {expected}")]
    PixelCount {
        /// `width * height * 4`
        expected: usize,
        /// Bytes returned.
        actual: usize,
    },
}

impl AppError {
    pub(crate) fn io(path: &Path, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn image(path: &Path, err: &image::ImageError) -> Self {
        Self::Image {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Result type for application operations.
pub type AppResult<T> = Result<T, AppError>;
