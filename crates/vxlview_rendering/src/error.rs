//! # Rendering Error Types
//!
//! `DeviceError` is what a backend reports; `RenderError` is what the
//! engine, resource sets and renderer report to their callers.

use thiserror::Error;

use crate::submission::EngineState;

/// Failures reported by a [`GpuDevice`](crate::device::GpuDevice).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// No adapter matched the request.
    #[error("no compatible GPU adapter available")]
    AdapterUnavailable,

    /// The adapter refused to create a device.
    #[error("device request failed: {0}")]
    RequestDevice(String),

    /// A resource could not be allocated.
    #[error("allocation of '{label}' failed: {reason}")]
    Allocation {
        /// Resource label.
        label: String,
        /// Backend reason.
        reason: String,
    },

    /// An id that the device does not own.
    #[error("unknown resource id {0}")]
    UnknownResource(u64),

    /// Binding table creation failed.
    #[error("binding failed: {0}")]
    Binding(String),

    /// A command batch was rejected.
    #[error("submission failed: {0}")]
    Submission(String),

    /// Copying results back to the CPU failed.
    #[error("readback failed: {0}")]
    Readback(String),

    /// The device stopped responding while waiting on the fence.
    #[error("device lost")]
    Lost,
}

/// Errors from the rendering layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A device call failed.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// An engine operation was called in a state that does not allow it.
    #[error("{operation} is not allowed while the engine is {state:?}")]
    InvalidState {
        /// Operation attempted.
        operation: &'static str,
        /// State at the time.
        state: EngineState,
    },

    /// A handle from another set or from before a discard.
    #[error("stale resource handle")]
    StaleHandle,

    /// The renderer's fixed resources are missing.
    #[error("renderer is not initialized")]
    NotInitialized,

    /// Something the operation needs has not been loaded yet.
    #[error("{0} not loaded")]
    ResourcesNotReady(&'static str),

    /// Animation sections and voxel limbs disagree.
    #[error("{sections} animation sections for {limbs} limbs")]
    SectionMismatch {
        /// Loaded limbs.
        limbs: usize,
        /// Sections supplied.
        sections: usize,
    },

    /// The animation has no matrix for this frame and section.
    #[error("no animation matrix for frame {frame}, section {section}")]
    MissingFrame {
        /// Frame after wrapping.
        frame: usize,
        /// Section index.
        section: usize,
    },

    /// Zero-sized canvas.
    #[error("invalid canvas size {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}

/// Result type for rendering operations.
pub type RenderResult<T> = Result<T, RenderError>;
