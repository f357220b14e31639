//! # Format Error Types
//!
//! Everything that can make a whole-file decode fail. Out-of-range lookups
//! are not errors (they return `None`), and tolerated inconsistencies inside
//! a column are reported through `tracing` instead.

use thiserror::Error;

/// Errors that abort a decode. The target object is never partially built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The input buffer was empty.
    #[error("{0}: empty buffer")]
    Empty(&'static str),

    /// The buffer ended before a fixed-size region was complete.
    #[error("{what}: truncated at offset {offset}, need {needed} bytes, {available} available")]
    Truncated {
        /// Region being read.
        what: &'static str,
        /// Byte offset where the read started.
        offset: usize,
        /// Bytes required.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },

    /// The buffer size is not the exact size the format requires.
    #[error("{what}: expected exactly {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Format being decoded.
        what: &'static str,
        /// Required size.
        expected: usize,
        /// Actual size.
        actual: usize,
    },

    /// A VXL header declared zero limbs.
    #[error("vxl: header declares no limbs")]
    NoLimbs,

    /// A VPL header declared zero lighting sections.
    #[error("vpl: header declares no lighting sections")]
    NoSections,

    /// A VPL header declared a section count other than the canonical one.
    #[error("vpl: header declares {actual} lighting sections, expected {expected}")]
    SectionCount {
        /// Required count.
        expected: usize,
        /// Declared count.
        actual: u32,
    },

    /// File could not be read or written.
    #[error("i/o error on {path}: {reason}")]
    Io {
        /// File path.
        path: String,
        /// OS error text.
        reason: String,
    },
}

impl FormatError {
    pub(crate) fn io(path: &std::path::Path, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Result type for decode operations.
pub type FormatResult<T> = Result<T, FormatError>;
