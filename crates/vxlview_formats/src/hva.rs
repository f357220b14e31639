//! HVA animation decoder.
//!
//! ```text
//! HVA File Structure (little-endian):
//! ├── signature      16B
//! ├── frame_count    u32
//! ├── section_count  u32
//! ├── names          section_count × 16B
//! └── matrices       frame_count × section_count × (3×4 f32), frame-major
//! ```
//!
//! A short buffer keeps whatever whole matrices are present. Lookups are
//! range-checked against the matrices actually stored, not the header.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{FormatError, FormatResult};
use crate::math::Matrix3x4;
use crate::reader::{fixed_name, ByteReader};

/// Size of the fixed header.
pub const HVA_HEADER_SIZE: usize = 16 + 4 + 4;

/// Size of one section name record.
pub const SECTION_NAME_SIZE: usize = 16;

/// Decoded per-frame, per-section transforms.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnimationSet {
    signature: [u8; 16],
    frame_count: usize,
    section_count: usize,
    names: Vec<String>,
    matrices: Vec<Matrix3x4>,
}

impl AnimationSet {
    /// Decodes an HVA buffer.
    ///
    /// # Errors
    ///
    /// [`FormatError::Empty`] for an empty buffer, [`FormatError::Truncated`]
    /// when the fixed header itself is cut short.
    pub fn decode(data: &[u8]) -> FormatResult<Self> {
        if data.is_empty() {
            return Err(FormatError::Empty("hva"));
        }

        let mut reader = ByteReader::new(data, "hva header");
        let signature = reader.read_array::<16>()?;
        let frame_count = reader.read_u32()? as usize;
        let section_count = reader.read_u32()? as usize;

        let mut names = Vec::with_capacity(section_count.min(reader.remaining() / SECTION_NAME_SIZE));
        reader.region("hva section names");
        for _ in 0..section_count {
            match reader.read_array::<SECTION_NAME_SIZE>() {
                Ok(raw) => names.push(fixed_name(&raw)),
                Err(_) => break,
            }
        }

        let declared = frame_count.saturating_mul(section_count);
        let present = if names.len() == section_count {
            declared.min(reader.remaining() / Matrix3x4::SIZE)
        } else {
            0
        };
        reader.region("hva matrices");
        let mut matrices = Vec::with_capacity(present);
        for _ in 0..present {
            matrices.push(reader.read_matrix()?);
        }

        if present < declared {
            warn!(declared, present, "hva: buffer holds fewer matrices than declared");
        }
        debug!(frame_count, section_count, matrices = matrices.len(), "hva decoded");

        Ok(Self { signature, frame_count, section_count, names, matrices })
    }

    /// Reads and decodes an `.hva` file.
    ///
    /// # Errors
    ///
    /// I/O failures or any error from [`AnimationSet::decode`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> FormatResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| FormatError::io(path, &e))?;
        Self::decode(&data)
    }

    /// An animation with one identity frame per section.
    #[must_use]
    pub fn identity(section_count: usize) -> Self {
        Self {
            signature: [0; 16],
            frame_count: 1,
            section_count,
            names: vec![String::new(); section_count],
            matrices: vec![Matrix3x4::IDENTITY; section_count],
        }
    }

    /// Raw signature bytes.
    #[must_use]
    pub const fn signature(&self) -> &[u8; 16] {
        &self.signature
    }

    /// Declared frame count.
    #[must_use]
    pub const fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Declared section count.
    #[must_use]
    pub const fn section_count(&self) -> usize {
        self.section_count
    }

    /// Section names (may be shorter than `section_count` for damaged files).
    #[must_use]
    pub fn section_names(&self) -> &[String] {
        &self.names
    }

    /// True once at least one matrix is present.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        !self.matrices.is_empty()
    }

    /// Matrix for `(frame, section)`, `None` outside the strict range or
    /// past the matrices the buffer actually held. Does not wrap.
    #[must_use]
    pub fn matrix(&self, frame: usize, section: usize) -> Option<&Matrix3x4> {
        if frame >= self.frame_count || section >= self.section_count {
            return None;
        }
        self.matrices.get(frame * self.section_count + section)
    }

    /// Resets to the empty animation.
    pub fn purge(&mut self) {
        *self = Self::default();
    }
}
