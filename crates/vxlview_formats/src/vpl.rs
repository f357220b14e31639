//! VPL lighting remap tables.
//!
//! ```text
//! VPL File Structure (little-endian):
//! ├── remap_start, remap_end, section_count, reserved   4 × u32
//! ├── palette                                           256 × 3B (6-bit)
//! └── sections                                          section_count × 256B
//! ```

use std::path::Path;

use tracing::debug;

use crate::error::{FormatError, FormatResult};
use crate::palette::{Color, Palette, PALETTE_BYTES, PALETTE_ENTRIES};
use crate::reader::ByteReader;

/// Size of the fixed header.
pub const VPL_HEADER_SIZE: usize = 16;

/// Section count of the canonical format.
pub const CANONICAL_SECTION_COUNT: usize = 32;

/// A decoded remap table: `section_count` rows of 256 palette indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LightingTable {
    remap_start: u32,
    remap_end: u32,
    section_count: u32,
    reserved: u32,
    palette: Palette,
    sections: Vec<[u8; PALETTE_ENTRIES]>,
}

impl LightingTable {
    /// Exact buffer size for a table with `section_count` rows.
    #[must_use]
    pub const fn expected_size(section_count: usize) -> usize {
        VPL_HEADER_SIZE + PALETTE_BYTES + section_count * PALETTE_ENTRIES
    }

    /// Decodes a VPL buffer. The header must declare
    /// [`CANONICAL_SECTION_COUNT`] sections and the buffer size must match
    /// it exactly.
    ///
    /// # Errors
    ///
    /// [`FormatError::Empty`], [`FormatError::Truncated`] for a short header,
    /// [`FormatError::NoSections`], [`FormatError::SectionCount`] or
    /// [`FormatError::SizeMismatch`].
    pub fn decode(data: &[u8]) -> FormatResult<Self> {
        if data.is_empty() {
            return Err(FormatError::Empty("vpl"));
        }
        let mut reader = ByteReader::new(data, "vpl header");
        let remap_start = reader.read_u32()?;
        let remap_end = reader.read_u32()?;
        let section_count = reader.read_u32()?;
        let reserved = reader.read_u32()?;
        if section_count == 0 {
            return Err(FormatError::NoSections);
        }
        if section_count as usize != CANONICAL_SECTION_COUNT {
            return Err(FormatError::SectionCount { expected: CANONICAL_SECTION_COUNT, actual: section_count });
        }

        let expected = Self::expected_size(CANONICAL_SECTION_COUNT);
        if data.len() != expected {
            return Err(FormatError::SizeMismatch { what: "vpl", expected, actual: data.len() });
        }

        reader.region("vpl palette");
        let palette = Palette::from_raw(&reader.read_array::<PALETTE_BYTES>()?);
        reader.region("vpl sections");
        let sections = (0..section_count)
            .map(|_| reader.read_array::<PALETTE_ENTRIES>())
            .collect::<FormatResult<Vec<_>>>()?;

        debug!(section_count, remap_start, remap_end, "vpl decoded");
        Ok(Self { remap_start, remap_end, section_count, reserved, palette, sections })
    }

    /// Reads and decodes a `.vpl` file.
    ///
    /// # Errors
    ///
    /// I/O failures or any error from [`LightingTable::decode`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> FormatResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| FormatError::io(path, &e))?;
        Self::decode(&data)
    }

    /// Serializes back to the on-disk layout (palette narrowed to 6 bits).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::expected_size(self.sections.len()));
        for word in [self.remap_start, self.remap_end, self.section_count, self.reserved] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out.extend_from_slice(&self.palette.to_raw());
        for row in &self.sections {
            out.extend_from_slice(row);
        }
        out
    }

    /// Writes [`LightingTable::encode`] to `path`.
    ///
    /// # Errors
    ///
    /// [`FormatError::Io`] when the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> FormatResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.encode()).map_err(|e| FormatError::io(path, &e))
    }

    /// First remapped index.
    #[must_use]
    pub const fn remap_start(&self) -> u32 {
        self.remap_start
    }

    /// Last remapped index.
    #[must_use]
    pub const fn remap_end(&self) -> u32 {
        self.remap_end
    }

    /// Number of lighting sections.
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Embedded palette.
    #[must_use]
    pub const fn palette(&self) -> &Palette {
        &self.palette
    }

    /// One section row.
    #[must_use]
    pub fn section(&self, section: usize) -> Option<&[u8; PALETTE_ENTRIES]> {
        self.sections.get(section)
    }

    /// All rows.
    #[must_use]
    pub fn sections(&self) -> &[[u8; PALETTE_ENTRIES]] {
        &self.sections
    }

    /// Palette index displayed for `color` under `section`.
    #[must_use]
    pub fn remap(&self, section: usize, color: u8) -> Option<u8> {
        self.section(section).map(|row| row[usize::from(color)])
    }

    /// Final displayed color for `color` under `section`, looked up in `palette`.
    #[must_use]
    pub fn resolve(&self, palette: &Palette, section: usize, color: u8) -> Option<Color> {
        self.remap(section, color).map(|index| palette.color(index))
    }

    /// Rows flattened section-major, widened to `u32` for GPU upload.
    #[must_use]
    pub fn to_words(&self) -> Vec<u32> {
        self.sections.iter().flat_map(|row| row.iter().map(|&i| u32::from(i))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::VplBuilder;

    #[test]
    fn test_exact_size_required() {
        let bytes = VplBuilder::new(CANONICAL_SECTION_COUNT).build();
        assert_eq!(bytes.len(), LightingTable::expected_size(32));
        assert!(LightingTable::decode(&bytes).is_ok());

        let mut long = bytes.clone();
        long.push(0);
        assert!(matches!(LightingTable::decode(&long), Err(FormatError::SizeMismatch { .. })));
        assert!(matches!(
            LightingTable::decode(&bytes[..bytes.len() - 1]),
            Err(FormatError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_sections_rejected() {
        let bytes = VplBuilder::new(0).build();
        assert_eq!(LightingTable::decode(&bytes), Err(FormatError::NoSections));
    }

    #[test]
    fn test_non_canonical_section_count_rejected() {
        for sections in [1, 4, 31, 33] {
            let bytes = VplBuilder::new(sections).build();
            assert_eq!(
                LightingTable::decode(&bytes),
                Err(FormatError::SectionCount { expected: 32, actual: sections as u32 })
            );
        }
    }

    #[test]
    fn test_remap_lookup() {
        let bytes = VplBuilder::new(CANONICAL_SECTION_COUNT).build();
        let vpl = LightingTable::decode(&bytes).unwrap();
        assert_eq!(vpl.section_count(), 32);
        // builder rows are `color.wrapping_add(section)`
        assert_eq!(vpl.remap(3, 10), Some(13));
        assert_eq!(vpl.remap(32, 10), None);
        assert_eq!(vpl.to_words().len(), 32 * 256);
    }

    #[test]
    fn test_encode_reproduces_input() {
        let bytes = VplBuilder::new(CANONICAL_SECTION_COUNT).remap_range(16, 31).build();
        let vpl = LightingTable::decode(&bytes).unwrap();
        assert_eq!(vpl.remap_start(), 16);
        assert_eq!(vpl.remap_end(), 31);
        assert_eq!(vpl.encode(), bytes);
    }
}
