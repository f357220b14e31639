//! 256-entry palettes.
//!
//! Palette bytes on disk carry 6-bit channels. They are widened to 8 bits
//! (`<< 2`) when loaded; that widening is part of the format, not a
//! rendering choice.

use std::path::Path;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::error::{FormatError, FormatResult};

/// Number of palette entries.
pub const PALETTE_ENTRIES: usize = 256;

/// Size of a raw palette on disk.
pub const PALETTE_BYTES: usize = PALETTE_ENTRIES * 3;

/// RGB color, 8 bits per channel.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
pub struct Color {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
}

impl Color {
    /// Creates a color.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Packs as little-endian RGBA with an opaque alpha.
    #[inline]
    #[must_use]
    pub const fn to_rgba_u32(self) -> u32 {
        self.r as u32 | (self.g as u32) << 8 | (self.b as u32) << 16 | 0xFF << 24
    }
}

/// A 256-color palette with widened channels.
///
/// A palette is always "loaded": zero is a valid, if degenerate, palette.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    entries: [Color; PALETTE_ENTRIES],
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

impl Palette {
    /// All-black palette.
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: [Color::new(0, 0, 0); PALETTE_ENTRIES] }
    }

    /// Decodes a standalone `.pal` buffer (exactly 768 bytes).
    ///
    /// # Errors
    ///
    /// [`FormatError::Empty`] or [`FormatError::SizeMismatch`].
    pub fn from_bytes(data: &[u8]) -> FormatResult<Self> {
        if data.is_empty() {
            return Err(FormatError::Empty("pal"));
        }
        if data.len() != PALETTE_BYTES {
            return Err(FormatError::SizeMismatch {
                what: "pal",
                expected: PALETTE_BYTES,
                actual: data.len(),
            });
        }
        let mut raw = [0u8; PALETTE_BYTES];
        raw.copy_from_slice(data);
        Ok(Self::from_raw(&raw))
    }

    /// Reads and decodes a `.pal` file.
    ///
    /// # Errors
    ///
    /// I/O failures or any error from [`Palette::from_bytes`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> FormatResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| FormatError::io(path, &e))?;
        Self::from_bytes(&data)
    }

    /// Widens 768 raw 6-bit bytes. Shared with the palettes embedded in
    /// VXL and VPL headers.
    #[must_use]
    pub fn from_raw(raw: &[u8; PALETTE_BYTES]) -> Self {
        let mut entries = [Color::default(); PALETTE_ENTRIES];
        for (entry, rgb) in entries.iter_mut().zip(raw.chunks_exact(3)) {
            *entry = Color::new(rgb[0] << 2, rgb[1] << 2, rgb[2] << 2);
        }
        Self { entries }
    }

    /// Narrows back to 6-bit bytes, the inverse of [`Palette::from_raw`]
    /// for inputs in `0..=63`.
    #[must_use]
    pub fn to_raw(&self) -> [u8; PALETTE_BYTES] {
        let mut raw = [0u8; PALETTE_BYTES];
        for (rgb, entry) in raw.chunks_exact_mut(3).zip(self.entries.iter()) {
            rgb.copy_from_slice(&[entry.r >> 2, entry.g >> 2, entry.b >> 2]);
        }
        raw
    }

    /// Zeroes every entry.
    pub fn purge(&mut self) {
        self.entries = [Color::default(); PALETTE_ENTRIES];
    }

    /// Always true.
    #[inline]
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        true
    }

    /// All entries.
    #[inline]
    #[must_use]
    pub const fn entries(&self) -> &[Color; PALETTE_ENTRIES] {
        &self.entries
    }

    /// Entry at `index`.
    #[inline]
    #[must_use]
    pub const fn color(&self, index: u8) -> Color {
        self.entries[index as usize]
    }

    /// Packed RGBA words for GPU upload.
    #[must_use]
    pub fn to_rgba_words(&self) -> [u32; PALETTE_ENTRIES] {
        let mut out = [0u32; PALETTE_ENTRIES];
        for (word, entry) in out.iter_mut().zip(self.entries.iter()) {
            *word = entry.to_rgba_u32();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_wrong_size() {
        assert_eq!(Palette::from_bytes(&[]), Err(FormatError::Empty("pal")));
        assert!(matches!(
            Palette::from_bytes(&[0u8; 767]),
            Err(FormatError::SizeMismatch { expected: 768, actual: 767, .. })
        ));
        assert!(Palette::from_bytes(&[0u8; 769]).is_err());
    }

    #[test]
    fn test_widening_and_narrowing() {
        let mut raw = [0u8; PALETTE_BYTES];
        raw[3..6].copy_from_slice(&[63, 32, 1]);
        let pal = Palette::from_bytes(&raw).unwrap();
        assert_eq!(pal.color(1), Color::new(252, 128, 4));
        assert_eq!(pal.to_raw(), raw);
    }

    #[test]
    fn test_purge_keeps_loaded() {
        let mut pal = Palette::from_bytes(&[20u8; PALETTE_BYTES]).unwrap();
        pal.purge();
        assert!(pal.is_loaded());
        assert!(pal.entries().iter().all(|c| *c == Color::default()));
    }

    #[test]
    fn test_rgba_packing() {
        assert_eq!(Color::new(1, 2, 3).to_rgba_u32(), 0xFF03_0201);
    }
}
