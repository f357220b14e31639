//! Lighting-section selection.
//!
//! Every voxel normal is resolved to a VPL section (a brightness bucket):
//!
//! ```text
//! fill    = normalize(light + Z)          (zero vector stays zero)
//! f       = max(0, n·light)
//! f2      = max(0, c / (α - (α-1)·c))     c = n·fill, α = 3
//! section = min(⌊16·(f + f2)⌋, section_count - 1)
//! ```
//!
//! The same per-limb table feeds the GPU kernel and any CPU consumer, so
//! both paths pick identical sections.

use crate::math::{Mat4, Vec3};
use crate::normals::{NormalEncoding, NORMAL_TABLE_SIZE};

/// Falloff shape of the fill term.
pub const FILL_ALPHA: f64 = 3.0;

/// Scale applied to the combined intensity before flooring.
pub const BUCKET_SCALE: f64 = 16.0;

/// Light direction used when nothing else is configured.
pub const DEFAULT_LIGHT_DIRECTION: Vec3 = Vec3::new(0.201_302_2, -0.910_113_8, -0.362_170_9);

/// Primary light plus the derived fill light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightRig {
    light: Vec3,
    fill: Vec3,
}

impl Default for LightRig {
    fn default() -> Self {
        Self::new(DEFAULT_LIGHT_DIRECTION)
    }
}

impl LightRig {
    /// Builds the rig for a primary light direction.
    #[must_use]
    pub fn new(light: Vec3) -> Self {
        Self { light, fill: fill_light(light) }
    }

    /// Primary direction.
    #[must_use]
    pub const fn light(&self) -> Vec3 {
        self.light
    }

    /// Fill direction.
    #[must_use]
    pub const fn fill(&self) -> Vec3 {
        self.fill
    }

    /// Section for an already-transformed normal.
    #[must_use]
    pub fn section_for(&self, normal: Vec3, section_count: usize) -> u32 {
        section_bucket(normal.dot(self.light), normal.dot(self.fill), section_count)
    }

    /// Section for each of the 256 normal indices of `encoding`, after
    /// rotating the normals by `normal_transform` (translation ignored).
    #[must_use]
    pub fn section_table(
        &self,
        encoding: NormalEncoding,
        normal_transform: &Mat4,
        section_count: usize,
    ) -> [u32; NORMAL_TABLE_SIZE] {
        let mut table = [0u32; NORMAL_TABLE_SIZE];
        for (slot, normal) in table.iter_mut().zip(encoding.table().iter()) {
            *slot = self.section_for(normal_transform.transform_vector(*normal), section_count);
        }
        table
    }
}

/// `normalize(light + Z)`, or the zero vector when that sum vanishes.
#[must_use]
pub fn fill_light(light: Vec3) -> Vec3 {
    (light + Vec3::Z).try_normalize().unwrap_or(Vec3::ZERO)
}

/// Combines the two cosines into a section index clamped to the table.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn section_bucket(cos_primary: f32, cos_fill: f32, section_count: usize) -> u32 {
    let c1 = f64::from(cos_primary);
    let c2 = f64::from(cos_fill);
    let f = c1.max(0.0);
    let f2 = (c2 / (FILL_ALPHA - (FILL_ALPHA - 1.0) * c2)).max(0.0);
    let raw = (BUCKET_SCALE * (f + f2)).floor().max(0.0);
    let last = section_count.saturating_sub(1) as f64;
    raw.min(last) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vpl::CANONICAL_SECTION_COUNT;

    #[test]
    fn test_fill_light_zero_guard() {
        assert_eq!(fill_light(-Vec3::Z), Vec3::ZERO);
        let fill = fill_light(Vec3::X);
        assert!((fill.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_bucket_extremes() {
        assert_eq!(section_bucket(-1.0, -1.0, 32), 0);
        assert_eq!(section_bucket(0.5, 0.0, 32), 8);
        // 16 * (1 + 1) = 32 lands past the table and is clamped
        assert_eq!(section_bucket(1.0, 1.0, 32), 31);
        assert_eq!(section_bucket(1.0, 1.0, 0), 0);
    }

    #[test]
    fn test_bucket_monotonic_in_primary() {
        let mut previous = 0;
        for step in 0..=200 {
            let c = -1.0 + step as f32 / 100.0;
            let bucket = section_bucket(c, c, CANONICAL_SECTION_COUNT);
            assert!(bucket >= previous, "bucket fell at cos {c}");
            previous = bucket;
        }
    }

    #[test]
    fn test_section_table_identity_matches_direct() {
        let rig = LightRig::default();
        let table = rig.section_table(NormalEncoding::RedAlert2, &Mat4::IDENTITY, 32);
        let normals = NormalEncoding::RedAlert2.table();
        for i in [0usize, 17, 100, 243, 255] {
            assert_eq!(table[i], rig.section_for(normals[i], 32));
        }
    }

    #[test]
    fn test_normal_facing_light_is_brightest() {
        let rig = LightRig::default();
        let toward = rig.section_for(rig.light(), 32);
        let away = rig.section_for(-rig.light(), 32);
        assert!(toward > away);
        assert_eq!(away, 0);
    }
}
