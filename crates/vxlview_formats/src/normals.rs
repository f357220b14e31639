//! Precomputed unit-normal tables.
//!
//! Each voxel stores an 8-bit normal index. The limb's normal encoding picks
//! which 256-entry table the index resolves against. Only the first
//! [`NormalEncoding::meaningful_normals`] entries are distinct directions;
//! the remainder point straight up.

use std::sync::OnceLock;

use crate::math::Vec3;

/// Entries per table.
pub const NORMAL_TABLE_SIZE: usize = 256;

/// Normal-index encoding declared by a limb tailer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NormalEncoding {
    /// Tiberian Sun style (tag 2).
    Tiberian,
    /// Red Alert 2 style (tag 4).
    RedAlert2,
    /// Any other tag. Resolved with the Red Alert 2 table.
    Unknown(u8),
}

impl NormalEncoding {
    /// Tag value for [`NormalEncoding::Tiberian`].
    pub const TIBERIAN_TAG: u8 = 2;
    /// Tag value for [`NormalEncoding::RedAlert2`].
    pub const RED_ALERT_2_TAG: u8 = 4;

    /// Decodes a tailer tag.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Self {
        match tag {
            Self::TIBERIAN_TAG => Self::Tiberian,
            Self::RED_ALERT_2_TAG => Self::RedAlert2,
            other => Self::Unknown(other),
        }
    }

    /// Tag as stored on disk.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Tiberian => Self::TIBERIAN_TAG,
            Self::RedAlert2 => Self::RED_ALERT_2_TAG,
            Self::Unknown(tag) => tag,
        }
    }

    /// Number of distinct directions in the table.
    #[must_use]
    pub const fn meaningful_normals(self) -> usize {
        match self {
            Self::Tiberian => 36,
            Self::RedAlert2 | Self::Unknown(_) => 244,
        }
    }

    /// The 256-entry table for this encoding.
    #[must_use]
    pub fn table(self) -> &'static [Vec3; NORMAL_TABLE_SIZE] {
        static TIBERIAN: OnceLock<[Vec3; NORMAL_TABLE_SIZE]> = OnceLock::new();
        static RED_ALERT_2: OnceLock<[Vec3; NORMAL_TABLE_SIZE]> = OnceLock::new();
        match self {
            Self::Tiberian => TIBERIAN.get_or_init(|| build_table(36)),
            Self::RedAlert2 | Self::Unknown(_) => RED_ALERT_2.get_or_init(|| build_table(244)),
        }
    }

    /// Normal for `index`.
    #[inline]
    #[must_use]
    pub fn normal(self, index: u8) -> Vec3 {
        self.table()[index as usize]
    }
}

/// Spreads `count` directions evenly over the sphere (golden-angle spiral)
/// and pads the rest of the table with +Z.
fn build_table(count: usize) -> [Vec3; NORMAL_TABLE_SIZE] {
    let mut table = [Vec3::Z; NORMAL_TABLE_SIZE];
    let golden_angle = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    let n = count as f64;
    for (i, slot) in table.iter_mut().take(count).enumerate() {
        let z = 1.0 - 2.0 * (i as f64 + 0.5) / n;
        let radius = (1.0 - z * z).sqrt();
        let (sin, cos) = (golden_angle * i as f64).sin_cos();
        *slot = Vec3::new((cos * radius) as f32, (sin * radius) as f32, z as f32);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_roundtrip() {
        for tag in 0..=u8::MAX {
            assert_eq!(NormalEncoding::from_tag(tag).tag(), tag);
        }
        assert_eq!(NormalEncoding::from_tag(2), NormalEncoding::Tiberian);
        assert_eq!(NormalEncoding::from_tag(4), NormalEncoding::RedAlert2);
    }

    #[test]
    fn test_tables_are_unit_length() {
        for enc in [NormalEncoding::Tiberian, NormalEncoding::RedAlert2] {
            for n in enc.table() {
                assert!((n.length() - 1.0).abs() < 1e-5, "{enc:?} {n:?}");
            }
        }
    }

    #[test]
    fn test_padding_points_up() {
        let table = NormalEncoding::Tiberian.table();
        assert!(table[36..].iter().all(|n| *n == Vec3::Z));
        assert_ne!(table[0], table[1]);
    }
}
