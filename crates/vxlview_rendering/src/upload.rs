//! CPU-side packing of everything the kernels read.
//!
//! Record layouts here are mirrored field for field by the WGSL structs in
//! [`crate::shaders`]; keep them in sync.

use bytemuck::{Pod, Zeroable};
use vxlview_formats::normals::NORMAL_TABLE_SIZE;
use vxlview_formats::{Color, Limb, Mat4};

/// Ceiling on one staged copy, in bytes. Larger uploads are split.
pub const UPLOAD_ROW_BYTES: u64 = 16_000;

/// Voxel invocations per shading workgroup.
pub const SHADE_WORKGROUP_SIZE: u32 = 64;

/// Edge of the square resolve workgroup.
pub const RESOLVE_WORKGROUP_EDGE: u32 = 8;

/// Hardware cap on workgroups along one dispatch axis.
pub const MAX_GROUPS_PER_AXIS: u32 = 65_535;

/// Bytes per canvas pixel: a depth/color key and a hit count.
pub const CANVAS_PIXEL_BYTES: u64 = 8;

/// Bytes per render target pixel (RGBA8).
pub const TARGET_PIXEL_BYTES: u64 = 4;

/// One non-empty voxel as the shading kernel reads it.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct VoxelRecord {
    /// Palette index (never 0 for real voxels).
    pub color: u32,
    /// Normal index.
    pub normal: u32,
    /// Grid x.
    pub x: u32,
    /// Grid y.
    pub y: u32,
    /// Grid z.
    pub z: u32,
}

impl VoxelRecord {
    /// Record size in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

/// Flattens a limb's populated voxels, columns in `x` then `y` order and
/// `z` ascending inside each column.
///
/// A limb without visible voxels yields one zeroed record so it still owns
/// exactly one voxel buffer; the kernel skips color 0.
#[must_use]
pub fn pack_limb(limb: &Limb) -> Vec<VoxelRecord> {
    let (xs, ys, _) = limb.grid_size();
    let mut records = Vec::with_capacity(limb.voxel_count().max(1));
    for x in 0..xs {
        for y in 0..ys {
            let Some(column) = limb.column(usize::from(x), usize::from(y)) else { continue };
            for (z, voxel) in (0u32..).zip(column.voxels()) {
                if voxel.is_empty() {
                    continue;
                }
                records.push(VoxelRecord {
                    color: u32::from(voxel.color),
                    normal: u32::from(voxel.normal),
                    x: u32::from(x),
                    y: u32::from(y),
                    z,
                });
            }
        }
    }
    if records.is_empty() {
        records.push(VoxelRecord::zeroed());
    }
    records
}

/// Splits a transfer of `size` bytes into `(offset, len)` copies of at most
/// [`UPLOAD_ROW_BYTES`].
pub fn upload_chunks(size: u64) -> impl Iterator<Item = (u64, u64)> {
    (0..size.div_ceil(UPLOAD_ROW_BYTES)).map(move |row| {
        let offset = row * UPLOAD_ROW_BYTES;
        (offset, UPLOAD_ROW_BYTES.min(size - offset))
    })
}

/// Workgroup counts for `records` voxel invocations. Always at least one
/// group; counts above the per-axis cap fold into `y`.
#[must_use]
pub fn shade_groups(records: usize) -> [u32; 3] {
    let records = u32::try_from(records).unwrap_or(u32::MAX);
    let groups = records.div_ceil(SHADE_WORKGROUP_SIZE).max(1);
    if groups <= MAX_GROUPS_PER_AXIS {
        [groups, 1, 1]
    } else {
        [MAX_GROUPS_PER_AXIS, groups.div_ceil(MAX_GROUPS_PER_AXIS), 1]
    }
}

/// Workgroup counts covering a `width × height` canvas.
#[must_use]
pub const fn resolve_groups(width: u32, height: u32) -> [u32; 3] {
    [width.div_ceil(RESOLVE_WORKGROUP_EDGE), height.div_ceil(RESOLVE_WORKGROUP_EDGE), 1]
}

/// Per-limb uniform block of the shading kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LimbConstants {
    /// Row-vector position matrix, one row per WGSL column.
    pub transform: [[f32; 4]; 4],
    /// Canvas width and height.
    pub canvas: [f32; 4],
    /// Remap start, remap end, VPL section count, voxel record count.
    pub info: [u32; 4],
    /// Lighting section per normal index, four per vector.
    pub sections: [[u32; 4]; NORMAL_TABLE_SIZE / 4],
}

impl LimbConstants {
    /// Block size in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Packs one limb's constants.
    #[must_use]
    pub fn new(
        transform: &Mat4,
        canvas: (u32, u32),
        remap: (u8, u8),
        section_count: usize,
        records: usize,
        sections: &[u32; NORMAL_TABLE_SIZE],
    ) -> Self {
        let mut packed = [[0u32; 4]; NORMAL_TABLE_SIZE / 4];
        for (dst, src) in packed.iter_mut().zip(sections.chunks_exact(4)) {
            dst.copy_from_slice(src);
        }
        #[allow(clippy::cast_precision_loss)]
        let canvas = [canvas.0 as f32, canvas.1 as f32, 0.0, 0.0];
        Self {
            transform: transform.rows,
            canvas,
            info: [
                u32::from(remap.0),
                u32::from(remap.1),
                u32::try_from(section_count).unwrap_or(u32::MAX),
                u32::try_from(records).unwrap_or(u32::MAX),
            ],
            sections: packed,
        }
    }
}

/// Uniform block of the resolve kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneConstants {
    /// Background RGBA, 0..1.
    pub background: [f32; 4],
    /// Remap colour RGB, 0..1, alpha 1.
    pub remap: [f32; 4],
    /// Canvas width and height.
    pub canvas: [u32; 4],
    /// Extra light in `x`.
    pub light: [f32; 4],
}

impl SceneConstants {
    /// Block size in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Packs the scene block.
    #[must_use]
    pub fn new(background: [f32; 4], remap: Color, extra_light: f32, canvas: (u32, u32)) -> Self {
        let channel = |c: u8| f32::from(c) / 255.0;
        Self {
            background,
            remap: [channel(remap.r), channel(remap.g), channel(remap.b), 1.0],
            canvas: [canvas.0, canvas.1, 0, 0],
            light: [extra_light, 0.0, 0.0, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vxlview_formats::testing::{LimbSpec, VxlBuilder};
    use vxlview_formats::{Voxel, VoxelModel};

    #[test]
    fn test_layout_sizes() {
        assert_eq!(VoxelRecord::SIZE, 20);
        assert_eq!(LimbConstants::SIZE, 64 + 16 + 16 + 1024);
        assert_eq!(SceneConstants::SIZE, 64);
    }

    #[test]
    fn test_pack_skips_empty_voxels() {
        let bytes = VxlBuilder::new()
            .limb(
                LimbSpec::new("body", (2, 2, 4))
                    .voxel(1, 0, 3, Voxel::new(9, 2))
                    .voxel(0, 1, 0, Voxel::new(4, 7)),
            )
            .build();
        let model = VoxelModel::decode(&bytes).unwrap();
        let records = pack_limb(&model.limbs()[0]);
        assert_eq!(
            records,
            vec![
                VoxelRecord { color: 4, normal: 7, x: 0, y: 1, z: 0 },
                VoxelRecord { color: 9, normal: 2, x: 1, y: 0, z: 3 },
            ]
        );
    }

    #[test]
    fn test_empty_limb_gets_sentinel() {
        let bytes = VxlBuilder::new().limb(LimbSpec::new("empty", (3, 3, 3))).build();
        let model = VoxelModel::decode(&bytes).unwrap();
        assert_eq!(pack_limb(&model.limbs()[0]), vec![VoxelRecord::zeroed()]);
    }

    #[test]
    fn test_upload_chunks_cover_exactly() {
        assert_eq!(upload_chunks(20).collect::<Vec<_>>(), vec![(0, 20)]);
        let chunks: Vec<_> = upload_chunks(UPLOAD_ROW_BYTES * 2 + 4).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], (UPLOAD_ROW_BYTES * 2, 4));
        assert_eq!(chunks.iter().map(|c| c.1).sum::<u64>(), UPLOAD_ROW_BYTES * 2 + 4);
        assert_eq!(upload_chunks(0).count(), 0);
    }

    #[test]
    fn test_group_folding() {
        assert_eq!(shade_groups(0), [1, 1, 1]);
        assert_eq!(shade_groups(65), [2, 1, 1]);
        let big = (MAX_GROUPS_PER_AXIS as usize + 1) * SHADE_WORKGROUP_SIZE as usize;
        assert_eq!(shade_groups(big), [MAX_GROUPS_PER_AXIS, 2, 1]);
        assert_eq!(resolve_groups(256, 250), [32, 32, 1]);
    }

    #[test]
    fn test_constants_pack_sections() {
        let mut sections = [0u32; NORMAL_TABLE_SIZE];
        for (i, s) in sections.iter_mut().enumerate() {
            *s = i as u32 % 32;
        }
        let c = LimbConstants::new(&Mat4::IDENTITY, (256, 128), (16, 31), 32, 10, &sections);
        assert_eq!(c.sections[1], [4, 5, 6, 7]);
        assert_eq!(c.info, [16, 31, 32, 10]);
        assert_eq!(c.canvas[1], 128.0);
    }
}
