//! Byte builders for synthetic assets.
//!
//! Used by the unit tests here, the integration tests, benchmarks and the
//! rendering crate's tests. The VXL builder is a real span encoder, so it
//! doubles as the reference for the run-length format.

use std::collections::{BTreeMap, BTreeSet};

use crate::math::{Matrix3x4, Vec3};
use crate::normals::NormalEncoding;
use crate::palette::PALETTE_BYTES;
use crate::vxl::{Voxel, EMPTY_SPAN};

/// Signature written by [`VxlBuilder`].
pub const VXL_SIGNATURE: &[u8; 16] = b"Voxel Animation\0";

/// One limb to encode.
#[derive(Clone, Debug)]
pub struct LimbSpec {
    name: String,
    grid: (u8, u8, u8),
    scale: f32,
    transform: Matrix3x4,
    min_bounds: Vec3,
    max_bounds: Vec3,
    normal_encoding: NormalEncoding,
    voxels: BTreeMap<(u8, u8, u8), Voxel>,
    raw_columns: BTreeMap<(u8, u8), Vec<u8>>,
    present_empty: BTreeSet<(u8, u8)>,
}

impl LimbSpec {
    /// Empty limb with bounds equal to the grid size, centred on the origin.
    #[must_use]
    pub fn new(name: &str, grid: (u8, u8, u8)) -> Self {
        let size = Vec3::new(f32::from(grid.0), f32::from(grid.1), f32::from(grid.2));
        Self {
            name: name.to_owned(),
            grid,
            scale: 1.0,
            transform: Matrix3x4::IDENTITY,
            min_bounds: -(size * 0.5),
            max_bounds: size * 0.5,
            normal_encoding: NormalEncoding::RedAlert2,
            voxels: BTreeMap::new(),
            raw_columns: BTreeMap::new(),
            present_empty: BTreeSet::new(),
        }
    }

    /// Places a voxel. Coordinates must lie inside the grid.
    #[must_use]
    pub fn voxel(mut self, x: u8, y: u8, z: u8, voxel: Voxel) -> Self {
        self.voxels.insert((x, y, z), voxel);
        self
    }

    /// Overrides the min/max bounds.
    #[must_use]
    pub fn bounds(mut self, min: Vec3, max: Vec3) -> Self {
        self.min_bounds = min;
        self.max_bounds = max;
        self
    }

    /// Overrides the limb scale.
    #[must_use]
    pub fn scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Overrides the normal encoding.
    #[must_use]
    pub fn normal_encoding(mut self, encoding: NormalEncoding) -> Self {
        self.normal_encoding = encoding;
        self
    }

    /// Writes `bytes` verbatim as the span data of column `(x, y)`.
    #[must_use]
    pub fn raw_column(mut self, x: u8, y: u8, bytes: Vec<u8>) -> Self {
        self.raw_columns.insert((x, y), bytes);
        self
    }

    /// Encodes column `(x, y)` as present even if it holds no voxels.
    #[must_use]
    pub fn present_empty(mut self, x: u8, y: u8) -> Self {
        self.present_empty.insert((x, y));
        self
    }

    /// All placed voxels.
    #[must_use]
    pub fn voxels(&self) -> &BTreeMap<(u8, u8, u8), Voxel> {
        &self.voxels
    }

    fn column_span(&self, x: u8, y: u8, corrupt: bool) -> Option<Vec<u8>> {
        if let Some(raw) = self.raw_columns.get(&(x, y)) {
            return Some(raw.clone());
        }
        let slots: Vec<(u8, Voxel)> = (0..self.grid.2)
            .filter_map(|z| self.voxels.get(&(x, y, z)).map(|v| (z, *v)))
            .filter(|(_, v)| !v.is_empty())
            .collect();
        if slots.is_empty() {
            return self
                .present_empty
                .contains(&(x, y))
                .then(|| vec![self.grid.2, 0, 0]);
        }

        let mut out = Vec::new();
        let mut cursor = 0u8;
        let mut i = 0;
        while i < slots.len() {
            let start = slots[i].0;
            let mut run = vec![slots[i].1];
            while i + run.len() < slots.len() && slots[i + run.len()].0 == start + run.len() as u8 {
                run.push(slots[i + run.len()].1);
            }
            let count = run.len() as u8;
            out.push(start - cursor);
            out.push(count);
            for v in &run {
                out.extend_from_slice(&[v.color, v.normal]);
            }
            out.push(if corrupt { count.wrapping_add(1) } else { count });
            cursor = start + count;
            i += run.len();
        }
        Some(out)
    }

    /// Body section for this limb: start table, end table, span data.
    /// Returns the bytes and the three offsets relative to `base`.
    fn encode_body(&self, base: usize, corrupt: bool) -> (Vec<u8>, [u32; 3]) {
        let (xs, ys, _) = self.grid;
        let n = usize::from(xs) * usize::from(ys);
        let mut starts = Vec::with_capacity(n);
        let mut ends = Vec::with_capacity(n);
        let mut data = Vec::new();
        for y in 0..ys {
            for x in 0..xs {
                match self.column_span(x, y, corrupt) {
                    Some(span) if !span.is_empty() => {
                        starts.push(data.len() as u32);
                        ends.push((data.len() + span.len() - 1) as u32);
                        data.extend_from_slice(&span);
                    }
                    _ => {
                        starts.push(EMPTY_SPAN);
                        ends.push(EMPTY_SPAN);
                    }
                }
            }
        }
        let mut out = Vec::with_capacity(n * 8 + data.len());
        out.extend(starts.iter().flat_map(|s| s.to_le_bytes()));
        out.extend(ends.iter().flat_map(|e| e.to_le_bytes()));
        out.extend_from_slice(&data);
        let offsets = [base as u32, (base + n * 4) as u32, (base + n * 8) as u32];
        (out, offsets)
    }
}

/// Builds VXL files.
#[derive(Clone, Debug, Default)]
pub struct VxlBuilder {
    limbs: Vec<LimbSpec>,
    remap: (u8, u8),
    limb_count_copy: Option<u32>,
    corrupt_trailing: bool,
    palette: Option<[u8; PALETTE_BYTES]>,
}

impl VxlBuilder {
    /// Builder with no limbs.
    #[must_use]
    pub fn new() -> Self {
        Self { remap: (16, 31), ..Self::default() }
    }

    /// Appends a limb.
    #[must_use]
    pub fn limb(mut self, limb: LimbSpec) -> Self {
        self.limbs.push(limb);
        self
    }

    /// Sets the remap range.
    #[must_use]
    pub fn remap(mut self, start: u8, end: u8) -> Self {
        self.remap = (start, end);
        self
    }

    /// Writes a different value into the duplicate limb count.
    #[must_use]
    pub fn limb_count_copy(mut self, copy: u32) -> Self {
        self.limb_count_copy = Some(copy);
        self
    }

    /// Writes every run's trailing count as `count + 1`.
    #[must_use]
    pub fn corrupt_trailing_counts(mut self) -> Self {
        self.corrupt_trailing = true;
        self
    }

    /// Embeds a raw (6-bit) palette.
    #[must_use]
    pub fn palette(mut self, raw: [u8; PALETTE_BYTES]) -> Self {
        self.palette = Some(raw);
        self
    }

    /// Encodes the file.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let mut body = Vec::new();
        let mut offsets = Vec::with_capacity(self.limbs.len());
        for limb in &self.limbs {
            let (bytes, off) = limb.encode_body(body.len(), self.corrupt_trailing);
            body.extend_from_slice(&bytes);
            offsets.push(off);
        }

        let count = self.limbs.len() as u32;
        let mut out = Vec::new();
        out.extend_from_slice(VXL_SIGNATURE);
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&self.limb_count_copy.unwrap_or(count).to_le_bytes());
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.push(self.remap.0);
        out.push(self.remap.1);
        out.extend_from_slice(&self.palette.unwrap_or_else(ramp_palette));

        for (index, limb) in self.limbs.iter().enumerate() {
            out.extend_from_slice(&name_bytes(&limb.name));
            out.extend_from_slice(&(index as i32).to_le_bytes());
            out.extend_from_slice(&1u32.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
        }

        out.extend_from_slice(&body);

        for (limb, off) in self.limbs.iter().zip(&offsets) {
            for o in off {
                out.extend_from_slice(&o.to_le_bytes());
            }
            out.extend_from_slice(&limb.scale.to_le_bytes());
            push_matrix(&mut out, &limb.transform);
            for v in [limb.min_bounds, limb.max_bounds] {
                for c in v.to_array() {
                    out.extend_from_slice(&c.to_le_bytes());
                }
            }
            out.extend_from_slice(&[limb.grid.0, limb.grid.1, limb.grid.2, limb.normal_encoding.tag()]);
        }
        out
    }
}

/// Builds HVA files. Matrix `(f, s)` defaults to identity with an x
/// translation of `f * 10 + s`.
#[derive(Clone, Debug)]
pub struct HvaBuilder {
    frames: u32,
    sections: u32,
    overrides: BTreeMap<(u32, u32), Matrix3x4>,
}

impl HvaBuilder {
    /// Builder for `frames × sections` matrices.
    #[must_use]
    pub fn new(frames: u32, sections: u32) -> Self {
        Self { frames, sections, overrides: BTreeMap::new() }
    }

    /// Replaces one matrix.
    #[must_use]
    pub fn matrix(mut self, frame: u32, section: u32, matrix: Matrix3x4) -> Self {
        self.overrides.insert((frame, section), matrix);
        self
    }

    /// Encodes the file.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&name_bytes("hva"));
        out.extend_from_slice(&self.frames.to_le_bytes());
        out.extend_from_slice(&self.sections.to_le_bytes());
        for s in 0..self.sections {
            out.extend_from_slice(&name_bytes(&format!("section{s}")));
        }
        for f in 0..self.frames {
            for s in 0..self.sections {
                let m = self.overrides.get(&(f, s)).copied().unwrap_or_else(|| {
                    let mut m = Matrix3x4::IDENTITY;
                    m.data[0][3] = (f * 10 + s) as f32;
                    m
                });
                push_matrix(&mut out, &m);
            }
        }
        out
    }
}

/// Builds VPL files. Row `s` maps color `c` to `c + s` (wrapping).
#[derive(Clone, Debug)]
pub struct VplBuilder {
    sections: u32,
    remap: (u32, u32),
}

impl VplBuilder {
    /// Builder with `sections` rows.
    #[must_use]
    pub fn new(sections: usize) -> Self {
        Self { sections: sections as u32, remap: (16, 31) }
    }

    /// Sets the remap range.
    #[must_use]
    pub fn remap_range(mut self, start: u32, end: u32) -> Self {
        self.remap = (start, end);
        self
    }

    /// Encodes the file.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for word in [self.remap.0, self.remap.1, self.sections, 0] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out.extend_from_slice(&ramp_palette());
        for s in 0..self.sections {
            out.extend((0..=255u8).map(|c| c.wrapping_add(s as u8)));
        }
        out
    }
}

/// Raw 6-bit palette where entry `i` is `(i % 64, (i / 4) % 64, 63 - i % 64)`.
#[must_use]
pub fn ramp_palette() -> [u8; PALETTE_BYTES] {
    let mut raw = [0u8; PALETTE_BYTES];
    for (i, rgb) in raw.chunks_exact_mut(3).enumerate() {
        let i = i as u8;
        rgb.copy_from_slice(&[i % 64, (i / 4) % 64, 63 - i % 64]);
    }
    raw
}

fn name_bytes(name: &str) -> [u8; 16] {
    let mut raw = [0u8; 16];
    let len = name.len().min(15);
    raw[..len].copy_from_slice(&name.as_bytes()[..len]);
    raw
}

fn push_matrix(out: &mut Vec<u8>, m: &Matrix3x4) {
    for row in &m.data {
        for c in row {
            out.extend_from_slice(&c.to_le_bytes());
        }
    }
}
