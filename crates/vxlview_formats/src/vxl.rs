//! VXL sparse voxel model decoder.
//!
//! ## File layout
//!
//! ```text
//! VXL File Structure (little-endian):
//! ├── Header (802 bytes)
//! │   ├── signature        16B
//! │   ├── reserved         u32
//! │   ├── limb_count       u32
//! │   ├── limb_count_copy  u32
//! │   ├── body_size        u32
//! │   ├── remap_start/end  u8, u8
//! │   └── palette          256 × 3B (6-bit)
//! ├── Limb headers (N × 28 bytes): name 16B, index i32, 2 × u32 reserved
//! ├── Body (body_size bytes)
//! │   └── per limb: x*y span starts (u32), x*y span ends (u32), span data
//! └── Limb tailers (N × 92 bytes)
//!     ├── span start/end/data offsets (3 × u32, relative to body)
//!     ├── scale f32, 3×4 matrix, min bounds, max bounds
//!     └── x, y, z size (u8 each), normal encoding (u8)
//! ```
//!
//! Span data is a run-length stream per column:
//! `(skip:u8, count:u8, count × (color:u8, normal:u8), trailing_count:u8)*`.
//!
//! Whole-file structure errors fail the decode. Damage inside one column's
//! run stream only degrades that column and is reported through `tracing`.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{FormatError, FormatResult};
use crate::math::{Matrix3x4, Vec3};
use crate::normals::NormalEncoding;
use crate::palette::{Palette, PALETTE_BYTES};
use crate::reader::{fixed_name, u32_table, ByteReader};

/// Fixed header size.
pub const HEADER_SIZE: usize = 16 + 4 + 4 + 4 + 4 + 1 + 1 + PALETTE_BYTES;

/// Size of one limb header record.
pub const LIMB_HEADER_SIZE: usize = 16 + 4 + 4 + 4;

/// Size of one limb tailer record.
pub const LIMB_TAILER_SIZE: usize = 3 * 4 + 4 + Matrix3x4::SIZE + 12 + 12 + 4;

/// Span offset marking a column with no run data.
pub const EMPTY_SPAN: u32 = 0xFFFF_FFFF;

/// One voxel slot. Color 0 is reserved for "empty" and never renders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Voxel {
    /// Palette index, 0 = empty.
    pub color: u8,
    /// Index into the limb's normal table.
    pub normal: u8,
}

impl Voxel {
    /// The empty voxel.
    pub const EMPTY: Self = Self { color: 0, normal: 0 };

    /// Creates a voxel.
    #[must_use]
    pub const fn new(color: u8, normal: u8) -> Self {
        Self { color, normal }
    }

    /// Returns true if the slot is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.color == 0
    }
}

/// File header.
#[derive(Clone, Debug, PartialEq)]
pub struct VxlHeader {
    /// Raw signature bytes.
    pub signature: [u8; 16],
    /// Declared limb count.
    pub limb_count: u32,
    /// Second copy of the limb count.
    pub limb_count_copy: u32,
    /// Size of the body region.
    pub body_size: u32,
    /// First palette index of the player remap range.
    pub remap_start: u8,
    /// Last palette index of the player remap range.
    pub remap_end: u8,
    /// Embedded palette, widened.
    pub palette: Palette,
}

/// Per-limb header record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LimbHeader {
    /// Raw name bytes.
    pub name: [u8; 16],
    /// Limb index as stored.
    pub index: i32,
}

impl LimbHeader {
    /// Name up to the first NUL.
    #[must_use]
    pub fn name(&self) -> String {
        fixed_name(&self.name)
    }
}

/// Per-limb tailer record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LimbTailer {
    /// Offset of the span start table, relative to the body.
    pub span_start_offset: u32,
    /// Offset of the span end table, relative to the body.
    pub span_end_offset: u32,
    /// Offset of the span data blob, relative to the body.
    pub span_data_offset: u32,
    /// Limb scale.
    pub scale: f32,
    /// Embedded transform.
    pub transform: Matrix3x4,
    /// Minimum bounds in model space.
    pub min_bounds: Vec3,
    /// Maximum bounds in model space.
    pub max_bounds: Vec3,
    /// Grid width.
    pub x_size: u8,
    /// Grid depth.
    pub y_size: u8,
    /// Grid height.
    pub z_size: u8,
    /// Normal encoding.
    pub normal_encoding: NormalEncoding,
}

impl LimbTailer {
    /// Grid size as floats.
    #[must_use]
    pub fn grid_size(&self) -> Vec3 {
        Vec3::new(f32::from(self.x_size), f32::from(self.y_size), f32::from(self.z_size))
    }

    /// Number of columns (`x * y`).
    #[must_use]
    pub fn column_count(&self) -> usize {
        usize::from(self.x_size) * usize::from(self.y_size)
    }
}

/// One `(x, y)` column of a limb.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    start: u32,
    end: u32,
    voxels: Vec<Voxel>,
    voxels_size: usize,
}

impl Column {
    /// Start offset within the limb's span data.
    #[must_use]
    pub const fn start(&self) -> u32 {
        self.start
    }

    /// End offset within the limb's span data.
    #[must_use]
    pub const fn end(&self) -> u32 {
        self.end
    }

    /// True when either offset is the absent sentinel.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        self.start == EMPTY_SPAN || self.end == EMPTY_SPAN
    }

    /// Dense slots indexed by z (length = grid z size).
    #[must_use]
    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    /// Populated voxel at `z`, `None` for empty or out of range.
    #[must_use]
    pub fn get(&self, z: usize) -> Option<Voxel> {
        self.voxels.get(z).copied().filter(|v| !v.is_empty())
    }

    /// Number of populated slots.
    #[must_use]
    pub const fn voxels_size(&self) -> usize {
        self.voxels_size
    }
}

/// One rigid part of a model.
#[derive(Clone, Debug, PartialEq)]
pub struct Limb {
    header: LimbHeader,
    tailer: LimbTailer,
    columns: Vec<Column>,
}

impl Limb {
    /// Limb name.
    #[must_use]
    pub fn name(&self) -> String {
        self.header.name()
    }

    /// Header record.
    #[must_use]
    pub const fn header(&self) -> &LimbHeader {
        &self.header
    }

    /// Tailer record.
    #[must_use]
    pub const fn tailer(&self) -> &LimbTailer {
        &self.tailer
    }

    /// `(x, y, z)` grid size.
    #[must_use]
    pub const fn grid_size(&self) -> (u8, u8, u8) {
        (self.tailer.x_size, self.tailer.y_size, self.tailer.z_size)
    }

    /// Column at `(x, y)`.
    #[must_use]
    pub fn column(&self, x: usize, y: usize) -> Option<&Column> {
        let (xs, ys, _) = self.grid_size();
        if x >= usize::from(xs) || y >= usize::from(ys) {
            return None;
        }
        self.columns.get(y * usize::from(xs) + x)
    }

    /// All columns, indexed `y * x_size + x`.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Voxel at `(x, y, z)`; the empty voxel when out of range.
    #[must_use]
    pub fn voxel(&self, x: usize, y: usize, z: usize) -> Voxel {
        self.column(x, y)
            .and_then(|c| c.voxels.get(z).copied())
            .unwrap_or(Voxel::EMPTY)
    }

    /// Total populated voxels.
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.columns.iter().map(Column::voxels_size).sum()
    }
}

/// Counters for tolerated damage found while decoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeDiagnostics {
    /// Runs whose trailing count disagreed with their leading count.
    pub run_mismatches: usize,
    /// Voxels that fell past the column height and were dropped.
    pub overflowed_voxels: usize,
    /// Columns whose run stream ran off the end of the body.
    pub truncated_columns: usize,
}

impl DecodeDiagnostics {
    /// True when nothing was tolerated.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.run_mismatches == 0 && self.overflowed_voxels == 0 && self.truncated_columns == 0
    }
}

/// A decoded VXL file.
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelModel {
    header: VxlHeader,
    limbs: Vec<Limb>,
    diagnostics: DecodeDiagnostics,
}

impl VoxelModel {
    /// Decodes a VXL buffer.
    ///
    /// # Errors
    ///
    /// Fails on an empty buffer, a zero limb count, truncated header, limb
    /// header or tailer regions, or span tables that fall outside the body.
    pub fn decode(data: &[u8]) -> FormatResult<Self> {
        if data.is_empty() {
            return Err(FormatError::Empty("vxl"));
        }

        let mut reader = ByteReader::new(data, "vxl header");
        let header = read_header(&mut reader)?;
        if header.limb_count == 0 {
            return Err(FormatError::NoLimbs);
        }
        if header.limb_count != header.limb_count_copy {
            warn!(
                limb_count = header.limb_count,
                copy = header.limb_count_copy,
                "vxl: limb count copies disagree, using the first"
            );
        }

        let limb_count = header.limb_count as usize;
        reader.region("vxl limb headers");
        let mut headers = Vec::with_capacity(limb_count.min(reader.remaining() / LIMB_HEADER_SIZE));
        for _ in 0..limb_count {
            headers.push(read_limb_header(&mut reader)?);
        }

        let body_start = reader.position();
        reader.region("vxl body");
        let body = reader.take(header.body_size as usize)?;

        reader.region("vxl limb tailers");
        let mut tailers = Vec::with_capacity(headers.len());
        for _ in 0..limb_count {
            tailers.push(read_limb_tailer(&mut reader)?);
        }

        let mut diagnostics = DecodeDiagnostics::default();
        let mut limbs = Vec::with_capacity(limb_count);
        for (index, (limb_header, tailer)) in headers.into_iter().zip(tailers).enumerate() {
            let columns = decode_columns(body, body_start, index, &tailer, &mut diagnostics)?;
            limbs.push(Limb { header: limb_header, tailer, columns });
        }

        debug!(
            limbs = limbs.len(),
            voxels = limbs.iter().map(Limb::voxel_count).sum::<usize>(),
            "vxl decoded"
        );

        Ok(Self { header, limbs, diagnostics })
    }

    /// Reads and decodes a `.vxl` file.
    ///
    /// # Errors
    ///
    /// I/O failures or any error from [`VoxelModel::decode`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> FormatResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| FormatError::io(path, &e))?;
        Self::decode(&data)
    }

    /// Header record.
    #[must_use]
    pub const fn header(&self) -> &VxlHeader {
        &self.header
    }

    /// Embedded palette.
    #[must_use]
    pub const fn palette(&self) -> &Palette {
        &self.header.palette
    }

    /// Remap range as `(start, end)`.
    #[must_use]
    pub const fn remap_range(&self) -> (u8, u8) {
        (self.header.remap_start, self.header.remap_end)
    }

    /// Number of limbs.
    #[must_use]
    pub fn limb_count(&self) -> usize {
        self.limbs.len()
    }

    /// All limbs.
    #[must_use]
    pub fn limbs(&self) -> &[Limb] {
        &self.limbs
    }

    /// Limb by index.
    #[must_use]
    pub fn limb(&self, limb: usize) -> Option<&Limb> {
        self.limbs.get(limb)
    }

    /// Limb header by index.
    #[must_use]
    pub fn limb_header(&self, limb: usize) -> Option<&LimbHeader> {
        self.limb(limb).map(Limb::header)
    }

    /// Limb tailer by index.
    #[must_use]
    pub fn limb_tailer(&self, limb: usize) -> Option<&LimbTailer> {
        self.limb(limb).map(Limb::tailer)
    }

    /// Voxel in the file's own (right-handed) axis order.
    #[must_use]
    pub fn voxel_rh(&self, limb: usize, x: usize, y: usize, z: usize) -> Voxel {
        self.limb(limb).map_or(Voxel::EMPTY, |l| l.voxel(x, y, z))
    }

    /// Voxel with x and y swapped.
    #[must_use]
    pub fn voxel_lh(&self, limb: usize, x: usize, y: usize, z: usize) -> Voxel {
        self.voxel_rh(limb, y, x, z)
    }

    /// Damage tolerated while decoding.
    #[must_use]
    pub const fn diagnostics(&self) -> &DecodeDiagnostics {
        &self.diagnostics
    }
}

fn read_header(reader: &mut ByteReader<'_>) -> FormatResult<VxlHeader> {
    let signature = reader.read_array::<16>()?;
    let _reserved = reader.read_u32()?;
    let limb_count = reader.read_u32()?;
    let limb_count_copy = reader.read_u32()?;
    let body_size = reader.read_u32()?;
    let remap_start = reader.read_u8()?;
    let remap_end = reader.read_u8()?;
    let palette = Palette::from_raw(&reader.read_array::<PALETTE_BYTES>()?);
    Ok(VxlHeader {
        signature,
        limb_count,
        limb_count_copy,
        body_size,
        remap_start,
        remap_end,
        palette,
    })
}

fn read_limb_header(reader: &mut ByteReader<'_>) -> FormatResult<LimbHeader> {
    let name = reader.read_array::<16>()?;
    let index = reader.read_i32()?;
    reader.skip(8)?;
    Ok(LimbHeader { name, index })
}

fn read_limb_tailer(reader: &mut ByteReader<'_>) -> FormatResult<LimbTailer> {
    Ok(LimbTailer {
        span_start_offset: reader.read_u32()?,
        span_end_offset: reader.read_u32()?,
        span_data_offset: reader.read_u32()?,
        scale: reader.read_f32()?,
        transform: reader.read_matrix()?,
        min_bounds: reader.read_vec3()?,
        max_bounds: reader.read_vec3()?,
        x_size: reader.read_u8()?,
        y_size: reader.read_u8()?,
        z_size: reader.read_u8()?,
        normal_encoding: NormalEncoding::from_tag(reader.read_u8()?),
    })
}

fn decode_columns(
    body: &[u8],
    body_start: usize,
    limb: usize,
    tailer: &LimbTailer,
    diagnostics: &mut DecodeDiagnostics,
) -> FormatResult<Vec<Column>> {
    let count = tailer.column_count();
    let table = |offset: u32, what: &'static str| {
        u32_table(body, offset as usize, count).ok_or(FormatError::Truncated {
            what,
            offset: body_start + offset as usize,
            needed: count * 4,
            available: body.len().saturating_sub(offset as usize),
        })
    };
    let starts = table(tailer.span_start_offset, "vxl span start table")?;
    let ends = table(tailer.span_end_offset, "vxl span end table")?;

    let z_size = usize::from(tailer.z_size);
    let data_base = tailer.span_data_offset as usize;

    let columns = starts
        .into_iter()
        .zip(ends)
        .enumerate()
        .map(|(index, (start, end))| {
            let mut column = Column { start, end, voxels: vec![Voxel::EMPTY; z_size], voxels_size: 0 };
            if !column.is_absent() {
                decode_runs(body, data_base, &mut column, diagnostics, limb, index);
                column.voxels_size = column.voxels.iter().filter(|v| !v.is_empty()).count();
            }
            column
        })
        .collect();
    Ok(columns)
}

/// Walks one column's run stream. Stops once the cursor passes the end
/// offset; every byte access is bounds-checked against the body.
fn decode_runs(
    body: &[u8],
    data_base: usize,
    column: &mut Column,
    diagnostics: &mut DecodeDiagnostics,
    limb: usize,
    index: usize,
) {
    let byte = |pos: usize| body.get(pos).copied();
    let mut pos = data_base.saturating_add(column.start as usize);
    let end = data_base.saturating_add(column.end as usize);
    let mut z = 0usize;

    loop {
        let (Some(skip), Some(count)) = (byte(pos), byte(pos.saturating_add(1))) else {
            diagnostics.truncated_columns += 1;
            warn!(limb, column = index, offset = pos, "vxl: run header past end of body");
            return;
        };
        pos += 2;
        z += usize::from(skip);

        for _ in 0..count {
            let (Some(color), Some(normal)) = (byte(pos), byte(pos.saturating_add(1))) else {
                diagnostics.truncated_columns += 1;
                warn!(limb, column = index, offset = pos, "vxl: voxel run past end of body");
                return;
            };
            match column.voxels.get_mut(z) {
                Some(slot) => *slot = Voxel::new(color, normal),
                None => diagnostics.overflowed_voxels += 1,
            }
            pos += 2;
            z += 1;
        }

        let Some(trailing) = byte(pos) else {
            diagnostics.truncated_columns += 1;
            warn!(limb, column = index, offset = pos, "vxl: trailing count past end of body");
            return;
        };
        pos += 1;

        if trailing != count {
            diagnostics.run_mismatches += 1;
            warn!(limb, column = index, count, trailing, "vxl: run trailing count mismatch");
        }

        if pos > end {
            return;
        }
    }
}
