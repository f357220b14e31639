//! # Format Contract Tests
//!
//! Sparse column absence, lenient run decoding, animation bounds, palette
//! widening, the VPL section contract and VPL persistence.

use vxlview_formats::palette::{PALETTE_BYTES, PALETTE_ENTRIES};
use vxlview_formats::testing::{HvaBuilder, LimbSpec, VplBuilder, VxlBuilder};
use vxlview_formats::vpl::{CANONICAL_SECTION_COUNT, VPL_HEADER_SIZE};
use vxlview_formats::vxl::EMPTY_SPAN;
use vxlview_formats::{AnimationSet, Color, FormatError, LightingTable, Palette, Voxel, VoxelModel};

/// Test: An absent column has no voxels; a present empty column is not absent.
#[test]
fn test_absent_column_vs_empty_column() {
    let spec = LimbSpec::new("body", (2, 1, 4))
        .voxel(0, 0, 0, Voxel::new(1, 1))
        .present_empty(1, 0);
    let model = VoxelModel::decode(&VxlBuilder::new().limb(spec).build()).unwrap();
    let limb = model.limb(0).unwrap();

    let empty = limb.column(1, 0).unwrap();
    assert!(!empty.is_absent());
    assert_eq!(empty.voxels_size(), 0);

    let spec = LimbSpec::new("body", (2, 1, 4)).voxel(0, 0, 0, Voxel::new(1, 1));
    let model = VoxelModel::decode(&VxlBuilder::new().limb(spec).build()).unwrap();
    let absent = model.limb(0).unwrap().column(1, 0).unwrap();
    assert!(absent.is_absent());
    assert_eq!(absent.start(), EMPTY_SPAN);
    assert_eq!(absent.voxels_size(), 0);
    assert!(absent.voxels().iter().all(|v| v.is_empty()));
}

/// Test: Voxels past the column height are dropped and counted.
#[test]
fn test_column_overflow_is_counted() {
    // skip 1, run of 3 in a 2-tall column
    let raw = vec![1, 3, 9, 0, 9, 1, 9, 2, 3];
    let spec = LimbSpec::new("body", (1, 1, 2)).raw_column(0, 0, raw);
    let model = VoxelModel::decode(&VxlBuilder::new().limb(spec).build()).unwrap();
    assert_eq!(model.voxel_rh(0, 0, 0, 1), Voxel::new(9, 0));
    assert_eq!(model.limb(0).unwrap().voxel_count(), 1);
    assert_eq!(model.diagnostics().overflowed_voxels, 2);
}

/// Test: A run stream cut short at the end of the body degrades one column.
#[test]
fn test_truncated_run_degrades_column() {
    // declares 4 voxels, body ends after 1
    let raw = vec![0, 4, 7, 0];
    let spec = LimbSpec::new("body", (1, 1, 8)).raw_column(0, 0, raw);
    let model = VoxelModel::decode(&VxlBuilder::new().limb(spec).build()).unwrap();
    assert_eq!(model.voxel_rh(0, 0, 0, 0), Voxel::new(7, 0));
    assert_eq!(model.diagnostics().truncated_columns, 1);
}

/// Test: Disagreeing limb count copies are tolerated.
#[test]
fn test_limb_count_copy_mismatch_tolerated() {
    let bytes = VxlBuilder::new()
        .limb(LimbSpec::new("body", (1, 1, 1)))
        .limb_count_copy(9)
        .build();
    let model = VoxelModel::decode(&bytes).unwrap();
    assert_eq!(model.limb_count(), 1);
    assert_eq!(model.header().limb_count_copy, 9);
}

/// Test: Span tables pointing outside the body fail the whole decode.
#[test]
fn test_span_table_out_of_body_fails() {
    let mut bytes = VxlBuilder::new().limb(LimbSpec::new("body", (2, 2, 2))).build();
    // the tailer is the last 92 bytes; its first field is the start table offset
    let tailer = bytes.len() - 92;
    bytes[tailer..tailer + 4].copy_from_slice(&0x00FF_FFFFu32.to_le_bytes());
    assert!(matches!(
        VoxelModel::decode(&bytes),
        Err(FormatError::Truncated { what: "vxl span start table", .. })
    ));
}

/// Test: matrix() is absent outside the strict range for many shapes, including (0,0).
#[test]
fn test_animation_bounds() {
    for (frames, sections) in [(0, 0), (0, 3), (3, 0), (1, 1), (4, 2), (2, 5)] {
        let hva = AnimationSet::decode(&HvaBuilder::new(frames, sections).build()).unwrap();
        let (f, s) = (frames as usize, sections as usize);
        for frame in 0..f + 2 {
            for section in 0..s + 2 {
                let present = hva.matrix(frame, section).is_some();
                assert_eq!(present, frame < f && section < s, "({frames},{sections}) @ ({frame},{section})");
            }
        }
    }
}

/// Test: Every 6-bit channel value widens to exactly value * 4.
#[test]
fn test_palette_widening_all_values() {
    let mut raw = [0u8; PALETTE_BYTES];
    for (i, rgb) in raw.chunks_exact_mut(3).enumerate() {
        let v = (i % 64) as u8;
        rgb.copy_from_slice(&[v, 63 - v, (i / 4) as u8]);
    }
    let pal = Palette::from_bytes(&raw).unwrap();
    for (i, rgb) in raw.chunks_exact(3).enumerate() {
        assert_eq!(pal.color(i as u8), Color::new(rgb[0] * 4, rgb[1] * 4, rgb[2] * 4));
    }
}

/// Test: A VPL whose header declares 16 sections is rejected even when the
/// buffer size matches that header.
#[test]
fn test_vpl_with_16_sections_rejected() {
    let mut bytes = vec![0u8; VPL_HEADER_SIZE + PALETTE_BYTES + 16 * PALETTE_ENTRIES];
    bytes[8..12].copy_from_slice(&16u32.to_le_bytes());
    assert_eq!(
        LightingTable::decode(&bytes),
        Err(FormatError::SectionCount { expected: CANONICAL_SECTION_COUNT, actual: 16 })
    );

    let canonical = VplBuilder::new(CANONICAL_SECTION_COUNT).build();
    assert_eq!(LightingTable::decode(&canonical).unwrap().section_count(), 32);
}

/// Test: A saved VPL loads back identical.
#[test]
fn test_vpl_save_load() {
    let vpl = LightingTable::decode(&VplBuilder::new(CANONICAL_SECTION_COUNT).build()).unwrap();
    let path = std::env::temp_dir().join(format!("vxlview_vpl_{}.vpl", std::process::id()));
    vpl.save(&path).unwrap();
    let reloaded = LightingTable::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(reloaded, vpl);
}

/// Test: Missing files surface as I/O errors.
#[test]
fn test_missing_file_is_io_error() {
    let err = VoxelModel::from_file("does/not/exist.vxl").unwrap_err();
    assert!(matches!(err, FormatError::Io { .. }));
}
