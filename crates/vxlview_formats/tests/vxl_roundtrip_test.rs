//! # VXL Round-Trip Tests
//!
//! Encodes synthetic models with the span encoder and checks the decoder
//! reproduces every populated voxel.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use vxlview_formats::testing::{LimbSpec, VxlBuilder};
use vxlview_formats::{Voxel, VoxelModel};

fn random_limb(rng: &mut ChaCha8Rng, name: &str, grid: (u8, u8, u8), fill: f64) -> LimbSpec {
    let mut limb = LimbSpec::new(name, grid);
    for x in 0..grid.0 {
        for y in 0..grid.1 {
            for z in 0..grid.2 {
                if rng.gen_bool(fill) {
                    let voxel = Voxel::new(rng.gen_range(1..=255), rng.gen());
                    limb = limb.voxel(x, y, z, voxel);
                }
            }
        }
    }
    limb
}

fn assert_matches(model: &VoxelModel, limb_index: usize, spec: &LimbSpec) {
    let limb = model.limb(limb_index).expect("limb decoded");
    let (xs, ys, zs) = limb.grid_size();
    let mut populated = 0;
    for x in 0..usize::from(xs) {
        for y in 0..usize::from(ys) {
            for z in 0..usize::from(zs) {
                let expected = spec
                    .voxels()
                    .get(&(x as u8, y as u8, z as u8))
                    .copied()
                    .unwrap_or(Voxel::EMPTY);
                assert_eq!(model.voxel_rh(limb_index, x, y, z), expected, "at ({x},{y},{z})");
                if !expected.is_empty() {
                    populated += 1;
                }
            }
        }
    }
    assert_eq!(limb.voxel_count(), populated);
}

/// Test: A limb with no voxels decodes with every column empty.
#[test]
fn test_roundtrip_zero_voxels() {
    let spec = LimbSpec::new("empty", (6, 5, 4));
    let model = VoxelModel::decode(&VxlBuilder::new().limb(spec.clone()).build()).unwrap();
    assert_matches(&model, 0, &spec);
    assert!(model.limb(0).unwrap().columns().iter().all(|c| c.is_absent()));
}

/// Test: A single voxel in the far corner survives the trip.
#[test]
fn test_roundtrip_one_voxel() {
    let spec = LimbSpec::new("one", (7, 9, 11)).voxel(6, 8, 10, Voxel::new(200, 17));
    let model = VoxelModel::decode(&VxlBuilder::new().limb(spec.clone()).build()).unwrap();
    assert_matches(&model, 0, &spec);
}

/// Test: A fully populated grid (including a 255-tall column) survives.
#[test]
fn test_roundtrip_grid_max() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let full = random_limb(&mut rng, "full", (4, 3, 255), 1.0);
    let model = VoxelModel::decode(&VxlBuilder::new().limb(full.clone()).build()).unwrap();
    assert_matches(&model, 0, &full);
    assert_eq!(model.limb(0).unwrap().voxel_count(), 4 * 3 * 255);
}

/// Test: Sparse random multi-limb models decode exactly.
#[test]
fn test_roundtrip_random_sparse_models() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
    for round in 0..8 {
        let grid = (rng.gen_range(1..=12), rng.gen_range(1..=12), rng.gen_range(1..=40));
        let body = random_limb(&mut rng, "body", grid, 0.3);
        let turret = random_limb(&mut rng, "turret", (3, 3, 3), 0.5);
        let bytes = VxlBuilder::new().limb(body.clone()).limb(turret.clone()).build();
        let model = VoxelModel::decode(&bytes).unwrap_or_else(|e| panic!("round {round}: {e}"));
        assert_eq!(model.limb_count(), 2);
        assert_matches(&model, 0, &body);
        assert_matches(&model, 1, &turret);
        assert!(model.diagnostics().is_clean());
    }
}

/// Test: Decoding the same bytes twice yields equal models.
#[test]
fn test_decode_is_idempotent() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let bytes = VxlBuilder::new()
        .limb(random_limb(&mut rng, "a", (8, 8, 8), 0.2))
        .corrupt_trailing_counts()
        .build();
    let first = VoxelModel::decode(&bytes).unwrap();
    let second = VoxelModel::decode(&bytes).unwrap();
    assert_eq!(first, second);
}

/// Test: The minimal limb scenario.
#[test]
fn test_minimal_limb() {
    let spec = LimbSpec::new("body", (1, 1, 1)).voxel(0, 0, 0, Voxel::new(5, 0));
    let model = VoxelModel::decode(&VxlBuilder::new().limb(spec).build()).unwrap();
    assert_eq!(model.limb_count(), 1);
    assert_eq!(model.voxel_rh(0, 0, 0, 0).color, 5);
    assert_eq!(model.limb(0).unwrap().name(), "body");
}
