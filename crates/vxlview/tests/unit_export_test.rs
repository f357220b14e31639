//! # Unit Export Tests
//!
//! Unit discovery, renderer setup and PNG export against the headless
//! device. Images are blank (the headless device does not run kernels);
//! these tests cover file handling, sequencing and canvas geometry.

use std::path::{Path, PathBuf};

use vxlview::screenshot::{self, PreviewLayout, ShotOptions, PREVIEW_DIRECTIONS, PREVIEW_FILE_NAME};
use vxlview::unit::{discover, Part};
use vxlview::{build_renderer, AppError, Settings, SharedAssets, Unit};
use vxlview_formats::testing::{ramp_palette, HvaBuilder, LimbSpec, VplBuilder, VxlBuilder};
use vxlview_formats::vpl::CANONICAL_SECTION_COUNT;
use vxlview_formats::{Color, Mat4, Vec3, Voxel};
use vxlview_rendering::{HeadlessDevice, Renderer};

struct Scratch(PathBuf);

impl Scratch {
    fn new(tag: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("vxlview_{tag}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.0.join(name)
    }

    fn write_model(&self, stem: &str, frames: u32) {
        let vxl = VxlBuilder::new()
            .limb(LimbSpec::new(stem, (2, 2, 2)).voxel(1, 1, 1, Voxel::new(40, 3)))
            .build();
        std::fs::write(self.path(&format!("{stem}.vxl")), vxl).unwrap();
        std::fs::write(self.path(&format!("{stem}.hva")), HvaBuilder::new(frames, 1).build()).unwrap();
    }

    fn write_shared(&self) -> SharedAssets {
        std::fs::write(self.path("voxels.vpl"), VplBuilder::new(CANONICAL_SECTION_COUNT).build()).unwrap();
        std::fs::write(self.path("unittem.pal"), ramp_palette()).unwrap();
        SharedAssets::load(&self.path("voxels.vpl"), &self.path("unittem.pal")).unwrap()
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn renderer(scratch: &Scratch, settings: &Settings) -> Renderer<HeadlessDevice> {
    let assets = scratch.write_shared();
    build_renderer(HeadlessDevice::new(), settings, &assets, Color::new(252, 0, 0)).unwrap()
}

/// Test: turret and barrel are picked up next to the body; a part without
/// its animation file is skipped.
#[test]
fn test_discovery_finds_optional_parts() {
    let scratch = Scratch::new("discover");
    scratch.write_model("htnk", 1);
    scratch.write_model("htnktur", 1);
    std::fs::write(scratch.path("htnkbarl.vxl"), b"orphan").unwrap();

    let parts = discover(&scratch.path("htnk.vxl")).unwrap();
    assert_eq!(parts.iter().map(|p| p.part).collect::<Vec<_>>(), vec![Part::Body, Part::Turret]);
    assert_eq!(parts[1].hva, scratch.path("htnktur.hva"));
}

/// Test: a body without its animation file is an error.
#[test]
fn test_missing_body_animation_rejected() {
    let scratch = Scratch::new("nobody");
    scratch.write_model("htnk", 1);
    std::fs::remove_file(scratch.path("htnk.hva")).unwrap();

    let err = Unit::load(&scratch.path("htnk.vxl")).unwrap_err();
    assert!(matches!(err, AppError::MissingModel(path) if path.ends_with("htnk.hva")));
}

/// Test: every part lands in one renderer, body first.
#[test]
fn test_unit_loads_all_parts() {
    let scratch = Scratch::new("load");
    scratch.write_model("htnk", 2);
    scratch.write_model("htnktur", 3);
    scratch.write_model("htnkbarl", 1);

    let unit = Unit::load(&scratch.path("htnk.vxl")).unwrap();
    assert_eq!(unit.name(), "htnk");
    assert_eq!(unit.frames_per_direction(), 6);

    let mut renderer = renderer(&scratch, &Settings::default());
    unit.load_into(&mut renderer).unwrap();
    assert_eq!(renderer.limb_count(), 3);
    assert_eq!(renderer.remap(), Color::new(252, 0, 0));
}

/// Test: the sequence writes directions × frames images with running
/// indices into a freshly created directory.
#[test]
fn test_sequence_file_count_and_names() {
    let scratch = Scratch::new("sequence");
    scratch.write_model("htnk", 2);
    scratch.write_model("htnktur", 3);

    let unit = Unit::load(&scratch.path("htnk.vxl")).unwrap();
    let mut renderer = renderer(&scratch, &Settings::default());
    unit.load_into(&mut renderer).unwrap();

    let options = ShotOptions {
        output_dir: scratch.path("out/shots"),
        directions: 2,
        turret_rotation: 25.0,
        turret_offset: 0.0,
    };
    let written = screenshot::write_sequence(&mut renderer, &unit, &options).unwrap();
    assert_eq!(written.len(), 2 * 6);
    assert_eq!(written[0], scratch.path("out/shots/htnk 0.png"));
    assert_eq!(written[11], scratch.path("out/shots/htnk 11.png"));

    let first = image::open(&written[0]).unwrap();
    assert_eq!((first.width(), first.height()), (256, 256));
}

/// Test: the preview canvas has the cell-derived size and the renderer's
/// world, scale and background are restored afterwards.
#[test]
fn test_preview_size_and_state_restored() {
    let scratch = Scratch::new("preview");
    scratch.write_model("htnk", 1);

    let unit = Unit::load(&scratch.path("htnk.vxl")).unwrap();
    let settings = Settings::default();
    let mut renderer = renderer(&scratch, &settings);
    unit.load_into(&mut renderer).unwrap();

    let world = Mat4::translation(Vec3::new(1.0, 2.0, 3.0));
    renderer.set_world(world);
    renderer.set_scale_factor([2.0, 2.0, 2.0, 1.0]);

    let options = ShotOptions { output_dir: scratch.path("out"), ..ShotOptions::from_settings(&settings.settings) };
    let views = screenshot::render_preview_views(&mut renderer, &unit, &options).unwrap();
    assert_eq!(views.views.len(), PREVIEW_DIRECTIONS);
    assert_eq!(views.shadows.len(), PREVIEW_DIRECTIONS);
    assert_eq!(*renderer.world(), world);
    assert_eq!(renderer.scale_factor(), [2.0, 2.0, 2.0, 1.0]);
    assert_eq!(renderer.bg_color(), settings.settings.background_rgba());

    let path = screenshot::write_preview(&mut renderer, &unit, &options, (2, 1), None).unwrap();
    assert_eq!(path, scratch.path("out").join(PREVIEW_FILE_NAME));
    let layout = PreviewLayout::new((2, 1), (256, 256));
    let preview = image::open(Path::new(&path)).unwrap();
    assert_eq!((preview.width(), preview.height()), (layout.width(), layout.height()));
}

/// Test: an unknown remap color name is reported, not defaulted.
#[test]
fn test_unknown_color_rejected() {
    let settings = Settings::default();
    assert!(matches!(settings.require_color("Purple"), Err(AppError::UnknownColor(name)) if name == "Purple"));
}
