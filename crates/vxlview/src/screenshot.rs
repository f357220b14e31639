//! # Screenshot Export
//!
//! Two products, both PNG:
//!
//! - A sequence: `directions` views around the unit, every view playing the
//!   animations through once, written as `"<name> <index>.png"`.
//! - The in-game preview: eight views with flattened shadows laid out on a
//!   3×3 grid over an optional background image.

use std::f32::consts::{PI, TAU};
use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgba, RgbaImage};
use tracing::{debug, info, warn};
use vxlview_formats::{Mat4, Vec3};
use vxlview_rendering::{GpuDevice, Renderer};

use crate::config::ShotSettings;
use crate::error::{AppError, AppResult};
use crate::unit::Unit;

/// First view of a sequence.
pub const SEQUENCE_START_ANGLE: f32 = -0.75 * PI;

/// First view of the in-game preview (top left).
pub const PREVIEW_START_ANGLE: f32 = -PI;

/// Views in the in-game preview.
pub const PREVIEW_DIRECTIONS: usize = 8;

/// Preview cell size in pixels.
pub const CELL_WIDTH: u32 = 60;
/// Preview cell height in pixels.
pub const CELL_HEIGHT: u32 = 30;

/// File written by [`write_preview`].
pub const PREVIEW_FILE_NAME: &str = "Preview.png";

/// Paint order of preview views.
const INDEX_TO_DIRECTION: [usize; PREVIEW_DIRECTIONS] = [1, 0, 2, 7, 3, 5, 6, 4];
/// Grid block (row-major 3×3) of each preview view.
const DIRECTION_TO_BLOCK: [usize; PREVIEW_DIRECTIONS] = [0, 1, 2, 5, 8, 7, 6, 3];

/// Alpha written where a shadow lands on transparent background.
const SHADOW_ALPHA: u8 = 127;

/// Angle of view `index` out of `directions` evenly spaced views.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn direction_angle(start: f32, directions: usize, index: usize) -> f32 {
    if directions == 0 {
        return start;
    }
    start + index as f32 * TAU / directions as f32
}

/// Sequence parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct ShotOptions {
    /// Output directory, created when missing.
    pub output_dir: PathBuf,
    /// Views around the unit.
    pub directions: usize,
    /// Turret turn in hundredths of a full circle.
    pub turret_rotation: f32,
    /// Turret and barrel shift along X.
    pub turret_offset: f32,
}

impl ShotOptions {
    /// Options taken from the settings file.
    #[must_use]
    pub fn from_settings(settings: &ShotSettings) -> Self {
        Self {
            output_dir: settings.screenshot_output_dir.clone(),
            directions: usize::try_from(settings.direction_count).unwrap_or(usize::MAX),
            turret_rotation: 0.0,
            turret_offset: 0.0,
        }
    }

    /// Turret rotation in radians.
    #[must_use]
    pub fn turret_angle(&self) -> f32 {
        self.turret_rotation * TAU / 100.0
    }
}

/// Presents the current canvas and reads it back as an image.
///
/// # Errors
///
/// Any renderer failure, or [`AppError::PixelCount`] when the readback
/// does not match the canvas.
pub fn capture<D: GpuDevice>(renderer: &mut Renderer<D>) -> AppResult<RgbaImage> {
    renderer.present()?;
    let pixels = renderer.render_target_data()?;
    let (width, height) = (renderer.width(), renderer.height());
    let expected = width as usize * height as usize * 4;
    let actual = pixels.len();
    RgbaImage::from_raw(width, height, pixels).ok_or(AppError::PixelCount { expected, actual })
}

/// Poses the unit for `frame` at `angle` and renders it.
///
/// # Errors
///
/// Any renderer failure.
pub fn render_frame<D: GpuDevice>(
    renderer: &mut Renderer<D>,
    unit: &Unit,
    frame: usize,
    angle: f32,
    options: &ShotOptions,
) -> AppResult<RgbaImage> {
    let poses = unit.poses(frame, angle, options.turret_angle(), options.turret_offset);
    renderer.reload_hva(&poses)?;
    renderer.clear_vxl_canvas()?;
    renderer.render_loaded_vxl()?;
    capture(renderer)
}

/// Writes `image` as PNG.
///
/// # Errors
///
/// [`AppError::Image`]
pub fn save_png(image: &RgbaImage, path: &Path) -> AppResult<()> {
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| AppError::image(path, &e))
}

fn ensure_dir(dir: &Path) -> AppResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| AppError::io(dir, &e))
}

/// File name of sequence image `index`.
#[must_use]
pub fn sequence_file_name(unit_name: &str, index: usize) -> String {
    format!("{unit_name} {index}.png")
}

/// Renders and writes the whole sequence. The unit must already be
/// loaded into `renderer`.
///
/// # Errors
///
/// The first renderer or filesystem failure; files written before it stay.
pub fn write_sequence<D: GpuDevice>(
    renderer: &mut Renderer<D>,
    unit: &Unit,
    options: &ShotOptions,
) -> AppResult<Vec<PathBuf>> {
    ensure_dir(&options.output_dir)?;
    let frames = unit.frames_per_direction();
    let mut written = Vec::with_capacity(options.directions * frames);

    for direction in 0..options.directions {
        let angle = direction_angle(SEQUENCE_START_ANGLE, options.directions, direction);
        for frame in 0..frames {
            let image = render_frame(renderer, unit, frame, angle, options)?;
            let path = options.output_dir.join(sequence_file_name(unit.name(), written.len()));
            save_png(&image, &path)?;
            debug!(path = %path.display(), direction, frame, "screenshot written");
            written.push(path);
        }
    }
    info!(count = written.len(), dir = %options.output_dir.display(), "screenshot sequence written");
    Ok(written)
}

/// Geometry of the in-game preview canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreviewLayout {
    /// Horizontal spacing in cells.
    pub cells_x: u32,
    /// Vertical spacing in cells.
    pub cells_y: u32,
    /// View width.
    pub tile_width: u32,
    /// View height.
    pub tile_height: u32,
}

impl PreviewLayout {
    /// Layout for views of `tile` size spaced by `cells`.
    #[must_use]
    pub const fn new(cells: (u32, u32), tile: (u32, u32)) -> Self {
        Self {
            cells_x: cells.0,
            cells_y: cells.1,
            tile_width: tile.0,
            tile_height: tile.1,
        }
    }

    /// Canvas width.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.tile_width + CELL_WIDTH * self.cells_x * 2
    }

    /// Canvas height.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.tile_height + CELL_HEIGHT * self.cells_y * 2
    }

    /// Top-left corner of the view for `direction`.
    #[must_use]
    pub const fn tile_origin(&self, direction: usize) -> (u32, u32) {
        let block = DIRECTION_TO_BLOCK[direction % PREVIEW_DIRECTIONS] as u32;
        let (bx, by) = (block % 3, block / 3);
        (bx * self.cells_x * CELL_WIDTH, by * self.cells_y * CELL_HEIGHT)
    }
}

/// Plain and shadow views for the preview, one per direction.
#[derive(Clone, Debug, Default)]
pub struct PreviewViews {
    /// Unit views.
    pub views: Vec<RgbaImage>,
    /// Flattened views used as shadows.
    pub shadows: Vec<RgbaImage>,
}

/// Renders the eight preview directions, each plain and flattened. World,
/// scale and background are restored afterwards, even on failure.
///
/// # Errors
///
/// The first renderer failure.
pub fn render_preview_views<D: GpuDevice>(
    renderer: &mut Renderer<D>,
    unit: &Unit,
    options: &ShotOptions,
) -> AppResult<PreviewViews> {
    let saved = (*renderer.world(), renderer.scale_factor(), renderer.bg_color());

    let result = render_preview_pass(renderer, unit, options);

    renderer.set_world(saved.0);
    renderer.set_scale_factor(saved.1);
    renderer.set_bg_color(saved.2);
    result
}

fn render_preview_pass<D: GpuDevice>(
    renderer: &mut Renderer<D>,
    unit: &Unit,
    options: &ShotOptions,
) -> AppResult<PreviewViews> {
    let poses = unit.poses(0, 0.0, 0.0, options.turret_offset);
    renderer.reload_hva(&poses)?;
    renderer.set_scale_factor([1.0; 4]);
    renderer.set_bg_color([0.0, 0.0, 1.0, 0.0]);

    let flatten = Mat4::scaling(Vec3::new(1.0, 1.0, 0.0));
    let mut out = PreviewViews::default();
    for direction in 0..PREVIEW_DIRECTIONS {
        let rotation = Mat4::rotation_z(direction_angle(PREVIEW_START_ANGLE, PREVIEW_DIRECTIONS, direction));
        for (world, sink) in [(rotation, &mut out.views), (rotation * flatten, &mut out.shadows)] {
            renderer.set_world(world);
            renderer.clear_vxl_canvas()?;
            renderer.render_loaded_vxl()?;
            sink.push(capture(renderer)?);
        }
    }
    Ok(out)
}

fn blit_centered(canvas: &mut RgbaImage, image: &RgbaImage) {
    let offset_x = (i64::from(canvas.width()) - i64::from(image.width())) / 2;
    let offset_y = (i64::from(canvas.height()) - i64::from(image.height())) / 2;
    for (x, y, pixel) in image.enumerate_pixels() {
        let (cx, cy) = (i64::from(x) + offset_x, i64::from(y) + offset_y);
        if let (Ok(cx), Ok(cy)) = (u32::try_from(cx), u32::try_from(cy)) {
            if cx < canvas.width() && cy < canvas.height() {
                canvas.put_pixel(cx, cy, *pixel);
            }
        }
    }
}

/// Lays views and shadows out on the preview canvas.
///
/// Shadow pixels halve an opaque background or become translucent black;
/// unit pixels overwrite both.
#[must_use]
pub fn composite(layout: &PreviewLayout, views: &PreviewViews, background: Option<&RgbaImage>) -> RgbaImage {
    let mut canvas = RgbaImage::new(layout.width(), layout.height());
    if let Some(background) = background {
        blit_centered(&mut canvas, background);
    }

    for direction in INDEX_TO_DIRECTION {
        let (Some(view), Some(shadow)) = (views.views.get(direction), views.shadows.get(direction)) else {
            continue;
        };
        let (ox, oy) = layout.tile_origin(direction);
        for (x, y, pixel) in view.enumerate_pixels() {
            let (dx, dy) = (ox + x, oy + y);
            if dx >= canvas.width() || dy >= canvas.height() {
                continue;
            }
            let dst = canvas.get_pixel_mut(dx, dy);
            if shadow.get_pixel_checked(x, y).is_some_and(|s| s[3] != 0) {
                *dst = if dst[3] == 0 {
                    Rgba([0, 0, 0, SHADOW_ALPHA])
                } else {
                    Rgba([dst[0] >> 1, dst[1] >> 1, dst[2] >> 1, dst[3]])
                };
            }
            if pixel[3] != 0 {
                *dst = *pixel;
            }
        }
    }
    canvas
}

/// Loads the preview background, `None` when absent or unreadable.
#[must_use]
pub fn load_background(path: &Path) -> Option<RgbaImage> {
    if !path.is_file() {
        debug!(path = %path.display(), "no preview background");
        return None;
    }
    match image::open(path) {
        Ok(image) => Some(image.to_rgba8()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "preview background unreadable, skipped");
            None
        }
    }
}

/// Renders, composites and writes the in-game preview.
///
/// # Errors
///
/// The first renderer or filesystem failure.
pub fn write_preview<D: GpuDevice>(
    renderer: &mut Renderer<D>,
    unit: &Unit,
    options: &ShotOptions,
    cells: (u32, u32),
    background: Option<&RgbaImage>,
) -> AppResult<PathBuf> {
    let views = render_preview_views(renderer, unit, options)?;
    let layout = PreviewLayout::new(cells, (renderer.width(), renderer.height()));
    let canvas = composite(&layout, &views, background);

    ensure_dir(&options.output_dir)?;
    let path = options.output_dir.join(PREVIEW_FILE_NAME);
    save_png(&canvas, &path)?;
    info!(path = %path.display(), width = layout.width(), height = layout.height(), "preview written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    #[test]
    fn test_direction_angles() {
        assert!((direction_angle(SEQUENCE_START_ANGLE, 8, 0) + 0.75 * PI).abs() < 1e-6);
        assert!((direction_angle(SEQUENCE_START_ANGLE, 8, 2) + 0.25 * PI).abs() < 1e-6);
        assert!((direction_angle(PREVIEW_START_ANGLE, 4, 1) + 0.5 * PI).abs() < 1e-6);
        assert_eq!(direction_angle(1.0, 0, 3), 1.0);
    }

    #[test]
    fn test_turret_rotation_is_hundredths_of_a_turn() {
        let options = ShotOptions { turret_rotation: 25.0, ..ShotOptions::from_settings(&ShotSettings::default()) };
        assert!((options.turret_angle() - PI / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_layout_geometry() {
        let layout = PreviewLayout::new((6, 6), (256, 256));
        assert_eq!((layout.width(), layout.height()), (256 + 720, 256 + 360));
        assert_eq!(layout.tile_origin(0), (0, 0));
        assert_eq!(layout.tile_origin(3), (720, 180));
        assert_eq!(layout.tile_origin(4), (720, 360));
        assert_eq!(layout.tile_origin(7), (0, 180));
    }

    #[test]
    fn test_every_grid_block_but_center_used() {
        let mut blocks: Vec<usize> = DIRECTION_TO_BLOCK.to_vec();
        blocks.sort_unstable();
        assert_eq!(blocks, vec![0, 1, 2, 3, 5, 6, 7, 8]);
    }

    #[test]
    fn test_shadow_over_transparent_and_opaque() {
        let layout = PreviewLayout::new((0, 0), (2, 1));
        let mut views = PreviewViews::default();
        for _ in 0..PREVIEW_DIRECTIONS {
            views.views.push(solid(2, 1, [0, 0, 0, 0]));
            views.shadows.push(solid(2, 1, [0, 0, 0, 255]));
        }

        let plain = composite(&layout, &views, None);
        assert_eq!(plain.get_pixel(0, 0), &Rgba([0, 0, 0, SHADOW_ALPHA]));

        let background = solid(2, 1, [200, 100, 50, 255]);
        let over = composite(&layout, &views, Some(&background));
        // Every direction overlaps here, so the background is halved eight times.
        assert_eq!(over.get_pixel(1, 0), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_unit_pixels_overwrite_shadow() {
        let layout = PreviewLayout::new((1, 1), (4, 4));
        let mut views = PreviewViews::default();
        for direction in 0..PREVIEW_DIRECTIONS {
            let value = u8::try_from(direction + 1).unwrap();
            views.views.push(solid(4, 4, [value, 0, 0, 255]));
            views.shadows.push(solid(4, 4, [0, 0, 0, 255]));
        }
        let canvas = composite(&layout, &views, None);
        let (x, y) = layout.tile_origin(0);
        assert_eq!(canvas.get_pixel(x, y)[0], 1);
        let (x, y) = layout.tile_origin(4);
        assert_eq!(canvas.get_pixel(x + 3, y + 3)[0], 5);
    }

    #[test]
    fn test_background_centered_and_clipped() {
        let mut canvas = solid(4, 4, [0, 0, 0, 0]);
        blit_centered(&mut canvas, &solid(6, 2, [9, 9, 9, 255]));
        assert_eq!(canvas.get_pixel(0, 1)[0], 9);
        assert_eq!(canvas.get_pixel(3, 2)[0], 9);
        assert_eq!(canvas.get_pixel(0, 0)[3], 0);
        assert_eq!(canvas.get_pixel(0, 3)[3], 0);
    }

    #[test]
    fn test_sequence_file_name() {
        assert_eq!(sequence_file_name("htnk", 12), "htnk 12.png");
    }
}
