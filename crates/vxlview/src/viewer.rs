//! Renderer setup from settings and shared assets.

use std::path::Path;

use tracing::info;
use vxlview_formats::{Color, LightingTable, Palette};
use vxlview_rendering::{GpuDevice, RenderError, Renderer};

use crate::config::Settings;
use crate::error::AppResult;

/// Lighting table and palette shared by every unit.
#[derive(Clone, Debug)]
pub struct SharedAssets {
    /// `voxels.vpl`
    pub lighting: LightingTable,
    /// `unittem.pal`
    pub palette: Palette,
}

impl SharedAssets {
    /// Reads both files.
    ///
    /// # Errors
    ///
    /// Any read or decode failure.
    pub fn load(vpl: &Path, pal: &Path) -> AppResult<Self> {
        let lighting = LightingTable::from_file(vpl)?;
        let palette = Palette::from_file(pal)?;
        info!(vpl = %vpl.display(), pal = %pal.display(), sections = lighting.section_count(), "shared assets loaded");
        Ok(Self { lighting, palette })
    }
}

/// Builds a renderer configured from `settings`, with the shared assets
/// uploaded and `remap` selected.
///
/// # Errors
///
/// [`RenderError::NotInitialized`] when the fixed resources could not be
/// created, or an upload failure.
pub fn build_renderer<D: GpuDevice>(
    device: D,
    settings: &Settings,
    assets: &SharedAssets,
    remap: Color,
) -> AppResult<Renderer<D>> {
    let mut renderer = Renderer::new(device, settings.settings.renderer_config());
    if !renderer.valid() {
        return Err(RenderError::NotInitialized.into());
    }
    renderer.load_vpl(&assets.lighting)?;
    renderer.load_pal(&assets.palette)?;
    renderer.set_bg_color(settings.settings.background_rgba());
    renderer.set_remap(remap);
    Ok(renderer)
}
