//! # Renderer
//!
//! Owns the device, the submission engine and three resource sets:
//!
//! - `present`: canvas, three render targets in a ring, palette, scene constants
//! - `lighting`: the VPL remap table
//! - `limbs`: per limb a voxel buffer, a constant block and its staging copy
//!
//! Per frame:
//!
//! ```text
//! rebind (if dirty) ─▶ per limb: compose ─▶ stage constants ─▶ dispatch shade ─▶ [execute+wait]
//!                   ─▶ present: resolve canvas into the current target ─▶ advance ring
//! ```
//!
//! Every failed step abandons the open batch so the next call starts from
//! `Idle`. [`Renderer::valid`] is the liveness check for the fixed resources.

use std::time::Duration;

use tracing::{debug, error, info, trace};
use vxlview_formats::transform::compose;
use vxlview_formats::{
    AnimationSet, Color, LightRig, LightingTable, LimbPose, LimbTailer, Mat4, Matrix3x4, Palette, Vec3, VoxelModel,
    DEFAULT_LIGHT_DIRECTION,
};

use crate::device::{BindingId, Command, GpuDevice, Kernel, ResourceDesc, ResourceKind, ResourceState};
use crate::error::{RenderError, RenderResult};
use crate::resource::{ResourceHandle, ResourceSet};
use crate::submission::{SubmissionEngine, SubmitMode, DEFAULT_WAIT_TIMEOUT};
use crate::upload::{
    pack_limb, resolve_groups, shade_groups, upload_chunks, LimbConstants, SceneConstants, CANVAS_PIXEL_BYTES,
    TARGET_PIXEL_BYTES,
};

/// Render targets in the present ring.
pub const TARGET_COUNT: usize = 3;

/// Remap colour used until one is chosen.
pub const DEFAULT_REMAP: Color = Color::new(252, 0, 0);

/// Default extra light applied by the resolve pass.
pub const DEFAULT_EXTRA_LIGHT: f32 = 0.2;

/// Default background, RGBA 0..1.
pub const DEFAULT_BACKGROUND: [f32; 4] = [0.0, 0.0, 1.0, 0.0];

/// Construction parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RendererConfig {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Batch grouping for per-limb work.
    pub submit_mode: SubmitMode,
    /// Bound on each fence wait.
    pub wait_timeout: Duration,
    /// Primary light direction.
    pub light_direction: Vec3,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            submit_mode: SubmitMode::default(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            light_direction: DEFAULT_LIGHT_DIRECTION,
        }
    }
}

/// How one model is posed by [`Renderer::reload_hva`].
#[derive(Clone, Copy, Debug)]
pub struct AnimationPose<'a> {
    /// Matrices for the model's limbs.
    pub animation: &'a AnimationSet,
    /// Frame, wrapped by the animation's frame count.
    pub frame: usize,
    /// Prerotation and offset.
    pub pose: LimbPose,
}

#[derive(Clone, Copy, Debug)]
struct FrameResources {
    canvas: ResourceHandle,
    targets: [ResourceHandle; TARGET_COUNT],
    palette: ResourceHandle,
    scene: ResourceHandle,
}

#[derive(Clone, Debug)]
struct LimbSlot {
    voxels: ResourceHandle,
    constants: ResourceHandle,
    staging: ResourceHandle,
    tailer: LimbTailer,
    remap: (u8, u8),
    records: usize,
    matrix: Matrix3x4,
    pose: LimbPose,
    binding: Option<BindingId>,
}

fn wrap_frame(animation: &AnimationSet, frame: usize) -> usize {
    frame.checked_rem(animation.frame_count()).unwrap_or(0)
}

fn byte_len(bytes: &[u8]) -> u64 {
    bytes.len() as u64
}

/// Drives decoded voxel models through a [`GpuDevice`].
#[derive(Debug)]
pub struct Renderer<D: GpuDevice> {
    device: D,
    engine: SubmissionEngine,
    present: ResourceSet,
    frame: Option<FrameResources>,
    lighting: ResourceSet,
    vpl: Option<(ResourceHandle, usize)>,
    limb_set: ResourceSet,
    limbs: Vec<LimbSlot>,
    resolve_bindings: Vec<BindingId>,
    dirty: bool,
    current: usize,
    front: Option<usize>,
    width: u32,
    height: u32,
    palette: Palette,
    light: LightRig,
    world: Mat4,
    scale_factor: [f32; 4],
    bg_color: [f32; 4],
    remap: Color,
    extra_light: f32,
}

impl<D: GpuDevice> Renderer<D> {
    /// Builds the fixed resources. A renderer whose allocation failed is
    /// returned anyway and reports `valid() == false`.
    pub fn new(device: D, config: RendererConfig) -> Self {
        let mut renderer = Self {
            device,
            engine: SubmissionEngine::new(config.submit_mode, config.wait_timeout),
            present: ResourceSet::new("present"),
            frame: None,
            lighting: ResourceSet::new("lighting"),
            vpl: None,
            limb_set: ResourceSet::new("limbs"),
            limbs: Vec::new(),
            resolve_bindings: Vec::new(),
            dirty: true,
            current: 0,
            front: None,
            width: config.width,
            height: config.height,
            palette: Palette::new(),
            light: LightRig::new(config.light_direction),
            world: Mat4::IDENTITY,
            scale_factor: [1.0; 4],
            bg_color: DEFAULT_BACKGROUND,
            remap: DEFAULT_REMAP,
            extra_light: DEFAULT_EXTRA_LIGHT,
        };
        if let Err(e) = renderer.resize_buffers(config.width, config.height) {
            error!(device = renderer.device.name(), error = %e, "renderer initialization failed");
        }
        renderer
    }

    /// Fixed resources exist and are consistent.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.frame.is_some() && self.present.is_valid()
    }

    fn frame_resources(&self) -> RenderResult<FrameResources> {
        if !self.valid() {
            return Err(RenderError::NotInitialized);
        }
        self.frame.ok_or(RenderError::NotInitialized)
    }

    /// Rebuilds canvas and render targets at a new size. The old set is
    /// replaced only when the new one is complete.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidDimensions`] for a zero side, or the allocation
    /// failure (the previous resources stay in place).
    pub fn resize_buffers(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        let mut set = ResourceSet::new("present");
        let frame = match Self::build_frame(&mut self.device, &mut set, width, height) {
            Ok(frame) => frame,
            Err(e) => {
                set.discard(&mut self.device);
                return Err(e);
            }
        };

        self.drop_bindings();
        self.present.discard(&mut self.device);
        self.present = set;
        self.frame = Some(frame);
        self.width = width;
        self.height = height;
        self.current = 0;
        self.front = None;
        self.dirty = true;
        self.upload_palette()?;
        info!(width, height, device = self.device.name(), "render targets ready");
        Ok(())
    }

    fn build_frame(device: &mut D, set: &mut ResourceSet, width: u32, height: u32) -> RenderResult<FrameResources> {
        let pixels = u64::from(width) * u64::from(height);
        let canvas = set.add(
            device,
            ResourceDesc::new("canvas", ResourceKind::Storage, pixels * CANVAS_PIXEL_BYTES, ResourceState::ShaderWrite),
        )?;
        let mut targets = [canvas; TARGET_COUNT];
        for (i, slot) in targets.iter_mut().enumerate() {
            *slot = set.add(
                device,
                ResourceDesc::new(
                    format!("render target {i}"),
                    ResourceKind::Storage,
                    pixels * TARGET_PIXEL_BYTES,
                    ResourceState::Present,
                ),
            )?;
        }
        let palette = set.add(device, ResourceDesc::new("palette", ResourceKind::Storage, 256 * 4, ResourceState::ShaderRead))?;
        let scene = set.add(
            device,
            ResourceDesc::new("scene constants", ResourceKind::Uniform, SceneConstants::SIZE, ResourceState::ShaderRead),
        )?;
        Ok(FrameResources { canvas, targets, palette, scene })
    }

    fn upload_palette(&mut self) -> RenderResult<()> {
        let frame = self.frame_resources()?;
        let id = self.present.id(frame.palette)?;
        let words = self.palette.to_rgba_words();
        self.device.write(id, 0, bytemuck::cast_slice(&words))?;
        Ok(())
    }

    /// Replaces the palette used by the resolve pass.
    ///
    /// # Errors
    ///
    /// [`RenderError::NotInitialized`] or the device write failure.
    pub fn load_pal(&mut self, palette: &Palette) -> RenderResult<()> {
        self.frame_resources()?;
        self.palette = palette.clone();
        self.upload_palette()?;
        debug!("palette uploaded");
        Ok(())
    }

    /// Replaces the lighting remap table.
    ///
    /// # Errors
    ///
    /// [`RenderError::NotInitialized`] or a device failure; the previous
    /// table is gone either way.
    pub fn load_vpl(&mut self, table: &LightingTable) -> RenderResult<()> {
        self.frame_resources()?;
        self.drop_bindings();
        self.lighting.discard(&mut self.device);
        self.vpl = None;
        self.dirty = true;

        let words = table.to_words();
        let bytes: &[u8] = bytemuck::cast_slice(&words);
        let result = self
            .lighting
            .add(
                &mut self.device,
                ResourceDesc::new("vpl table", ResourceKind::Storage, byte_len(bytes), ResourceState::ShaderRead),
            )
            .and_then(|handle| {
                let id = self.lighting.id(handle)?;
                self.device.write(id, 0, bytes)?;
                Ok(handle)
            });
        match result {
            Ok(handle) => {
                self.vpl = Some((handle, table.section_count()));
                info!(sections = table.section_count(), "lighting table loaded");
                Ok(())
            }
            Err(e) => {
                self.lighting.discard(&mut self.device);
                Err(e)
            }
        }
    }

    /// Uploads every limb of `vxl`, posed at `frame` of `hva`, after the
    /// limbs already loaded (or instead of them when `clear` is set).
    ///
    /// Each limb gets exactly one voxel buffer. Any failure drops every
    /// loaded limb.
    ///
    /// # Errors
    ///
    /// [`RenderError::NotInitialized`], [`RenderError::SectionMismatch`],
    /// [`RenderError::MissingFrame`] or a device failure.
    pub fn load_vxl(&mut self, vxl: &VoxelModel, hva: &AnimationSet, frame: usize, clear: bool) -> RenderResult<()> {
        self.frame_resources()?;
        if hva.section_count() != vxl.limb_count() {
            return Err(RenderError::SectionMismatch { limbs: vxl.limb_count(), sections: hva.section_count() });
        }
        let frame = wrap_frame(hva, frame);
        let matrices = (0..vxl.limb_count())
            .map(|section| hva.matrix(frame, section).copied().ok_or(RenderError::MissingFrame { frame, section }))
            .collect::<RenderResult<Vec<_>>>()?;
        if clear {
            self.clear_vxl_resources();
        }

        let mut transfer = ResourceSet::new("vxl transfer");
        let result = self.upload_model(vxl, &matrices, &mut transfer);
        transfer.discard(&mut self.device);
        if let Err(e) = result {
            error!(error = %e, "voxel upload failed, dropping loaded limbs");
            self.engine.abandon();
            self.clear_vxl_resources();
            return Err(e);
        }
        self.dirty = true;
        info!(
            limbs = vxl.limb_count(),
            total_limbs = self.limbs.len(),
            voxels = vxl.limbs().iter().map(|l| l.voxel_count()).sum::<usize>(),
            "voxel model loaded"
        );
        Ok(())
    }

    fn upload_model(&mut self, vxl: &VoxelModel, matrices: &[Matrix3x4], transfer: &mut ResourceSet) -> RenderResult<()> {
        self.engine.begin()?;
        for (limb, matrix) in vxl.limbs().iter().zip(matrices) {
            let name = limb.name();
            let records = pack_limb(limb);
            let bytes: &[u8] = bytemuck::cast_slice(&records);
            let size = byte_len(bytes);

            let voxels = self.limb_set.add(
                &mut self.device,
                ResourceDesc::new(format!("{name} voxels"), ResourceKind::Storage, size, ResourceState::CopyDest),
            )?;
            let constants = self.limb_set.add(
                &mut self.device,
                ResourceDesc::new(format!("{name} constants"), ResourceKind::Uniform, LimbConstants::SIZE, ResourceState::ShaderRead),
            )?;
            let staging = self.limb_set.add(
                &mut self.device,
                ResourceDesc::new(format!("{name} staging"), ResourceKind::Staging, LimbConstants::SIZE, ResourceState::CopySource),
            )?;
            let source = transfer.add(
                &mut self.device,
                ResourceDesc::new(format!("{name} transfer"), ResourceKind::Staging, size, ResourceState::CopySource),
            )?;

            let src = transfer.id(source)?;
            let dst = self.limb_set.id(voxels)?;
            self.device.write(src, 0, bytes)?;
            for (offset, len) in upload_chunks(size) {
                self.engine.record(Command::Copy { src, src_offset: offset, dst, dst_offset: offset, size: len })?;
            }
            self.engine.transition(&mut self.limb_set, voxels, ResourceState::ShaderRead)?;
            trace!(limb = %name, records = records.len(), bytes = size, "limb staged");

            self.limbs.push(LimbSlot {
                voxels,
                constants,
                staging,
                tailer: *limb.tailer(),
                remap: vxl.remap_range(),
                records: records.len(),
                matrix: *matrix,
                pose: LimbPose::default(),
                binding: None,
            });
        }
        self.engine.flush(&mut self.device)?;
        Ok(())
    }

    /// Re-poses every loaded limb. `poses` are taken in load order and
    /// their section counts must add up to the number of loaded limbs.
    ///
    /// # Errors
    ///
    /// [`RenderError::SectionMismatch`] or [`RenderError::MissingFrame`];
    /// no limb is changed on error.
    pub fn reload_hva(&mut self, poses: &[AnimationPose<'_>]) -> RenderResult<()> {
        let sections: usize = poses.iter().map(|p| p.animation.section_count()).sum();
        if sections != self.limbs.len() {
            return Err(RenderError::SectionMismatch { limbs: self.limbs.len(), sections });
        }
        let mut updates = Vec::with_capacity(sections);
        for pose in poses {
            let frame = wrap_frame(pose.animation, pose.frame);
            for section in 0..pose.animation.section_count() {
                let matrix = pose.animation.matrix(frame, section).ok_or(RenderError::MissingFrame { frame, section })?;
                updates.push((*matrix, pose.pose));
            }
        }
        for (slot, (matrix, pose)) in self.limbs.iter_mut().zip(updates) {
            slot.matrix = matrix;
            slot.pose = pose;
        }
        Ok(())
    }

    /// Drops every loaded limb.
    pub fn clear_vxl_resources(&mut self) {
        for slot in self.limbs.drain(..) {
            if let Some(binding) = slot.binding {
                self.device.destroy_binding(binding);
            }
        }
        self.limb_set.discard(&mut self.device);
        self.dirty = true;
    }

    fn drop_bindings(&mut self) {
        for binding in self.resolve_bindings.drain(..) {
            self.device.destroy_binding(binding);
        }
        for slot in &mut self.limbs {
            if let Some(binding) = slot.binding.take() {
                self.device.destroy_binding(binding);
            }
        }
        self.dirty = true;
    }

    fn rebind(&mut self) -> RenderResult<()> {
        let frame = self.frame_resources()?;
        self.drop_bindings();
        let canvas = self.present.id(frame.canvas)?;
        let palette = self.present.id(frame.palette)?;
        let scene = self.present.id(frame.scene)?;
        for target in frame.targets {
            let target = self.present.id(target)?;
            let binding = self.device.create_binding(Kernel::Resolve, &[canvas, target, palette, scene])?;
            self.resolve_bindings.push(binding);
        }
        if let Some((vpl, _)) = self.vpl {
            let vpl = self.lighting.id(vpl)?;
            for i in 0..self.limbs.len() {
                let slot = &self.limbs[i];
                let resources = [canvas, self.limb_set.id(slot.voxels)?, self.limb_set.id(slot.constants)?, vpl];
                let binding = self.device.create_binding(Kernel::Shade, &resources)?;
                self.limbs[i].binding = Some(binding);
            }
        }
        self.dirty = false;
        debug!(limbs = self.limbs.len(), "bindings rebuilt");
        Ok(())
    }

    fn ensure_bound(&mut self) -> RenderResult<()> {
        if self.dirty {
            self.rebind()?;
        }
        Ok(())
    }

    /// Shades every loaded limb into the canvas.
    ///
    /// # Errors
    ///
    /// [`RenderError::NotInitialized`], [`RenderError::ResourcesNotReady`]
    /// without limbs or lighting table, or a device failure.
    pub fn render_loaded_vxl(&mut self) -> RenderResult<()> {
        let frame = self.frame_resources()?;
        if self.limbs.is_empty() {
            return Err(RenderError::ResourcesNotReady("voxel limbs"));
        }
        let Some((_, sections)) = self.vpl else {
            return Err(RenderError::ResourcesNotReady("lighting table"));
        };
        let result = self.ensure_bound().and_then(|()| self.shade_limbs(frame, sections));
        if result.is_err() {
            self.engine.abandon();
        }
        result
    }

    fn shade_limbs(&mut self, frame: FrameResources, sections: usize) -> RenderResult<()> {
        let pipelined = self.engine.mode() == SubmitMode::Pipelined;
        let scale = Vec3::new(self.scale_factor[0], self.scale_factor[1], self.scale_factor[2]);
        let world = Mat4::scaling(scale) * self.world;

        for i in 0..self.limbs.len() {
            let slot = self.limbs[i].clone();
            let transform = compose(&slot.tailer, &slot.matrix, slot.pose, &world);
            let table = self.light.section_table(slot.tailer.normal_encoding, &transform.normal, sections);
            let constants =
                LimbConstants::new(&transform.position, (self.width, self.height), slot.remap, sections, slot.records, &table);
            let staging = self.limb_set.id(slot.staging)?;
            let constant_block = self.limb_set.id(slot.constants)?;
            let binding = slot.binding.ok_or(RenderError::ResourcesNotReady("shade bindings"))?;
            self.device.write(staging, 0, bytemuck::bytes_of(&constants))?;

            self.engine.begin()?;
            self.engine.transition(&mut self.present, frame.canvas, ResourceState::ShaderWrite)?;
            self.engine.transition(&mut self.limb_set, slot.constants, ResourceState::CopyDest)?;
            self.engine.record(Command::Copy {
                src: staging,
                src_offset: 0,
                dst: constant_block,
                dst_offset: 0,
                size: LimbConstants::SIZE,
            })?;
            self.engine.transition(&mut self.limb_set, slot.constants, ResourceState::ShaderRead)?;
            self.engine.transition(&mut self.limb_set, slot.voxels, ResourceState::ShaderWrite)?;
            self.engine.record(Command::Dispatch { kernel: Kernel::Shade, binding, groups: shade_groups(slot.records) })?;
            self.engine.transition(&mut self.limb_set, slot.voxels, ResourceState::ShaderRead)?;
            if !pipelined {
                self.engine.flush(&mut self.device)?;
            }
        }
        if pipelined {
            self.engine.flush(&mut self.device)?;
        }
        trace!(limbs = self.limbs.len(), pipelined, "limbs shaded");
        Ok(())
    }

    /// Zeroes the canvas.
    ///
    /// # Errors
    ///
    /// [`RenderError::NotInitialized`] or a device failure.
    pub fn clear_vxl_canvas(&mut self) -> RenderResult<()> {
        let frame = self.frame_resources()?;
        let result = self.record_clear(frame);
        if result.is_err() {
            self.engine.abandon();
        }
        result
    }

    fn record_clear(&mut self, frame: FrameResources) -> RenderResult<()> {
        let canvas = self.present.id(frame.canvas)?;
        self.engine.begin()?;
        self.engine.transition(&mut self.present, frame.canvas, ResourceState::CopyDest)?;
        self.engine.record(Command::Clear { target: canvas })?;
        self.engine.transition(&mut self.present, frame.canvas, ResourceState::ShaderWrite)?;
        self.engine.flush(&mut self.device)?;
        Ok(())
    }

    /// Resolves the canvas into the current render target, then advances
    /// the ring. The resolved target becomes the front target.
    ///
    /// # Errors
    ///
    /// [`RenderError::NotInitialized`] or a device failure.
    pub fn present(&mut self) -> RenderResult<()> {
        let frame = self.frame_resources()?;
        let result = self.ensure_bound().and_then(|()| self.resolve(frame));
        if let Err(e) = result {
            self.engine.abandon();
            return Err(e);
        }
        let presented = self.current;
        self.front = Some(presented);
        self.current = (presented + 1) % TARGET_COUNT;
        trace!(front = presented, back = self.current, "presented");
        Ok(())
    }

    fn resolve(&mut self, frame: FrameResources) -> RenderResult<()> {
        let scene = SceneConstants::new(self.bg_color, self.remap, self.extra_light, (self.width, self.height));
        let scene_id = self.present.id(frame.scene)?;
        self.device.write(scene_id, 0, bytemuck::bytes_of(&scene))?;
        let binding = *self
            .resolve_bindings
            .get(self.current)
            .ok_or(RenderError::ResourcesNotReady("resolve bindings"))?;
        let target = frame.targets[self.current];

        self.engine.begin()?;
        self.engine.transition(&mut self.present, frame.canvas, ResourceState::ShaderRead)?;
        self.engine.transition(&mut self.present, target, ResourceState::ShaderWrite)?;
        self.engine.record(Command::Dispatch {
            kernel: Kernel::Resolve,
            binding,
            groups: resolve_groups(self.width, self.height),
        })?;
        self.engine.transition(&mut self.present, target, ResourceState::Present)?;
        self.engine.transition(&mut self.present, frame.canvas, ResourceState::ShaderWrite)?;
        self.engine.flush(&mut self.device)?;
        Ok(())
    }

    /// Raw canvas: per pixel a key word and a hit count, little-endian.
    /// Blocks until the copy completes.
    ///
    /// # Errors
    ///
    /// [`RenderError::NotInitialized`] or a device failure.
    pub fn front_buffer_data(&mut self) -> RenderResult<Vec<u8>> {
        let frame = self.frame_resources()?;
        self.read_back(frame.canvas)
    }

    /// RGBA8 pixels of the most recently presented target. Blocks until
    /// the copy completes.
    ///
    /// # Errors
    ///
    /// [`RenderError::ResourcesNotReady`] before the first present, or a
    /// device failure.
    pub fn render_target_data(&mut self) -> RenderResult<Vec<u8>> {
        let frame = self.frame_resources()?;
        let front = self.front.ok_or(RenderError::ResourcesNotReady("presented frame"))?;
        self.read_back(frame.targets[front])
    }

    fn read_back(&mut self, handle: ResourceHandle) -> RenderResult<Vec<u8>> {
        let mut readback = ResourceSet::new("readback");
        let result = self.copy_out(&mut readback, handle);
        readback.discard(&mut self.device);
        if result.is_err() {
            self.engine.abandon();
        }
        result
    }

    fn copy_out(&mut self, readback: &mut ResourceSet, handle: ResourceHandle) -> RenderResult<Vec<u8>> {
        let src = self.present.id(handle)?;
        let (size, restore) = match (self.present.desc(handle), self.present.state(handle)) {
            (Some(desc), Some(state)) => (desc.size, state),
            _ => return Err(RenderError::StaleHandle),
        };
        let slot = readback.add(
            &mut self.device,
            ResourceDesc::new("readback", ResourceKind::Readback, size, ResourceState::CopyDest),
        )?;
        let dst = readback.id(slot)?;

        self.engine.begin()?;
        self.engine.transition(&mut self.present, handle, ResourceState::CopySource)?;
        self.engine.record(Command::Copy { src, src_offset: 0, dst, dst_offset: 0, size })?;
        self.engine.transition(&mut self.present, handle, restore)?;
        self.engine.flush(&mut self.device)?;
        self.device.read(dst).map_err(RenderError::from)
    }

    /// Loaded limb count.
    #[must_use]
    pub fn limb_count(&self) -> usize {
        self.limbs.len()
    }

    /// Bindings will be rebuilt before the next dispatch.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Canvas width.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Canvas height.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Ring index the next present resolves into.
    #[must_use]
    pub const fn current_target(&self) -> usize {
        self.current
    }

    /// Ring index of the most recent present.
    #[must_use]
    pub const fn front_target(&self) -> Option<usize> {
        self.front
    }

    /// Primary light direction.
    #[must_use]
    pub const fn light_direction(&self) -> Vec3 {
        self.light.light()
    }

    /// Changes the primary light; the fill light follows.
    pub fn set_light_direction(&mut self, light: Vec3) {
        self.light = LightRig::new(light);
    }

    /// World matrix applied after every limb transform.
    #[must_use]
    pub const fn world(&self) -> &Mat4 {
        &self.world
    }

    /// Replaces the world matrix.
    pub fn set_world(&mut self, world: Mat4) {
        self.world = world;
    }

    /// Scale applied ahead of the world matrix (`w` unused).
    #[must_use]
    pub const fn scale_factor(&self) -> [f32; 4] {
        self.scale_factor
    }

    /// Replaces the scale factor.
    pub fn set_scale_factor(&mut self, scale: [f32; 4]) {
        self.scale_factor = scale;
    }

    /// Background colour written where no voxel landed.
    #[must_use]
    pub const fn bg_color(&self) -> [f32; 4] {
        self.bg_color
    }

    /// Replaces the background colour.
    pub fn set_bg_color(&mut self, color: [f32; 4]) {
        self.bg_color = color;
    }

    /// Remap colour.
    #[must_use]
    pub const fn remap(&self) -> Color {
        self.remap
    }

    /// Replaces the remap colour.
    pub fn set_remap(&mut self, color: Color) {
        self.remap = color;
    }

    /// Extra light factor.
    #[must_use]
    pub const fn extra_light(&self) -> f32 {
        self.extra_light
    }

    /// Replaces the extra light factor.
    pub fn set_extra_light(&mut self, extra_light: f32) {
        self.extra_light = extra_light;
    }

    /// Palette used by the resolve pass.
    #[must_use]
    pub const fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Batch grouping mode.
    #[must_use]
    pub const fn submit_mode(&self) -> SubmitMode {
        self.engine.mode()
    }

    /// Changes the batch grouping mode.
    pub fn set_submit_mode(&mut self, mode: SubmitMode) {
        self.engine.set_mode(mode);
    }

    /// Submission engine.
    #[must_use]
    pub const fn engine(&self) -> &SubmissionEngine {
        &self.engine
    }

    /// Backend.
    #[must_use]
    pub const fn device(&self) -> &D {
        &self.device
    }

    /// Backend, mutably (failure injection in tests).
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

impl<D: GpuDevice> Drop for Renderer<D> {
    fn drop(&mut self) {
        self.engine.abandon();
        self.clear_vxl_resources();
        self.drop_bindings();
        self.lighting.discard(&mut self.device);
        self.present.discard(&mut self.device);
    }
}
