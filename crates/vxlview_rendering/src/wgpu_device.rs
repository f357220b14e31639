//! wgpu compute backend.
//!
//! Buffers map one-to-one onto `wgpu::Buffer`s and each kernel owns a
//! compute pipeline with an explicit bind group layout. A batch becomes one
//! command encoder and one queue submission; the fence is a counter bumped
//! from `on_submitted_work_done`. wgpu tracks buffer usage itself, so
//! transitions are only validated and traced here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::device::{BindingId, Command, GpuDevice, Kernel, ResourceDesc, ResourceId, ResourceKind, WaitStatus};
use crate::error::DeviceError;
use crate::shaders::{RESOLVE_WGSL, SHADE_WGSL};

struct KernelPipeline {
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

/// GPU device driven through wgpu.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    shade: KernelPipeline,
    resolve: KernelPipeline,
    buffers: HashMap<ResourceId, (wgpu::Buffer, ResourceKind)>,
    bindings: HashMap<BindingId, wgpu::BindGroup>,
    next_id: u64,
    completed: Arc<AtomicU64>,
}

impl std::fmt::Debug for WgpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuDevice")
            .field("adapter", &self.adapter_name)
            .field("buffers", &self.buffers.len())
            .field("bindings", &self.bindings.len())
            .finish_non_exhaustive()
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn layout_entries(kernel: Kernel) -> [wgpu::BindGroupLayoutEntry; 4] {
    match kernel {
        Kernel::Shade => [storage_entry(0, false), storage_entry(1, true), uniform_entry(2), storage_entry(3, true)],
        Kernel::Resolve => [storage_entry(0, true), storage_entry(1, false), storage_entry(2, true), uniform_entry(3)],
    }
}

fn build_pipeline(device: &wgpu::Device, kernel: Kernel) -> KernelPipeline {
    let (label, source) = match kernel {
        Kernel::Shade => ("Voxel Shade", SHADE_WGSL),
        Kernel::Resolve => ("Canvas Resolve", RESOLVE_WGSL),
    };
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &layout_entries(kernel),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: "main",
    });
    KernelPipeline { layout, pipeline }
}

const fn usage(kind: ResourceKind) -> wgpu::BufferUsages {
    match kind {
        ResourceKind::Storage => wgpu::BufferUsages::STORAGE
            .union(wgpu::BufferUsages::COPY_DST)
            .union(wgpu::BufferUsages::COPY_SRC),
        ResourceKind::Uniform => wgpu::BufferUsages::UNIFORM.union(wgpu::BufferUsages::COPY_DST),
        ResourceKind::Staging => wgpu::BufferUsages::COPY_SRC.union(wgpu::BufferUsages::COPY_DST),
        ResourceKind::Readback => wgpu::BufferUsages::MAP_READ.union(wgpu::BufferUsages::COPY_DST),
    }
}

impl WgpuDevice {
    /// Opens the first high-performance adapter and builds both kernels.
    ///
    /// # Errors
    ///
    /// [`DeviceError::AdapterUnavailable`] or [`DeviceError::RequestDevice`].
    pub fn new() -> Result<Self, DeviceError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(DeviceError::AdapterUnavailable)?;
        let adapter_name = adapter.get_info().name;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("vxlview"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
            },
            None,
        ))
        .map_err(|e| DeviceError::RequestDevice(e.to_string()))?;
        info!(adapter = %adapter_name, "GPU device ready");

        let shade = build_pipeline(&device, Kernel::Shade);
        let resolve = build_pipeline(&device, Kernel::Resolve);
        Ok(Self {
            device,
            queue,
            adapter_name,
            shade,
            resolve,
            buffers: HashMap::new(),
            bindings: HashMap::new(),
            next_id: 0,
            completed: Arc::new(AtomicU64::new(0)),
        })
    }

    fn buffer(&self, id: ResourceId) -> Result<&wgpu::Buffer, DeviceError> {
        self.buffers.get(&id).map(|(b, _)| b).ok_or(DeviceError::UnknownResource(id.0))
    }

    const fn kernel(&self, kernel: Kernel) -> &KernelPipeline {
        match kernel {
            Kernel::Shade => &self.shade,
            Kernel::Resolve => &self.resolve,
        }
    }

    fn pop_error(&self) -> Option<String> {
        pollster::block_on(self.device.pop_error_scope()).map(|e| e.to_string())
    }

    fn encode(&self, commands: &[Command]) -> Result<wgpu::CommandBuffer, DeviceError> {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("vxlview batch"),
        });
        for command in commands {
            match command {
                Command::Copy { src, src_offset, dst, dst_offset, size } => {
                    encoder.copy_buffer_to_buffer(self.buffer(*src)?, *src_offset, self.buffer(*dst)?, *dst_offset, *size);
                }
                Command::Clear { target } => encoder.clear_buffer(self.buffer(*target)?, 0, None),
                Command::Transition { resource, from, to } => {
                    self.buffer(*resource)?;
                    trace!(%resource, ?from, ?to, "transition");
                }
                Command::Dispatch { kernel, binding, groups } => {
                    let group = self
                        .bindings
                        .get(binding)
                        .ok_or_else(|| DeviceError::Submission(format!("unknown binding {}", binding.0)))?;
                    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: Some("vxlview dispatch"),
                        timestamp_writes: None,
                    });
                    pass.set_pipeline(&self.kernel(*kernel).pipeline);
                    pass.set_bind_group(0, group, &[]);
                    pass.dispatch_workgroups(groups[0], groups[1], groups[2]);
                }
            }
        }
        Ok(encoder.finish())
    }
}

impl GpuDevice for WgpuDevice {
    fn name(&self) -> &str {
        &self.adapter_name
    }

    fn create_resource(&mut self, desc: &ResourceDesc) -> Result<ResourceId, DeviceError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label.as_str()),
            size: desc.size,
            usage: usage(desc.kind),
            mapped_at_creation: false,
        });
        if let Some(reason) = self.pop_error() {
            buffer.destroy();
            return Err(DeviceError::Allocation { label: desc.label.clone(), reason });
        }
        self.next_id += 1;
        let id = ResourceId(self.next_id);
        self.buffers.insert(id, (buffer, desc.kind));
        Ok(id)
    }

    fn destroy_resource(&mut self, id: ResourceId) {
        if let Some((buffer, _)) = self.buffers.remove(&id) {
            buffer.destroy();
        }
    }

    fn write(&mut self, id: ResourceId, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let buffer = self.buffer(id)?;
        if offset + data.len() as u64 > buffer.size() {
            return Err(DeviceError::Submission(format!("write past the end of {id}")));
        }
        self.queue.write_buffer(buffer, offset, data);
        Ok(())
    }

    fn create_binding(&mut self, kernel: Kernel, resources: &[ResourceId]) -> Result<BindingId, DeviceError> {
        if resources.len() != kernel.binding_count() {
            return Err(DeviceError::Binding(format!(
                "{kernel:?} takes {} resources, got {}",
                kernel.binding_count(),
                resources.len()
            )));
        }
        let buffers = resources
            .iter()
            .map(|id| self.buffer(*id).map_err(|e| DeviceError::Binding(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        let entries: Vec<wgpu::BindGroupEntry<'_>> = (0u32..)
            .zip(&buffers)
            .map(|(binding, buffer)| wgpu::BindGroupEntry { binding, resource: buffer.as_entire_binding() })
            .collect();

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("vxlview binding"),
            layout: &self.kernel(kernel).layout,
            entries: &entries,
        });
        if let Some(reason) = self.pop_error() {
            return Err(DeviceError::Binding(reason));
        }
        self.next_id += 1;
        let id = BindingId(self.next_id);
        self.bindings.insert(id, group);
        Ok(id)
    }

    fn destroy_binding(&mut self, id: BindingId) {
        self.bindings.remove(&id);
    }

    fn submit(&mut self, commands: &[Command], fence_value: u64) -> Result<(), DeviceError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let batch = self.encode(commands);
        let batch = match batch {
            Ok(batch) => batch,
            Err(e) => {
                self.pop_error();
                return Err(e);
            }
        };
        self.queue.submit(Some(batch));
        if let Some(reason) = self.pop_error() {
            return Err(DeviceError::Submission(reason));
        }
        let completed = Arc::clone(&self.completed);
        self.queue.on_submitted_work_done(move || {
            completed.fetch_max(fence_value, Ordering::AcqRel);
        });
        trace!(fence = fence_value, commands = commands.len(), "queue submission");
        Ok(())
    }

    fn wait(&mut self, fence_value: u64, timeout: Duration) -> Result<WaitStatus, DeviceError> {
        let started = Instant::now();
        loop {
            if self.completed.load(Ordering::Acquire) >= fence_value {
                return Ok(WaitStatus::Completed);
            }
            if started.elapsed() >= timeout {
                return Ok(WaitStatus::TimedOut);
            }
            self.device.poll(wgpu::Maintain::Poll);
            std::thread::yield_now();
        }
    }

    fn completed_value(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    fn read(&mut self, id: ResourceId) -> Result<Vec<u8>, DeviceError> {
        let (buffer, kind) = self.buffers.get(&id).ok_or(DeviceError::UnknownResource(id.0))?;
        if *kind != ResourceKind::Readback {
            return Err(DeviceError::Readback(format!("{id} is not a readback buffer")));
        }
        let slice = buffer.slice(..);
        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver outlives the blocking poll below.
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| DeviceError::Readback(e.to_string()))?
            .map_err(|e| DeviceError::Readback(e.to_string()))?;
        let data = slice.get_mapped_range().to_vec();
        buffer.unmap();
        debug!(%id, bytes = data.len(), "readback complete");
        Ok(data)
    }
}
