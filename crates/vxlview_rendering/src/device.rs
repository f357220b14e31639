//! The seam between the renderer and a GPU backend.
//!
//! The renderer only ever talks to a [`GpuDevice`]: it allocates buffers,
//! writes bytes into them, submits command batches that signal a fence
//! value, waits for that value, and reads buffers back. The wgpu backend
//! and the headless test backend both implement it.

use std::fmt;
use std::time::Duration;

use crate::error::DeviceError;

/// Device-side id of one buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Device-side id of one binding table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub u64);

/// What a buffer is for. Decides its usage flags on the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Shader-visible storage (voxels, canvas, targets, tables).
    Storage,
    /// Small constant block.
    Uniform,
    /// CPU-written transfer source.
    Staging,
    /// CPU-readable copy destination.
    Readback,
}

/// Usage state tag. Changed only by an explicit transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// No particular use.
    Common,
    /// Source of a copy.
    CopySource,
    /// Destination of a copy or clear.
    CopyDest,
    /// Read by a kernel.
    ShaderRead,
    /// Written by a kernel.
    ShaderWrite,
    /// Owned by presentation.
    Present,
}

/// Allocation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceDesc {
    /// Debug label.
    pub label: String,
    /// Purpose.
    pub kind: ResourceKind,
    /// Size in bytes (a multiple of 4).
    pub size: u64,
    /// State the resource starts in.
    pub initial_state: ResourceState,
}

impl ResourceDesc {
    /// Builds a request, rounding `size` up to a multiple of 4.
    #[must_use]
    pub fn new(label: impl Into<String>, kind: ResourceKind, size: u64, initial_state: ResourceState) -> Self {
        Self { label: label.into(), kind, size: size.max(4).next_multiple_of(4), initial_state }
    }
}

/// The two compute kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kernel {
    /// Projects and lights voxels into the canvas.
    Shade,
    /// Turns canvas keys into RGBA pixels.
    Resolve,
}

impl Kernel {
    /// Number of resources a binding table for this kernel takes.
    #[must_use]
    pub const fn binding_count(self) -> usize {
        match self {
            Self::Shade | Self::Resolve => 4,
        }
    }
}

/// One recorded command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Buffer-to-buffer copy.
    Copy {
        /// Source buffer.
        src: ResourceId,
        /// Byte offset in the source.
        src_offset: u64,
        /// Destination buffer.
        dst: ResourceId,
        /// Byte offset in the destination.
        dst_offset: u64,
        /// Bytes to copy.
        size: u64,
    },
    /// Zero a whole buffer.
    Clear {
        /// Buffer to clear.
        target: ResourceId,
    },
    /// State change of one resource.
    Transition {
        /// Resource.
        resource: ResourceId,
        /// State before.
        from: ResourceState,
        /// State after.
        to: ResourceState,
    },
    /// Kernel launch.
    Dispatch {
        /// Which kernel.
        kernel: Kernel,
        /// Binding table.
        binding: BindingId,
        /// Workgroup counts.
        groups: [u32; 3],
    },
}

/// Outcome of a bounded fence wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitStatus {
    /// The fence reached the value.
    Completed,
    /// The timeout expired first.
    TimedOut,
}

/// A GPU backend.
pub trait GpuDevice {
    /// Human-readable adapter or backend name.
    fn name(&self) -> &str;

    /// Allocates a zero-filled buffer.
    ///
    /// # Errors
    ///
    /// [`DeviceError::Allocation`] when the device refuses.
    fn create_resource(&mut self, desc: &ResourceDesc) -> Result<ResourceId, DeviceError>;

    /// Frees a buffer. Unknown ids are ignored.
    fn destroy_resource(&mut self, id: ResourceId);

    /// Writes `data` at `offset`. Takes effect before the next submission.
    ///
    /// # Errors
    ///
    /// [`DeviceError::UnknownResource`] or an out-of-range write.
    fn write(&mut self, id: ResourceId, offset: u64, data: &[u8]) -> Result<(), DeviceError>;

    /// Creates a binding table for `kernel` over `resources`, in binding order.
    ///
    /// # Errors
    ///
    /// [`DeviceError::Binding`] for wrong arity or unknown resources.
    fn create_binding(&mut self, kernel: Kernel, resources: &[ResourceId]) -> Result<BindingId, DeviceError>;

    /// Drops a binding table. Unknown ids are ignored.
    fn destroy_binding(&mut self, id: BindingId);

    /// Submits a batch that signals `fence_value` when it completes.
    ///
    /// # Errors
    ///
    /// [`DeviceError::Submission`] when the batch is rejected.
    fn submit(&mut self, commands: &[Command], fence_value: u64) -> Result<(), DeviceError>;

    /// Blocks until the fence reaches `fence_value` or `timeout` passes.
    ///
    /// # Errors
    ///
    /// [`DeviceError::Lost`] when the device stops responding.
    fn wait(&mut self, fence_value: u64, timeout: Duration) -> Result<WaitStatus, DeviceError>;

    /// Highest fence value known to be reached.
    fn completed_value(&self) -> u64;

    /// Reads a [`ResourceKind::Readback`] buffer.
    ///
    /// # Errors
    ///
    /// [`DeviceError::Readback`] when mapping fails.
    fn read(&mut self, id: ResourceId) -> Result<Vec<u8>, DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desc_rounds_size() {
        let d = ResourceDesc::new("x", ResourceKind::Storage, 5, ResourceState::Common);
        assert_eq!(d.size, 8);
        let d = ResourceDesc::new("x", ResourceKind::Storage, 0, ResourceState::Common);
        assert_eq!(d.size, 4);
    }

    #[test]
    fn test_resource_id_display() {
        assert_eq!(ResourceId(7).to_string(), "#7");
    }
}
