//! In-memory device for tests and adapter-less environments.
//!
//! Buffers are byte vectors. Copies and clears execute for real, state
//! transitions are checked against the device's own view of each buffer,
//! and dispatches are validated and logged but compute nothing. Failures
//! can be injected to exercise the engine's error paths.

use std::collections::HashMap;
use std::time::Duration;

use tracing::trace;

use crate::device::{
    BindingId, Command, GpuDevice, Kernel, ResourceDesc, ResourceId, ResourceKind, ResourceState, WaitStatus,
};
use crate::error::DeviceError;

#[derive(Debug)]
struct Buffer {
    desc: ResourceDesc,
    data: Vec<u8>,
    state: ResourceState,
}

/// A dispatch that reached the device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchRecord {
    /// Kernel launched.
    pub kernel: Kernel,
    /// Resources bound, in binding order.
    pub resources: Vec<ResourceId>,
    /// Workgroup counts.
    pub groups: [u32; 3],
}

/// Device backed by host memory.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    buffers: HashMap<ResourceId, Buffer>,
    bindings: HashMap<BindingId, (Kernel, Vec<ResourceId>)>,
    next_id: u64,
    completed: u64,
    allocations: usize,
    allocation_budget: Option<usize>,
    fail_submit: bool,
    fail_wait: bool,
    stalled: bool,
    batches: Vec<Vec<Command>>,
    dispatches: Vec<DispatchRecord>,
}

impl HeadlessDevice {
    /// Empty device.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `n` more allocations succeed, then fails every later one.
    pub fn fail_allocations_after(&mut self, n: usize) {
        self.allocation_budget = Some(n);
    }

    /// Rejects the next submission.
    pub fn fail_next_submit(&mut self) {
        self.fail_submit = true;
    }

    /// Fails the next wait with [`DeviceError::Lost`].
    pub fn fail_next_wait(&mut self) {
        self.fail_wait = true;
    }

    /// While stalled, submissions never signal and waits time out.
    pub fn set_stalled(&mut self, stalled: bool) {
        self.stalled = stalled;
    }

    /// Buffers currently alive.
    #[must_use]
    pub fn live_resources(&self) -> usize {
        self.buffers.len()
    }

    /// Live buffers of one kind.
    #[must_use]
    pub fn live_of_kind(&self, kind: ResourceKind) -> usize {
        self.buffers.values().filter(|b| b.desc.kind == kind).count()
    }

    /// Total successful allocations.
    #[must_use]
    pub const fn allocations(&self) -> usize {
        self.allocations
    }

    /// Every accepted batch, in order.
    #[must_use]
    pub fn batches(&self) -> &[Vec<Command>] {
        &self.batches
    }

    /// Every dispatch executed, in order.
    #[must_use]
    pub fn dispatches(&self) -> &[DispatchRecord] {
        &self.dispatches
    }

    /// Live binding tables.
    #[must_use]
    pub fn live_bindings(&self) -> usize {
        self.bindings.len()
    }

    /// Current contents of a buffer.
    #[must_use]
    pub fn contents(&self, id: ResourceId) -> Option<&[u8]> {
        self.buffers.get(&id).map(|b| b.data.as_slice())
    }

    /// Device-side state of a buffer.
    #[must_use]
    pub fn state_of(&self, id: ResourceId) -> Option<ResourceState> {
        self.buffers.get(&id).map(|b| b.state)
    }

    fn buffer_mut(&mut self, id: ResourceId) -> Result<&mut Buffer, DeviceError> {
        self.buffers.get_mut(&id).ok_or(DeviceError::UnknownResource(id.0))
    }

    fn range(len: usize, offset: u64, size: u64) -> Option<std::ops::Range<usize>> {
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(usize::try_from(size).ok()?)?;
        (end <= len).then_some(start..end)
    }

    fn execute(&mut self, command: &Command) -> Result<(), DeviceError> {
        match command {
            Command::Copy { src, src_offset, dst, dst_offset, size } => {
                let source = self.buffers.get(src).ok_or(DeviceError::UnknownResource(src.0))?;
                let from = Self::range(source.data.len(), *src_offset, *size)
                    .ok_or_else(|| DeviceError::Submission(format!("copy reads past the end of {src}")))?;
                let bytes = source.data[from].to_vec();
                let target = self.buffer_mut(*dst)?;
                let to = Self::range(target.data.len(), *dst_offset, *size)
                    .ok_or_else(|| DeviceError::Submission(format!("copy writes past the end of {dst}")))?;
                target.data[to].copy_from_slice(&bytes);
            }
            Command::Clear { target } => {
                self.buffer_mut(*target)?.data.fill(0);
            }
            Command::Transition { resource, from, to } => {
                let buffer = self.buffer_mut(*resource)?;
                if buffer.state != *from {
                    return Err(DeviceError::Submission(format!(
                        "{resource} is {:?}, transition expected {from:?}",
                        buffer.state
                    )));
                }
                buffer.state = *to;
            }
            Command::Dispatch { kernel, binding, groups } => {
                let (bound, resources) = self
                    .bindings
                    .get(binding)
                    .ok_or_else(|| DeviceError::Submission(format!("unknown binding {}", binding.0)))?;
                if bound != kernel {
                    return Err(DeviceError::Submission(format!("binding {} is for {bound:?}", binding.0)));
                }
                if let Some(missing) = resources.iter().find(|id| !self.buffers.contains_key(id)) {
                    return Err(DeviceError::UnknownResource(missing.0));
                }
                self.dispatches.push(DispatchRecord { kernel: *kernel, resources: resources.clone(), groups: *groups });
            }
        }
        Ok(())
    }
}

impl GpuDevice for HeadlessDevice {
    fn name(&self) -> &str {
        "headless"
    }

    fn create_resource(&mut self, desc: &ResourceDesc) -> Result<ResourceId, DeviceError> {
        if let Some(budget) = self.allocation_budget.as_mut() {
            if *budget == 0 {
                return Err(DeviceError::Allocation {
                    label: desc.label.clone(),
                    reason: "injected allocation failure".to_owned(),
                });
            }
            *budget -= 1;
        }
        let len = usize::try_from(desc.size).map_err(|_| DeviceError::Allocation {
            label: desc.label.clone(),
            reason: "size exceeds host memory".to_owned(),
        })?;
        self.next_id += 1;
        let id = ResourceId(self.next_id);
        self.buffers.insert(id, Buffer { desc: desc.clone(), data: vec![0; len], state: desc.initial_state });
        self.allocations += 1;
        Ok(id)
    }

    fn destroy_resource(&mut self, id: ResourceId) {
        self.buffers.remove(&id);
    }

    fn write(&mut self, id: ResourceId, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let buffer = self.buffer_mut(id)?;
        let range = Self::range(buffer.data.len(), offset, data.len() as u64)
            .ok_or_else(|| DeviceError::Submission(format!("write past the end of {id}")))?;
        buffer.data[range].copy_from_slice(data);
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
        if let Some(missing) = resources.iter().find(|id| !self.buffers.contains_key(id)) {
            return Err(DeviceError::Binding(format!("unknown resource {missing}")));
        }
        self.next_id += 1;
        let id = BindingId(self.next_id);
        self.bindings.insert(id, (kernel, resources.to_vec()));
        Ok(id)
    }

    fn destroy_binding(&mut self, id: BindingId) {
        self.bindings.remove(&id);
    }

    fn submit(&mut self, commands: &[Command], fence_value: u64) -> Result<(), DeviceError> {
        if std::mem::take(&mut self.fail_submit) {
            return Err(DeviceError::Submission("injected submission failure".to_owned()));
        }
        for command in commands {
            self.execute(command)?;
        }
        trace!(fence = fence_value, commands = commands.len(), "headless batch executed");
        self.batches.push(commands.to_vec());
        if !self.stalled {
            self.completed = self.completed.max(fence_value);
        }
        Ok(())
    }

    fn wait(&mut self, fence_value: u64, _timeout: Duration) -> Result<WaitStatus, DeviceError> {
        if std::mem::take(&mut self.fail_wait) {
            return Err(DeviceError::Lost);
        }
        Ok(if self.completed >= fence_value { WaitStatus::Completed } else { WaitStatus::TimedOut })
    }

    fn completed_value(&self) -> u64 {
        self.completed
    }

    fn read(&mut self, id: ResourceId) -> Result<Vec<u8>, DeviceError> {
        let buffer = self.buffers.get(&id).ok_or(DeviceError::UnknownResource(id.0))?;
        if buffer.desc.kind != ResourceKind::Readback {
            return Err(DeviceError::Readback(format!("{id} is not a readback buffer")));
        }
        Ok(buffer.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(device: &mut HeadlessDevice, size: u64, state: ResourceState) -> ResourceId {
        device
            .create_resource(&ResourceDesc::new("buf", ResourceKind::Storage, size, state))
            .unwrap()
    }

    #[test]
    fn test_copy_and_clear_execute() {
        let mut device = HeadlessDevice::new();
        let a = storage(&mut device, 8, ResourceState::CopySource);
        let b = storage(&mut device, 8, ResourceState::CopyDest);
        device.write(a, 0, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        device
            .submit(&[Command::Copy { src: a, src_offset: 4, dst: b, dst_offset: 0, size: 4 }], 1)
            .unwrap();
        assert_eq!(&device.contents(b).unwrap()[..4], &[5, 6, 7, 8]);
        device.submit(&[Command::Clear { target: b }], 2).unwrap();
        assert!(device.contents(b).unwrap().iter().all(|&x| x == 0));
        assert_eq!(device.completed_value(), 2);
    }

    #[test]
    fn test_transition_mismatch_rejected() {
        let mut device = HeadlessDevice::new();
        let a = storage(&mut device, 4, ResourceState::ShaderRead);
        let bad = Command::Transition { resource: a, from: ResourceState::CopyDest, to: ResourceState::ShaderRead };
        assert!(matches!(device.submit(&[bad], 1), Err(DeviceError::Submission(_))));
    }

    #[test]
    fn test_stalled_wait_times_out() {
        let mut device = HeadlessDevice::new();
        device.set_stalled(true);
        device.submit(&[], 1).unwrap();
        assert_eq!(device.wait(1, Duration::from_millis(1)).unwrap(), WaitStatus::TimedOut);
        assert_eq!(device.completed_value(), 0);
    }

    #[test]
    fn test_binding_arity_checked() {
        let mut device = HeadlessDevice::new();
        let a = storage(&mut device, 4, ResourceState::Common);
        assert!(device.create_binding(Kernel::Shade, &[a]).is_err());
        assert!(device.create_binding(Kernel::Shade, &[a, a, a, a]).is_ok());
    }

    #[test]
    fn test_read_requires_readback_kind() {
        let mut device = HeadlessDevice::new();
        let a = storage(&mut device, 4, ResourceState::Common);
        assert!(matches!(device.read(a), Err(DeviceError::Readback(_))));
    }
}
