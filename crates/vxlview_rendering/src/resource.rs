//! Resource sets: owned collections of device buffers.
//!
//! A set is an arena. [`ResourceHandle`]s are indices tagged with the set's
//! generation, so a handle kept across a [`ResourceSet::discard`] is
//! rejected instead of aliasing a newer buffer. Each entry carries its
//! usage state; only [`SubmissionEngine::transition`] changes it.
//!
//! A set never rolls back on its own. When one `add` in a construction
//! sequence fails, the caller discards the whole set.
//!
//! [`SubmissionEngine::transition`]: crate::submission::SubmissionEngine::transition

use tracing::{debug, error, trace};

use crate::device::{GpuDevice, ResourceDesc, ResourceId, ResourceState};
use crate::error::{RenderError, RenderResult};

/// Index of one entry in a [`ResourceSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Entry {
    id: ResourceId,
    desc: ResourceDesc,
    state: ResourceState,
}

/// A named, ordered collection of device buffers.
#[derive(Debug)]
pub struct ResourceSet {
    name: &'static str,
    entries: Vec<Entry>,
    generation: u32,
}

impl ResourceSet {
    /// Empty set.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name, entries: Vec::new(), generation: 0 }
    }

    /// Set name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Allocates a buffer and appends it.
    ///
    /// # Errors
    ///
    /// The device's allocation error. The set is left as it was.
    pub fn add<D: GpuDevice>(&mut self, device: &mut D, desc: ResourceDesc) -> RenderResult<ResourceHandle> {
        let id = device.create_resource(&desc).map_err(|e| {
            error!(set = self.name, label = %desc.label, error = %e, "resource allocation failed");
            RenderError::from(e)
        })?;
        trace!(set = self.name, %id, label = %desc.label, size = desc.size, "resource added");
        let handle = ResourceHandle { index: self.entries.len(), generation: self.generation };
        self.entries.push(Entry { id, state: desc.initial_state, desc });
        Ok(handle)
    }

    /// Destroys every buffer and invalidates outstanding handles.
    pub fn discard<D: GpuDevice>(&mut self, device: &mut D) {
        if self.entries.is_empty() {
            return;
        }
        debug!(set = self.name, count = self.entries.len(), "discarding resource set");
        for entry in self.entries.drain(..) {
            device.destroy_resource(entry.id);
        }
        self.generation = self.generation.wrapping_add(1);
    }

    /// Non-empty, with every entry holding a distinct device id.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let mut ids: Vec<ResourceId> = self.entries.iter().map(|e| e.id).collect();
        ids.sort_unstable();
        ids.windows(2).all(|w| w[0] != w[1])
    }

    /// Number of buffers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the set owns nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handles in insertion order.
    pub fn handles(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
        (0..self.entries.len()).map(move |index| ResourceHandle { index, generation: self.generation })
    }

    fn entry(&self, handle: ResourceHandle) -> Option<&Entry> {
        if handle.generation != self.generation {
            return None;
        }
        self.entries.get(handle.index)
    }

    /// Device id behind `handle`.
    ///
    /// # Errors
    ///
    /// [`RenderError::StaleHandle`] for handles from before a discard.
    pub fn id(&self, handle: ResourceHandle) -> RenderResult<ResourceId> {
        self.entry(handle).map(|e| e.id).ok_or(RenderError::StaleHandle)
    }

    /// Allocation request behind `handle`.
    #[must_use]
    pub fn desc(&self, handle: ResourceHandle) -> Option<&ResourceDesc> {
        self.entry(handle).map(|e| &e.desc)
    }

    /// Current state tag.
    #[must_use]
    pub fn state(&self, handle: ResourceHandle) -> Option<ResourceState> {
        self.entry(handle).map(|e| e.state)
    }

    /// Swaps the state tag, returning the previous one.
    pub(crate) fn replace_state(&mut self, handle: ResourceHandle, to: ResourceState) -> RenderResult<(ResourceId, ResourceState)> {
        if handle.generation != self.generation {
            return Err(RenderError::StaleHandle);
        }
        let entry = self.entries.get_mut(handle.index).ok_or(RenderError::StaleHandle)?;
        let from = std::mem::replace(&mut entry.state, to);
        Ok((entry.id, from))
    }
}
