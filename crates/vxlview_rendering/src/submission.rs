//! # Submission Engine
//!
//! One recording context, one fence, at most one batch in flight.
//!
//! ```text
//!            begin                execute               wait
//!   Idle ───────────▶ Recording ───────────▶ Submitted ───────────▶ Synced ──▶ Idle
//!     ▲   (raise fence)   │ ▲  begin = no-op                (fence reached
//!     │                   │ │                                or timed out)
//!     └───────────────────┘ └── transition / record only here
//! ```
//!
//! A failed device call leaves the engine in the last state it reached.
//! A wait that times out is treated as completed and logged.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use crate::device::{Command, GpuDevice, ResourceState, WaitStatus};
use crate::error::{RenderError, RenderResult};
use crate::resource::{ResourceHandle, ResourceSet};

/// Default bound on a fence wait (effectively infinite).
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(u32::MAX as u64);

/// Engine state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// No batch open.
    Idle,
    /// Batch open, commands being appended.
    Recording,
    /// Batch handed to the device, fence not yet waited.
    Submitted,
    /// Fence wait finished.
    Synced,
}

/// How the renderer groups per-limb work into batches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitMode {
    /// Execute and wait after every limb.
    #[default]
    Synchronous,
    /// Record every limb into one batch, then execute and wait once.
    Pipelined,
}

/// Monotonic fence counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Fence {
    value: u64,
    completed: u64,
}

impl Fence {
    /// Raises the target value and returns it.
    pub fn raise(&mut self) -> u64 {
        self.value += 1;
        self.value
    }

    /// Latest raised value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Latest value considered reached.
    #[must_use]
    pub const fn completed(&self) -> u64 {
        self.completed
    }

    fn complete(&mut self, value: u64) {
        self.completed = self.completed.max(value);
    }
}

/// Records command batches and synchronizes them with a fence.
#[derive(Debug)]
pub struct SubmissionEngine {
    state: EngineState,
    fence: Fence,
    commands: Vec<Command>,
    mode: SubmitMode,
    timeout: Duration,
    batches: u64,
}

impl Default for SubmissionEngine {
    fn default() -> Self {
        Self::new(SubmitMode::default(), DEFAULT_WAIT_TIMEOUT)
    }
}

impl SubmissionEngine {
    /// Creates an idle engine.
    #[must_use]
    pub fn new(mode: SubmitMode, timeout: Duration) -> Self {
        Self {
            state: EngineState::Idle,
            fence: Fence::default(),
            commands: Vec::with_capacity(64),
            mode,
            timeout,
            batches: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Fence counters.
    #[must_use]
    pub const fn fence(&self) -> Fence {
        self.fence
    }

    /// Batch grouping mode.
    #[must_use]
    pub const fn mode(&self) -> SubmitMode {
        self.mode
    }

    /// Changes the grouping mode.
    pub fn set_mode(&mut self, mode: SubmitMode) {
        self.mode = mode;
    }

    /// Wait bound.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Changes the wait bound.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Commands recorded in the open batch.
    #[must_use]
    pub fn pending(&self) -> &[Command] {
        &self.commands
    }

    /// Batches submitted so far.
    #[must_use]
    pub const fn batches_submitted(&self) -> u64 {
        self.batches
    }

    fn refuse(&self, operation: &'static str) -> RenderError {
        RenderError::InvalidState { operation, state: self.state }
    }

    /// Opens a batch and raises the fence. A no-op while already recording.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidState`] while a batch is still outstanding.
    pub fn begin(&mut self) -> RenderResult<()> {
        match self.state {
            EngineState::Recording => Ok(()),
            EngineState::Submitted => Err(self.refuse("begin")),
            EngineState::Idle | EngineState::Synced => {
                self.commands.clear();
                let value = self.fence.raise();
                self.state = EngineState::Recording;
                trace!(fence = value, "batch opened");
                Ok(())
            }
        }
    }

    /// Appends a command to the open batch.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidState`] unless recording.
    pub fn record(&mut self, command: Command) -> RenderResult<()> {
        if self.state != EngineState::Recording {
            return Err(self.refuse("record"));
        }
        self.commands.push(command);
        Ok(())
    }

    /// Records a state transition and updates the resource's tag.
    ///
    /// Transitions to the state the resource already has record nothing.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidState`] unless recording (the tag is left
    /// untouched), or [`RenderError::StaleHandle`].
    pub fn transition(&mut self, set: &mut ResourceSet, handle: ResourceHandle, to: ResourceState) -> RenderResult<()> {
        if self.state != EngineState::Recording {
            return Err(self.refuse("transition"));
        }
        let (resource, from) = set.replace_state(handle, to)?;
        if from != to {
            self.commands.push(Command::Transition { resource, from, to });
        }
        Ok(())
    }

    /// Closes the batch and hands it to the device.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidState`] unless recording; device failures keep
    /// the engine recording with the batch intact.
    pub fn execute<D: GpuDevice>(&mut self, device: &mut D) -> RenderResult<()> {
        if self.state != EngineState::Recording {
            return Err(self.refuse("execute"));
        }
        if let Err(e) = device.submit(&self.commands, self.fence.value) {
            error!(fence = self.fence.value, error = %e, "batch submission failed");
            return Err(e.into());
        }
        trace!(fence = self.fence.value, commands = self.commands.len(), "batch submitted");
        self.commands.clear();
        self.batches += 1;
        self.state = EngineState::Submitted;
        Ok(())
    }

    /// Blocks until the outstanding batch completes, then returns to idle.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidState`] with nothing outstanding (state is
    /// unchanged); device failures keep the engine submitted.
    pub fn wait<D: GpuDevice>(&mut self, device: &mut D) -> RenderResult<WaitStatus> {
        if self.state != EngineState::Submitted {
            return Err(self.refuse("wait"));
        }
        let value = self.fence.value;
        let status = match device.wait(value, self.timeout) {
            Ok(status) => status,
            Err(e) => {
                error!(fence = value, error = %e, "fence wait failed");
                return Err(e.into());
            }
        };
        if status == WaitStatus::TimedOut {
            warn!(fence = value, timeout_ms = self.timeout.as_millis(), "fence wait timed out, treating batch as complete");
        }
        self.fence.complete(value);
        self.state = EngineState::Synced;
        trace!(fence = value, ?status, "batch synced");
        self.state = EngineState::Idle;
        Ok(status)
    }

    /// `execute` followed by `wait`.
    ///
    /// # Errors
    ///
    /// Whatever either step reports.
    pub fn flush<D: GpuDevice>(&mut self, device: &mut D) -> RenderResult<WaitStatus> {
        self.execute(device)?;
        self.wait(device)
    }

    /// Drops the open or outstanding batch and returns to idle. Used by
    /// callers recovering from a failed step; the fence stays monotonic.
    pub fn abandon(&mut self) {
        if matches!(self.state, EngineState::Recording | EngineState::Submitted) {
            debug!(state = ?self.state, dropped = self.commands.len(), "batch abandoned");
        }
        self.commands.clear();
        self.state = EngineState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{ResourceDesc, ResourceKind};
    use crate::headless::HeadlessDevice;

    #[test]
    fn test_full_cycle() {
        let mut device = HeadlessDevice::new();
        let mut engine = SubmissionEngine::default();
        assert_eq!(engine.state(), EngineState::Idle);

        engine.begin().unwrap();
        assert_eq!(engine.state(), EngineState::Recording);
        assert_eq!(engine.fence().value(), 1);
        engine.begin().unwrap();
        assert_eq!(engine.fence().value(), 1, "begin while recording is a no-op");

        engine.execute(&mut device).unwrap();
        assert_eq!(engine.state(), EngineState::Submitted);
        assert_eq!(engine.begin(), Err(RenderError::InvalidState { operation: "begin", state: EngineState::Submitted }));

        assert_eq!(engine.wait(&mut device).unwrap(), WaitStatus::Completed);
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.fence().completed(), 1);
        assert_eq!(device.completed_value(), 1);
    }

    #[test]
    fn test_fence_is_monotonic() {
        let mut device = HeadlessDevice::new();
        let mut engine = SubmissionEngine::default();
        let mut last = 0;
        for _ in 0..5 {
            engine.begin().unwrap();
            engine.flush(&mut device).unwrap();
            assert!(engine.fence().value() > last);
            last = engine.fence().value();
        }
        assert_eq!(engine.batches_submitted(), 5);
    }

    #[test]
    fn test_wait_without_batch_fails() {
        let mut device = HeadlessDevice::new();
        let mut engine = SubmissionEngine::default();
        assert!(engine.wait(&mut device).is_err());
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.execute(&mut device).is_err());
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn test_transition_only_while_recording() {
        let mut device = HeadlessDevice::new();
        let mut set = ResourceSet::new("t");
        let desc = ResourceDesc::new("buf", ResourceKind::Storage, 16, ResourceState::CopyDest);
        let h = set.add(&mut device, desc).unwrap();
        let mut engine = SubmissionEngine::default();

        assert!(engine.transition(&mut set, h, ResourceState::ShaderRead).is_err());
        assert_eq!(set.state(h), Some(ResourceState::CopyDest));

        engine.begin().unwrap();
        engine.transition(&mut set, h, ResourceState::ShaderRead).unwrap();
        engine.transition(&mut set, h, ResourceState::ShaderRead).unwrap();
        assert_eq!(set.state(h), Some(ResourceState::ShaderRead));
        assert_eq!(engine.pending().len(), 1);
    }

    #[test]
    fn test_abandon_returns_to_idle() {
        let mut engine = SubmissionEngine::default();
        engine.begin().unwrap();
        engine.abandon();
        assert_eq!(engine.state(), EngineState::Idle);
        engine.begin().unwrap();
        assert_eq!(engine.fence().value(), 2);
    }
}
