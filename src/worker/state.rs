//! Worker lifecycle state machine
//!
//! Tracks a transcoding worker from spawn to exit. Transitions are guarded
//! so that teardown is idempotent: only the first termination request is
//! allowed to signal the process.

use std::time::Instant;

/// Worker lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Process spawn requested, not yet confirmed running
    Starting,
    /// Process is running and producing output
    Running,
    /// Graceful termination signalled, waiting for exit
    Terminating,
    /// Process has exited
    Terminated,
}

/// Guarded lifecycle state for one worker
#[derive(Debug)]
pub struct WorkerLifecycle {
    phase: WorkerPhase,
    spawned_at: Instant,
    terminated_at: Option<Instant>,
}

impl WorkerLifecycle {
    /// Create a lifecycle in the `Starting` phase
    pub fn new() -> Self {
        Self {
            phase: WorkerPhase::Starting,
            spawned_at: Instant::now(),
            terminated_at: None,
        }
    }

    /// Current phase
    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    /// Mark the worker as running (spawn confirmed)
    pub fn mark_running(&mut self) {
        if self.phase == WorkerPhase::Starting {
            self.phase = WorkerPhase::Running;
        }
    }

    /// Request graceful termination
    ///
    /// Returns `true` exactly once: the caller that gets `true` must deliver
    /// the termination signal. Repeated calls are no-ops.
    pub fn begin_terminate(&mut self) -> bool {
        match self.phase {
            WorkerPhase::Starting | WorkerPhase::Running => {
                self.phase = WorkerPhase::Terminating;
                true
            }
            WorkerPhase::Terminating | WorkerPhase::Terminated => false,
        }
    }

    /// Mark the worker as exited (normally or not)
    pub fn mark_terminated(&mut self) {
        if self.phase != WorkerPhase::Terminated {
            self.phase = WorkerPhase::Terminated;
            self.terminated_at = Some(Instant::now());
        }
    }

    /// Whether the worker has exited
    pub fn is_terminated(&self) -> bool {
        self.phase == WorkerPhase::Terminated
    }

    /// How long the worker has been alive (or was alive, once terminated)
    pub fn uptime(&self) -> std::time::Duration {
        match self.terminated_at {
            Some(at) => at.duration_since(self.spawned_at),
            None => self.spawned_at.elapsed(),
        }
    }
}

impl Default for WorkerLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
