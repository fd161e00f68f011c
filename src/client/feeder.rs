//! Fragment feeding state machine
//!
//! Incoming stream chunks are queued in arrival order and handed to the
//! playback buffer one at a time. The buffer's append primitive accepts a
//! single fragment; starting another append before the previous one
//! completes, or reordering fragments, corrupts the container's internal
//! byte offsets. The feeder therefore enforces two hard invariants:
//!
//! - at most one append outstanding at any time
//! - appends happen in strict arrival order
//!
//! End-of-stream is deferred until the queue has fully drained and the last
//! append has completed; signaling earlier risks the player truncating the
//! final segments.
//!
//! The machine is pure (no I/O): callers submit the fragments it hands out
//! and report completions back. The pending queue is unbounded; a consumer
//! slower than the network grows it without backpressure (known gap,
//! preserved behavior).

use std::collections::VecDeque;
use std::time::Instant;

use bytes::Bytes;

/// An immutable stream fragment plus its arrival timestamp
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Fragment payload
    pub data: Bytes,
    /// Instant the bytes were read from the network
    pub t0: Instant,
}

impl Fragment {
    /// Wrap freshly received bytes, stamping them with the current instant
    pub fn now(data: Bytes) -> Self {
        Self {
            data,
            t0: Instant::now(),
        }
    }
}

/// Feeder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    /// No append outstanding
    Idle,
    /// An append is in flight
    Feeding,
}

/// What to do after an append completes
#[derive(Debug)]
pub enum DrainStep {
    /// Submit this fragment next (eager drain)
    Append(Fragment),
    /// Queue empty; wait for more input
    Wait,
    /// Queue drained and upstream finished; signal end-of-stream now
    EndOfStream,
}

/// FIFO fragment queue with the single-outstanding-append invariant
#[derive(Debug, Default)]
pub struct FragmentFeeder {
    queue: VecDeque<Fragment>,
    state: FeedState,
    in_flight_t0: Option<Instant>,
    upstream_finished: bool,
    eos_signaled: bool,
}

impl Default for FeedState {
    fn default() -> Self {
        FeedState::Idle
    }
}

impl FragmentFeeder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> FeedState {
        self.state
    }

    /// Number of fragments waiting in the queue
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Arrival timestamp of the fragment currently being appended
    pub fn in_flight_t0(&self) -> Option<Instant> {
        self.in_flight_t0
    }

    /// Queue a fragment
    ///
    /// Returns the fragment to submit to the playback buffer if the feeder
    /// was idle; `None` while an append is already outstanding.
    pub fn enqueue(&mut self, fragment: Fragment) -> Option<Fragment> {
        self.queue.push_back(fragment);
        self.feed()
    }

    /// Report that the outstanding append completed
    pub fn complete(&mut self) -> DrainStep {
        self.in_flight_t0 = None;
        self.state = FeedState::Idle;

        if let Some(fragment) = self.feed() {
            return DrainStep::Append(fragment);
        }
        if self.upstream_finished && !self.eos_signaled {
            self.eos_signaled = true;
            return DrainStep::EndOfStream;
        }
        DrainStep::Wait
    }

    /// Report that the upstream read finished
    ///
    /// Returns `true` if end-of-stream should be signaled right now, i.e.
    /// the queue is already drained and no append is outstanding. Otherwise
    /// the signal is deferred until [`FragmentFeeder::complete`] drains the
    /// queue.
    pub fn finish(&mut self) -> bool {
        self.upstream_finished = true;
        if self.state == FeedState::Idle && self.queue.is_empty() && !self.eos_signaled {
            self.eos_signaled = true;
            return true;
        }
        false
    }

    fn feed(&mut self) -> Option<Fragment> {
        if self.state == FeedState::Feeding {
            return None;
        }
        let fragment = self.queue.pop_front()?;
        self.state = FeedState::Feeding;
        self.in_flight_t0 = Some(fragment.t0);
        Some(fragment)
    }
}
