//! Playback latency measurement
//!
//! After each fed fragment, the probe publishes the elapsed time between
//! the fragment's arrival and the moment its content is actually presented
//! for playback. Two measurement strategies exist, chosen once at
//! initialization from the host's capabilities:
//!
//! - **frame-presented** (precise): wait for a one-shot per-frame
//!   presentation callback; exactly one measurement per append.
//! - **time-advanced** (fallback): take the first playback-time-advance
//!   event after an append, then stop listening until re-armed (debounced).
//!
//! The published value always reflects the most recent completed
//! measurement; before the first one, a `NoData` sentinel is published.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

/// Most recent latency reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatencyReading {
    /// No measurement has completed yet
    NoData,
    /// Latency of the most recently presented fragment, in milliseconds
    Millis(f64),
}

impl std::fmt::Display for LatencyReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LatencyReading::NoData => write!(f, "-- ms"),
            LatencyReading::Millis(ms) => write!(f, "{:.1} ms", ms),
        }
    }
}

/// Host capability for observing media presentation
#[async_trait]
pub trait PlaybackEvents: Send + 'static {
    /// Whether per-frame presentation callbacks are available
    fn supports_frame_callbacks(&self) -> bool;

    /// Resolve when the next rendered frame is presented
    async fn frame_presented(&mut self);

    /// Resolve when playback time next advances
    async fn time_advanced(&mut self);
}

/// Measurement strategy, fixed at probe creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    FramePresented,
    TimeAdvanced,
}

/// Handle for arming the probe and reading measurements
#[derive(Clone)]
pub struct ProbeHandle {
    arm_tx: mpsc::UnboundedSender<Instant>,
    reading_tx: Arc<watch::Sender<LatencyReading>>,
    reading_rx: watch::Receiver<LatencyReading>,
}

impl ProbeHandle {
    /// Arm a measurement for the fragment appended at `t0`
    ///
    /// Re-arming before the previous measurement fires replaces it; the
    /// published value always corresponds to the most recent append.
    pub fn arm(&self, t0: Instant) {
        let _ = self.arm_tx.send(t0);
    }

    /// Latest reading
    pub fn reading(&self) -> LatencyReading {
        *self.reading_rx.borrow()
    }

    /// Subscribe to reading updates
    pub fn watch(&self) -> watch::Receiver<LatencyReading> {
        self.reading_rx.clone()
    }

    /// Reset the published value to the `NoData` sentinel
    pub fn clear(&self) {
        let _ = self.reading_tx.send(LatencyReading::NoData);
    }
}

/// Latency probe task
///
/// Owns the host capability and publishes readings through a watch
/// channel. Run it with [`LatencyProbe::run`], typically on its own task.
pub struct LatencyProbe<E: PlaybackEvents> {
    events: E,
    strategy: Strategy,
    arm_rx: mpsc::UnboundedReceiver<Instant>,
    reading_tx: Arc<watch::Sender<LatencyReading>>,
}

impl<E: PlaybackEvents> LatencyProbe<E> {
    /// Create a probe, picking the measurement strategy from the host
    pub fn new(events: E) -> (Self, ProbeHandle) {
        let strategy = if events.supports_frame_callbacks() {
            Strategy::FramePresented
        } else {
            Strategy::TimeAdvanced
        };
        tracing::debug!(?strategy, "Latency probe initialized");

        let (arm_tx, arm_rx) = mpsc::unbounded_channel();
        let (reading_tx, reading_rx) = watch::channel(LatencyReading::NoData);
        let reading_tx = Arc::new(reading_tx);

        let probe = Self {
            events,
            strategy,
            arm_rx,
            reading_tx: Arc::clone(&reading_tx),
        };
        let handle = ProbeHandle {
            arm_tx,
            reading_tx,
            reading_rx,
        };
        (probe, handle)
    }

    /// Run until every handle is dropped
    pub async fn run(self) {
        let LatencyProbe {
            mut events,
            strategy,
            mut arm_rx,
            reading_tx,
        } = self;

        'armed: while let Some(mut t0) = arm_rx.recv().await {
            loop {
                let presented = async {
                    match strategy {
                        Strategy::FramePresented => events.frame_presented().await,
                        Strategy::TimeAdvanced => events.time_advanced().await,
                    }
                };
                tokio::select! {
                    _ = presented => {
                        let ms = t0.elapsed().as_secs_f64() * 1000.0;
                        let _ = reading_tx.send(LatencyReading::Millis(ms));
                        continue 'armed;
                    }
                    rearm = arm_rx.recv() => match rearm {
                        // A newer append replaces the pending measurement.
                        Some(newer) => t0 = newer,
                        None => break 'armed,
                    },
                }
            }
        }
    }
}
