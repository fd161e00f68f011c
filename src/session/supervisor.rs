//! Worker supervision loop
//!
//! Keeps one transcoding worker alive per session for as long as the client
//! sink accepts bytes. Worker output is passed straight through to the sink
//! as it is produced; nothing is buffered beyond the sink channel itself.
//! A worker exit while the sink is open triggers an immediate relaunch, so
//! the client sees an uninterrupted byte stream with at most a brief
//! pass-through gap. The sink is never closed or reset by a relaunch.
//!
//! There is no restart cap and, by default, no backoff: a source that fails
//! instantly produces a tight relaunch loop. `restart_delay` exists as an
//! opt-in damper and defaults to zero to preserve the immediate-relaunch
//! contract.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use super::StreamSession;
use crate::worker::{Worker, WorkerFactory};

/// Default grace period between the graceful interrupt and a forced kill
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_secs(3);

/// Why the pass-through pump stopped
#[derive(Debug, PartialEq, Eq)]
enum PumpOutcome {
    /// The worker's output channel closed
    WorkerExited,
    /// The client sink closed (disconnect)
    SinkClosed,
}

/// Supervises one worker per session and pumps its output into the sink
pub struct StreamSupervisor<F: WorkerFactory> {
    session: StreamSession,
    factory: Arc<F>,
    grace: Duration,
    restart_delay: Duration,
}

impl<F: WorkerFactory> StreamSupervisor<F> {
    /// Create a supervisor for a session
    pub fn new(session: StreamSession, factory: Arc<F>) -> Self {
        Self {
            session,
            factory,
            grace: DEFAULT_TERMINATION_GRACE,
            restart_delay: Duration::ZERO,
        }
    }

    /// Set the grace period before a stuck worker is force-killed
    pub fn termination_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Set an optional delay between worker relaunches (default: none)
    pub fn restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Run until the sink closes
    ///
    /// Returns the session with its final relay statistics. The worker
    /// handle never outlives this call.
    pub async fn run(mut self, sink: mpsc::Sender<Bytes>) -> StreamSession {
        tracing::info!(
            session_id = self.session.id,
            source = %self.session.source,
            "Stream session started"
        );

        loop {
            if sink.is_closed() {
                break;
            }

            let mut worker = match self.factory.launch(&self.session.source) {
                Ok(worker) => worker,
                Err(e) => {
                    tracing::warn!(
                        session_id = self.session.id,
                        error = %e,
                        "Worker spawn failed, retrying"
                    );
                    self.pause_before_relaunch().await;
                    continue;
                }
            };

            match self.pump(&mut worker, &sink).await {
                PumpOutcome::WorkerExited => {
                    worker.wait().await;
                    self.session.stats.record_relaunch();
                    tracing::debug!(
                        session_id = self.session.id,
                        relaunches = self.session.stats.relaunches,
                        "Worker exited with sink open, relaunching"
                    );
                    self.pause_before_relaunch().await;
                }
                PumpOutcome::SinkClosed => {
                    teardown(&mut worker, self.grace).await;
                    break;
                }
            }
        }

        tracing::info!(
            session_id = self.session.id,
            bytes = self.session.stats.bytes_relayed,
            relaunches = self.session.stats.relaunches,
            duration = ?self.session.stats.duration(),
            "Stream session closed"
        );

        self.session
    }

    /// Pass worker output through to the sink until one side stops
    async fn pump(&mut self, worker: &mut F::Worker, sink: &mpsc::Sender<Bytes>) -> PumpOutcome {
        loop {
            tokio::select! {
                chunk = worker.next_chunk() => match chunk {
                    Ok(Some(bytes)) => {
                        self.session.stats.record_chunk(bytes.len());
                        if sink.send(bytes).await.is_err() {
                            return PumpOutcome::SinkClosed;
                        }
                    }
                    Ok(None) => return PumpOutcome::WorkerExited,
                    Err(e) => {
                        tracing::debug!(
                            session_id = self.session.id,
                            error = %e,
                            "Worker output read failed"
                        );
                        return PumpOutcome::WorkerExited;
                    }
                },
                _ = sink.closed() => return PumpOutcome::SinkClosed,
            }
        }
    }

    async fn pause_before_relaunch(&self) {
        if self.restart_delay.is_zero() {
            // Keep the relaunch immediate but let other tasks run.
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.restart_delay).await;
        }
    }
}

/// Tear down a worker: graceful interrupt, bounded wait, then forced kill
///
/// Safe to invoke more than once; the worker delivers at most one interrupt.
pub async fn teardown<W: Worker>(worker: &mut W, grace: Duration) {
    worker.terminate().await;
    if tokio::time::timeout(grace, worker.wait()).await.is_err() {
        tracing::warn!("Worker ignored interrupt, killing");
        worker.kill().await;
    }
}
