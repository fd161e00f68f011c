//! Transcoding worker abstraction
//!
//! The supervision loop depends only on this seam: a continuous output byte
//! channel, a graceful-interrupt capability, and an exit notification. The
//! real implementation shells out to ffmpeg; tests inject fake workers to
//! exercise supervision without spawning processes.

pub mod ffmpeg;
pub mod state;

pub use ffmpeg::{FfmpegFactory, FfmpegWorker};
pub use state::{WorkerLifecycle, WorkerPhase};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::source::SourceDescriptor;

/// A running transcoding worker
#[async_trait]
pub trait Worker: Send {
    /// Read the next chunk from the worker's output channel
    ///
    /// `Ok(None)` means the output channel closed, i.e. the worker is
    /// exiting. Callers should follow up with [`Worker::wait`].
    async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>>;

    /// Request graceful termination
    ///
    /// Idempotent: at most one interrupt is ever delivered to the process,
    /// no matter how many times this is called.
    async fn terminate(&mut self);

    /// Wait for the worker process to exit
    async fn wait(&mut self);

    /// Force-kill the worker (used after the grace period expires)
    async fn kill(&mut self);
}

/// Launches workers for a given source
///
/// One factory is shared by all sessions; each launch produces a fresh,
/// exclusively owned worker.
pub trait WorkerFactory: Send + Sync + 'static {
    type Worker: Worker + 'static;

    /// Spawn a new worker transcoding `source` into a looping fMP4 stream
    fn launch(&self, source: &SourceDescriptor) -> Result<Self::Worker>;
}
