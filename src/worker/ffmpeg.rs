//! ffmpeg-backed transcoding worker
//!
//! Spawns one ffmpeg process per session that loops the input source forever
//! and writes a fragmented MP4 stream to stdout. The encode profile is fixed
//! for low latency: constant GOP length, no B-frames, fragment per keyframe,
//! and the init segment embedded up front (`empty_moov`) so a client joining
//! mid-stream can start decoding immediately.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::state::WorkerLifecycle;
use super::Worker;
use crate::error::{Error, Result};
use crate::source::SourceDescriptor;

/// Read buffer size for the worker's stdout
const OUTPUT_READ_BUF: usize = 64 * 1024;

/// Build the ffmpeg argument list for a looping low-latency fMP4 encode
fn encode_args(input: &str) -> Vec<String> {
    [
        // pace reads at native frame rate and loop the input forever
        "-re",
        "-stream_loop",
        "-1",
        "-i",
        input,
        "-c:v",
        "libx264",
        "-preset",
        "ultrafast",
        "-tune",
        "zerolatency",
        "-g",
        "30",
        "-bf",
        "0",
        "-f",
        "mp4",
        "-movflags",
        "frag_keyframe+empty_moov+default_base_moof",
        "pipe:1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Factory spawning ffmpeg workers
#[derive(Debug, Clone)]
pub struct FfmpegFactory {
    binary: String,
}

impl FfmpegFactory {
    /// Use `ffmpeg` from `PATH`
    pub fn new() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
        }
    }

    /// Use a specific ffmpeg binary
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl super::WorkerFactory for FfmpegFactory {
    type Worker = FfmpegWorker;

    fn launch(&self, source: &SourceDescriptor) -> Result<FfmpegWorker> {
        let input = source.input_spec();

        let mut child = Command::new(&self.binary)
            .args(encode_args(&input))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(Error::WorkerSpawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::WorkerSpawn(io::Error::new(io::ErrorKind::BrokenPipe, "no stdout pipe")))?;
        let stdin = child.stdin.take();

        // Drain diagnostics; they are logged, never parsed.
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "ffmpeg", "{}", line);
                }
            });
        }

        let mut lifecycle = WorkerLifecycle::new();
        lifecycle.mark_running();

        tracing::debug!(input = %input, "ffmpeg worker spawned");

        Ok(FfmpegWorker {
            child,
            stdout,
            stdin,
            lifecycle,
            buf: vec![0u8; OUTPUT_READ_BUF],
        })
    }
}

/// A running ffmpeg process
pub struct FfmpegWorker {
    child: Child,
    stdout: ChildStdout,
    stdin: Option<ChildStdin>,
    lifecycle: WorkerLifecycle,
    buf: Vec<u8>,
}

#[async_trait]
impl Worker for FfmpegWorker {
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        let n = self.stdout.read(&mut self.buf).await?;
        if n == 0 {
            Ok(None)
        } else {
            Ok(Some(Bytes::copy_from_slice(&self.buf[..n])))
        }
    }

    async fn terminate(&mut self) {
        if !self.lifecycle.begin_terminate() {
            return;
        }
        // ffmpeg treats `q` on stdin as a graceful quit request; it flushes
        // the muxer before exiting, unlike a hard kill.
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.write_all(b"q").await;
            let _ = stdin.shutdown().await;
        }
    }

    async fn wait(&mut self) {
        match self.child.wait().await {
            Ok(status) => tracing::debug!(%status, uptime = ?self.lifecycle.uptime(), "ffmpeg worker exited"),
            Err(e) => tracing::warn!(error = %e, "Failed to reap ffmpeg worker"),
        }
        self.lifecycle.mark_terminated();
    }

    async fn kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::warn!(error = %e, "Failed to kill ffmpeg worker");
        }
        let _ = self.child.wait().await;
        self.lifecycle.mark_terminated();
    }
}
