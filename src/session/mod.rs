//! Per-connection stream sessions
//!
//! Each client connection owns exactly one session, each session owns at
//! most one transcoding worker at a time, and the worker's lifetime is
//! strictly bounded by the session. Sessions are never shared or pooled:
//! N simultaneous clients produce N independent workers against the same
//! source.

pub mod supervisor;

pub use supervisor::StreamSupervisor;

use std::time::{Duration, Instant};

use crate::source::SourceDescriptor;

/// Per-session relay statistics
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Bytes passed through to the client sink
    pub bytes_relayed: u64,
    /// Chunks passed through to the client sink
    pub chunks_relayed: u64,
    /// Worker relaunches performed while the sink stayed open
    pub relaunches: u64,
    /// Session start time
    pub started_at: Instant,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            bytes_relayed: 0,
            chunks_relayed: 0,
            relaunches: 0,
            started_at: Instant::now(),
        }
    }

    /// Record one chunk passed through to the sink
    pub fn record_chunk(&mut self, len: usize) {
        self.bytes_relayed += len as u64;
        self.chunks_relayed += 1;
    }

    /// Record a worker relaunch
    pub fn record_relaunch(&mut self) {
        self.relaunches += 1;
    }

    /// Session duration so far
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Relay bitrate estimate (bits per second)
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration().as_secs();
        if secs > 0 {
            (self.bytes_relayed * 8) / secs
        } else {
            0
        }
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-connection aggregate: identity, source snapshot and relay stats
///
/// The source descriptor is snapshotted when the session is created;
/// configuration changes after that point never affect this session.
#[derive(Debug)]
pub struct StreamSession {
    /// Unique session ID
    pub id: u64,
    /// Source snapshot taken at session creation
    pub source: SourceDescriptor,
    /// Relay statistics
    pub stats: SessionStats,
}

impl StreamSession {
    /// Create a new session for a source snapshot
    pub fn new(id: u64, source: SourceDescriptor) -> Self {
        Self {
            id,
            source,
            stats: SessionStats::new(),
        }
    }
}
