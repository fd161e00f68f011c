//! Crate-wide error types
//!
//! Configuration and stream-start failures surface to the requester as
//! immediate textual responses. Worker crashes are deliberately absent from
//! this taxonomy: the supervision loop absorbs them by relaunching while the
//! client sink stays open.

use std::io;

use hyper::StatusCode;

/// Convenience result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for relay operations
#[derive(Debug)]
pub enum Error {
    /// A stream was requested before any source was configured
    NoSourceConfigured,
    /// The transcoding worker process could not be spawned
    WorkerSpawn(io::Error),
    /// A configuration request was malformed (bad upload, unparsable JSON)
    InvalidConfigRequest(&'static str),
    /// Reading the stream body from the network failed
    NetworkRead(hyper::Error),
    /// The server refused to open a stream
    StreamRejected(StatusCode),
    /// The playback buffer rejected an appended fragment
    BufferAppend(String),
    /// I/O error
    Io(io::Error),
    /// HTTP message construction error
    Http(hyper::http::Error),
    /// Transport-level HTTP error
    Hyper(hyper::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NoSourceConfigured => write!(f, "No source configured"),
            Error::WorkerSpawn(e) => write!(f, "Failed to spawn transcoding worker: {}", e),
            Error::InvalidConfigRequest(msg) => write!(f, "Invalid configuration request: {}", msg),
            Error::NetworkRead(e) => write!(f, "Stream read failed: {}", e),
            Error::StreamRejected(status) => write!(f, "Stream request rejected: {}", status),
            Error::BufferAppend(msg) => write!(f, "Playback buffer rejected fragment: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::Hyper(e) => write!(f, "HTTP transport error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::WorkerSpawn(e) | Error::Io(e) => Some(e),
            Error::NetworkRead(e) | Error::Hyper(e) => Some(e),
            Error::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<hyper::http::Error> for Error {
    fn from(e: hyper::http::Error) -> Self {
        Error::Http(e)
    }
}

impl From<hyper::Error> for Error {
    fn from(e: hyper::Error) -> Self {
        Error::Hyper(e)
    }
}
