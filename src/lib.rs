//! Live fMP4 relay server and client library.
//!
//! Relays an arbitrary video source (a local file or a remote URL) as a
//! continuous, never-ending live stream over chunked HTTP, re-encoding on
//! the fly into fragmented MP4. Each client connection gets its own
//! transcoding worker, supervised so that worker exits are invisible to the
//! client as long as the connection stays open.
//!
//! # Architecture
//!
//! ```text
//!   PUT /upload ──┐
//!   POST /set-url ┴─► SourceRegistry (current source descriptor)
//!                              │ snapshot at session start
//!   GET /stream ──► StreamSupervisor ──► ffmpeg worker ──► chunked body
//!                        │ relaunch on worker exit, teardown on disconnect
//!
//!   client: body chunks ──► FragmentFeeder ──► PlaybackBuffer
//!                                 │ one append outstanding, strict FIFO
//!                           LatencyProbe ──► latest latency reading
//! ```
//!
//! The server side lives in [`server`], [`session`], [`worker`] and
//! [`source`]; the client side (fragment feeding and latency measurement)
//! lives in [`client`].

pub mod client;
pub mod error;
pub mod server;
pub mod session;
pub mod source;
pub mod worker;

pub use error::{Error, Result};
