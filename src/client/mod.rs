//! Client-side stream consumption and latency measurement
//!
//! The client half of the relay: read the chunked stream incrementally,
//! serialize fragments into a playback buffer one at a time in arrival
//! order ([`feeder`], [`feed`]), and publish the end-to-end playback
//! latency of the most recently presented fragment ([`probe`]).

pub mod feed;
pub mod feeder;
pub mod probe;

pub use feed::{run_feed, PlaybackBuffer, StreamClient};
pub use feeder::{DrainStep, FeedState, Fragment, FragmentFeeder};
pub use probe::{LatencyProbe, LatencyReading, PlaybackEvents, ProbeHandle};
