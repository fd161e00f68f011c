//! Client-side stream consumption
//!
//! Fetches the relay's `/stream` endpoint and drives the fragment feeder
//! against a playback buffer under a single logical thread: the only
//! suspension points are the network read and the outstanding append.
//! Each completed append arms the latency probe with the fragment's
//! arrival timestamp.

use bytes::Bytes;
use futures_util::{Stream, StreamExt, TryStreamExt};
use hyper::StatusCode;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::feeder::{DrainStep, Fragment, FragmentFeeder};
use super::probe::{LatencyProbe, LatencyReading, PlaybackEvents, ProbeHandle};
use crate::error::{Error, Result};

/// Append-only playback buffer fed one fragment at a time
///
/// Mirrors a media source buffer: `append` resolves when the buffer has
/// accepted the fragment, and no second append may start before that.
/// The `&mut self` receivers make an overlapping append unrepresentable.
#[async_trait::async_trait]
pub trait PlaybackBuffer: Send {
    /// Append one fragment; resolves on completion
    ///
    /// A rejected fragment aborts the whole feed (the stream cannot
    /// recover from a hole in the fragment sequence).
    async fn append(&mut self, data: Bytes) -> Result<()>;

    /// Signal that no further fragments will arrive
    async fn end_of_stream(&mut self);
}

/// Drive the feed loop until the stream ends or fails
///
/// Fragments are timestamped as they are read, queued in arrival order and
/// appended strictly one at a time. End-of-stream is signaled only after
/// the queue has drained and the last append has completed.
pub async fn run_feed<S, B>(chunks: S, buffer: &mut B, probe: &ProbeHandle) -> Result<()>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
    B: PlaybackBuffer,
{
    let mut chunks = chunks.fuse();
    let mut feeder = FragmentFeeder::new();
    let mut next_append: Option<Fragment> = None;
    let mut upstream_done = false;

    loop {
        if let Some(fragment) = next_append.take() {
            let t0 = fragment.t0;
            {
                let mut append = buffer.append(fragment.data);
                loop {
                    tokio::select! {
                        res = &mut append => {
                            res?;
                            break;
                        }
                        chunk = chunks.next(), if !upstream_done => match chunk {
                            Some(Ok(data)) => {
                                // Feeding: this only queues.
                                let _ = feeder.enqueue(Fragment::now(data));
                            }
                            Some(Err(e)) => {
                                tracing::error!(error = %e, "Stream read failed");
                                return Err(e);
                            }
                            None => {
                                upstream_done = true;
                                // Deferred: an append is still outstanding.
                                let _ = feeder.finish();
                            }
                        },
                    }
                }
            }
            probe.arm(t0);
            match feeder.complete() {
                DrainStep::Append(fragment) => next_append = Some(fragment),
                DrainStep::EndOfStream => {
                    buffer.end_of_stream().await;
                    return Ok(());
                }
                DrainStep::Wait => {}
            }
        } else {
            match chunks.next().await {
                Some(Ok(data)) => {
                    if let Some(fragment) = feeder.enqueue(Fragment::now(data)) {
                        next_append = Some(fragment);
                    }
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Stream read failed");
                    return Err(e);
                }
                None => {
                    if feeder.finish() {
                        buffer.end_of_stream().await;
                    }
                    return Ok(());
                }
            }
        }
    }
}

/// A connected stream client
///
/// Owns the feed loop and the latency probe as background tasks. Dropping
/// the client (or calling [`StreamClient::reset`]) tears both down.
pub struct StreamClient {
    feed_task: JoinHandle<()>,
    probe_task: JoinHandle<()>,
    probe: ProbeHandle,
}

impl StreamClient {
    /// Fetch `uri` and feed its body into `buffer`
    ///
    /// Fails without opening a feed loop if the server refuses the stream
    /// (e.g. no source configured yet).
    pub async fn connect<B, E>(uri: hyper::Uri, mut buffer: B, events: E) -> Result<Self>
    where
        B: PlaybackBuffer + 'static,
        E: PlaybackEvents,
    {
        let client = hyper::Client::new();
        let response = client.get(uri).await.map_err(Error::NetworkRead)?;
        if response.status() != StatusCode::OK {
            return Err(Error::StreamRejected(response.status()));
        }

        let (probe, handle) = LatencyProbe::new(events);
        let probe_task = tokio::spawn(probe.run());

        let body = response.into_body().map_err(Error::NetworkRead);
        let feed_handle = handle.clone();
        let feed_task = tokio::spawn(async move {
            if let Err(e) = run_feed(body, &mut buffer, &feed_handle).await {
                tracing::error!(error = %e, "Feed loop aborted");
            }
        });

        Ok(Self {
            feed_task,
            probe_task,
            probe: handle,
        })
    }

    /// Latest latency reading
    pub fn latency(&self) -> LatencyReading {
        self.probe.reading()
    }

    /// Subscribe to latency updates
    pub fn watch_latency(&self) -> watch::Receiver<LatencyReading> {
        self.probe.watch()
    }

    /// Whether the feed loop is still running
    pub fn is_running(&self) -> bool {
        !self.feed_task.is_finished()
    }

    /// Full reset: stop feeding and measuring, clear the displayed latency
    ///
    /// Safe to call from any state, including while an append or network
    /// read is outstanding; the playback buffer is dropped with the feed
    /// task.
    pub fn reset(&mut self) {
        self.feed_task.abort();
        self.probe_task.abort();
        self.probe.clear();
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.feed_task.abort();
        self.probe_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures_util::stream;

    use crate::client::probe::tests_support::idle_probe_handle;

    /// Buffer that records appends and completes them after a delay
    struct RecordingBuffer {
        appended: Vec<Bytes>,
        delay: Duration,
        fail_at: Option<usize>,
        eos_at: Option<usize>,
    }

    impl RecordingBuffer {
        fn new(delay: Duration) -> Self {
            Self {
                appended: Vec::new(),
                delay,
                fail_at: None,
                eos_at: None,
            }
        }
    }

    #[async_trait::async_trait]
    impl PlaybackBuffer for RecordingBuffer {
        async fn append(&mut self, data: Bytes) -> Result<()> {
            if self.delay > Duration::ZERO {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail_at == Some(self.appended.len()) {
                return Err(Error::BufferAppend("rejected".into()));
            }
            self.appended.push(data);
            Ok(())
        }

        async fn end_of_stream(&mut self) {
            self.eos_at = Some(self.appended.len());
        }
    }

    fn chunk_stream(n: u8) -> impl Stream<Item = Result<Bytes>> + Unpin {
        stream::iter((0..n).map(|i| Ok(Bytes::from(vec![i]))))
    }

    #[tokio::test]
    async fn test_appends_preserve_arrival_order() {
        // Delayed completions force every later chunk through the queue.
        let mut buffer = RecordingBuffer::new(Duration::from_millis(2));
        let probe = idle_probe_handle();

        run_feed(chunk_stream(10), &mut buffer, &probe).await.unwrap();

        let order: Vec<u8> = buffer.appended.iter().map(|b| b[0]).collect();
        assert_eq!(order, (0..10).collect::<Vec<u8>>());
    }

    #[tokio::test]
    async fn test_eos_after_queue_drained() {
        let mut buffer = RecordingBuffer::new(Duration::from_millis(2));
        let probe = idle_probe_handle();

        run_feed(chunk_stream(5), &mut buffer, &probe).await.unwrap();

        // end_of_stream observed all five appends already applied
        assert_eq!(buffer.eos_at, Some(5));
    }

    #[tokio::test]
    async fn test_eos_on_empty_stream() {
        let mut buffer = RecordingBuffer::new(Duration::ZERO);
        let probe = idle_probe_handle();

        run_feed(chunk_stream(0), &mut buffer, &probe).await.unwrap();

        assert_eq!(buffer.eos_at, Some(0));
    }

    #[tokio::test]
    async fn test_append_rejection_aborts_feed() {
        let mut buffer = RecordingBuffer::new(Duration::ZERO);
        buffer.fail_at = Some(2);
        let probe = idle_probe_handle();

        let result = run_feed(chunk_stream(5), &mut buffer, &probe).await;

        assert!(matches!(result, Err(Error::BufferAppend(_))));
        assert_eq!(buffer.appended.len(), 2);
        // No end-of-stream after an abort.
        assert_eq!(buffer.eos_at, None);
    }

    #[tokio::test]
    async fn test_read_error_aborts_feed() {
        let mut buffer = RecordingBuffer::new(Duration::ZERO);
        let probe = idle_probe_handle();

        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"a")),
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))),
        ]);

        let result = run_feed(chunks, &mut buffer, &probe).await;

        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(buffer.eos_at, None);
    }
}
