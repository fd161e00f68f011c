//! End-to-end tests of the HTTP surface with injected fake workers.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use hyper::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, TRANSFER_ENCODING};
use hyper::{Body, Client, Method, Request, StatusCode};
use tokio::sync::oneshot;

use fmp4_relay::client::{LatencyReading, PlaybackBuffer, PlaybackEvents, StreamClient};
use fmp4_relay::server::{RelayServer, ServerConfig};
use fmp4_relay::source::SourceDescriptor;
use fmp4_relay::worker::{Worker, WorkerFactory, WorkerLifecycle};
use fmp4_relay::Result;

/// Looks enough like an fMP4 init segment for the tests
const INIT_SEGMENT: &[u8] = b"\x00\x00\x00\x18ftypisom";

/// Worker emitting an init segment first, then media chunks
struct ScriptWorker {
    emitted: usize,
    exit_after: Option<usize>,
    lifecycle: WorkerLifecycle,
}

#[async_trait]
impl Worker for ScriptWorker {
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        if let Some(limit) = self.exit_after {
            if self.emitted >= limit {
                return Ok(None);
            }
        }
        let chunk = if self.emitted == 0 {
            Bytes::from_static(INIT_SEGMENT)
        } else {
            tokio::time::sleep(Duration::from_millis(2)).await;
            Bytes::from_static(b"moofmdat")
        };
        self.emitted += 1;
        Ok(Some(chunk))
    }

    async fn terminate(&mut self) {
        self.lifecycle.begin_terminate();
    }

    async fn wait(&mut self) {
        self.lifecycle.mark_terminated();
    }

    async fn kill(&mut self) {
        self.lifecycle.mark_terminated();
    }
}

/// Fake ffmpeg factory recording every launch
#[derive(Clone)]
struct FakeFfmpeg {
    inner: Arc<FakeInner>,
}

struct FakeInner {
    exit_after: Option<usize>,
    launches: AtomicU64,
    inputs: Mutex<Vec<String>>,
}

impl FakeFfmpeg {
    fn new(exit_after: Option<usize>) -> Self {
        Self {
            inner: Arc::new(FakeInner {
                exit_after,
                launches: AtomicU64::new(0),
                inputs: Mutex::new(Vec::new()),
            }),
        }
    }

    fn launches(&self) -> u64 {
        self.inner.launches.load(Ordering::SeqCst)
    }

    fn inputs(&self) -> Vec<String> {
        self.inner.inputs.lock().unwrap().clone()
    }
}

impl WorkerFactory for FakeFfmpeg {
    type Worker = ScriptWorker;

    fn launch(&self, source: &SourceDescriptor) -> Result<ScriptWorker> {
        self.inner.launches.fetch_add(1, Ordering::SeqCst);
        self.inner.inputs.lock().unwrap().push(source.input_spec());
        Ok(ScriptWorker {
            emitted: 0,
            exit_after: self.inner.exit_after,
            lifecycle: WorkerLifecycle::new(),
        })
    }
}

struct TestServer {
    addr: SocketAddr,
    server: RelayServer<FakeFfmpeg>,
    stop: Option<oneshot::Sender<()>>,
}

impl TestServer {
    fn start(factory: FakeFfmpeg) -> Self {
        let config = ServerConfig::with_addr("127.0.0.1:0".parse().unwrap())
            .termination_grace(Duration::from_millis(100));
        let server = RelayServer::new(config, factory);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (addr, driver) = server
            .bind(async move {
                let _ = stop_rx.await;
            })
            .expect("bind failed");
        tokio::spawn(driver);
        Self {
            addr,
            server,
            stop: Some(stop_tx),
        }
    }

    fn uri(&self, path: &str) -> hyper::Uri {
        format!("http://{}{}", self.addr, path).parse().unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

async fn body_text(body: Body) -> String {
    let bytes = hyper::body::to_bytes(body).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_stream_without_source_is_rejected() {
    let factory = FakeFfmpeg::new(None);
    let ts = TestServer::start(factory.clone());

    let resp = Client::new().get(ts.uri("/stream")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    // Non-chunked error: no streaming body is ever opened.
    assert!(resp.headers().get(TRANSFER_ENCODING).is_none());
    assert_eq!(
        resp.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
    assert_eq!(body_text(resp.into_body()).await, "No source configured");
    assert_eq!(factory.launches(), 0);
}

#[tokio::test]
async fn test_set_url_rejects_bad_json_and_keeps_registry() {
    let ts = TestServer::start(FakeFfmpeg::new(None));
    let client = Client::new();

    // Configure a valid URL first.
    let req = Request::builder()
        .method(Method::POST)
        .uri(ts.uri("/set-url"))
        .body(Body::from(r#"{"url":"http://example.com/video.mp4"}"#))
        .unwrap();
    let resp = client.request(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp.into_body()).await, "OK");

    // Unparsable body must not touch the registry.
    let req = Request::builder()
        .method(Method::POST)
        .uri(ts.uri("/set-url"))
        .body(Body::from("not json"))
        .unwrap();
    let resp = client.request(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(resp.into_body()).await, "Invalid JSON");

    // Empty url is just as invalid.
    let req = Request::builder()
        .method(Method::POST)
        .uri(ts.uri("/set-url"))
        .body(Body::from(r#"{"url":""}"#))
        .unwrap();
    let resp = client.request(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert_eq!(
        ts.server.registry().snapshot().await,
        Some(SourceDescriptor::RemoteUrl(
            "http://example.com/video.mp4".into()
        ))
    );
}

#[tokio::test]
async fn test_upload_roundtrip_streams_init_segment() {
    let factory = FakeFfmpeg::new(None);
    let ts = TestServer::start(factory.clone());
    let client = Client::new();

    let req = Request::builder()
        .method(Method::PUT)
        .uri(ts.uri("/upload"))
        .body(Body::from(vec![0u8; 1024]))
        .unwrap();
    let resp = client.request(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp.into_body()).await, "OK");

    let source = ts.server.registry().snapshot().await.expect("source set");
    assert!(source.is_file());
    let saved = tokio::fs::read(source.input_spec()).await.unwrap();
    assert_eq!(saved.len(), 1024);

    let resp = client.get(ts.uri("/stream")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(CONTENT_TYPE).unwrap(), "video/mp4");

    let mut body = resp.into_body();
    let first = body.next().await.unwrap().unwrap();
    assert!(first.starts_with(b"\x00\x00\x00\x18ftyp"));

    // Worker was launched against the uploaded temp file.
    assert_eq!(factory.inputs(), vec![source.input_spec()]);
}

#[tokio::test]
async fn test_worker_exits_are_invisible_to_the_client() {
    // Every worker emits its init segment and dies immediately.
    let factory = FakeFfmpeg::new(Some(1));
    let ts = TestServer::start(factory.clone());
    let client = Client::new();

    let req = Request::builder()
        .method(Method::POST)
        .uri(ts.uri("/set-url"))
        .body(Body::from(r#"{"url":"http://example.com/video.mp4"}"#))
        .unwrap();
    assert_eq!(client.request(req).await.unwrap().status(), StatusCode::OK);

    let resp = client.get(ts.uri("/stream")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // One contiguous body across many worker generations.
    let mut body = resp.into_body();
    for _ in 0..5 {
        let chunk = body.next().await.expect("stream stayed open").unwrap();
        assert_eq!(chunk, Bytes::from_static(INIT_SEGMENT));
    }

    assert!(factory.launches() >= 5);
    // Every relaunch reused the session's source snapshot.
    assert!(factory
        .inputs()
        .iter()
        .all(|input| input == "http://example.com/video.mp4"));
}

/// Playback buffer that counts appends
#[derive(Clone)]
struct CountingBuffer {
    appends: Arc<AtomicU64>,
}

#[async_trait]
impl PlaybackBuffer for CountingBuffer {
    async fn append(&mut self, _data: Bytes) -> Result<()> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn end_of_stream(&mut self) {}
}

/// Host where every armed frame presents immediately
struct InstantEvents;

#[async_trait]
impl PlaybackEvents for InstantEvents {
    fn supports_frame_callbacks(&self) -> bool {
        true
    }

    async fn frame_presented(&mut self) {}

    async fn time_advanced(&mut self) {}
}

#[tokio::test]
async fn test_stream_client_measures_latency_end_to_end() {
    let ts = TestServer::start(FakeFfmpeg::new(None));
    let client = Client::new();

    let req = Request::builder()
        .method(Method::POST)
        .uri(ts.uri("/set-url"))
        .body(Body::from(r#"{"url":"http://example.com/video.mp4"}"#))
        .unwrap();
    assert_eq!(client.request(req).await.unwrap().status(), StatusCode::OK);

    let appends = Arc::new(AtomicU64::new(0));
    let buffer = CountingBuffer {
        appends: Arc::clone(&appends),
    };
    let mut stream_client = StreamClient::connect(ts.uri("/stream"), buffer, InstantEvents)
        .await
        .expect("connect");

    let mut latency = stream_client.watch_latency();
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            latency.changed().await.unwrap();
            if let LatencyReading::Millis(ms) = *latency.borrow() {
                assert!(ms >= 0.0);
                break;
            }
        }
    })
    .await
    .expect("no latency published");

    assert!(appends.load(Ordering::SeqCst) >= 1);

    stream_client.reset();
    assert_eq!(stream_client.latency(), LatencyReading::NoData);
}

#[tokio::test]
async fn test_connect_fails_cleanly_without_source() {
    let ts = TestServer::start(FakeFfmpeg::new(None));

    let buffer = CountingBuffer {
        appends: Arc::new(AtomicU64::new(0)),
    };
    let result = StreamClient::connect(ts.uri("/stream"), buffer, InstantEvents).await;

    assert!(matches!(
        result,
        Err(fmp4_relay::Error::StreamRejected(StatusCode::BAD_REQUEST))
    ));
}

#[tokio::test]
async fn test_unknown_static_path_is_404() {
    let ts = TestServer::start(FakeFfmpeg::new(None));

    let resp = Client::new().get(ts.uri("/missing.html")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        resp.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
    assert_eq!(body_text(resp.into_body()).await, "Not Found");
}
