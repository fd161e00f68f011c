//! HTTP request routing
//!
//! Implements the relay's HTTP surface:
//!
//! | Method/Path     | Behavior                                             |
//! |-----------------|------------------------------------------------------|
//! | `PUT /upload`   | save body to a temp file, set it as the source       |
//! | `POST /set-url` | set a remote URL as the source                       |
//! | `GET /stream`   | chunked, never-ending fMP4 stream                    |
//! | `GET /*`        | static assets                                        |
//!
//! Every response, success or failure, allows cross-origin access.

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::StreamExt;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE, TRANSFER_ENCODING,
};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::assets;
use super::listener::ServerInner;
use crate::error::{Error, Result};
use crate::session::{StreamSession, StreamSupervisor};
use crate::worker::WorkerFactory;

#[derive(Debug, Deserialize)]
struct SetUrlRequest {
    #[serde(default)]
    url: String,
}

/// Top-level request dispatcher
pub(crate) async fn handle<F: WorkerFactory>(
    inner: Arc<ServerInner<F>>,
    req: Request<Body>,
) -> std::result::Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let result = match (&method, path.as_str()) {
        (&Method::PUT, "/upload") => upload(&inner, req).await,
        (&Method::POST, "/set-url") => set_url(&inner, req).await,
        (&Method::GET, "/stream") => stream(&inner).await,
        (&Method::GET, _) => assets::serve(&inner.config.public_dir, &path).await,
        _ => Ok(plain(StatusCode::NOT_FOUND, "Not Found")),
    };

    let mut response = match result {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(method = %method, path = %path, error = %e, "Request failed");
            plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    };

    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));

    Ok(response)
}

/// Build a plain-text response
fn plain(status: StatusCode, msg: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(msg));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

/// `PUT /upload`: persist the raw body and make it the current source
async fn upload<F: WorkerFactory>(
    inner: &Arc<ServerInner<F>>,
    req: Request<Body>,
) -> Result<Response<Body>> {
    match save_upload(req).await {
        Ok(path) => {
            inner.registry.set_file(path).await;
            Ok(plain(StatusCode::OK, "OK"))
        }
        Err(e) => {
            tracing::error!(error = %e, "Upload failed");
            Ok(plain(StatusCode::INTERNAL_SERVER_ERROR, "Upload failed"))
        }
    }
}

async fn save_upload(req: Request<Body>) -> Result<PathBuf> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let path = std::env::temp_dir().join(format!("upload_{}.mp4", millis));

    let mut file = tokio::fs::File::create(&path).await?;
    let mut body = req.into_body();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(Error::NetworkRead)?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    tracing::info!(path = %path.display(), "Uploaded source saved");
    Ok(path)
}

/// `POST /set-url`: point the source at a remote URL
///
/// An unparsable body or a missing/empty `url` leaves the registry
/// untouched.
async fn set_url<F: WorkerFactory>(
    inner: &Arc<ServerInner<F>>,
    req: Request<Body>,
) -> Result<Response<Body>> {
    let body = match hyper::body::to_bytes(req.into_body()).await {
        Ok(body) => body,
        Err(_) => return Ok(plain(StatusCode::BAD_REQUEST, "Invalid JSON")),
    };

    match serde_json::from_slice::<SetUrlRequest>(&body) {
        Ok(SetUrlRequest { url }) if !url.is_empty() => {
            inner.registry.set_url(url).await;
            Ok(plain(StatusCode::OK, "OK"))
        }
        _ => Ok(plain(StatusCode::BAD_REQUEST, "Invalid JSON")),
    }
}

/// `GET /stream`: open a never-ending chunked fMP4 response
///
/// Spawns one supervised worker exclusively for this connection. With no
/// source configured this fails up front with a plain 400 and never opens
/// a streaming body.
async fn stream<F: WorkerFactory>(inner: &Arc<ServerInner<F>>) -> Result<Response<Body>> {
    let source = match inner.registry.snapshot().await {
        Some(source) => source,
        None => return Ok(plain(StatusCode::BAD_REQUEST, "No source configured")),
    };

    let session_id = inner.next_session_id.fetch_add(1, Ordering::Relaxed);
    let session = StreamSession::new(session_id, source);

    let (sink, body_rx) = mpsc::channel(inner.config.sink_capacity);
    let supervisor = StreamSupervisor::new(session, Arc::clone(&inner.factory))
        .termination_grace(inner.config.termination_grace)
        .restart_delay(inner.config.restart_delay);
    tokio::spawn(supervisor.run(sink));

    let body = Body::wrap_stream(ReceiverStream::new(body_rx).map(Ok::<_, Infallible>));
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "video/mp4")
        .header(TRANSFER_ENCODING, "chunked")
        .header(CACHE_CONTROL, "no-cache")
        .body(body)?)
}
