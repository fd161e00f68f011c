//! Static asset serving
//!
//! Thin stateless wrapper: `/` maps to `index.html`, the content type is
//! derived from the file extension, and anything missing is a plain 404.

use std::path::{Component, Path, PathBuf};

use hyper::header::CONTENT_TYPE;
use hyper::{Body, Response, StatusCode};

use crate::error::Result;

/// Content type for a file path, by extension
pub(crate) fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("html") => "text/html",
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}

/// Resolve a URL path inside the public dir, rejecting traversal
fn resolve(public_dir: &Path, url_path: &str) -> Option<PathBuf> {
    let rel = if url_path == "/" { "index.html" } else { url_path.trim_start_matches('/') };
    let rel = Path::new(rel);
    if rel.components().any(|c| matches!(c, Component::ParentDir)) {
        return None;
    }
    Some(public_dir.join(rel))
}

/// Serve a static file from the public dir
pub(crate) async fn serve(public_dir: &Path, url_path: &str) -> Result<Response<Body>> {
    let path = match resolve(public_dir, url_path) {
        Some(path) => path,
        None => return not_found(),
    };

    match tokio::fs::read(&path).await {
        Ok(data) => Ok(Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, content_type_for(&path))
            .body(Body::from(data))?),
        Err(_) => not_found(),
    }
}

fn not_found() -> Result<Response<Body>> {
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Body::from("Not Found"))?)
}
