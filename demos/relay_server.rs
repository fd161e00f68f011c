//! Minimal relay server backed by ffmpeg.
//!
//! Usage:
//!   cargo run --example relay_server [bind_addr]
//!
//! Then configure a source:
//!   curl -X POST localhost:8080/set-url -d '{"url":"http://example.com/video.mp4"}'
//!   curl -T input.mp4 localhost:8080/upload
//! and play:
//!   curl localhost:8080/stream > live.mp4

use std::net::SocketAddr;

use fmp4_relay::server::{RelayServer, ServerConfig};
use fmp4_relay::worker::FfmpegFactory;

#[tokio::main]
async fn main() -> fmp4_relay::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let bind_addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "0.0.0.0:8080".to_string())
        .parse()
        .expect("invalid bind address");

    let server = RelayServer::new(ServerConfig::with_addr(bind_addr), FfmpegFactory::new());
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
