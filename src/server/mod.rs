//! HTTP relay server
//!
//! Exposes the configuration endpoints (`PUT /upload`, `POST /set-url`),
//! the live stream endpoint (`GET /stream`) and static asset serving.
//! Each `GET /stream` connection gets its own supervised transcoding
//! worker; see [`crate::session`].

pub mod assets;
pub mod config;
pub mod listener;
pub(crate) mod routes;

pub use config::ServerConfig;
pub use listener::RelayServer;
