//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::session::supervisor::DEFAULT_TERMINATION_GRACE;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Directory served for static asset requests
    pub public_dir: PathBuf,

    /// Capacity of the per-session sink channel (chunks, not bytes)
    pub sink_capacity: usize,

    /// Grace period between worker interrupt and forced kill
    pub termination_grace: Duration,

    /// Delay between worker relaunches (zero = immediate relaunch)
    pub restart_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            public_dir: PathBuf::from("public"),
            sink_capacity: 64,
            termination_grace: DEFAULT_TERMINATION_GRACE,
            restart_delay: Duration::ZERO,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the static asset directory
    pub fn public_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.public_dir = dir.into();
        self
    }

    /// Set the per-session sink channel capacity
    pub fn sink_capacity(mut self, capacity: usize) -> Self {
        self.sink_capacity = capacity.max(1);
        self
    }

    /// Set the worker termination grace period
    pub fn termination_grace(mut self, grace: Duration) -> Self {
        self.termination_grace = grace;
        self
    }

    /// Set the delay between worker relaunches
    pub fn restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }
}
