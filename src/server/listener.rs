//! Relay HTTP server
//!
//! Binds the configured address and dispatches requests to the route
//! handlers. The server is generic over the worker factory so tests can
//! inject fake workers and exercise the whole HTTP surface without ffmpeg.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};

use super::config::ServerConfig;
use super::routes;
use crate::error::Result;
use crate::source::SourceRegistry;
use crate::worker::WorkerFactory;

/// Shared server state
pub(crate) struct ServerInner<F: WorkerFactory> {
    pub(crate) config: ServerConfig,
    pub(crate) factory: Arc<F>,
    pub(crate) registry: SourceRegistry,
    pub(crate) next_session_id: AtomicU64,
}

/// Relay HTTP server
pub struct RelayServer<F: WorkerFactory> {
    inner: Arc<ServerInner<F>>,
}

impl<F: WorkerFactory> Clone for RelayServer<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: WorkerFactory> RelayServer<F> {
    /// Create a new server with the given configuration and worker factory
    pub fn new(config: ServerConfig, factory: F) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                config,
                factory: Arc::new(factory),
                registry: SourceRegistry::new(),
                next_session_id: AtomicU64::new(1),
            }),
        }
    }

    /// Get the source registry
    pub fn registry(&self) -> &SourceRegistry {
        &self.inner.registry
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.inner.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the listener fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<Fut>(&self, shutdown: Fut) -> Result<()>
    where
        Fut: Future<Output = ()>,
    {
        let (addr, server) = self.bind(shutdown)?;
        tracing::info!(addr = %addr, "Relay server listening");
        server.await
    }

    /// Bind the configured address without driving the server yet
    ///
    /// Returns the bound address (resolving port 0) and a future that runs
    /// the server until `shutdown` resolves.
    pub fn bind<Fut>(
        &self,
        shutdown: Fut,
    ) -> Result<(SocketAddr, impl Future<Output = Result<()>>)>
    where
        Fut: Future<Output = ()>,
    {
        let inner = Arc::clone(&self.inner);
        let make_svc = make_service_fn(move |_conn| {
            let inner = Arc::clone(&inner);
            async move {
                Ok::<_, std::convert::Infallible>(service_fn(move |req| {
                    routes::handle(Arc::clone(&inner), req)
                }))
            }
        });

        let server = hyper::Server::try_bind(&self.inner.config.bind_addr)?.serve(make_svc);
        let addr = server.local_addr();

        Ok((addr, async move {
            server
                .with_graceful_shutdown(shutdown)
                .await
                .map_err(crate::Error::Hyper)
        }))
    }
}
