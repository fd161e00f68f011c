//! Video source configuration
//!
//! A single source descriptor is configured process-wide and read by each
//! stream session at creation time. Updates are last-write-wins through one
//! async `RwLock` register; sessions hold an immutable snapshot, so a
//! configuration change never affects streams already in flight. Ordering
//! between concurrent writers is unspecified (accepted limitation).

use std::path::PathBuf;

use tokio::sync::RwLock;

/// The currently configured video source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    /// A local file (typically an uploaded temp file)
    File(PathBuf),
    /// A remote URL fetched by the transcoding worker
    RemoteUrl(String),
}

impl SourceDescriptor {
    /// Input argument handed to the transcoding worker
    pub fn input_spec(&self) -> String {
        match self {
            SourceDescriptor::File(path) => path.display().to_string(),
            SourceDescriptor::RemoteUrl(url) => url.clone(),
        }
    }

    /// Whether this source is a local file
    pub fn is_file(&self) -> bool {
        matches!(self, SourceDescriptor::File(_))
    }
}

impl std::fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceDescriptor::File(path) => write!(f, "file:{}", path.display()),
            SourceDescriptor::RemoteUrl(url) => write!(f, "url:{}", url),
        }
    }
}

/// Register holding the current source descriptor
///
/// Replaced wholesale on every configuration request; there is no history
/// and no versioning.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    current: RwLock<Option<SourceDescriptor>>,
}

impl SourceRegistry {
    /// Create an empty registry (no source configured)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source to a local file
    pub async fn set_file(&self, path: impl Into<PathBuf>) {
        self.replace(SourceDescriptor::File(path.into())).await;
    }

    /// Set the source to a remote URL
    pub async fn set_url(&self, url: impl Into<String>) {
        self.replace(SourceDescriptor::RemoteUrl(url.into())).await;
    }

    /// Replace the current descriptor (last write wins)
    pub async fn replace(&self, descriptor: SourceDescriptor) {
        let mut current = self.current.write().await;
        tracing::info!(source = %descriptor, "Source configured");
        *current = Some(descriptor);
    }

    /// Snapshot the current descriptor, if any
    ///
    /// Sessions call this once at creation and keep the snapshot for their
    /// whole lifetime.
    pub async fn snapshot(&self) -> Option<SourceDescriptor> {
        self.current.read().await.clone()
    }
}
