//! # Outbound Payload Cache
//!
//! The audio artifact replayed to every caller. Loaded from disk at most once
//! per process and shared read-only across sessions; a missing artifact is a
//! degraded mode, not a failure; sessions simply stream nothing.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Process-wide, lazily loaded copy of the outbound audio artifact.
#[derive(Debug, Clone)]
pub struct PayloadCache {
    path: PathBuf,
    cell: Arc<OnceCell<Option<Arc<Vec<u8>>>>>,
}

impl PayloadCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// Get the payload, reading it from disk on first use.
    ///
    /// The read happens once: later calls reuse the cached bytes, and a
    /// missing artifact stays missing for the life of the process.
    pub async fn load(&self) -> Option<Arc<Vec<u8>>> {
        self.cell
            .get_or_init(|| async {
                match tokio::fs::read(&self.path).await {
                    Ok(bytes) => {
                        info!(
                            path = %self.path.display(),
                            bytes = bytes.len(),
                            "Loaded outbound audio payload"
                        );
                        Some(Arc::new(bytes))
                    }
                    Err(error) => {
                        warn!(
                            path = %self.path.display(),
                            %error,
                            "Outbound audio payload unavailable; calls will receive no audio"
                        );
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// Cache status for the health endpoint, without forcing a load.
    pub fn status(&self) -> &'static str {
        match self.cell.get() {
            None => "not_loaded",
            Some(Some(_)) => "available",
            Some(None) => "missing",
        }
    }
}
