use crate::domain::contract::Snapshot;
use crate::error::SourceError;
use std::path::{Path, PathBuf};

/// Produces the raw snapshot the batch is computed from.
#[async_trait::async_trait]
pub trait SnapshotLoader: Send + Sync {
    fn describe(&self) -> String;

    async fn load(&self) -> Result<Snapshot, SourceError>;
}

/// Reads the snapshot JSON document from disk on every call.
#[derive(Debug, Clone)]
pub struct FileSnapshotLoader {
    path: PathBuf,
}

impl FileSnapshotLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl SnapshotLoader for FileSnapshotLoader {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Snapshot, SourceError> {
        let t0 = std::time::Instant::now();
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| SourceError::Unreadable {
                path: self.path.clone(),
                source,
            })?;

        let snapshot = Snapshot::from_json_slice(&bytes).map_err(|source| SourceError::Malformed {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!(
            path = %self.path.display(),
            bytes = bytes.len(),
            tickers = snapshot.tickers.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }
}
