//! JSON snapshot files for the refresh driver.
//!
//! One file per table. Writes go to a temporary file that is renamed over the
//! previous one, so a reader never sees a half-written snapshot. Two refreshes
//! of the same table racing each other are last-write-wins.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::simulation::TableSnapshot;

/// On-disk envelope around a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSnapshot {
    pub persisted_at: DateTime<Utc>,
    pub snapshot: TableSnapshot,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating snapshot dir {}", self.dir.display()))
    }

    fn path_for(&self, table_id: &str) -> PathBuf {
        let safe: String = table_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    /// Load the persisted snapshot of a table.
    ///
    /// A missing file is `None`; an unreadable one is logged and also `None`
    /// so the table starts over instead of stalling the refresh loop.
    pub async fn load(&self, table_id: &str) -> Option<StoredSnapshot> {
        let path = self.path_for(table_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(table = table_id, path = %path.display(), error = %e, "failed to read snapshot");
                return None;
            }
        };
        match serde_json::from_slice::<StoredSnapshot>(&bytes) {
            Ok(stored) => Some(stored),
            Err(e) => {
                warn!(table = table_id, path = %path.display(), error = %e, "discarding corrupt snapshot");
                None
            }
        }
    }

    pub async fn save(&self, snapshot: &TableSnapshot) -> Result<()> {
        let path = self.path_for(&snapshot.table_id);
        let tmp = path.with_extension("json.tmp");
        let stored = StoredSnapshot {
            persisted_at: Utc::now(),
            snapshot: snapshot.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&stored)?;

        tokio::fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("replacing {}", path.display()))?;

        debug!(table = %snapshot.table_id, path = %path.display(), "snapshot persisted");
        Ok(())
    }
}
