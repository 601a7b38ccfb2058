use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use govsi_crawler_core::CanonicalUrl;
use govsi_crawler_frontier::Frontier;

#[derive(Serialize, Deserialize)]
struct CheckpointData {
    queue: Vec<CanonicalUrl>,
    visited: Vec<CanonicalUrl>,
}

/// Serializes the Frontier's queue contents and visited set to a single
/// JSON file, written atomically so a crash mid-write cannot corrupt
/// the previous checkpoint.
pub struct Checkpointer {
    path: String,
}

impl Checkpointer {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Restore a previously saved checkpoint into `frontier`. Returns
    /// `true` if a checkpoint was found and loaded. A missing or
    /// corrupt file is treated as "start empty" and logged, not an
    /// error.
    pub async fn load(&self, frontier: &Frontier) -> bool {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(_) => return false,
        };

        let data: CheckpointData = match serde_json::from_str(&contents) {
            Ok(d) => d,
            Err(err) => {
                warn!(path = %self.path, error = %err, "checkpoint file is corrupt, starting empty");
                return false;
            }
        };

        frontier.restore(data.queue, data.visited).await;
        true
    }

    /// Atomically write the current Frontier state: write to a `.tmp`
    /// sibling, then rename over the real path.
    pub async fn save(&self, frontier: &Frontier) -> Result<()> {
        let (queue, visited) = frontier.snapshot().await;
        let data = CheckpointData { queue, visited };
        let json = serde_json::to_vec_pretty(&data)?;

        let tmp_path = format!("{}.tmp", self.path);
        tokio::fs::write(&tmp_path, &json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

