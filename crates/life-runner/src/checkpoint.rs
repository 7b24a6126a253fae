//! Checkpoint files for long headless runs.

use life_core::{Error, Result};
use life_world::{Simulation, WorldSnapshot};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    /// Unix timestamp of when the checkpoint was written
    pub timestamp: i64,
    pub tick: u64,
    pub seed: u64,
    pub snapshot: WorldSnapshot,
}

pub struct CheckpointManager {
    checkpoint_dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
        }
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    /// Write `checkpoint_<tick>.bin` for the simulation's current state.
    pub async fn create_checkpoint(&self, sim: &Simulation) -> Result<PathBuf> {
        fs::create_dir_all(&self.checkpoint_dir).await?;

        let checkpoint = Checkpoint {
            version: CHECKPOINT_VERSION,
            timestamp: chrono::Utc::now().timestamp(),
            tick: sim.tick(),
            seed: sim.config().seed,
            snapshot: sim.snapshot(),
        };
        let bytes = bincode::serialize(&checkpoint)
            .map_err(|e| Error::Serialization(format!("Failed to serialize checkpoint: {}", e)))?;

        let path = self
            .checkpoint_dir
            .join(format!("checkpoint_{}.bin", checkpoint.tick));
        fs::write(&path, &bytes).await?;

        info!(
            event = "checkpoint_written",
            tick = checkpoint.tick,
            bytes = bytes.len(),
            path = %path.display()
        );
        Ok(path)
    }

    /// Load the checkpoint with the highest tick.
    pub async fn load_latest(&self) -> Result<Checkpoint> {
        let Some((path, _)) = self.list_checkpoints().await?.into_iter().max_by_key(|(_, tick)| *tick) else {
            return Err(Error::NotFound(format!(
                "no checkpoint files in {}",
                self.checkpoint_dir.display()
            )));
        };
        let bytes = fs::read(&path).await?;
        let checkpoint: Checkpoint = bincode::deserialize(&bytes)
            .map_err(|e| Error::Serialization(format!("Failed to deserialize checkpoint: {}", e)))?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(Error::Validation(format!(
                "checkpoint {} has version {}, expected {}",
                path.display(),
                checkpoint.version,
                CHECKPOINT_VERSION
            )));
        }

        let written = chrono::DateTime::from_timestamp(checkpoint.timestamp, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        info!(
            event = "checkpoint_loaded",
            tick = checkpoint.tick,
            written = %written,
            path = %path.display()
        );
        Ok(checkpoint)
    }

    /// Remove all but the `keep_count` newest checkpoints.
    pub async fn cleanup_old_checkpoints(&self, keep_count: usize) -> Result<usize> {
        let mut checkpoints = self.list_checkpoints().await?;
        if checkpoints.len() <= keep_count {
            return Ok(0);
        }
        checkpoints.sort_by(|a, b| b.1.cmp(&a.1));

        let mut removed = 0;
        for (path, _) in checkpoints.iter().skip(keep_count) {
            match fs::remove_file(path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove old checkpoint {:?}: {}", path, e),
            }
        }
        Ok(removed)
    }

    async fn list_checkpoints(&self) -> Result<Vec<(PathBuf, u64)>> {
        if !self.checkpoint_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = fs::read_dir(&self.checkpoint_dir).await?;
        let mut checkpoints = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Some(tick) = checkpoint_tick(&path) {
                checkpoints.push((path, tick));
            }
        }
        Ok(checkpoints)
    }
}

/// Tick encoded in a `checkpoint_<tick>.bin` file name
fn checkpoint_tick(path: &Path) -> Option<u64> {
    path.file_name()?
        .to_str()?
        .strip_prefix("checkpoint_")?
        .strip_suffix(".bin")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use life_core::SimulationConfig;

    fn scratch_dir(name: &str) -> PathBuf {
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        std::env::temp_dir().join(format!("life-runner-{}-{}-{}", name, std::process::id(), nanos))
    }

    #[test]
    fn test_checkpoint_tick_parsing() {
        assert_eq!(checkpoint_tick(Path::new("/x/checkpoint_120.bin")), Some(120));
        assert_eq!(checkpoint_tick(Path::new("checkpoint_abc.bin")), None);
        assert_eq!(checkpoint_tick(Path::new("snapshot_1.bin")), None);
        assert_eq!(checkpoint_tick(Path::new("checkpoint_5.json")), None);
    }

    #[tokio::test]
    async fn test_create_and_load_latest() {
        let dir = scratch_dir("latest");
        let manager = CheckpointManager::new(&dir);
        assert!(matches!(manager.load_latest().await, Err(Error::NotFound(_))));

        let mut sim = Simulation::new(SimulationConfig::default());
        sim.run(5);
        manager.create_checkpoint(&sim).await.unwrap();
        sim.run(5);
        let path = manager.create_checkpoint(&sim).await.unwrap();
        assert!(path.ends_with("checkpoint_10.bin"));

        let latest = manager.load_latest().await.unwrap();
        assert_eq!(latest.tick, 10);
        assert_eq!(latest.snapshot, sim.snapshot());

        let resumed = Simulation::from_snapshot(SimulationConfig::default(), latest.snapshot).unwrap();
        assert_eq!(resumed.tick(), 10);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_newest() {
        let dir = scratch_dir("cleanup");
        let manager = CheckpointManager::new(&dir);
        let mut sim = Simulation::new(SimulationConfig::default());
        for _ in 0..4 {
            sim.run(1);
            manager.create_checkpoint(&sim).await.unwrap();
        }
        assert_eq!(manager.cleanup_old_checkpoints(2).await.unwrap(), 2);
        let remaining = manager.list_checkpoints().await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|(_, tick)| *tick >= 3));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
