//! Crash-resilient checkpointing.
//!
//! One structured file per run records stage completion and per-founder
//! Stage-2 completion, so a new engine invocation can skip already-done
//! (costly) work. Every write is read-merge-write against the file on disk —
//! booleans OR together and the founder-done list is unioned, never
//! overwritten — so repeated partial crashes cannot lose progress. Writes go
//! through a temp file and rename, and are serialized across concurrently
//! completing founders by the store's lock.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::EngineResult;

pub const CHECKPOINT_FILE: &str = "checkpoint.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub stage1_complete: bool,
    #[serde(default)]
    pub stage2_complete: bool,
    #[serde(default)]
    pub stage3_complete: bool,
    #[serde(default)]
    pub stage2_founders_done: Vec<String>,
}

impl Checkpoint {
    /// Merge another checkpoint into this one. Completion only ever moves
    /// forward; the founder-done list is a union preserving this side's
    /// order.
    pub fn merge_from(&mut self, other: &Checkpoint) {
        self.stage1_complete |= other.stage1_complete;
        self.stage2_complete |= other.stage2_complete;
        self.stage3_complete |= other.stage3_complete;
        for founder in &other.stage2_founders_done {
            if !self.stage2_founders_done.contains(founder) {
                self.stage2_founders_done.push(founder.clone());
            }
        }
    }

    pub fn mark_founder_done(&mut self, founder: &str) {
        if !self.stage2_founders_done.iter().any(|f| f == founder) {
            self.stage2_founders_done.push(founder.to_string());
        }
    }
}

/// Persistent checkpoint handle for one run directory.
pub struct CheckpointStore {
    path: PathBuf,
    state: Mutex<Checkpoint>,
}

impl CheckpointStore {
    /// Open (or initialize) the checkpoint for a run directory.
    pub fn open(run_dir: &Path) -> EngineResult<Self> {
        let path = run_dir.join(CHECKPOINT_FILE);
        let state = read_checkpoint(&path)?.unwrap_or_default();
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// A copy of the current in-memory state.
    pub async fn snapshot(&self) -> Checkpoint {
        self.state.lock().await.clone()
    }

    /// Apply a mutation under the store lock and persist atomically.
    ///
    /// Re-reads the file first and merges, so a checkpoint written by an
    /// earlier crashed invocation of the same run directory is never clobbered.
    pub async fn update<F>(&self, mutate: F) -> EngineResult<()>
    where
        F: FnOnce(&mut Checkpoint),
    {
        let mut state = self.state.lock().await;
        if let Some(on_disk) = read_checkpoint(&self.path)? {
            state.merge_from(&on_disk);
        }
        mutate(&mut state);

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&*state)?)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "checkpoint written");
        Ok(())
    }
}

fn read_checkpoint(path: &Path) -> EngineResult<Option<Checkpoint>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&raw)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_checkpoint_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let cp = store.snapshot().await;
        assert_eq!(cp, Checkpoint::default());
    }

    #[tokio::test]
    async fn test_write_then_reopen_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        store
            .update(|cp| {
                cp.stage1_complete = true;
                cp.mark_founder_done("openai");
            })
            .await
            .unwrap();

        let reopened = CheckpointStore::open(dir.path()).unwrap();
        let cp = reopened.snapshot().await;
        assert!(cp.stage1_complete);
        assert!(!cp.stage2_complete);
        assert_eq!(cp.stage2_founders_done, vec!["openai"]);
    }

    #[tokio::test]
    async fn test_founder_list_merges_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();

        // First invocation marks one founder and "crashes".
        let first = CheckpointStore::open(dir.path()).unwrap();
        first
            .update(|cp| cp.mark_founder_done("anthropic"))
            .await
            .unwrap();

        // Second invocation loads, then marks a different founder.
        let second = CheckpointStore::open(dir.path()).unwrap();
        second
            .update(|cp| cp.mark_founder_done("gemini"))
            .await
            .unwrap();

        let cp = CheckpointStore::open(dir.path()).unwrap().snapshot().await;
        assert!(cp.stage2_founders_done.contains(&"anthropic".to_string()));
        assert!(cp.stage2_founders_done.contains(&"gemini".to_string()));
    }

    #[tokio::test]
    async fn test_update_merges_external_disk_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();

        // Simulate another writer updating the file behind our back.
        let external = Checkpoint {
            stage1_complete: true,
            stage2_founders_done: vec!["external".into()],
            ..Checkpoint::default()
        };
        std::fs::write(
            dir.path().join(CHECKPOINT_FILE),
            serde_json::to_vec_pretty(&external).unwrap(),
        )
        .unwrap();

        store
            .update(|cp| cp.mark_founder_done("local"))
            .await
            .unwrap();
        let cp = store.snapshot().await;
        assert!(cp.stage1_complete);
        assert!(cp.stage2_founders_done.contains(&"external".to_string()));
        assert!(cp.stage2_founders_done.contains(&"local".to_string()));
    }

    #[test]
    fn test_mark_founder_done_is_idempotent() {
        let mut cp = Checkpoint::default();
        cp.mark_founder_done("a");
        cp.mark_founder_done("a");
        assert_eq!(cp.stage2_founders_done.len(), 1);
    }

    #[test]
    fn test_partial_fields_deserialize_with_defaults() {
        let cp: Checkpoint = serde_json::from_str(r#"{"stage1_complete": true}"#).unwrap();
        assert!(cp.stage1_complete);
        assert!(cp.stage2_founders_done.is_empty());
    }
}
