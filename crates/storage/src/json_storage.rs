//! JSON file storage implementation.
//!
//! Local fallback backend. Goals live one per file under `goals/`, and each
//! goal's snapshots live in a single array file under `history/`. Writes go
//! to a temp file first and are renamed into place.

use std::path::{Path, PathBuf};
use async_trait::async_trait;
use goalsync_core::{Goal, GoalId, GoalStatus, OwnerId, ProgressHistoryEntry, Time};
use super::{GoalStore, HistoryStore, StoreError, Result};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// File-based JSON storage backend.
pub struct JsonStore {
    root: PathBuf,
    // Serializes read-modify-write cycles on individual files.
    write_lock: Mutex<()>,
}

impl JsonStore {
    /// Create storage rooted at `root`, creating the data directories.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("goals")).await?;
        fs::create_dir_all(root.join("history")).await?;

        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory this store writes into.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn goal_path(&self, id: GoalId) -> PathBuf {
        self.root.join("goals").join(format!("{}.json", id))
    }

    fn history_path(&self, id: GoalId) -> PathBuf {
        self.root.join("history").join(format!("{}.json", id))
    }

    async fn modify_goal(&self, id: GoalId, apply: impl FnOnce(&mut Goal)) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.goal_path(id);
        let mut goal: Goal = read_json(&path)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("goal {}", id)))?;
        apply(&mut goal);
        goal.updated_at = chrono::Utc::now();
        write_json(&path, &goal).await
    }

    async fn load_history(&self, id: GoalId) -> Result<Vec<ProgressHistoryEntry>> {
        Ok(read_json(&self.history_path(id)).await?.unwrap_or_default())
    }
}

#[async_trait]
impl GoalStore for JsonStore {
    fn backend_name(&self) -> &'static str {
        "json"
    }

    async fn fetch(&self, owner: &OwnerId) -> Result<Vec<Goal>> {
        let mut goals: Vec<Goal> = list_dir(&self.root.join("goals")).await?;
        goals.retain(|g| &g.owner_id == owner);
        goals.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(goals)
    }

    async fn create(&self, goal: &Goal) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        write_json(&self.goal_path(goal.id), goal).await?;
        debug!(goal_id = %goal.id, "json store: created goal");
        Ok(())
    }

    async fn update_progress(&self, id: GoalId, value: f64) -> Result<()> {
        self.modify_goal(id, |goal| goal.current_value = value).await
    }

    async fn update_status(
        &self,
        id: GoalId,
        status: GoalStatus,
        completed_at: Option<Time>,
    ) -> Result<()> {
        self.modify_goal(id, |goal| {
            goal.status = status;
            goal.completed_at = completed_at;
        })
        .await
    }

    async fn delete(&self, id: GoalId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        remove_if_exists(&self.goal_path(id)).await
    }
}

#[async_trait]
impl HistoryStore for JsonStore {
    async fn append_snapshot(&self, entry: &ProgressHistoryEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load_history(entry.goal_id).await?;
        entries.push(entry.clone());
        write_json(&self.history_path(entry.goal_id), &entries).await
    }

    async fn list_snapshots(&self, owner: &OwnerId, since: Time) -> Result<Vec<ProgressHistoryEntry>> {
        let files: Vec<Vec<ProgressHistoryEntry>> = list_dir(&self.root.join("history")).await?;
        let mut entries: Vec<_> = files
            .into_iter()
            .flatten()
            .filter(|e| &e.owner_id == owner && e.recorded_at >= since)
            .collect();
        entries.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));
        Ok(entries)
    }

    async fn prune_snapshots(&self, goal_id: GoalId, keep: usize) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load_history(goal_id).await?;
        if entries.len() <= keep {
            return Ok(0);
        }
        entries.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));
        let dropped = entries.len() - keep;
        entries.drain(..dropped);
        write_json(&self.history_path(goal_id), &entries).await?;
        Ok(dropped)
    }

    async fn delete_snapshots(&self, goal_id: GoalId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        remove_if_exists(&self.history_path(goal_id)).await
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json.as_bytes()).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    fs::remove_file(path).await.or_else(|e| {
        if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) }
    })?;
    Ok(())
}

async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        if let Ok(Some(item)) = read_json(&entry.path()).await {
            items.push(item);
        }
    }
    Ok(items)
}
