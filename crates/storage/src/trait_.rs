//! Store trait abstraction.

use async_trait::async_trait;
use goalsync_core::{Goal, GoalId, GoalStatus, OwnerId, ProgressHistoryEntry, Time};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database driver error
    #[error("Database error: {0}")]
    Database(String),

    /// Backend could not be reached or is not compiled in
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Durable goal persistence.
///
/// Remote and local backends implement the same contract; callers hold an
/// `Arc<dyn Store>` and never learn which one they got.
#[async_trait]
pub trait GoalStore: Send + Sync {
    /// Short backend name, for logs.
    fn backend_name(&self) -> &'static str;

    /// Load every goal owned by `owner`.
    async fn fetch(&self, owner: &OwnerId) -> Result<Vec<Goal>>;

    /// Persist a newly created goal.
    async fn create(&self, goal: &Goal) -> Result<()>;

    /// Overwrite a goal's `current_value`.
    async fn update_progress(&self, id: GoalId, value: f64) -> Result<()>;

    /// Overwrite a goal's status and completion time.
    async fn update_status(
        &self,
        id: GoalId,
        status: GoalStatus,
        completed_at: Option<Time>,
    ) -> Result<()>;

    /// Remove a goal. Deleting a missing goal is not an error.
    async fn delete(&self, id: GoalId) -> Result<()>;
}

/// Append-only storage for progress snapshots.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one snapshot.
    async fn append_snapshot(&self, entry: &ProgressHistoryEntry) -> Result<()>;

    /// Snapshots for `owner` recorded at or after `since`, oldest first.
    async fn list_snapshots(&self, owner: &OwnerId, since: Time) -> Result<Vec<ProgressHistoryEntry>>;

    /// Keep only the newest `keep` snapshots of a goal. Returns how many were dropped.
    async fn prune_snapshots(&self, goal_id: GoalId, keep: usize) -> Result<usize>;

    /// Drop all snapshots of a goal.
    async fn delete_snapshots(&self, goal_id: GoalId) -> Result<()>;
}

/// A backend providing both goal and history persistence.
pub trait Store: GoalStore + HistoryStore {}

impl<T: GoalStore + HistoryStore> Store for T {}
