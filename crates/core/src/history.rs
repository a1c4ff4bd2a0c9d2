//! Progress snapshots used for charting.

use serde::{Deserialize, Serialize};
use crate::id::{GoalId, HistoryEntryId, OwnerId};
use crate::Time;

/// One recorded `(goal, value, percentage, time)` point. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressHistoryEntry {
    /// Unique identifier
    pub id: HistoryEntryId,

    /// Goal the snapshot belongs to
    pub goal_id: GoalId,

    /// Owner of the goal
    pub owner_id: OwnerId,

    /// Goal `current_value` at the time
    pub progress_value: f64,

    /// Goal progress percentage at the time
    pub progress_percentage: u8,

    /// When recorded
    pub recorded_at: Time,
}

impl ProgressHistoryEntry {
    /// Create a new snapshot.
    pub fn new(
        goal_id: GoalId,
        owner_id: OwnerId,
        progress_value: f64,
        progress_percentage: u8,
        recorded_at: Time,
    ) -> Self {
        Self {
            id: HistoryEntryId::new(),
            goal_id,
            owner_id,
            progress_value,
            progress_percentage,
            recorded_at,
        }
    }
}
