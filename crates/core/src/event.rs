//! Completion events emitted to listeners.

use serde::{Deserialize, Serialize};
use crate::goal::Goal;
use crate::id::{GoalId, OwnerId};
use crate::Time;

/// A goal reached its target. Emitted at most once per goal id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    /// The completed goal
    pub goal_id: GoalId,

    /// Owner of the goal
    pub owner_id: OwnerId,

    /// Goal title, for the notification text
    pub title: String,

    /// Target that was reached
    pub target_value: f64,

    /// Unit of the target
    pub unit: String,

    /// When the transition happened
    pub completed_at: Time,
}

impl CompletionEvent {
    /// Describe a goal that has just been marked completed.
    pub fn for_goal(goal: &Goal, completed_at: Time) -> Self {
        Self {
            goal_id: goal.id,
            owner_id: goal.owner_id.clone(),
            title: goal.title.clone(),
            target_value: goal.target_value,
            unit: goal.unit().to_string(),
            completed_at,
        }
    }
}
