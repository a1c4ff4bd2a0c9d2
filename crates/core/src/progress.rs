//! Derived progress views and roll-ups.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use crate::goal::{Goal, GoalStatus};
use crate::Time;

/// Percentage of `target` reached by `current`, rounded and clamped to 0..=100.
pub fn progress_percentage(current: f64, target: f64) -> u8 {
    if target <= 0.0 || !current.is_finite() {
        return 0;
    }
    (current / target * 100.0).round().clamp(0.0, 100.0) as u8
}

/// A goal plus the values the UI derives from it. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalWithProgress {
    /// The goal itself
    #[serde(flatten)]
    pub goal: Goal,

    /// `current_value / target_value` as a whole percentage
    pub progress_percentage: u8,

    /// Whole days until `end_date`, never negative
    pub days_remaining: Option<i64>,

    /// Deadline passed and the goal is not completed
    pub is_overdue: bool,
}

impl GoalWithProgress {
    /// Build the view as of `now`.
    pub fn new(goal: Goal, now: Time) -> Self {
        let progress_percentage = progress_percentage(goal.current_value, goal.target_value);
        let days_remaining = goal.end_date.map(|end| {
            let secs = (end - now).num_seconds();
            if secs <= 0 { 0 } else { (secs + 86_399) / 86_400 }
        });
        let is_overdue = goal
            .end_date
            .is_some_and(|end| goal.status != GoalStatus::Completed && end < now);

        Self {
            goal,
            progress_percentage,
            days_remaining,
            is_overdue,
        }
    }
}

/// Roll-up counts over a goal collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalStats {
    /// All goals
    pub total: usize,
    /// Goals with status `Active`
    pub active: usize,
    /// Goals with status `Completed`
    pub completed: usize,
    /// `completed / total` as a whole percentage, 0 when empty
    pub completion_rate: u32,
}

/// One day of aggregated history for charting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    /// Calendar day (UTC)
    pub date: NaiveDate,
    /// Goals completed on or before this day
    pub completed: usize,
    /// Goals existing but not yet completed on this day
    pub active: usize,
    /// Mean progress percentage of the day's snapshots
    pub total_progress: f64,
}
