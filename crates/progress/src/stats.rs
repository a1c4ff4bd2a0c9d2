//! Goal roll-up statistics.

use goalsync_core::{Goal, GoalStats, GoalStatus};

/// Count goals by status. Recomputed on demand; nothing is cached.
pub fn compute_stats<'a>(goals: impl IntoIterator<Item = &'a Goal>) -> GoalStats {
    let mut stats = GoalStats::default();
    for goal in goals {
        stats.total += 1;
        match goal.status {
            GoalStatus::Active => stats.active += 1,
            GoalStatus::Completed => stats.completed += 1,
            GoalStatus::Paused | GoalStatus::Expired => {}
        }
    }
    stats.completion_rate = if stats.total > 0 {
        (stats.completed as f64 / stats.total as f64 * 100.0).round() as u32
    } else {
        0
    };
    stats
}
