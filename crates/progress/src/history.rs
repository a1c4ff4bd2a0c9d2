//! Progress history recording and day-bucketed aggregation.

use std::collections::BTreeMap;
use std::sync::Arc;
use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use goalsync_core::{
    Goal, GoalId, GoalStats, HistoryRow, OwnerId, ProgressHistoryEntry, Time,
};
use goalsync_storage::{Result, Store};
use tracing::debug;

/// Appends snapshots through the store and keeps each goal's history bounded.
#[derive(Clone)]
pub struct HistoryRecorder {
    store: Arc<dyn Store>,
    limit: usize,
}

impl HistoryRecorder {
    /// Create a recorder keeping at most `limit` snapshots per goal.
    pub fn new(store: Arc<dyn Store>, limit: usize) -> Self {
        Self { store, limit }
    }

    /// Append a snapshot stamped `recorded_at`, then prune old ones.
    pub async fn record_snapshot(
        &self,
        goal_id: GoalId,
        owner_id: OwnerId,
        value: f64,
        percentage: u8,
        recorded_at: Time,
    ) -> Result<ProgressHistoryEntry> {
        let entry = ProgressHistoryEntry::new(goal_id, owner_id, value, percentage, recorded_at);
        self.store.append_snapshot(&entry).await?;
        let dropped = self.store.prune_snapshots(goal_id, self.limit).await?;
        if dropped > 0 {
            debug!(goal_id = %goal_id, dropped, "pruned progress history");
        }
        Ok(entry)
    }

    /// Snapshots for `owner` recorded on or after the start of `since`.
    pub async fn snapshots_since(&self, owner: &OwnerId, since: NaiveDate) -> Result<Vec<ProgressHistoryEntry>> {
        let start = Utc.from_utc_datetime(&since.and_time(NaiveTime::MIN));
        self.store.list_snapshots(owner, start).await
    }

    /// Forget a deleted goal's history.
    pub async fn forget(&self, goal_id: GoalId) -> Result<()> {
        self.store.delete_snapshots(goal_id).await
    }
}

/// Live numbers used for today's row instead of stored snapshots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveDay {
    /// Goals currently active
    pub active: usize,
    /// Goals currently completed
    pub completed: usize,
    /// Mean progress percentage over all goals
    pub mean_progress: f64,
}

impl LiveDay {
    /// Build from the current collection and its stats.
    pub fn from_goals<'a>(stats: &GoalStats, goals: impl IntoIterator<Item = &'a Goal>) -> Self {
        let percentages: Vec<f64> = goals
            .into_iter()
            .map(|g| goalsync_core::progress_percentage(g.current_value, g.target_value) as f64)
            .collect();
        Self {
            active: stats.active,
            completed: stats.completed,
            mean_progress: mean(&percentages).unwrap_or(0.0),
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some((values.iter().sum::<f64>() / values.len() as f64).round())
    }
}

/// Longest window [`aggregate_history`] will produce, in days before today.
pub const MAX_HISTORY_DAYS: u32 = 3650;

/// One row per day from `today - days` through `today`, ascending.
/// `days` is capped at [`MAX_HISTORY_DAYS`].
///
/// For past days a goal counts as completed if it was completed on or before
/// that day, and as active if it existed but was not yet completed. The day's
/// progress is the mean of that day's snapshots, carried forward from the
/// previous day when there are none. Today's row uses `live` instead.
pub fn aggregate_history(
    days: u32,
    today: NaiveDate,
    goals: &[Goal],
    snapshots: &[ProgressHistoryEntry],
    live: LiveDay,
) -> Vec<HistoryRow> {
    let mut by_day: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for entry in snapshots {
        by_day
            .entry(entry.recorded_at.date_naive())
            .or_default()
            .push(entry.progress_percentage as f64);
    }

    let days = days.min(MAX_HISTORY_DAYS);
    let first = today - Duration::days(days as i64);
    let mut rows = Vec::with_capacity(days as usize + 1);
    let mut carried = 0.0;

    for offset in 0..=days as i64 {
        let date = first + Duration::days(offset);

        if date == today {
            rows.push(HistoryRow {
                date,
                completed: live.completed,
                active: live.active,
                total_progress: live.mean_progress,
            });
            break;
        }

        let (mut completed, mut active) = (0, 0);
        for goal in goals.iter().filter(|g| g.created_at.date_naive() <= date) {
            match goal.completed_at {
                Some(at) if at.date_naive() <= date => completed += 1,
                _ => active += 1,
            }
        }

        let total_progress = by_day
            .get(&date)
            .and_then(|values| mean(values))
            .unwrap_or(carried);
        carried = total_progress;

        rows.push(HistoryRow {
            date,
            completed,
            active,
            total_progress,
        });
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use goalsync_core::{GoalDraft, GoalKind, GoalStatus};

    fn at(date: NaiveDate, hour: u32) -> Time {
        Utc.from_utc_datetime(&date.and_hms_opt(hour, 0, 0).unwrap())
    }

    fn goal_created(date: NaiveDate) -> Goal {
        Goal::new(
            OwnerId::local(),
            GoalDraft::new("g", GoalKind::Streak, 10.0),
            0.0,
            at(date, 9),
        )
    }

    fn snapshot(goal: &Goal, date: NaiveDate, pct: u8) -> ProgressHistoryEntry {
        ProgressHistoryEntry::new(goal.id, goal.owner_id.clone(), pct as f64 / 10.0, pct, at(date, 12))
    }

    fn live() -> LiveDay {
        LiveDay {
            active: 1,
            completed: 1,
            mean_progress: 90.0,
        }
    }

    #[test]
    fn test_seven_days_gives_eight_ascending_rows() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let rows = aggregate_history(7, today, &[], &[], live());

        assert_eq!(rows.len(), 8);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
        assert_eq!(rows[7].date, today);
        assert!(rows.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn test_counts_partition_by_completion_day() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();

        let early = goal_created(d(4));
        let mut finished = goal_created(d(5));
        finished.transition(GoalStatus::Completed, at(d(7), 18)).unwrap();

        let rows = aggregate_history(7, today, &[early, finished], &[], live());

        // 3rd: nothing yet; 4th: one active; 5th/6th: two active; 7th on: one of each.
        let counts: Vec<(usize, usize)> = rows.iter().map(|r| (r.active, r.completed)).collect();
        assert_eq!(
            counts,
            vec![(0, 0), (1, 0), (2, 0), (2, 0), (1, 1), (1, 1), (1, 1), (1, 1)]
        );
    }

    #[test]
    fn test_progress_carries_forward() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        let goal = goal_created(d(1));
        let snapshots = vec![
            snapshot(&goal, d(5), 20),
            snapshot(&goal, d(5), 40),
            snapshot(&goal, d(8), 70),
        ];

        let rows = aggregate_history(7, today, &[goal], &snapshots, live());
        let progress: Vec<f64> = rows.iter().map(|r| r.total_progress).collect();

        assert_eq!(progress, vec![0.0, 0.0, 30.0, 30.0, 30.0, 70.0, 70.0, 90.0]);
    }

    #[test]
    fn test_today_uses_live_numbers() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let goal = goal_created(today);
        let stale = snapshot(&goal, today, 10);

        let rows = aggregate_history(0, today, &[goal], &[stale], live());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_progress, 90.0);
        assert_eq!((rows[0].active, rows[0].completed), (1, 1));
    }

    #[test]
    fn test_oversized_window_is_capped() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let rows = aggregate_history(200_000_000, today, &[], &[], live());

        assert_eq!(rows.len(), MAX_HISTORY_DAYS as usize + 1);
        assert_eq!(rows[0].date, today - Duration::days(MAX_HISTORY_DAYS as i64));
        assert_eq!(rows.last().map(|r| r.date), Some(today));
    }
}
