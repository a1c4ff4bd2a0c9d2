//! Progress derivation.

use goalsync_core::Goal;
use tracing::trace;

use crate::activity::ActivitySource;
use crate::baseline::absolute_reading;

/// Current progress of `goal`: the source reading minus the goal's baseline,
/// never below zero.
///
/// Pure apart from reading `source`. If the signal cannot be read the goal's
/// last known `current_value` is returned, so progress never regresses on a
/// provider outage.
pub fn derive_progress(goal: &Goal, source: &dyn ActivitySource) -> f64 {
    match absolute_reading(&goal.metadata.kind, source) {
        Ok(reading) => (reading - goal.metadata.baseline_value()).max(0.0),
        Err(e) => {
            trace!(goal_id = %goal.id, error = %e, "keeping last known progress");
            goal.current_value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::StaticActivity;
    use crate::baseline::capture_baseline;
    use chrono::Utc;
    use goalsync_core::{
        progress_percentage, CourseRef, GoalDraft, GoalKind, GoalStatus, OwnerId, TimeUnit,
    };

    fn goal_with_baseline(kind: GoalKind, target: f64, baseline: f64) -> Goal {
        Goal::new(OwnerId::local(), GoalDraft::new("goal", kind, target), baseline, Utc::now())
    }

    #[test]
    fn test_clamped_at_zero_below_baseline() {
        let source = StaticActivity::new();
        let goal = goal_with_baseline(GoalKind::Streak, 7.0, 10.0);

        for streak in [0, 3, 9, 10] {
            source.set_streak(streak);
            assert_eq!(derive_progress(&goal, &source), 0.0);
        }
    }

    #[test]
    fn test_study_time_relative_to_baseline() {
        let source = StaticActivity::new();
        let goal = goal_with_baseline(GoalKind::StudyTime { unit: TimeUnit::Hours }, 5.0, 1.5);

        // 148 minutes reads as 2.5 hours.
        source.set_weekly_minutes(148.0);
        assert_eq!(derive_progress(&goal, &source), 1.0);
    }

    #[test]
    fn test_minutes_and_course_grade_are_not_rounded() {
        let source = StaticActivity::new();
        source.set_weekly_minutes(12.34);
        let minutes = goal_with_baseline(GoalKind::StudyTime { unit: TimeUnit::Minutes }, 60.0, 0.0);
        assert_eq!(derive_progress(&minutes, &source), 12.34);

        source.set_course("rust-101", 1, 3);
        let grade = goal_with_baseline(
            GoalKind::Grade {
                course: Some(CourseRef::new("rust-101")),
            },
            90.0,
            0.0,
        );
        let progress = derive_progress(&grade, &source);
        assert!((progress - 100.0 / 3.0).abs() < 1e-9, "got {progress}");
    }

    #[test]
    fn test_unavailable_source_keeps_last_value() {
        let source = StaticActivity::new();
        let mut goal = goal_with_baseline(GoalKind::Streak, 7.0, 0.0);
        goal.current_value = 4.0;
        assert_eq!(derive_progress(&goal, &source), 4.0);
    }

    #[test]
    fn test_different_baselines_give_different_progress() {
        let source = StaticActivity::new();
        source.set_weekly_minutes(60.0);
        let early = goal_with_baseline(GoalKind::StudyTime { unit: TimeUnit::Minutes }, 300.0, 0.0);
        source.set_weekly_minutes(120.0);
        let late = goal_with_baseline(
            GoalKind::StudyTime { unit: TimeUnit::Minutes },
            300.0,
            capture_baseline(&GoalKind::StudyTime { unit: TimeUnit::Minutes }, &source),
        );

        source.set_weekly_minutes(200.0);
        assert_eq!(derive_progress(&early, &source), 200.0);
        assert_eq!(derive_progress(&late, &source), 80.0);
    }

    #[test]
    fn test_course_completion_scenario() {
        let source = StaticActivity::new();
        source.set_course("rust-101", 2, 7);
        let kind = GoalKind::CourseCompletion {
            course: Some(CourseRef::new("rust-101")),
        };
        let baseline = capture_baseline(&kind, &source);
        let mut goal = goal_with_baseline(kind, 5.0, baseline);

        source.set_course("rust-101", 6, 7);
        goal.current_value = derive_progress(&goal, &source);

        assert_eq!(goal.current_value, 4.0);
        assert_eq!(progress_percentage(goal.current_value, goal.target_value), 80);
        assert_eq!(goal.status, GoalStatus::Active);
    }

    #[test]
    fn test_monotonic_for_non_decreasing_readings() {
        let source = StaticActivity::new();
        let mut goal = goal_with_baseline(GoalKind::Streak, 20.0, 2.0);
        let mut last = 0;

        for streak in [1, 2, 2, 5, 8, 8, 13, 30] {
            source.set_streak(streak);
            goal.current_value = derive_progress(&goal, &source);
            let pct = progress_percentage(goal.current_value, goal.target_value);
            assert!(pct >= last, "{pct} < {last} at streak {streak}");
            last = pct;
        }
        assert_eq!(last, 100);
    }
}
