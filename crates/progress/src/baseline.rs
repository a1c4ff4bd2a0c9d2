//! Baseline capture at goal creation.
//!
//! Progress is measured from the reading taken here, so a goal created
//! after twenty hours of study this week starts at zero rather than twenty.

use goalsync_core::{GoalKind, TimeUnit};
use tracing::{debug, warn};

use crate::activity::{ActivitySource, ProviderError};

/// Round to one decimal place.
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Read the absolute value a goal of `kind` is measured against, in the
/// goal's unit.
pub fn absolute_reading(kind: &GoalKind, source: &dyn ActivitySource) -> Result<f64, ProviderError> {
    match kind {
        GoalKind::StudyTime { unit } => {
            let minutes = source.study_time()?.weekly_minutes;
            Ok(match unit {
                TimeUnit::Hours => round1(minutes / 60.0),
                TimeUnit::Minutes => minutes,
            })
        }
        GoalKind::CourseCompletion { course } => {
            let courses = source.course_progress()?;
            match course {
                Some(course) => courses
                    .get(&course.course_id)
                    .map(|p| p.completed_modules as f64)
                    .ok_or_else(|| ProviderError::UnknownCourse(course.course_id.clone())),
                None => Ok(courses.values().map(|p| p.completed_modules as f64).sum()),
            }
        }
        GoalKind::Streak => Ok(source.streak()?.current_streak as f64),
        GoalKind::Grade { course: Some(course) } => source
            .course_progress()?
            .get(&course.course_id)
            .map(|p| p.progress)
            .ok_or_else(|| ProviderError::UnknownCourse(course.course_id.clone())),
        GoalKind::Grade { course: None } => Ok(round1(source.grade_prediction()?.predicted_grade)),
    }
}

/// Capture the baseline for a new goal.
///
/// An unreadable source yields 0, so the goal tracks cumulative activity
/// instead of failing creation.
pub fn capture_baseline(kind: &GoalKind, source: &dyn ActivitySource) -> f64 {
    match absolute_reading(kind, source) {
        Ok(value) => {
            debug!(goal_type = kind.goal_type().as_str(), baseline = value, "captured baseline");
            value
        }
        Err(e) => {
            warn!(goal_type = kind.goal_type().as_str(), error = %e, "baseline unavailable, using 0");
            0.0
        }
    }
}
