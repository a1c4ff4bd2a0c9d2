//! Activity signal sources.
//!
//! Sources are synchronous, read-only and cheap; the engine calls them from
//! inside its fast tick.

use std::collections::HashMap;
use std::sync::RwLock;
use serde::{Deserialize, Serialize};

/// Failure to read an activity signal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The signal is not available right now
    #[error("activity signal unavailable: {0}")]
    Unavailable(String),

    /// The course is not among the enrolled courses
    #[error("unknown course: {0}")]
    UnknownCourse(String),
}

/// Study time over the current week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StudyTime {
    pub weekly_minutes: f64,
}

/// Current study streak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub current_streak: u32,
}

/// Progress through one enrolled course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseProgress {
    pub completed_modules: u32,
    pub total_modules: u32,
    /// Percentage through the course
    pub progress: f64,
}

/// Predicted overall grade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GradePrediction {
    pub predicted_grade: f64,
}

/// Read-only access to the activity signals goals are derived from.
pub trait ActivitySource: Send + Sync {
    /// Study time this week.
    fn study_time(&self) -> Result<StudyTime, ProviderError>;

    /// Current streak.
    fn streak(&self) -> Result<Streak, ProviderError>;

    /// Progress per enrolled course, keyed by course id.
    fn course_progress(&self) -> Result<HashMap<String, CourseProgress>, ProviderError>;

    /// Predicted overall grade.
    fn grade_prediction(&self) -> Result<GradePrediction, ProviderError>;
}

/// Serializable set of readings. A `None` field reads as unavailable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivitySnapshot {
    pub study_time: Option<StudyTime>,
    pub streak: Option<Streak>,
    pub courses: Option<HashMap<String, CourseProgress>>,
    pub grade: Option<GradePrediction>,
}

/// In-memory source whose readings can be changed at runtime.
#[derive(Debug, Default)]
pub struct StaticActivity {
    snapshot: RwLock<ActivitySnapshot>,
}

impl StaticActivity {
    /// Source with every signal unavailable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Source serving the given readings.
    pub fn from_snapshot(snapshot: ActivitySnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Replace all readings.
    pub fn replace(&self, snapshot: ActivitySnapshot) {
        self.update(|s| *s = snapshot);
    }

    /// Set this week's study minutes.
    pub fn set_weekly_minutes(&self, weekly_minutes: f64) {
        self.update(|s| s.study_time = Some(StudyTime { weekly_minutes }));
    }

    /// Set the current streak.
    pub fn set_streak(&self, current_streak: u32) {
        self.update(|s| s.streak = Some(Streak { current_streak }));
    }

    /// Set progress for one course.
    pub fn set_course(&self, course_id: impl Into<String>, completed: u32, total: u32) {
        let progress = if total > 0 {
            completed as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        let entry = CourseProgress {
            completed_modules: completed,
            total_modules: total,
            progress,
        };
        let course_id = course_id.into();
        self.update(|s| {
            s.courses
                .get_or_insert_with(HashMap::new)
                .insert(course_id, entry);
        });
    }

    /// Set the predicted grade.
    pub fn set_predicted_grade(&self, predicted_grade: f64) {
        self.update(|s| s.grade = Some(GradePrediction { predicted_grade }));
    }

    fn update(&self, apply: impl FnOnce(&mut ActivitySnapshot)) {
        // A poisoned lock only means a writer panicked mid-update; the data is plain values.
        let mut guard = match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        apply(&mut guard);
    }

    fn read<T>(&self, name: &str, get: impl FnOnce(&ActivitySnapshot) -> Option<T>) -> Result<T, ProviderError> {
        let guard = self
            .snapshot
            .read()
            .map_err(|_| ProviderError::Unavailable(name.to_string()))?;
        get(&guard).ok_or_else(|| ProviderError::Unavailable(name.to_string()))
    }
}

impl ActivitySource for StaticActivity {
    fn study_time(&self) -> Result<StudyTime, ProviderError> {
        self.read("study_time", |s| s.study_time)
    }

    fn streak(&self) -> Result<Streak, ProviderError> {
        self.read("streak", |s| s.streak)
    }

    fn course_progress(&self) -> Result<HashMap<String, CourseProgress>, ProviderError> {
        self.read("course_progress", |s| s.courses.clone())
    }

    fn grade_prediction(&self) -> Result<GradePrediction, ProviderError> {
        self.read("grade_prediction", |s| s.grade)
    }
}
