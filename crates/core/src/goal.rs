//! Goal model - a learning objective whose progress is derived from activity.

use serde::{Deserialize, Serialize};
use crate::id::{GoalId, OwnerId};
use crate::Time;

/// A learning goal tracked against one activity signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    /// Unique identifier
    pub id: GoalId,

    /// Owning user
    pub owner_id: OwnerId,

    /// Goal title
    pub title: String,

    /// Optional longer description
    pub description: Option<String>,

    /// Value at which the goal counts as reached
    pub target_value: f64,

    /// Progress so far, relative to the baseline
    pub current_value: f64,

    /// Priority
    pub priority: Priority,

    /// Lifecycle status
    pub status: GoalStatus,

    /// When tracking starts
    pub start_date: Time,

    /// Optional deadline
    pub end_date: Option<Time>,

    /// Set if and only if status is `Completed`
    pub completed_at: Option<Time>,

    /// When created
    pub created_at: Time,

    /// Last updated
    pub updated_at: Time,

    /// Type-specific tracking data
    pub metadata: GoalMetadata,
}

impl Goal {
    /// Build a goal from a draft and an already captured baseline.
    pub fn new(owner_id: OwnerId, draft: GoalDraft, baseline_value: f64, now: Time) -> Self {
        Self {
            id: GoalId::new(),
            owner_id,
            title: draft.title,
            description: draft.description,
            target_value: draft.target_value,
            current_value: 0.0,
            priority: draft.priority,
            status: GoalStatus::Active,
            start_date: draft.start_date.unwrap_or(now),
            end_date: draft.end_date,
            completed_at: None,
            created_at: now,
            updated_at: now,
            metadata: GoalMetadata::new(
                draft.kind,
                baseline_value,
                draft.notifications_enabled,
            ),
        }
    }

    /// The goal's flat type tag.
    pub fn goal_type(&self) -> GoalType {
        self.metadata.kind.goal_type()
    }

    /// Display unit of `current_value` and `target_value`.
    pub fn unit(&self) -> &'static str {
        self.metadata.kind.unit()
    }

    /// Whether the reconciler should derive progress for this goal.
    pub fn is_active(&self) -> bool {
        self.status == GoalStatus::Active
    }

    /// Move to a new status, keeping `completed_at` in step.
    pub fn transition(&mut self, to: GoalStatus, now: Time) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError { from: self.status, to });
        }
        self.status = to;
        self.completed_at = if to == GoalStatus::Completed { Some(now) } else { None };
        self.updated_at = now;
        Ok(())
    }
}

/// Lifecycle status of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    /// Progress is being tracked
    Active,
    /// Tracking suspended by the user
    Paused,
    /// Target reached; terminal
    Completed,
    /// Deadline passed without completion
    Expired,
}

impl GoalStatus {
    /// Whether a goal may move from `self` to `to`.
    ///
    /// `Completed` is terminal. Expiry is only ever applied by the user.
    pub fn can_transition_to(self, to: GoalStatus) -> bool {
        use GoalStatus::*;
        match (self, to) {
            (Completed, _) => false,
            (from, to) if from == to => false,
            (Active, Paused | Completed | Expired) => true,
            (Paused, Active | Completed | Expired) => true,
            (Expired, Active) => true,
            _ => false,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Paused => "paused",
            GoalStatus::Completed => "completed",
            GoalStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GoalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(GoalStatus::Active),
            "paused" => Ok(GoalStatus::Paused),
            "completed" => Ok(GoalStatus::Completed),
            "expired" => Ok(GoalStatus::Expired),
            other => Err(format!("unknown goal status: {other}")),
        }
    }
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move goal from {from} to {to}")]
pub struct TransitionError {
    /// Status before the attempted change
    pub from: GoalStatus,
    /// Requested status
    pub to: GoalStatus,
}

/// Goal priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Low
    Low,
    /// Medium
    #[default]
    Medium,
    /// High
    High,
}

/// Flat goal type tag, as stored and displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    /// Weekly study time
    StudyTime,
    /// Course modules completed
    CourseCompletion,
    /// Consecutive study days
    Streak,
    /// Course progress or predicted grade
    Grade,
}

impl GoalType {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalType::StudyTime => "study_time",
            GoalType::CourseCompletion => "course_completion",
            GoalType::Streak => "streak",
            GoalType::Grade => "grade",
        }
    }
}

/// Unit for study time goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    /// Minutes
    Minutes,
    /// Hours
    #[default]
    Hours,
}

/// A course a goal is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRef {
    /// Course identifier as known to the course-progress source
    pub course_id: String,
    /// Human readable title
    pub course_title: Option<String>,
}

impl CourseRef {
    /// Reference a course by id.
    pub fn new(course_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            course_title: None,
        }
    }
}

/// What a goal tracks. Each variant carries only the fields it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GoalKind {
    /// Weekly study time
    StudyTime {
        /// Unit the goal is expressed in
        unit: TimeUnit,
    },
    /// Completed course modules, for one course or all enrolled ones
    CourseCompletion {
        /// Scope to a single course
        course: Option<CourseRef>,
    },
    /// Consecutive study days
    Streak,
    /// Per-course progress or predicted overall grade
    Grade {
        /// Scope to a single course
        course: Option<CourseRef>,
    },
}

impl GoalKind {
    /// The flat type tag for this kind.
    pub fn goal_type(&self) -> GoalType {
        match self {
            GoalKind::StudyTime { .. } => GoalType::StudyTime,
            GoalKind::CourseCompletion { .. } => GoalType::CourseCompletion,
            GoalKind::Streak => GoalType::Streak,
            GoalKind::Grade { .. } => GoalType::Grade,
        }
    }

    /// Display unit.
    pub fn unit(&self) -> &'static str {
        match self {
            GoalKind::StudyTime { unit: TimeUnit::Hours } => "hours",
            GoalKind::StudyTime { unit: TimeUnit::Minutes } => "minutes",
            GoalKind::CourseCompletion { .. } => "modules",
            GoalKind::Streak => "days",
            GoalKind::Grade { .. } => "%",
        }
    }

    /// Course scope, if any.
    pub fn course(&self) -> Option<&CourseRef> {
        match self {
            GoalKind::CourseCompletion { course } | GoalKind::Grade { course } => course.as_ref(),
            _ => None,
        }
    }
}

/// Type-specific tracking data attached to a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalMetadata {
    /// What the goal tracks
    pub kind: GoalKind,

    /// Provider reading captured at creation
    baseline_value: f64,

    /// Whether completion should be announced
    pub notifications_enabled: bool,
}

impl GoalMetadata {
    /// Create metadata. The baseline cannot be changed afterwards.
    pub fn new(kind: GoalKind, baseline_value: f64, notifications_enabled: bool) -> Self {
        Self {
            kind,
            baseline_value,
            notifications_enabled,
        }
    }

    /// Provider reading captured when the goal was created.
    pub fn baseline_value(&self) -> f64 {
        self.baseline_value
    }
}

/// User input for a new goal, before a baseline is captured.
#[derive(Debug, Clone)]
pub struct GoalDraft {
    /// Goal title
    pub title: String,
    /// Optional longer description
    pub description: Option<String>,
    /// What the goal tracks
    pub kind: GoalKind,
    /// Must be positive
    pub target_value: f64,
    /// Priority
    pub priority: Priority,
    /// Defaults to creation time
    pub start_date: Option<Time>,
    /// Optional deadline
    pub end_date: Option<Time>,
    /// Announce completion
    pub notifications_enabled: bool,
}

impl GoalDraft {
    /// Draft with default priority, no deadline and notifications on.
    pub fn new(title: impl Into<String>, kind: GoalKind, target_value: f64) -> Self {
        Self {
            title: title.into(),
            description: None,
            kind,
            target_value,
            priority: Priority::default(),
            start_date: None,
            end_date: None,
            notifications_enabled: true,
        }
    }
}
