//! goalsync core data models.
//!
//! This crate defines the goal, snapshot and derived-view types shared by
//! the storage backends and the progress engine.

#![warn(missing_docs)]

// Core identities
mod id;

// Goals
mod goal;
mod progress;

// History and events
mod history;
mod event;

// Re-exports
pub use id::*;

pub use goal::{
    Goal, GoalDraft, GoalKind, GoalMetadata, GoalStatus, GoalType, CourseRef, Priority,
    TimeUnit, TransitionError,
};
pub use progress::{progress_percentage, GoalStats, GoalWithProgress, HistoryRow};
pub use history::ProgressHistoryEntry;
pub use event::CompletionEvent;

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
