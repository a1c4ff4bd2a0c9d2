//! Goal progress synchronization.
//!
//! Baseline capture, progress derivation, completion detection, history
//! aggregation and the dual-cadence engine that ties them together.

#![warn(missing_docs)]

pub mod activity;
pub mod baseline;
pub mod derive;
pub mod completion;
pub mod history;
pub mod stats;
pub mod config;
pub mod engine;

pub use activity::{
    ActivitySnapshot, ActivitySource, CourseProgress, GradePrediction, ProviderError,
    StaticActivity, Streak, StudyTime,
};
pub use baseline::{absolute_reading, capture_baseline};
pub use derive::derive_progress;
pub use completion::CompletionDetector;
pub use history::{aggregate_history, HistoryRecorder, LiveDay, MAX_HISTORY_DAYS};
pub use stats::compute_stats;
pub use config::{AppConfig, ConfigError, EngineConfig};
pub use engine::{EngineError, GoalEngine, SyncReport};
