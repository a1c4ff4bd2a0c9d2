//! Goal progress engine.
//!
//! One engine per user session. It owns the in-memory goal collection and
//! two periodic loops over it:
//!
//! - the fast loop re-derives progress for active goals and runs completion
//!   detection. It never touches the store.
//! - the slow loop writes changed values and pending status transitions to
//!   the store, coalescing everything that happened since its last pass.
//!
//! The collection sits behind one mutex that is never held across a store
//! call. Deleted goal ids are tombstoned so a write that is already in
//! flight cannot bring a goal back.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use chrono::Utc;
use goalsync_core::{
    progress_percentage, CompletionEvent, Goal, GoalDraft, GoalId, GoalStats, GoalStatus,
    GoalWithProgress, HistoryRow, OwnerId,
};
use goalsync_storage::{Store, StoreError};
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::activity::ActivitySource;
use crate::baseline::capture_baseline;
use crate::completion::CompletionDetector;
use crate::config::EngineConfig;
use crate::derive::derive_progress;
use crate::history::{aggregate_history, HistoryRecorder, LiveDay, MAX_HISTORY_DAYS};
use crate::stats::compute_stats;

/// Error type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by user-facing engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The store rejected the operation
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// No such goal in this session
    #[error("goal not found: {0}")]
    NotFound(GoalId),

    /// Status change not allowed
    #[error(transparent)]
    InvalidTransition(#[from] goalsync_core::TransitionError),

    /// Rejected goal input
    #[error("invalid goal: {0}")]
    InvalidGoal(String),
}

/// Outcome of one slow-tick pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Progress values written
    pub progress_written: usize,
    /// Status transitions written
    pub status_written: usize,
    /// Writes that failed and stay queued
    pub failed: usize,
    /// Writes dropped because the goal was deleted
    pub skipped_deleted: usize,
}

struct TrackedGoal {
    goal: Goal,
    // Last current_value the store acknowledged.
    persisted_value: f64,
}

struct EngineState {
    goals: BTreeMap<GoalId, TrackedGoal>,
    pending_status: HashSet<GoalId>,
    tombstones: HashSet<GoalId>,
    detector: CompletionDetector,
}

enum Write {
    Status {
        id: GoalId,
        status: GoalStatus,
        completed_at: Option<goalsync_core::Time>,
    },
    Progress {
        id: GoalId,
        owner: OwnerId,
        value: f64,
        percentage: u8,
    },
}

/// Goal progress synchronization engine for one owner.
pub struct GoalEngine {
    owner: OwnerId,
    store: Arc<dyn Store>,
    activity: Arc<dyn ActivitySource>,
    history: HistoryRecorder,
    config: EngineConfig,
    state: Mutex<EngineState>,
    events: broadcast::Sender<CompletionEvent>,
    cancel: CancellationToken,
    flush: Notify,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl GoalEngine {
    /// Create an engine. Call [`fetch_goals`](Self::fetch_goals) to load the
    /// owner's goals and [`start`](Self::start) to run the loops.
    pub fn new(
        owner: OwnerId,
        store: Arc<dyn Store>,
        activity: Arc<dyn ActivitySource>,
        config: EngineConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let history = HistoryRecorder::new(store.clone(), config.history_limit);
        Self {
            owner,
            state: Mutex::new(EngineState {
                goals: BTreeMap::new(),
                pending_status: HashSet::new(),
                tombstones: HashSet::new(),
                detector: CompletionDetector::new(events.clone()),
            }),
            store,
            activity,
            history,
            config,
            events,
            cancel: CancellationToken::new(),
            flush: Notify::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Owner this engine tracks.
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Subscribe to completion events.
    pub fn subscribe(&self) -> broadcast::Receiver<CompletionEvent> {
        self.events.subscribe()
    }

    // === User-facing operations ===

    /// Load the owner's goals from the store, replacing the in-memory set.
    pub async fn fetch_goals(&self) -> Result<Vec<GoalWithProgress>> {
        let goals = self.store.fetch(&self.owner).await?;
        let now = Utc::now();

        let mut state = self.state.lock().await;
        let EngineState {
            goals: tracked,
            pending_status,
            tombstones,
            detector,
        } = &mut *state;

        let mut previous = std::mem::take(tracked);
        for mut goal in goals {
            let id = goal.id;
            if tombstones.contains(&id) {
                continue;
            }
            if goal.status == GoalStatus::Completed {
                detector.mark_notified(id);
            }

            let persisted_value = goal.current_value;
            match previous.remove(&id) {
                // A status the store has not acknowledged yet wins over the stored copy.
                Some(local) if pending_status.contains(&id) => goal = local.goal,
                Some(local)
                    if local.goal.status == GoalStatus::Completed
                        && goal.status != GoalStatus::Completed =>
                {
                    pending_status.insert(id);
                    goal = local.goal;
                }
                _ if detector.is_notified(id) && goal.status != GoalStatus::Completed => {
                    // Completion was announced; the stored copy must not reopen it.
                    if goal.transition(GoalStatus::Completed, now).is_ok() {
                        pending_status.insert(id);
                    }
                }
                _ => {}
            }
            tracked.insert(id, TrackedGoal { goal, persisted_value });
        }
        pending_status.retain(|id| tracked.contains_key(id));

        info!(owner = %self.owner, count = tracked.len(), "loaded goals");
        Ok(tracked
            .values()
            .map(|t| GoalWithProgress::new(t.goal.clone(), now))
            .collect())
    }

    /// Create a goal, capturing its baseline before it is persisted.
    pub async fn create_goal(&self, draft: GoalDraft) -> Result<GoalWithProgress> {
        if draft.title.trim().is_empty() {
            return Err(EngineError::InvalidGoal("title is empty".to_string()));
        }
        if !draft.target_value.is_finite() || draft.target_value <= 0.0 {
            return Err(EngineError::InvalidGoal(format!(
                "target must be positive, got {}",
                draft.target_value
            )));
        }
        if let (Some(start), Some(end)) = (draft.start_date, draft.end_date) {
            if end < start {
                return Err(EngineError::InvalidGoal("end date is before start date".to_string()));
            }
        }

        let baseline = capture_baseline(&draft.kind, self.activity.as_ref());
        let now = Utc::now();
        let goal = Goal::new(self.owner.clone(), draft, baseline, now);

        self.store.create(&goal).await?;
        info!(goal_id = %goal.id, goal_type = goal.goal_type().as_str(), baseline, "created goal");

        let view = GoalWithProgress::new(goal.clone(), now);
        self.state.lock().await.goals.insert(
            goal.id,
            TrackedGoal {
                persisted_value: goal.current_value,
                goal,
            },
        );
        Ok(view)
    }

    /// Change a goal's status on the user's behalf (pause, resume, expire).
    pub async fn update_goal_status(&self, id: GoalId, status: GoalStatus) -> Result<GoalWithProgress> {
        let now = Utc::now();
        let mut updated = {
            let state = self.state.lock().await;
            state
                .goals
                .get(&id)
                .map(|t| t.goal.clone())
                .ok_or(EngineError::NotFound(id))?
        };
        updated.transition(status, now)?;

        self.store
            .update_status(id, updated.status, updated.completed_at)
            .await?;

        let mut state = self.state.lock().await;
        if status == GoalStatus::Completed {
            state.detector.mark_notified(id);
        }
        let EngineState {
            goals,
            pending_status,
            ..
        } = &mut *state;
        let tracked = goals.get_mut(&id).ok_or(EngineError::NotFound(id))?;
        if tracked.goal.status != updated.status {
            if let Err(e) = tracked.goal.transition(status, now) {
                // The fast tick completed the goal while we were writing, so
                // the store now holds our stale status. Rewrite the real one.
                pending_status.insert(id);
                warn!(goal_id = %id, error = %e, "status change lost to completion");
                return Err(e.into());
            }
        }
        info!(goal_id = %id, status = %status, "goal status updated");
        Ok(GoalWithProgress::new(tracked.goal.clone(), now))
    }

    /// Delete a goal and its history.
    pub async fn delete_goal(&self, id: GoalId) -> Result<()> {
        let removed = {
            let mut state = self.state.lock().await;
            let removed = state.goals.remove(&id).ok_or(EngineError::NotFound(id))?;
            state.tombstones.insert(id);
            state.pending_status.remove(&id);
            removed
        };

        if let Err(e) = self.store.delete(id).await {
            warn!(goal_id = %id, error = %e, "delete failed, restoring goal");
            let mut state = self.state.lock().await;
            state.tombstones.remove(&id);
            state.goals.insert(id, removed);
            return Err(e.into());
        }

        if let Err(e) = self.history.forget(id).await {
            warn!(goal_id = %id, error = %e, "failed to drop goal history");
        }
        info!(goal_id = %id, "deleted goal");
        Ok(())
    }

    /// Run one derivation pass and one persistence pass now, returning the
    /// refreshed goal list.
    pub async fn sync_all_goals_progress(&self) -> Vec<GoalWithProgress> {
        self.fast_tick().await;
        let report = self.slow_tick().await;
        debug!(?report, "manual sync");
        self.goals().await
    }

    // === Views ===

    /// Current in-memory goals with derived fields.
    pub async fn goals(&self) -> Vec<GoalWithProgress> {
        let now = Utc::now();
        let state = self.state.lock().await;
        state
            .goals
            .values()
            .map(|t| GoalWithProgress::new(t.goal.clone(), now))
            .collect()
    }

    /// One goal with derived fields.
    pub async fn goal(&self, id: GoalId) -> Option<GoalWithProgress> {
        let state = self.state.lock().await;
        state
            .goals
            .get(&id)
            .map(|t| GoalWithProgress::new(t.goal.clone(), Utc::now()))
    }

    /// Roll-up counts over the current collection.
    pub async fn stats(&self) -> GoalStats {
        let state = self.state.lock().await;
        compute_stats(state.goals.values().map(|t| &t.goal))
    }

    /// Day-by-day history for the last `days` days plus today.
    pub async fn aggregated_progress_history(&self, days: u32) -> Result<Vec<HistoryRow>> {
        let days = days.min(MAX_HISTORY_DAYS);
        let today = Utc::now().date_naive();
        let since = today - chrono::Duration::days(days as i64);
        let snapshots = self.history.snapshots_since(&self.owner, since).await?;

        let state = self.state.lock().await;
        let goals: Vec<Goal> = state.goals.values().map(|t| t.goal.clone()).collect();
        drop(state);

        let live = LiveDay::from_goals(&compute_stats(&goals), &goals);
        Ok(aggregate_history(days, today, &goals, &snapshots, live))
    }

    // === Reconciliation ===

    /// Fast tick: re-derive progress for every active goal and complete the
    /// ones that reached their target. Returns how many goals changed.
    pub async fn fast_tick(&self) -> usize {
        if self.cancel.is_cancelled() {
            return 0;
        }
        let now = Utc::now();
        let mut changed = 0;
        let mut completed = 0;

        {
            let mut state = self.state.lock().await;
            let EngineState {
                goals,
                pending_status,
                detector,
                ..
            } = &mut *state;

            for (id, tracked) in goals.iter_mut() {
                if !tracked.goal.is_active() {
                    continue;
                }
                let value = derive_progress(&tracked.goal, self.activity.as_ref());
                if value != tracked.goal.current_value {
                    tracked.goal.current_value = value;
                    tracked.goal.updated_at = now;
                    changed += 1;
                }
                if detector.observe(&mut tracked.goal, now) {
                    pending_status.insert(*id);
                    completed += 1;
                }
            }
        }

        if completed > 0 {
            self.flush.notify_one();
        }
        changed
    }

    /// Slow tick: persist changed progress values and pending status
    /// transitions. Failed writes stay queued for the next pass.
    pub async fn slow_tick(&self) -> SyncReport {
        let mut report = SyncReport::default();
        let writes = self.collect_writes().await;

        for write in writes {
            if self.cancel.is_cancelled() {
                debug!("slow tick cancelled, leaving remaining writes queued");
                break;
            }

            let id = match &write {
                Write::Status { id, .. } | Write::Progress { id, .. } => *id,
            };
            if self.is_deleted(id).await {
                report.skipped_deleted += 1;
                continue;
            }

            match write {
                Write::Status { id, status, completed_at } => {
                    match self.store.update_status(id, status, completed_at).await {
                        Ok(()) => {
                            let mut state = self.state.lock().await;
                            // A newer transition may have been queued meanwhile.
                            let current = state.goals.get(&id).map(|t| t.goal.status);
                            if current == Some(status) {
                                state.pending_status.remove(&id);
                            }
                            report.status_written += 1;
                        }
                        Err(e) => self.write_failed(id, "status", &e, &mut report).await,
                    }
                }
                Write::Progress { id, owner, value, percentage } => {
                    match self.store.update_progress(id, value).await {
                        Ok(()) => {
                            {
                                let mut state = self.state.lock().await;
                                if let Some(tracked) = state.goals.get_mut(&id) {
                                    tracked.persisted_value = value;
                                }
                            }
                            report.progress_written += 1;
                            if self.config.record_history && !self.is_deleted(id).await {
                                self.record_snapshot(id, owner, value, percentage).await;
                            }
                        }
                        Err(e) => self.write_failed(id, "progress", &e, &mut report).await,
                    }
                }
            }
        }

        if report != SyncReport::default() {
            debug!(?report, "slow tick");
        }
        report
    }

    async fn collect_writes(&self) -> Vec<Write> {
        let state = self.state.lock().await;
        let mut writes = Vec::new();

        for id in &state.pending_status {
            if let Some(tracked) = state.goals.get(id) {
                writes.push(Write::Status {
                    id: *id,
                    status: tracked.goal.status,
                    completed_at: tracked.goal.completed_at,
                });
            }
        }
        for (id, tracked) in &state.goals {
            if state.tombstones.contains(id) {
                continue;
            }
            let goal = &tracked.goal;
            if goal.current_value != tracked.persisted_value {
                writes.push(Write::Progress {
                    id: *id,
                    owner: goal.owner_id.clone(),
                    value: goal.current_value,
                    percentage: progress_percentage(goal.current_value, goal.target_value),
                });
            }
        }
        writes
    }

    async fn record_snapshot(&self, id: GoalId, owner: OwnerId, value: f64, percentage: u8) {
        if let Err(e) = self
            .history
            .record_snapshot(id, owner, value, percentage, Utc::now())
            .await
        {
            warn!(goal_id = %id, error = %e, "failed to record progress snapshot");
        }
        // A delete that landed during the append has already dropped the
        // history, so this snapshot would outlive its goal.
        if self.is_deleted(id).await {
            if let Err(e) = self.history.forget(id).await {
                warn!(goal_id = %id, error = %e, "failed to drop orphaned snapshot");
            }
        }
    }

    async fn write_failed(&self, id: GoalId, what: &str, error: &StoreError, report: &mut SyncReport) {
        if self.is_deleted(id).await {
            debug!(goal_id = %id, "write raced with delete, dropping");
            report.skipped_deleted += 1;
        } else {
            warn!(goal_id = %id, write = what, error = %error, "persist failed, will retry next slow tick");
            report.failed += 1;
        }
    }

    async fn is_deleted(&self, id: GoalId) -> bool {
        self.state.lock().await.tombstones.contains(&id)
    }

    // === Lifecycle ===

    /// Spawn the fast and slow loops. Calling this again while running is a no-op.
    pub async fn start(self: Arc<Self>) {
        let mut tasks = self.tasks.lock().await;
        if !tasks.is_empty() || self.cancel.is_cancelled() {
            warn!("engine already started or shut down");
            return;
        }

        info!(
            owner = %self.owner,
            fast_ms = self.config.fast_tick_ms,
            slow_secs = self.config.slow_tick_secs,
            "starting goal engine"
        );
        tasks.push(tokio::spawn(self.clone().run_fast_loop()));
        tasks.push(tokio::spawn(self.clone().run_slow_loop()));
    }

    /// Stop both loops. An in-flight store write is allowed to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handles: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "engine task ended abnormally");
            }
        }
        info!(owner = %self.owner, "goal engine stopped");
    }

    /// Whether [`shutdown`](Self::shutdown) has been requested.
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    async fn run_fast_loop(self: Arc<Self>) {
        let mut timer = interval(self.config.fast_tick());
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = timer.tick() => {
                    self.fast_tick().await;
                }
            }
        }
        debug!("fast loop stopped");
    }

    async fn run_slow_loop(self: Arc<Self>) {
        let mut timer = interval(self.config.slow_tick());
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; nothing has changed yet.
        timer.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = timer.tick() => {}
                _ = self.flush.notified() => {}
            }
            self.slow_tick().await;
        }
        debug!("slow loop stopped");
    }
}
