//! Completion detection.

use std::collections::HashSet;
use goalsync_core::{CompletionEvent, Goal, GoalId, GoalStatus, Time};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Performs the active→completed transition exactly once per goal id.
///
/// The notified set only grows, so a goal id can produce at most one event
/// for the lifetime of the detector, whatever happens to the goal afterwards.
pub struct CompletionDetector {
    notified: HashSet<GoalId>,
    events: broadcast::Sender<CompletionEvent>,
}

impl CompletionDetector {
    /// Create a detector publishing on `events`.
    pub fn new(events: broadcast::Sender<CompletionEvent>) -> Self {
        Self {
            notified: HashSet::new(),
            events,
        }
    }

    /// Record goals that are already completed so they are never announced.
    pub fn mark_notified(&mut self, id: GoalId) {
        self.notified.insert(id);
    }

    /// Whether `id` has already been handled.
    pub fn is_notified(&self, id: GoalId) -> bool {
        self.notified.contains(&id)
    }

    /// Complete `goal` if its current value has reached the target.
    ///
    /// Returns `true` when the goal was transitioned; the caller is then
    /// responsible for persisting the new status.
    pub fn observe(&mut self, goal: &mut Goal, now: Time) -> bool {
        if !goal.is_active() || goal.current_value < goal.target_value {
            return false;
        }
        if !self.notified.insert(goal.id) {
            return false;
        }

        if let Err(e) = goal.transition(GoalStatus::Completed, now) {
            // Unreachable for an active goal; keep the id so we never retry.
            debug!(goal_id = %goal.id, error = %e, "completion transition rejected");
            return false;
        }

        info!(goal_id = %goal.id, title = %goal.title, "goal completed");

        if goal.metadata.notifications_enabled {
            // No subscribers is fine.
            let _ = self.events.send(CompletionEvent::for_goal(goal, now));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use goalsync_core::{GoalDraft, GoalKind, OwnerId};

    fn goal(target: f64, current: f64, notify: bool) -> Goal {
        let mut draft = GoalDraft::new("Streak", GoalKind::Streak, target);
        draft.notifications_enabled = notify;
        let mut goal = Goal::new(OwnerId::local(), draft, 0.0, Utc::now());
        goal.current_value = current;
        goal
    }

    #[test]
    fn test_below_target_does_nothing() {
        let (tx, mut rx) = broadcast::channel(8);
        let mut detector = CompletionDetector::new(tx);
        let mut g = goal(7.0, 6.9, true);

        assert!(!detector.observe(&mut g, Utc::now()));
        assert_eq!(g.status, GoalStatus::Active);
        assert!(!detector.is_notified(g.id));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_completes_once_and_emits_once() {
        let (tx, mut rx) = broadcast::channel(8);
        let mut detector = CompletionDetector::new(tx);
        let mut g = goal(7.0, 7.0, true);
        let now = Utc::now();

        assert!(detector.observe(&mut g, now));
        assert_eq!(g.status, GoalStatus::Completed);
        assert_eq!(g.completed_at, Some(now));

        // Even if something reset the goal, the id is spent.
        g.status = GoalStatus::Active;
        g.completed_at = None;
        assert!(!detector.observe(&mut g, Utc::now()));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.goal_id, g.id);
        assert_eq!(event.unit, "days");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_notifications_disabled_still_completes() {
        let (tx, mut rx) = broadcast::channel(8);
        let mut detector = CompletionDetector::new(tx);
        let mut g = goal(5.0, 9.0, false);

        assert!(detector.observe(&mut g, Utc::now()));
        assert_eq!(g.status, GoalStatus::Completed);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_paused_goal_is_not_completed() {
        let (tx, _rx) = broadcast::channel(8);
        let mut detector = CompletionDetector::new(tx);
        let mut g = goal(5.0, 9.0, true);
        g.transition(GoalStatus::Paused, Utc::now()).unwrap();

        assert!(!detector.observe(&mut g, Utc::now()));
        assert_eq!(g.status, GoalStatus::Paused);
    }
}
