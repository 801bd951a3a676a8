//! Job id to scheduled handle bookkeeping

use super::queue_registry::ScheduledHandle;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;
use uuid::Uuid;

/// Remembers the latest scheduled handle per job so it can be cancelled later.
///
/// At most one handle is tracked per job. Recording a new handle for a job
/// that still has a pending one cancels the old schedule, so a job never fires
/// twice from two live schedules.
#[derive(Debug, Default)]
pub struct ScheduleTracker {
    handles: Mutex<HashMap<Uuid, ScheduledHandle>>,
}

impl ScheduleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `handle` under `job_id`.
    ///
    /// A handle that already completed (the callback can finish before the
    /// submitter gets here) is not stored.
    pub fn record(&self, job_id: Uuid, handle: ScheduledHandle) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);

        if handle.state().is_terminal() {
            if handles
                .get(&job_id)
                .is_some_and(|current| current.schedule_id() == handle.schedule_id())
            {
                handles.remove(&job_id);
            }
            return;
        }

        let replaced = handles.insert(job_id, handle);
        if let Some(previous) = replaced.filter(|previous| previous.cancel()) {
            debug!(
                "Replaced pending schedule {} of job {}",
                previous.schedule_id(),
                job_id
            );
        }
    }

    pub fn get(&self, job_id: Uuid) -> Option<ScheduledHandle> {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&job_id)
            .cloned()
    }

    /// Forget the handle for `job_id`, but only if it is still the one from
    /// schedule `schedule_id`. A newer schedule (a retry) stays tracked.
    pub fn release(&self, job_id: Uuid, schedule_id: u64) -> bool {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        match handles.get(&job_id) {
            Some(current) if current.schedule_id() == schedule_id => {
                handles.remove(&job_id);
                true
            }
            _ => false,
        }
    }

    pub fn remove(&self, job_id: Uuid) -> Option<ScheduledHandle> {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&job_id)
    }

    /// Cancel and forget the tracked schedule. Returns whether an execution
    /// was prevented.
    pub fn cancel(&self, job_id: Uuid) -> bool {
        self.remove(job_id)
            .is_some_and(|handle| handle.cancel())
    }

    pub fn job_ids(&self) -> Vec<Uuid> {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_scheduling::queue_registry::{QueueRegistry, ScheduleState};
    use crate::job_scheduling::time_unit::TimeUnit;
    use crate::job_scheduling::types::JobOutcome;
    use std::sync::Arc;

    fn schedule(registry: &QueueRegistry, job_id: Uuid, hours: u64) -> ScheduledHandle {
        registry
            .get("Default")
            .unwrap()
            .schedule(
                job_id,
                || async { JobOutcome::Succeeded },
                hours,
                TimeUnit::Hours,
            )
            .unwrap()
    }

    fn registry() -> QueueRegistry {
        let registry = QueueRegistry::new();
        registry.register("Default", 1).unwrap();
        registry
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_and_get() {
        let registry = registry();
        let tracker = ScheduleTracker::new();
        let job_id = Uuid::new_v4();
        let handle = schedule(&registry, job_id, 1);

        tracker.record(job_id, handle.clone());

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.get(job_id).unwrap().schedule_id(), handle.schedule_id());
        assert!(tracker.get(Uuid::new_v4()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_replaces_and_cancels_pending_handle() {
        let registry = registry();
        let tracker = ScheduleTracker::new();
        let job_id = Uuid::new_v4();
        let first = schedule(&registry, job_id, 1);
        let second = schedule(&registry, job_id, 2);

        tracker.record(job_id, first.clone());
        tracker.record(job_id, second.clone());

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.get(job_id).unwrap().schedule_id(), second.schedule_id());
        assert_eq!(first.state(), ScheduleState::Cancelled);
        assert!(second.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_only_matching_schedule() {
        let registry = registry();
        let tracker = ScheduleTracker::new();
        let job_id = Uuid::new_v4();
        let first = schedule(&registry, job_id, 1);
        let second = schedule(&registry, job_id, 1);
        tracker.record(job_id, second.clone());

        assert!(!tracker.release(job_id, first.schedule_id()));
        assert_eq!(tracker.len(), 1);
        assert!(tracker.release(job_id, second.schedule_id()));
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn test_completed_handle_is_not_recorded() {
        let registry = registry();
        let tracker = ScheduleTracker::new();
        let job_id = Uuid::new_v4();
        let handle = registry
            .get("Default")
            .unwrap()
            .schedule(
                job_id,
                || async { JobOutcome::Succeeded },
                0,
                TimeUnit::Milliseconds,
            )
            .unwrap();
        handle.wait().await;

        tracker.record(job_id, handle);
        assert!(tracker.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_execution() {
        let registry = registry();
        let tracker = ScheduleTracker::new();
        let job_id = Uuid::new_v4();
        let handle = schedule(&registry, job_id, 1);
        tracker.record(job_id, handle.clone());

        assert!(tracker.cancel(job_id));
        assert!(!tracker.cancel(job_id));
        assert_eq!(handle.wait().await, ScheduleState::Cancelled);
        assert!(tracker.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_records_for_distinct_jobs() {
        let registry = Arc::new(registry());
        let tracker = Arc::new(ScheduleTracker::new());

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let (registry, tracker) = (registry.clone(), tracker.clone());
            tasks.push(tokio::spawn(async move {
                let job_id = Uuid::new_v4();
                tracker.record(job_id, schedule(&registry, job_id, 1));
                job_id
            }));
        }

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }

        assert_eq!(tracker.len(), 32);
        for id in ids {
            assert!(tracker.get(id).is_some());
        }
    }
}
