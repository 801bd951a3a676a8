//! Named delay queues and the registry that owns them

use super::time_unit::TimeUnit;
use super::types::JobOutcome;
use crate::config::QueueConfig;
use crate::errors::{RegistryError, SchedulingError};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Lifecycle of a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueState {
    Open,
    ShuttingDown,
    Terminated,
}

impl QueueState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => QueueState::Open,
            1 => QueueState::ShuttingDown,
            _ => QueueState::Terminated,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            QueueState::Open => 0,
            QueueState::ShuttingDown => 1,
            QueueState::Terminated => 2,
        }
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QueueState::Open => "open",
            QueueState::ShuttingDown => "shutting down",
            QueueState::Terminated => "terminated",
        };
        f.write_str(label)
    }
}

/// Where a single schedule call currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    /// Waiting for the delay to elapse
    Pending,
    /// Delay elapsed; cancellation no longer has any effect
    Running,
    Completed(JobOutcome),
    Cancelled,
}

impl ScheduleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScheduleState::Completed(_) | ScheduleState::Cancelled)
    }
}

static NEXT_SCHEDULE_ID: AtomicU64 = AtomicU64::new(1);

/// Cancellable reference to one scheduled callback
#[derive(Debug, Clone)]
pub struct ScheduledHandle {
    job_id: Uuid,
    queue_name: String,
    schedule_id: u64,
    delay: Duration,
    cancel_token: CancellationToken,
    state: Arc<watch::Sender<ScheduleState>>,
}

impl ScheduledHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Unique per schedule call; a retry of the same job gets a new one
    pub fn schedule_id(&self) -> u64 {
        self.schedule_id
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> ScheduleState {
        *self.state.borrow()
    }

    pub fn is_pending(&self) -> bool {
        self.state() == ScheduleState::Pending
    }

    pub fn outcome(&self) -> Option<JobOutcome> {
        match self.state() {
            ScheduleState::Completed(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Cancel the callback if it has not fired yet. Returns whether this call
    /// prevented the execution.
    pub fn cancel(&self) -> bool {
        let cancelled = self.state.send_if_modified(|state| {
            if *state == ScheduleState::Pending {
                *state = ScheduleState::Cancelled;
                true
            } else {
                false
            }
        });

        if cancelled {
            self.cancel_token.cancel();
            debug!(
                "Cancelled pending schedule {} of job {} on queue {}",
                self.schedule_id, self.job_id, self.queue_name
            );
        }
        cancelled
    }

    /// Wait until the schedule is completed or cancelled
    pub async fn wait(&self) -> ScheduleState {
        let mut receiver = self.state.subscribe();
        match receiver.wait_for(ScheduleState::is_terminal).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }
}

/// Point-in-time counters for a queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Waiting for their delay
    pub pending: usize,
    /// Fired and executing (or waiting for a concurrency permit)
    pub running: usize,
    pub completed: usize,
    pub cancelled: usize,
}

#[derive(Debug, Default)]
struct QueueCounters {
    pending: AtomicUsize,
    running: AtomicUsize,
    completed: AtomicUsize,
    cancelled: AtomicUsize,
}

/// A named scheduling unit that runs callbacks once their delay elapses
#[derive(Debug)]
pub struct DelayQueue {
    name: String,
    concurrency: usize,
    state: AtomicU8,
    permits: Arc<Semaphore>,
    tasks: TaskTracker,
    shutdown_token: CancellationToken,
    counters: Arc<QueueCounters>,
}

impl DelayQueue {
    fn new(name: String, concurrency: usize) -> Self {
        Self {
            name,
            concurrency,
            state: AtomicU8::new(QueueState::Open.as_u8()),
            permits: Arc::new(Semaphore::new(concurrency)),
            tasks: TaskTracker::new(),
            shutdown_token: CancellationToken::new(),
            counters: Arc::new(QueueCounters::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn state(&self) -> QueueState {
        QueueState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_accepting(&self) -> bool {
        self.state() == QueueState::Open
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.counters.pending.load(Ordering::Relaxed),
            running: self.counters.running.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            cancelled: self.counters.cancelled.load(Ordering::Relaxed),
        }
    }

    /// Run `task` on this queue after `delay` units have elapsed.
    ///
    /// The callback is spawned on the queue's own task tracker and never runs
    /// on the caller's task. Must be called from within a tokio runtime.
    pub fn schedule<F, Fut>(
        &self,
        job_id: Uuid,
        task: F,
        delay: u64,
        unit: TimeUnit,
    ) -> Result<ScheduledHandle, SchedulingError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = JobOutcome> + Send + 'static,
    {
        let state = self.state();
        if state != QueueState::Open {
            return Err(SchedulingError::QueueUnavailable {
                queue: self.name.clone(),
                state,
            });
        }

        let delay = unit.to_duration(delay);
        let cancel_token = self.shutdown_token.child_token();
        let (state_tx, _) = watch::channel(ScheduleState::Pending);
        let handle = ScheduledHandle {
            job_id,
            queue_name: self.name.clone(),
            schedule_id: NEXT_SCHEDULE_ID.fetch_add(1, Ordering::Relaxed),
            delay,
            cancel_token: cancel_token.clone(),
            state: Arc::new(state_tx),
        };

        let state_tx = handle.state.clone();
        let permits = self.permits.clone();
        let counters = self.counters.clone();
        let queue_name = self.name.clone();
        let schedule_id = handle.schedule_id;

        counters.pending.fetch_add(1, Ordering::Relaxed);
        self.tasks.spawn(async move {
            let fired = tokio::select! {
                biased;
                _ = cancel_token.cancelled() => false,
                _ = tokio::time::sleep(delay) => true,
            };

            let started = fired
                && state_tx.send_if_modified(|state| {
                    if *state == ScheduleState::Pending {
                        *state = ScheduleState::Running;
                        true
                    } else {
                        false
                    }
                });
            counters.pending.fetch_sub(1, Ordering::Relaxed);

            if !started {
                state_tx.send_if_modified(|state| {
                    if *state == ScheduleState::Pending {
                        *state = ScheduleState::Cancelled;
                        true
                    } else {
                        false
                    }
                });
                counters.cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Schedule {} of job {} on queue {} cancelled before firing",
                    schedule_id, job_id, queue_name
                );
                return;
            }

            counters.running.fetch_add(1, Ordering::Relaxed);
            // the semaphore is never closed, so acquisition only waits for a free slot
            let _permit = permits.acquire_owned().await.ok();

            let outcome = match AssertUnwindSafe(task()).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!(
                        "Callback for job {} on queue {} panicked",
                        job_id, queue_name
                    );
                    JobOutcome::Failed
                }
            };

            counters.running.fetch_sub(1, Ordering::Relaxed);
            counters.completed.fetch_add(1, Ordering::Relaxed);
            state_tx.send_replace(ScheduleState::Completed(outcome));
        });

        debug!(
            "Scheduled job {} on queue {} in {:?} (schedule {})",
            job_id, self.name, delay, schedule_id
        );
        Ok(handle)
    }

    fn begin_shutdown(&self) -> bool {
        let began = self
            .state
            .compare_exchange(
                QueueState::Open.as_u8(),
                QueueState::ShuttingDown.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        self.tasks.close();
        began
    }

    /// Stop accepting jobs and let scheduled callbacks drain for up to `grace`.
    /// Whatever is still waiting for its delay after that is cancelled.
    pub async fn shutdown(&self, grace: Duration) {
        if self.begin_shutdown() {
            info!(
                "Shutting down queue {} ({} pending, {} running)",
                self.name,
                self.counters.pending.load(Ordering::Relaxed),
                self.counters.running.load(Ordering::Relaxed)
            );
        }

        if tokio::time::timeout(grace, self.tasks.wait()).await.is_err() {
            warn!(
                "Queue {} did not drain within {:?}, cancelling {} pending jobs",
                self.name,
                grace,
                self.counters.pending.load(Ordering::Relaxed)
            );
            self.shutdown_token.cancel();
            self.tasks.wait().await;
        }

        self.terminate();
    }

    /// Cancel every pending callback, wait for running ones, then terminate
    pub async fn shutdown_now(&self) {
        if self.begin_shutdown() {
            info!("Shutting down queue {} immediately", self.name);
        }
        self.shutdown_token.cancel();
        self.tasks.wait().await;
        self.terminate();
    }

    fn terminate(&self) {
        let previous = self
            .state
            .swap(QueueState::Terminated.as_u8(), Ordering::AcqRel);
        if QueueState::from_u8(previous) != QueueState::Terminated {
            info!("Queue {} terminated", self.name);
        }
    }
}

/// Owns every configured queue, keyed by name.
///
/// Queues are registered during host configuration; submissions only read.
#[derive(Debug, Default)]
pub struct QueueRegistry {
    queues: RwLock<HashMap<String, Arc<DelayQueue>>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(queues: &[QueueConfig]) -> Result<Self, RegistryError> {
        let registry = Self::new();
        for queue in queues {
            registry.register(queue.name.clone(), queue.concurrency)?;
        }
        Ok(registry)
    }

    pub fn register<S: Into<String>>(
        &self,
        name: S,
        concurrency: usize,
    ) -> Result<Arc<DelayQueue>, RegistryError> {
        let name = name.into();
        if concurrency == 0 {
            return Err(RegistryError::InvalidConcurrency { name });
        }

        let mut queues = self.queues.write().unwrap_or_else(PoisonError::into_inner);
        if queues.contains_key(&name) {
            return Err(RegistryError::DuplicateQueue { name });
        }

        let queue = Arc::new(DelayQueue::new(name.clone(), concurrency));
        queues.insert(name.clone(), queue.clone());
        info!("Initialized queue {} (concurrency: {})", name, concurrency);
        Ok(queue)
    }

    pub fn get(&self, name: &str) -> Option<Arc<DelayQueue>> {
        self.queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<DelayQueue>> {
        self.queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Gracefully shut every queue down in parallel
    pub async fn shutdown_all(&self, grace: Duration) {
        let queues = self.snapshot();
        futures::future::join_all(queues.iter().map(|queue| queue.shutdown(grace))).await;
    }

    pub async fn shutdown_all_now(&self) {
        let queues = self.snapshot();
        futures::future::join_all(queues.iter().map(|queue| queue.shutdown_now())).await;
    }
}
