//! Job admission, retry and execution
//!
//! [`JobSubmitter`] ties the validator, the queue registry and the host's
//! collaborators together. A submitted job is committed as Queued, scheduled on
//! its queue and tracked until it terminates. When the delay elapses the
//! scheduled callback reloads the job, runs its procedure and, if configured,
//! routes failures back through [`JobSubmitter::handle_failure`].

use super::backoff::BackoffCalculator;
use super::cluster::ConfiguredClusterIdentity;
use super::collaborators::{
    ClusterIdentity, JobLogger, JobStore, ProcedureInvoker, ProcedureResolver, SessionTimeZone,
    TracingJobLogger,
};
use super::job_validator::JobValidator;
use super::queue_registry::{DelayQueue, QueueRegistry, QueueState, ScheduledHandle};
use super::schedule_tracker::ScheduleTracker;
use super::time_unit::TimeUnitResolver;
use super::time_zone::session_offset_minutes;
use super::types::{Job, JobOutcome, JobStatus};
use crate::config::Config;
use crate::errors::{SubmitError, SubmitErrorKind, SubmitResult};
use crate::observability::QueueMetrics;
use chrono::Utc;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What [`JobSubmitter::handle_failure`] did with a failed job
#[derive(Debug, Clone)]
pub enum FailureDisposition {
    /// No retries left; the job is Exhausted and no longer tracked
    Exhausted,
    /// Resubmitted with a backed-off delay
    Retried(ScheduledHandle),
}

struct Inner {
    registry: Arc<QueueRegistry>,
    store: Arc<dyn JobStore>,
    invoker: Arc<dyn ProcedureInvoker>,
    cluster: Arc<dyn ClusterIdentity>,
    logger: Arc<dyn JobLogger>,
    validator: JobValidator,
    backoff: BackoffCalculator,
    time_units: TimeUnitResolver,
    tracker: ScheduleTracker,
    metrics: QueueMetrics,
    config: Config,
}

/// Admits jobs to their queues and runs them when due
#[derive(Clone)]
pub struct JobSubmitter {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for JobSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSubmitter")
            .field("queues", &self.inner.registry.names())
            .field("tracked_jobs", &self.inner.tracker.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`JobSubmitter`].
///
/// Cluster identity defaults to the `[cluster]` config section, the logger to
/// [`TracingJobLogger`] and the config to [`Config::default`].
pub struct JobSubmitterBuilder {
    registry: Arc<QueueRegistry>,
    store: Arc<dyn JobStore>,
    resolver: Arc<dyn ProcedureResolver>,
    invoker: Arc<dyn ProcedureInvoker>,
    cluster: Option<Arc<dyn ClusterIdentity>>,
    logger: Option<Arc<dyn JobLogger>>,
    metrics: Option<QueueMetrics>,
    config: Config,
}

impl JobSubmitterBuilder {
    pub fn new(
        registry: Arc<QueueRegistry>,
        store: Arc<dyn JobStore>,
        resolver: Arc<dyn ProcedureResolver>,
        invoker: Arc<dyn ProcedureInvoker>,
    ) -> Self {
        Self {
            registry,
            store,
            resolver,
            invoker,
            cluster: None,
            logger: None,
            metrics: None,
            config: Config::default(),
        }
    }

    pub fn cluster(mut self, cluster: Arc<dyn ClusterIdentity>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn JobLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn metrics(mut self, metrics: QueueMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> JobSubmitter {
        let cluster = self
            .cluster
            .unwrap_or_else(|| Arc::new(ConfiguredClusterIdentity::new(&self.config.cluster)));
        let logger = self
            .logger
            .unwrap_or_else(|| Arc::new(TracingJobLogger));

        JobSubmitter {
            inner: Arc::new(Inner {
                validator: JobValidator::new(logger.clone(), self.resolver),
                registry: self.registry,
                store: self.store,
                invoker: self.invoker,
                cluster,
                logger,
                backoff: BackoffCalculator::new(),
                time_units: TimeUnitResolver::new(),
                tracker: ScheduleTracker::new(),
                metrics: self.metrics.unwrap_or_default(),
                config: self.config,
            }),
        }
    }
}

impl JobSubmitter {
    pub fn new(
        registry: Arc<QueueRegistry>,
        store: Arc<dyn JobStore>,
        resolver: Arc<dyn ProcedureResolver>,
        invoker: Arc<dyn ProcedureInvoker>,
        cluster: Arc<dyn ClusterIdentity>,
        logger: Arc<dyn JobLogger>,
        config: Config,
    ) -> Self {
        JobSubmitterBuilder::new(registry, store, resolver, invoker)
            .cluster(cluster)
            .logger(logger)
            .config(config)
            .build()
    }

    pub fn builder(
        registry: Arc<QueueRegistry>,
        store: Arc<dyn JobStore>,
        resolver: Arc<dyn ProcedureResolver>,
        invoker: Arc<dyn ProcedureInvoker>,
    ) -> JobSubmitterBuilder {
        JobSubmitterBuilder::new(registry, store, resolver, invoker)
    }

    pub fn registry(&self) -> &Arc<QueueRegistry> {
        &self.inner.registry
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Validate, commit and schedule `job` on its queue.
    ///
    /// On success the job is Queued in the store and its handle is tracked.
    /// A job that fails validation is neither committed nor scheduled.
    pub async fn submit(&self, job: &mut Job) -> SubmitResult<ScheduledHandle> {
        match self.admit(job).await {
            Ok(handle) => {
                self.inner.metrics.record_submitted(&job.queue_name);
                Ok(handle)
            }
            Err(err) => {
                // validation findings were already reported through the JobLogger
                if err.kind() != SubmitErrorKind::Validation {
                    warn!("{}", err);
                }
                self.inner
                    .metrics
                    .record_rejected(&job.queue_name, err.kind());
                Err(err)
            }
        }
    }

    async fn admit(&self, job: &mut Job) -> SubmitResult<ScheduledHandle> {
        let inner = &self.inner;

        if !inner.validator.is_valid(&inner.registry, job) {
            return Err(SubmitError::Validation { job_id: job.id });
        }

        let queue = inner
            .registry
            .get(&job.queue_name)
            .ok_or_else(|| SubmitError::QueueNotFound {
                queue: job.queue_name.clone(),
            })?;

        let state = queue.state();
        if state != QueueState::Open {
            return Err(SubmitError::QueueUnavailable {
                queue: job.queue_name.clone(),
                state,
            });
        }

        if inner.cluster.cluster_support_enabled() {
            let index = inner.cluster.instance_index();
            if index >= 0 {
                job.instance_index = i32::try_from(index).ok();
            }
        }

        let previous_status = job.status;
        job.status = JobStatus::Queued;
        if let Err(source) = inner.store.commit(job).await {
            job.status = previous_status;
            return Err(SubmitError::Commit {
                job_id: job.id,
                source,
            });
        }

        match self.schedule_on(&queue, job) {
            Ok(handle) => Ok(handle),
            Err(err) => {
                self.revert_admission(job, previous_status).await;
                Err(err)
            }
        }
    }

    fn schedule_on(&self, queue: &DelayQueue, job: &Job) -> SubmitResult<ScheduledHandle> {
        let caption = job.delay_unit.map(|unit| unit.caption()).unwrap_or_default();
        let unit = self.inner.time_units.resolve(caption)?;
        let delay = u64::try_from(job.current_delay).unwrap_or(0);

        let job_id = job.id;
        let submitter = self.clone();
        let (ready_tx, ready_rx) = oneshot::channel::<u64>();
        let handle = queue.schedule(
            job_id,
            move || async move {
                let schedule_id = ready_rx.await.ok();
                submitter.run_scheduled(job_id, schedule_id).await
            },
            delay,
            unit,
        )?;

        self.inner.tracker.record(job_id, handle.clone());
        // the tracker entry exists before the callback touches it
        let _ = ready_tx.send(handle.schedule_id());

        info!(
            "Job {} added to queue {} ({} in {} {}, retry {}/{})",
            job_id,
            job.queue_name,
            job.procedure_name,
            job.current_delay,
            unit,
            job.retry,
            job.max_retries
        );
        Ok(handle)
    }

    /// Undo the Queued commit of a job that could not be scheduled
    async fn revert_admission(&self, job: &mut Job, previous_status: JobStatus) {
        job.status = previous_status;
        if let Err(err) = self.inner.store.commit(job).await {
            error!(
                "Job {} is stored as Queued but was never scheduled; reverting to {:?} failed: {:#}",
                job.id, previous_status, err
            );
        }
    }

    /// Set the procedure to run, then [`submit`](Self::submit)
    pub async fn submit_with_procedure(
        &self,
        job: &mut Job,
        procedure_name: &str,
    ) -> SubmitResult<ScheduledHandle> {
        job.procedure_name = procedure_name.to_string();
        self.submit(job).await
    }

    /// Resubmit `job` with an exponentially backed-off delay.
    ///
    /// Does not look at `max_retries`; use [`handle_failure`](Self::handle_failure)
    /// for the retry-or-give-up decision.
    pub async fn submit_retry(&self, job: &mut Job) -> SubmitResult<ScheduledHandle> {
        job.current_delay = self.inner.backoff.calculate(job.base_delay, job.retry);
        job.retry = job.retry.saturating_add(1);
        self.inner.metrics.record_retry(&job.queue_name);
        debug!(
            "Retrying job {} (attempt {}) in {}",
            job.id, job.retry, job.current_delay
        );
        self.submit(job).await
    }

    /// Retry `job` if it has retries left, otherwise mark it Exhausted
    pub async fn handle_failure(&self, job: &mut Job) -> SubmitResult<FailureDisposition> {
        if !job.retries_exhausted() {
            let handle = self.submit_retry(job).await?;
            return Ok(FailureDisposition::Retried(handle));
        }

        job.status = JobStatus::Exhausted;
        self.inner
            .store
            .commit(job)
            .await
            .map_err(|source| SubmitError::Commit {
                job_id: job.id,
                source,
            })?;
        self.inner.tracker.cancel(job.id);
        self.inner.metrics.record_exhausted(&job.queue_name);
        warn!(
            "Job {} ({}) failed and has no retries left ({} of {})",
            job.id, job.procedure_name, job.retry, job.max_retries
        );
        Ok(FailureDisposition::Exhausted)
    }

    /// Cancel the job's pending schedule. Returns whether an execution was prevented.
    pub fn cancel(&self, job_id: Uuid) -> bool {
        self.inner.tracker.cancel(job_id)
    }

    pub fn handle(&self, job_id: Uuid) -> Option<ScheduledHandle> {
        self.inner.tracker.get(job_id)
    }

    pub fn tracked_jobs(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Apply the configured time zone to the host session.
    ///
    /// Returns the offset that was applied, if any.
    pub fn configure_time_zone(&self, session: &dyn SessionTimeZone) -> Option<i32> {
        let time_zone = &self.inner.config.time_zone;
        let id = time_zone.id.trim();
        if id.is_empty() {
            return None;
        }

        match session_offset_minutes(id, time_zone.use_dst, Utc::now()) {
            Some(offset) => {
                session.set_offset_minutes(offset);
                info!("Session time zone set to {} ({} minutes west of UTC)", id, offset);
                Some(offset)
            }
            None => {
                self.inner.logger.warn(&format!(
                    "TimeZoneID {id} is not valid. No time zone will be configured."
                ));
                None
            }
        }
    }

    /// Gracefully shut every queue down using the configured grace period
    pub async fn shutdown(&self) {
        self.inner
            .registry
            .shutdown_all(self.inner.config.shutdown.grace_period)
            .await;
    }

    fn release(&self, job_id: Uuid, schedule_id: Option<u64>) {
        if let Some(schedule_id) = schedule_id {
            self.inner.tracker.release(job_id, schedule_id);
        }
    }

    // Boxed because a failed execution can resubmit, which schedules this again.
    fn run_scheduled(&self, job_id: Uuid, schedule_id: Option<u64>) -> BoxFuture<'static, JobOutcome> {
        let this = self.clone();
        async move {
            let inner = &this.inner;

            let mut job = match inner.store.load(job_id).await {
                Ok(Some(job)) if job.status == JobStatus::Queued => job,
                Ok(Some(job)) => {
                    debug!(
                        "Job {} is {:?}, not Queued; skipping execution",
                        job_id, job.status
                    );
                    this.release(job_id, schedule_id);
                    return JobOutcome::AlreadyHandled;
                }
                Ok(None) => {
                    debug!("Job {} no longer exists; skipping execution", job_id);
                    this.release(job_id, schedule_id);
                    return JobOutcome::AlreadyHandled;
                }
                Err(err) => {
                    error!("Could not load job {}: {:#}", job_id, err);
                    this.release(job_id, schedule_id);
                    return JobOutcome::Failed;
                }
            };

            job.status = JobStatus::Executing;
            if let Err(err) = inner.store.commit(&job).await {
                error!("Could not mark job {} as executing: {:#}", job_id, err);
            }

            let started = Instant::now();
            let invocation = AssertUnwindSafe(inner.invoker.invoke(&job.procedure_name, &job))
                .catch_unwind()
                .await;
            let outcome = match invocation {
                Ok(Ok(())) => JobOutcome::Succeeded,
                Ok(Err(err)) => {
                    warn!(
                        "Procedure {} of job {} failed: {:#}",
                        job.procedure_name, job_id, err
                    );
                    JobOutcome::Failed
                }
                Err(_) => {
                    error!("Procedure {} of job {} panicked", job.procedure_name, job_id);
                    JobOutcome::Failed
                }
            };
            inner
                .metrics
                .record_execution(&job.queue_name, outcome, started.elapsed());

            job.status = match outcome {
                JobOutcome::Succeeded => JobStatus::Succeeded,
                _ => JobStatus::Failed,
            };
            if let Err(err) = inner.store.commit(&job).await {
                error!(
                    "Could not commit {:?} status of job {}: {:#}",
                    job.status, job_id, err
                );
            }

            if outcome == JobOutcome::Failed && inner.config.retry.automatic {
                match this.handle_failure(&mut job).await {
                    Ok(FailureDisposition::Retried(handle)) => debug!(
                        "Job {} rescheduled as schedule {}",
                        job_id,
                        handle.schedule_id()
                    ),
                    Ok(FailureDisposition::Exhausted) => {}
                    Err(err) => {
                        error!("Could not retry job {}: {}", job_id, err);
                        this.release(job_id, schedule_id);
                    }
                }
            } else {
                this.release(job_id, schedule_id);
            }

            outcome
        }
        .boxed()
    }
}
