//! Delayed job scheduling
//!
//! Jobs are admitted to named in-process queues and run once their delay
//! elapses. Failed jobs are retried with exponential backoff until they run
//! out of retries.
//!
//! The subsystem is built around these components:
//! - `JobValidator`: ordered admission checks, reported through a `JobLogger`
//! - `BackoffCalculator`: next retry delay from the base delay and retry count
//! - `TimeUnitResolver`: unit captions to scheduler time units
//! - `QueueRegistry` / `DelayQueue`: named queues that run delayed callbacks
//! - `ScheduleTracker`: latest cancellable handle per job
//! - `JobSubmitter`: admission, retry and execution of jobs
//!
//! Storage, procedures and process identity belong to the host and are
//! reached through the traits in [`collaborators`].

pub mod backoff;
pub mod cluster;
pub mod collaborators;
pub mod job_submitter;
pub mod job_validator;
pub mod procedures;
pub mod queue_registry;
pub mod schedule_tracker;
pub mod store;
pub mod time_unit;
pub mod time_zone;
pub mod types;

#[cfg(test)]
mod test_support;

pub use backoff::{BackoffCalculator, MAX_BACKOFF_EXPONENT};
pub use cluster::{ConfiguredClusterIdentity, StaticClusterIdentity};
pub use collaborators::{
    ClusterIdentity, JobLogger, JobStore, ProcedureInvoker, ProcedureResolver, SessionTimeZone,
    TracingJobLogger,
};
pub use job_submitter::{FailureDisposition, JobSubmitter, JobSubmitterBuilder};
pub use job_validator::JobValidator;
pub use procedures::ProcedureTable;
pub use queue_registry::{
    DelayQueue, QueueRegistry, QueueState, QueueStats, ScheduleState, ScheduledHandle,
};
pub use schedule_tracker::ScheduleTracker;
pub use store::InMemoryJobStore;
pub use time_unit::{TimeUnit, TimeUnitResolver};
pub use types::*;
