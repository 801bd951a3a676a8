//! In-process delayed job queues with validation and exponential-backoff retries

pub mod config;
pub mod errors;
pub mod job_scheduling;
pub mod observability;

pub use config::Config;
pub use errors::{SubmitError, SubmitResult};
pub use job_scheduling::{Job, JobStatus, JobSubmitter, QueueRegistry};
