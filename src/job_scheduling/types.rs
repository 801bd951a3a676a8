//! Job scheduling type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum JobStatus {
    /// Created by the host, not yet admitted
    #[default]
    Created,
    /// Admitted and waiting for its delay to elapse
    Queued,
    /// Scheduled callback is running the procedure
    Executing,
    Succeeded,
    /// Last execution failed; the host or failure handling decides what next
    Failed,
    /// Failed with no retries left
    Exhausted,
}

impl JobStatus {
    /// Succeeded and Exhausted jobs never run again
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Exhausted)
    }
}

/// Unit a job's delays are expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DelayUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl DelayUnit {
    /// Canonical, locale-independent caption; this is what the time unit resolver consumes
    pub fn caption(&self) -> &'static str {
        match self {
            DelayUnit::Milliseconds => "Milliseconds",
            DelayUnit::Seconds => "Seconds",
            DelayUnit::Minutes => "Minutes",
            DelayUnit::Hours => "Hours",
            DelayUnit::Days => "Days",
        }
    }
}

impl fmt::Display for DelayUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.caption())
    }
}

/// A unit of deferred work
///
/// Delay and retry fields are signed on purpose: hosts hand in whatever they
/// stored and the validator is the one that rejects negative values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Identity assigned by the host before submission
    pub id: Uuid,
    #[serde(default)]
    pub queue_name: String,
    #[serde(default)]
    pub procedure_name: String,
    /// Delay used for the first attempt and as the backoff base
    pub base_delay: i64,
    /// Delay applied to the next scheduling
    pub current_delay: i64,
    pub delay_unit: Option<DelayUnit>,
    /// Attempts already made
    pub retry: i32,
    pub max_retries: i32,
    #[serde(default)]
    pub status: JobStatus,
    /// Owning process instance, only set with cluster support
    #[serde(default)]
    pub instance_index: Option<i32>,
}

impl Job {
    /// New job with a fresh id, no delay and no retries
    pub fn new<Q: Into<String>, P: Into<String>>(queue_name: Q, procedure_name: P) -> Self {
        Self {
            id: Uuid::new_v4(),
            queue_name: queue_name.into(),
            procedure_name: procedure_name.into(),
            base_delay: 0,
            current_delay: 0,
            delay_unit: Some(DelayUnit::Milliseconds),
            retry: 0,
            max_retries: 0,
            status: JobStatus::Created,
            instance_index: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Sets both the base and the current delay
    pub fn with_delay(mut self, delay: i64, unit: DelayUnit) -> Self {
        self.base_delay = delay;
        self.current_delay = delay;
        self.delay_unit = Some(unit);
        self
    }

    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// True once `retry` has reached `max_retries`
    pub fn retries_exhausted(&self) -> bool {
        self.retry >= self.max_retries
    }
}

/// Result reported by a scheduled callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobOutcome {
    Succeeded,
    Failed,
    /// Job was gone or no longer Queued when the delay elapsed
    AlreadyHandled,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Succeeded => "succeeded",
            JobOutcome::Failed => "failed",
            JobOutcome::AlreadyHandled => "already_handled",
        }
    }
}
