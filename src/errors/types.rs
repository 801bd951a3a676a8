//! Error type definitions for delayq

use crate::job_scheduling::QueueState;
use thiserror::Error;
use uuid::Uuid;

/// A delay unit label that does not map to a concrete duration unit
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown time unit '{label}'")]
pub struct UnknownUnit {
    pub label: String,
}

/// Errors returned when admitting a job to a queue
#[derive(Error, Debug)]
pub enum SubmitError {
    /// Job fields failed validation; the reason was already logged
    #[error("Job {job_id} is not added, because it could not be validated.")]
    Validation { job_id: Uuid },

    /// Queue disappeared between validation and scheduling
    #[error("Queue with name {queue} could not be found. Job has not been added.")]
    QueueNotFound { queue: String },

    /// Queue is shutting down or terminated
    #[error("Queue with name {queue} has already been shut down or terminated ({state}). Job has not been added.")]
    QueueUnavailable { queue: String, state: QueueState },

    /// Host store refused to persist the queued job
    #[error("Could not commit job {job_id}: {source}")]
    Commit {
        job_id: Uuid,
        #[source]
        source: anyhow::Error,
    },

    /// Delay unit could not be resolved
    #[error(transparent)]
    UnknownUnit(#[from] UnknownUnit),
}

/// Fieldless discriminant of [`SubmitError`] for branching and metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmitErrorKind {
    Validation,
    QueueNotFound,
    QueueUnavailable,
    Commit,
    UnknownUnit,
}

impl SubmitErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitErrorKind::Validation => "validation",
            SubmitErrorKind::QueueNotFound => "queue_not_found",
            SubmitErrorKind::QueueUnavailable => "queue_unavailable",
            SubmitErrorKind::Commit => "commit",
            SubmitErrorKind::UnknownUnit => "unknown_unit",
        }
    }
}

impl SubmitError {
    pub fn kind(&self) -> SubmitErrorKind {
        match self {
            SubmitError::Validation { .. } => SubmitErrorKind::Validation,
            SubmitError::QueueNotFound { .. } => SubmitErrorKind::QueueNotFound,
            SubmitError::QueueUnavailable { .. } => SubmitErrorKind::QueueUnavailable,
            SubmitError::Commit { .. } => SubmitErrorKind::Commit,
            SubmitError::UnknownUnit(_) => SubmitErrorKind::UnknownUnit,
        }
    }
}

/// Errors raised by a queue when asked to schedule work
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    #[error("Queue '{queue}' is not accepting new jobs (state: {state})")]
    QueueUnavailable { queue: String, state: QueueState },
}

impl From<SchedulingError> for SubmitError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::QueueUnavailable { queue, state } => {
                SubmitError::QueueUnavailable { queue, state }
            }
        }
    }
}

/// Queue registration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Queue with name '{name}' is already registered")]
    DuplicateQueue { name: String },

    #[error("Queue '{name}' must have a concurrency of at least 1")]
    InvalidConcurrency { name: String },
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}
