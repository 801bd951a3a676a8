//! Interfaces the host environment implements for the queue core
//!
//! The core never talks to storage, business logic or process metadata
//! directly. Everything goes through these traits so hosts can plug in their
//! own implementations and tests can observe every call.

use super::types::Job;
use anyhow::Result;
use uuid::Uuid;

/// Durable job state owned by the host
#[async_trait::async_trait]
pub trait JobStore: Send + Sync {
    /// Persist all job fields, including status
    async fn commit(&self, job: &Job) -> Result<()>;

    /// Re-acquire the current state of a job, `None` if the host no longer has it
    async fn load(&self, id: Uuid) -> Result<Option<Job>>;
}

/// Name lookup for the procedures jobs can invoke
pub trait ProcedureResolver: Send + Sync {
    fn exists(&self, name: &str) -> bool;

    /// Every known procedure name, used as suggestion candidates
    fn procedure_names(&self) -> Vec<String>;

    /// Closest candidate to `name`, if any is close enough to be a likely typo
    fn closest_match(&self, name: &str, candidates: &[String]) -> Option<String> {
        closest_match(name, candidates)
    }
}

/// Runs a job's named procedure when its delay elapses
#[async_trait::async_trait]
pub trait ProcedureInvoker: Send + Sync {
    async fn invoke(&self, procedure_name: &str, job: &Job) -> Result<()>;
}

/// Sink for validation findings and configuration warnings
pub trait JobLogger: Send + Sync {
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
}

/// Forwards to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingJobLogger;

impl JobLogger for TracingJobLogger {
    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
    }
}

/// Which process instance this is, for cluster deployments
pub trait ClusterIdentity: Send + Sync {
    /// Negative when unavailable
    fn instance_index(&self) -> i64;
    fn cluster_support_enabled(&self) -> bool;
}

/// Receives the session time-zone offset computed at startup
pub trait SessionTimeZone: Send + Sync {
    /// Offset in minutes west of UTC
    fn set_offset_minutes(&self, offset_minutes: i32);
}

/// Smallest Levenshtein distance candidate, accepted when the distance is at
/// most a third of the longer name (and at least 1 edit is always allowed).
pub fn closest_match(name: &str, candidates: &[String]) -> Option<String> {
    if name.is_empty() {
        return None;
    }

    let lowered = name.to_lowercase();
    candidates
        .iter()
        .map(|candidate| {
            let distance = levenshtein_distance(&lowered, &candidate.to_lowercase());
            (distance, candidate)
        })
        .filter(|(distance, candidate)| {
            let longest = name.chars().count().max(candidate.chars().count());
            *distance <= (longest / 3).max(1)
        })
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate.clone())
}

/// Levenshtein distance calculation
fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();
    let len2 = s2_chars.len();

    let mut previous: Vec<usize> = (0..=len2).collect();
    let mut current = vec![0; len2 + 1];

    for (i, c1) in s1_chars.iter().enumerate() {
        current[0] = i + 1;
        for (j, c2) in s2_chars.iter().enumerate() {
            let cost = usize::from(c1 != c2);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[len2]
}
