//! Admission checks for jobs

use super::collaborators::{JobLogger, ProcedureResolver};
use super::queue_registry::QueueRegistry;
use super::types::Job;
use std::sync::Arc;

/// Validates a job's fields before it is admitted to a queue.
///
/// Checks run in a fixed order and stop at the first failure, which is
/// reported through the [`JobLogger`] as exactly one `error` call. The
/// validator itself only ever answers yes or no.
#[derive(Clone)]
pub struct JobValidator {
    logger: Arc<dyn JobLogger>,
    resolver: Arc<dyn ProcedureResolver>,
}

impl JobValidator {
    pub fn new(logger: Arc<dyn JobLogger>, resolver: Arc<dyn ProcedureResolver>) -> Self {
        Self { logger, resolver }
    }

    pub fn is_valid(&self, registry: &QueueRegistry, job: &Job) -> bool {
        match self.first_violation(registry, job) {
            Some(message) => {
                self.logger.error(&message);
                false
            }
            None => true,
        }
    }

    fn first_violation(&self, registry: &QueueRegistry, job: &Job) -> Option<String> {
        let queue_name = job.queue_name.as_str();
        if queue_name.trim().is_empty() {
            return Some("Queue is missing in Job object.".to_string());
        }

        if !registry.contains(queue_name) {
            return Some(format!(
                "Queue with name {queue_name} has not been initialized."
            ));
        }

        let procedure_name = job.procedure_name.as_str();
        if procedure_name.trim().is_empty() {
            return Some("ProcedureName is missing in Job object.".to_string());
        }

        if !self.resolver.exists(procedure_name) {
            return Some(self.unknown_procedure_message(procedure_name));
        }

        if job.retry < 0 {
            return Some(format!(
                "Retry of {} is invalid and should be a number larger than or equal to 0.",
                job.retry
            ));
        }

        if job.delay_unit.is_none() {
            return Some("DelayUnit cannot be empty.".to_string());
        }

        if job.max_retries < 0 {
            return Some(format!(
                "MaxRetries of {} is invalid and should be a number larger than or equal to 0.",
                job.max_retries
            ));
        }

        if job.current_delay < 0 {
            return Some(format!(
                "CurrentDelay of {} is invalid and should be a number larger than or equal to 0.",
                job.current_delay
            ));
        }

        if job.base_delay < 0 {
            return Some(format!(
                "BaseDelay of {} is invalid and should be a number larger than or equal to 0.",
                job.base_delay
            ));
        }

        None
    }

    fn unknown_procedure_message(&self, procedure_name: &str) -> String {
        let candidates = self.resolver.procedure_names();
        match self
            .resolver
            .closest_match(procedure_name, &candidates)
            .filter(|suggestion| !suggestion.is_empty())
        {
            Some(suggestion) => format!(
                "Procedure {procedure_name} does not exist, did you mean {suggestion}?"
            ),
            None => format!("Procedure {procedure_name} does not exist."),
        }
    }
}

impl std::fmt::Debug for JobValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobValidator").finish_non_exhaustive()
    }
}
