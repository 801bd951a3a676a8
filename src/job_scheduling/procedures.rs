//! In-process procedure table
//!
//! A ready-made [`ProcedureResolver`] + [`ProcedureInvoker`] for hosts whose
//! procedures are plain async functions registered at startup.

use super::collaborators::{ProcedureInvoker, ProcedureResolver};
use super::types::Job;
use anyhow::{Result, anyhow};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

type Procedure = Arc<dyn Fn(Job) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Named async procedures, registered before the table is shared
#[derive(Default, Clone)]
pub struct ProcedureTable {
    procedures: HashMap<String, Procedure>,
}

impl ProcedureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `procedure` under `name`, replacing any previous registration
    pub fn register<N, F, Fut>(&mut self, name: N, procedure: F) -> &mut Self
    where
        N: Into<String>,
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let procedure: Procedure = Arc::new(move |job| Box::pin(procedure(job)));
        self.procedures.insert(name.into(), procedure);
        self
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}

impl std::fmt::Debug for ProcedureTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcedureTable")
            .field("procedures", &self.procedure_names())
            .finish()
    }
}

impl ProcedureResolver for ProcedureTable {
    fn exists(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    fn procedure_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.procedures.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait::async_trait]
impl ProcedureInvoker for ProcedureTable {
    async fn invoke(&self, procedure_name: &str, job: &Job) -> Result<()> {
        let procedure = self
            .procedures
            .get(procedure_name)
            .cloned()
            .ok_or_else(|| anyhow!("Procedure {procedure_name} is not registered"))?;
        procedure(job.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_register_and_invoke() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut table = ProcedureTable::new();
        table
            .register("SendEmail", move |_job| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .register("AlwaysFails", |job: Job| async move {
                Err(anyhow!("job {} failed", job.id))
            });

        assert!(table.exists("SendEmail"));
        assert!(!table.exists("sendemail"));
        assert_eq!(table.procedure_names(), vec!["AlwaysFails", "SendEmail"]);

        let job = Job::new("Default", "SendEmail");
        table.invoke("SendEmail", &job).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(table.invoke("AlwaysFails", &job).await.is_err());
        assert!(table.invoke("Missing", &job).await.is_err());
    }

    #[test]
    fn test_suggestions_use_registered_names() {
        let mut table = ProcedureTable::new();
        table.register("GenerateReport", |_job| async { Ok(()) });

        let candidates = table.procedure_names();
        assert_eq!(
            table.closest_match("GenerateRepot", &candidates).as_deref(),
            Some("GenerateReport")
        );
    }
}
