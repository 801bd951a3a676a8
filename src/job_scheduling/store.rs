//! In-memory job store

use super::collaborators::JobStore;
use super::types::{Job, JobStatus};
use anyhow::Result;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Keeps committed jobs in a map; useful for embedding and tests
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    pub async fn status(&self, id: Uuid) -> Option<JobStatus> {
        self.jobs.read().await.get(&id).map(|job| job.status)
    }

    pub async fn remove(&self, id: Uuid) -> Option<Job> {
        self.jobs.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl JobStore for InMemoryJobStore {
    async fn commit(&self, job: &Job) -> Result<()> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.get(id).await)
    }
}
