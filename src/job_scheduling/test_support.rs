//! Recording collaborators shared by the unit tests

use super::collaborators::{JobLogger, JobStore, ProcedureResolver, SessionTimeZone};
use super::types::Job;
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct RecordingLogger {
    errors: Mutex<Vec<String>>,
    warnings: Mutex<Vec<String>>,
}

impl RecordingLogger {
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }
}

impl JobLogger for RecordingLogger {
    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn warn(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }
}

#[derive(Debug, Default)]
pub struct StubResolver {
    names: Vec<String>,
    exists_calls: AtomicUsize,
}

impl StubResolver {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|name| name.to_string()).collect(),
            exists_calls: AtomicUsize::new(0),
        }
    }

    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }
}

impl ProcedureResolver for StubResolver {
    fn exists(&self, name: &str) -> bool {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.names.iter().any(|candidate| candidate == name)
    }

    fn procedure_names(&self) -> Vec<String> {
        self.names.clone()
    }
}

/// Keeps every committed snapshot, optionally failing commits
#[derive(Debug, Default)]
pub struct RecordingStore {
    commits: Mutex<Vec<Job>>,
    latest: Mutex<HashMap<Uuid, Job>>,
    fail_commits: AtomicBool,
}

impl RecordingStore {
    pub fn failing() -> Self {
        let store = Self::default();
        store.fail_commits.store(true, Ordering::SeqCst);
        store
    }

    pub fn commits(&self) -> Vec<Job> {
        self.commits.lock().unwrap().clone()
    }

    pub fn latest(&self, id: Uuid) -> Option<Job> {
        self.latest.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait::async_trait]
impl JobStore for RecordingStore {
    async fn commit(&self, job: &Job) -> Result<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(anyhow!("store is read-only"));
        }
        self.commits.lock().unwrap().push(job.clone());
        self.latest.lock().unwrap().insert(job.id, job.clone());
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.latest(id))
    }
}

/// Commits only after `delay`, signalling when a commit has started
#[derive(Debug)]
pub struct SlowStore {
    pub recorded: RecordingStore,
    delay: Duration,
    entered: Notify,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            recorded: RecordingStore::default(),
            delay,
            entered: Notify::new(),
        }
    }

    pub async fn commit_started(&self) {
        self.entered.notified().await;
    }
}

#[async_trait::async_trait]
impl JobStore for SlowStore {
    async fn commit(&self, job: &Job) -> Result<()> {
        self.entered.notify_one();
        tokio::time::sleep(self.delay).await;
        self.recorded.commit(job).await
    }

    async fn load(&self, id: Uuid) -> Result<Option<Job>> {
        self.recorded.load(id).await
    }
}

#[derive(Debug, Default)]
pub struct RecordingSession {
    offsets: Mutex<Vec<i32>>,
}

impl RecordingSession {
    pub fn offsets(&self) -> Vec<i32> {
        self.offsets.lock().unwrap().clone()
    }
}

impl SessionTimeZone for RecordingSession {
    fn set_offset_minutes(&self, offset_minutes: i32) {
        self.offsets.lock().unwrap().push(offset_minutes);
    }
}
