use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::import::job::{ImportJob, JobId};

/// Live state of one tracked job.
///
/// The processing task is the only writer of `state`; pollers clone the
/// current value, so every read is a whole snapshot.
#[derive(Debug)]
pub struct JobEntry {
    state: watch::Sender<ImportJob>,
    cancel: CancellationToken,
}

impl JobEntry {
    fn new(job: ImportJob) -> Self {
        let (state, _) = watch::channel(job);
        JobEntry {
            state,
            cancel: CancellationToken::new(),
        }
    }

    pub fn snapshot(&self) -> ImportJob {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ImportJob> {
        self.state.subscribe()
    }

    /// Apply `f` to the job and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut ImportJob)) {
        self.state.send_modify(f);
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Job id -> live job state.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, Arc<JobEntry>>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        JobRegistry::default()
    }

    pub async fn insert(&self, job: ImportJob) -> Arc<JobEntry> {
        let id = job.id;
        let entry = Arc::new(JobEntry::new(job));
        self.jobs.write().await.insert(id, Arc::clone(&entry));
        entry
    }

    pub async fn get(&self, id: &JobId) -> Option<Arc<JobEntry>> {
        self.jobs.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &JobId) -> Option<Arc<JobEntry>> {
        self.jobs.write().await.remove(id)
    }

    /// Remove every job that includes `path`; returns the removed entries.
    pub async fn remove_by_file(&self, path: &str) -> Vec<Arc<JobEntry>> {
        let mut jobs = self.jobs.write().await;
        let ids: Vec<JobId> = jobs
            .iter()
            .filter(|(_, entry)| entry.state.borrow().involves_file(path))
            .map(|(id, _)| *id)
            .collect();
        ids.iter().filter_map(|id| jobs.remove(id)).collect()
    }

    /// Snapshots of every tracked job, oldest first.
    pub async fn snapshots(&self) -> Vec<ImportJob> {
        let mut jobs: Vec<ImportJob> = self
            .jobs
            .read()
            .await
            .values()
            .map(|entry| entry.snapshot())
            .collect();
        jobs.sort_by_key(|j| j.started_at);
        jobs
    }
}
