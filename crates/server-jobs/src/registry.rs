// crates/server-jobs/src/registry.rs
//! Process-wide registry of asynchronous jobs.

use std::any::Any;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use lada_core::store::{Transaction, TransactionManager};
use lada_core::UserInfo;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{JobError, RegistryError};
use crate::job::{Job, JobContext};
use crate::state::JobState;
use crate::types::{Artifact, JobOutput, JobStatus, JobStatusSnapshot, RefId, StoredArtifact};

/// Tunables of the registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of job bodies running at the same time.
    pub worker_pool_size: usize,
    /// How long a terminal job is kept before the reaper drops it.
    pub retention: Duration,
    pub reaper_interval: Duration,
    /// Directory receiving one result file per job.
    pub result_dir: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 4,
            retention: Duration::from_secs(3600),
            reaper_interval: Duration::from_secs(60),
            result_dir: std::env::temp_dir().join("lada-results"),
        }
    }
}

/// A registered job with its state.
pub struct JobEntry {
    pub ref_id: RefId,
    pub state: Arc<JobState>,
    job: Arc<dyn Job>,
    cancel: CancellationToken,
}

impl JobEntry {
    pub fn kind(&self) -> &'static str {
        self.job.kind()
    }

    pub fn owner(&self) -> &UserInfo {
        self.job.owner()
    }
}

/// Registry mapping reference ids to jobs.
///
/// Readers (status polls) share the read lock; submit and remove hold the
/// write lock only for the map update. A semaphore bounds concurrently
/// running job bodies.
pub struct JobRegistry {
    jobs: RwLock<HashMap<RefId, Arc<JobEntry>>>,
    permits: Arc<Semaphore>,
    transactions: Arc<dyn TransactionManager>,
    shutdown: CancellationToken,
    config: RegistryConfig,
}

impl JobRegistry {
    pub fn new(config: RegistryConfig, transactions: Arc<dyn TransactionManager>) -> Arc<Self> {
        let workers = config.worker_pool_size.max(1);
        Arc::new(Self {
            jobs: RwLock::new(HashMap::new()),
            permits: Arc::new(Semaphore::new(workers)),
            transactions,
            shutdown: CancellationToken::new(),
            config,
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register `job` and start its worker. Returns without waiting for it.
    pub fn submit(self: &Arc<Self>, job: Arc<dyn Job>) -> Result<RefId, RegistryError> {
        let entry = {
            let mut jobs = self.jobs.write().map_err(|e| {
                tracing::error!("RwLock poisoned writing jobs map: {e}");
                RegistryError::Unavailable(e.to_string())
            })?;
            let mut ref_id = RefId::generate();
            while jobs.contains_key(&ref_id) {
                ref_id = RefId::generate();
            }
            let entry = Arc::new(JobEntry {
                ref_id: ref_id.clone(),
                state: Arc::new(JobState::new()),
                job,
                cancel: self.shutdown.child_token(),
            });
            jobs.insert(ref_id, Arc::clone(&entry));
            entry
        };

        tracing::info!(
            ref_id = %entry.ref_id,
            kind = entry.kind(),
            owner = %entry.owner().user_id,
            "Job submitted"
        );

        let registry = Arc::clone(self);
        let worker_entry = Arc::clone(&entry);
        tokio::spawn(async move { registry.run(worker_entry).await });

        Ok(entry.ref_id.clone())
    }

    pub fn lookup(&self, ref_id: &RefId) -> Result<Arc<JobEntry>, RegistryError> {
        match self.jobs.read() {
            Ok(jobs) => jobs
                .get(ref_id)
                .cloned()
                .ok_or_else(|| RegistryError::NotFound(ref_id.clone())),
            Err(e) => {
                tracing::error!("RwLock poisoned reading jobs map: {e}");
                Err(RegistryError::Unavailable(e.to_string()))
            }
        }
    }

    fn authorize(entry: &JobEntry, requester: &UserInfo) -> Result<(), RegistryError> {
        if !entry.owner().is_same_user(requester) {
            tracing::warn!(
                ref_id = %entry.ref_id,
                requester = %requester.user_id,
                "Rejected access to job of another user"
            );
            return Err(RegistryError::Forbidden(entry.ref_id.clone()));
        }
        Ok(())
    }

    /// Status snapshot for the job owner.
    pub fn status(
        &self,
        ref_id: &RefId,
        requester: &UserInfo,
    ) -> Result<JobStatusSnapshot, RegistryError> {
        let entry = self.lookup(ref_id)?;
        Self::authorize(&entry, requester)?;
        Ok(entry.state.snapshot())
    }

    /// Claim and read the result of a finished job. The job is evicted, so a
    /// second call yields [`RegistryError::NotFound`].
    pub async fn take_result(
        &self,
        ref_id: &RefId,
        requester: &UserInfo,
    ) -> Result<Artifact, RegistryError> {
        let entry = {
            let mut jobs = self.jobs.write().map_err(|e| {
                tracing::error!("RwLock poisoned writing jobs map: {e}");
                RegistryError::Unavailable(e.to_string())
            })?;
            let entry = jobs
                .get(ref_id)
                .ok_or_else(|| RegistryError::NotFound(ref_id.clone()))?;
            Self::authorize(entry, requester)?;
            let status = entry.state.status();
            if status != JobStatus::Finished {
                return Err(RegistryError::NotReady {
                    ref_id: ref_id.clone(),
                    status,
                });
            }
            jobs.remove(ref_id)
                .ok_or_else(|| RegistryError::NotFound(ref_id.clone()))?
        };

        let stored = entry
            .state
            .artifact()
            .ok_or_else(|| RegistryError::ArtifactUnreadable {
                ref_id: ref_id.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no result stored"),
            })?;
        let bytes = tokio::fs::read(&stored.path).await.map_err(|source| {
            tracing::error!(ref_id = %ref_id, error = %source, "Failed reading job result");
            RegistryError::ArtifactUnreadable {
                ref_id: ref_id.clone(),
                source,
            }
        })?;
        remove_file(&stored.path).await;

        tracing::info!(ref_id = %ref_id, kind = entry.kind(), "Job result downloaded");
        Ok(Artifact {
            bytes,
            filename: stored.filename,
            content_type: stored.content_type,
        })
    }

    /// Evict a job. Cancels a running body, runs the job's cleanup and
    /// deletes its stored result. Unknown ids are ignored.
    pub async fn remove(&self, ref_id: &RefId) {
        let entry = match self.jobs.write() {
            Ok(mut jobs) => jobs.remove(ref_id),
            Err(e) => {
                tracing::error!("RwLock poisoned writing jobs map: {e}");
                None
            }
        };
        let Some(entry) = entry else {
            return;
        };

        entry.cancel.cancel();
        entry.job.cleanup();
        if let Some(stored) = entry.state.artifact() {
            remove_file(&stored.path).await;
        }
        tracing::info!(ref_id = %ref_id, kind = entry.kind(), "Job evicted");
    }

    /// Drop jobs that have been terminal for longer than the retention window.
    /// Returns the number of evicted jobs.
    pub async fn evict_expired(&self) -> usize {
        let retention = self.config.retention;
        let expired: Vec<RefId> = match self.jobs.read() {
            Ok(jobs) => jobs
                .values()
                .filter(|entry| {
                    entry
                        .state
                        .done_at()
                        .is_some_and(|at| at.elapsed() > retention)
                })
                .map(|entry| entry.ref_id.clone())
                .collect(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading jobs map: {e}");
                Vec::new()
            }
        };

        for ref_id in &expired {
            self.remove(ref_id).await;
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Evicted expired jobs");
        }
        expired.len()
    }

    /// Periodically evict expired jobs until [`JobRegistry::shutdown`].
    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(registry.config.reaper_interval);
            loop {
                tokio::select! {
                    _ = registry.shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        registry.evict_expired().await;
                    }
                }
            }
        })
    }

    /// Cancel every live job and stop the reaper.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down job registry");
        self.shutdown.cancel();
    }

    /// Number of registered jobs.
    pub fn len(&self) -> usize {
        self.jobs.read().map(|jobs| jobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn run(self: Arc<Self>, entry: Arc<JobEntry>) {
        let permit = tokio::select! {
            biased;
            _ = entry.cancel.cancelled() => None,
            permit = Arc::clone(&self.permits).acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            entry.state.fail(JobError::Cancelled.to_string());
            tracing::info!(ref_id = %entry.ref_id, kind = entry.kind(), "Job cancelled before start");
            return;
        };

        if !entry.state.set_running() {
            return;
        }
        tracing::info!(ref_id = %entry.ref_id, kind = entry.kind(), "Job running");

        let result = self.execute(&entry).await;
        drop(permit);

        match result {
            Ok(stored) => {
                let path = stored.path.clone();
                let finished = entry.state.finish(stored);
                if finished {
                    tracing::info!(ref_id = %entry.ref_id, kind = entry.kind(), "Job finished");
                }
                // Evicted while finishing: nobody will download or reap the file.
                if !finished || self.lookup(&entry.ref_id).is_err() {
                    remove_file(&path).await;
                }
            }
            Err(e) => {
                tracing::warn!(
                    ref_id = %entry.ref_id,
                    kind = entry.kind(),
                    error = %e,
                    "Job failed"
                );
                entry.state.fail(e.to_string());
            }
        }
    }

    /// Run the body once inside a transaction. Panics in the body surface as
    /// [`JobError::Panicked`].
    async fn execute(&self, entry: &JobEntry) -> Result<StoredArtifact, JobError> {
        let tx = self
            .transactions
            .begin()
            .await
            .map_err(JobError::Transaction)?;

        let ctx = JobContext::new(
            entry.ref_id.clone(),
            Arc::clone(&entry.state),
            entry.cancel.clone(),
            Arc::clone(&self.transactions),
        );
        let job = Arc::clone(&entry.job);
        let mut body = tokio::spawn(async move { job.execute(&ctx).await });

        let outcome = tokio::select! {
            joined = &mut body => match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(JobError::Panicked(panic_message(e.into_panic()))),
                Err(_) => Err(JobError::Cancelled),
            },
            _ = entry.cancel.cancelled() => {
                body.abort();
                Err(JobError::Cancelled)
            }
        };

        let output = match outcome {
            Ok(output) if !entry.cancel.is_cancelled() => output,
            Ok(_) => return Err(self.abort(entry, tx, JobError::Cancelled).await),
            Err(e) => return Err(self.abort(entry, tx, e).await),
        };

        // The result file must exist before the writes become visible.
        let stored = match self.store(&entry.ref_id, output).await {
            Ok(stored) => stored,
            Err(e) => return Err(self.abort(entry, tx, e).await),
        };
        if let Err(e) = tx.commit().await {
            remove_file(&stored.path).await;
            return Err(JobError::Transaction(e));
        }
        Ok(stored)
    }

    async fn abort(&self, entry: &JobEntry, tx: Box<dyn Transaction>, error: JobError) -> JobError {
        if let Err(rollback) = tx.rollback().await {
            tracing::error!(ref_id = %entry.ref_id, error = %rollback, "Rollback failed");
        }
        error
    }

    async fn store(&self, ref_id: &RefId, output: JobOutput) -> Result<StoredArtifact, JobError> {
        tokio::fs::create_dir_all(&self.config.result_dir)
            .await
            .map_err(JobError::ResultStorage)?;
        let path = self.config.result_dir.join(ref_id.as_str());
        tokio::fs::write(&path, &output.bytes)
            .await
            .map_err(JobError::ResultStorage)?;
        Ok(StoredArtifact {
            path,
            filename: output.filename,
            content_type: output.content_type,
        })
    }
}

async fn remove_file(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed deleting job result");
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
