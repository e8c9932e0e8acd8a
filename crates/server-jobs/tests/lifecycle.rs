//! Registry lifecycle against the in-memory collaborators.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lada_core::memory::{CallCounters, InMemoryStore};
use lada_core::store::QueryTools;
use lada_core::{ExportError, UserInfo};
use lada_server_jobs::{
    Job, JobContext, JobError, JobOutput, JobRegistry, JobStatus, RefId, RegistryConfig,
    RegistryError,
};

struct FetchJob {
    owner: UserInfo,
    store: Arc<InMemoryStore>,
}

#[async_trait]
impl Job for FetchJob {
    fn kind(&self) -> &'static str {
        "fetch"
    }

    fn owner(&self) -> &UserInfo {
        &self.owner
    }

    async fn execute(&self, _ctx: &JobContext) -> Result<JobOutput, JobError> {
        let spec = lada_core::params::QuerySpec {
            query_id: None,
            columns: Vec::new(),
        };
        let rows = self.store.fetch(&spec).await.map_err(ExportError::query)?;
        Ok(JobOutput::new(
            rows.len().to_string().into_bytes(),
            "count.txt",
            "text/plain",
        ))
    }
}

fn setup(dir: &tempfile::TempDir) -> (Arc<JobRegistry>, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::demo());
    let registry = JobRegistry::new(
        RegistryConfig {
            worker_pool_size: 2,
            retention: Duration::from_secs(3600),
            reaper_interval: Duration::from_secs(60),
            result_dir: dir.path().join("results"),
        },
        store.clone(),
    );
    (registry, store)
}

#[tokio::test]
async fn polling_observes_forward_transitions_only() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, store) = setup(&dir);
    store.set_delay(Some(Duration::from_millis(50)));
    let alice = UserInfo::new("alice");

    let id = registry
        .submit(Arc::new(FetchJob {
            owner: alice.clone(),
            store: store.clone(),
        }))
        .unwrap();

    let rank = |s: JobStatus| match s {
        JobStatus::Waiting => 0,
        JobStatus::Running => 1,
        JobStatus::Finished | JobStatus::Error => 2,
    };
    let mut seen = Vec::new();
    loop {
        let snap = registry.status(&id, &alice).unwrap();
        if seen.last() != Some(&snap.status) {
            seen.push(snap.status);
        }
        if snap.done {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(seen.windows(2).all(|w| rank(w[0]) < rank(w[1])));
    assert!(seen.contains(&JobStatus::Running));
    assert_eq!(seen.last(), Some(&JobStatus::Finished));

    let artifact = registry.take_result(&id, &alice).await.unwrap();
    assert_eq!(artifact.bytes, b"2");
    assert_eq!(CallCounters::get(&store.calls.begin), 1);
    assert_eq!(CallCounters::get(&store.calls.commit), 1);
    assert_eq!(CallCounters::get(&store.calls.rollback), 0);
}

#[tokio::test]
async fn failed_body_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, store) = setup(&dir);
    store.fail_queries(true);
    let alice = UserInfo::new("alice");

    let id = registry
        .submit(Arc::new(FetchJob {
            owner: alice.clone(),
            store: store.clone(),
        }))
        .unwrap();

    let snap = loop {
        let snap = registry.status(&id, &alice).unwrap();
        if snap.done {
            break snap;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };
    assert_eq!(snap.status, JobStatus::Error);
    assert_eq!(snap.message.as_deref(), Some("Failed loading query result"));
    assert_eq!(CallCounters::get(&store.calls.rollback), 1);
    assert_eq!(CallCounters::get(&store.calls.commit), 0);
}

async fn wait_done(registry: &JobRegistry, id: &RefId, owner: &UserInfo) -> JobStatus {
    loop {
        let snap = registry.status(id, owner).unwrap();
        if snap.done {
            return snap.status;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_downloads_yield_one_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, store) = setup(&dir);
    let alice = UserInfo::new("alice");
    let id = registry
        .submit(Arc::new(FetchJob {
            owner: alice.clone(),
            store,
        }))
        .unwrap();
    assert_eq!(wait_done(&registry, &id, &alice).await, JobStatus::Finished);

    let downloads: Vec<_> = (0..16)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let id = id.clone();
            let alice = alice.clone();
            tokio::spawn(async move { registry.take_result(&id, &alice).await })
        })
        .collect();

    let mut ok = 0;
    let mut not_found = 0;
    for handle in downloads {
        match handle.await.unwrap() {
            Ok(artifact) => {
                assert_eq!(artifact.bytes, b"2");
                ok += 1;
            }
            Err(RegistryError::NotFound(_)) => not_found += 1,
            Err(e) => panic!("unexpected download error: {e}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(not_found, 15);
    assert!(registry.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submits_get_distinct_ref_ids() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, store) = setup(&dir);

    let submits: Vec<_> = (0..64)
        .map(|i| {
            let registry = Arc::clone(&registry);
            let store = store.clone();
            tokio::spawn(async move {
                registry
                    .submit(Arc::new(FetchJob {
                        owner: UserInfo::new(format!("user{}", i % 4)),
                        store,
                    }))
                    .unwrap()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in submits {
        ids.insert(handle.await.unwrap());
    }
    assert_eq!(ids.len(), 64);
    assert_eq!(registry.len(), 64);
    registry.shutdown();
}
