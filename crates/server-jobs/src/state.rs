// crates/server-jobs/src/state.rs
//! Lifecycle state of a single job.

use std::sync::RwLock;

use lada_core::diagnostics::{Diagnostics, JobDiagnostics, ReportItem, Severity};
use tokio::time::Instant;

use crate::types::{JobStatus, JobStatusSnapshot, StoredArtifact};

struct Inner {
    status: JobStatus,
    message: Option<String>,
    diagnostics: JobDiagnostics,
    artifact: Option<StoredArtifact>,
    done_at: Option<Instant>,
}

/// State of one job.
///
/// Status, message and diagnostics share one lock so a snapshot is never
/// torn. Only the job's own worker writes; the lock is never held across an
/// await point.
pub struct JobState {
    inner: RwLock<Inner>,
}

impl JobState {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                status: JobStatus::Waiting,
                message: None,
                diagnostics: JobDiagnostics::default(),
                artifact: None,
                done_at: None,
            }),
        }
    }

    fn write<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Option<R> {
        match self.inner.write() {
            Ok(mut guard) => Some(f(&mut guard)),
            Err(e) => {
                tracing::error!("RwLock poisoned writing job state: {e}");
                None
            }
        }
    }

    fn read<R>(&self, f: impl FnOnce(&Inner) -> R) -> Option<R> {
        match self.inner.read() {
            Ok(guard) => Some(f(&guard)),
            Err(e) => {
                tracing::error!("RwLock poisoned reading job state: {e}");
                None
            }
        }
    }

    /// `Waiting -> Running`. Returns false if the job was not waiting.
    pub fn set_running(&self) -> bool {
        self.write(|inner| {
            if inner.status != JobStatus::Waiting {
                return false;
            }
            inner.status = JobStatus::Running;
            true
        })
        .unwrap_or(false)
    }

    /// `Running -> Finished` with the stored result.
    pub fn finish(&self, artifact: StoredArtifact) -> bool {
        self.write(|inner| {
            if inner.status != JobStatus::Running {
                return false;
            }
            inner.status = JobStatus::Finished;
            inner.artifact = Some(artifact);
            inner.done_at = Some(Instant::now());
            true
        })
        .unwrap_or(false)
    }

    /// `Waiting | Running -> Error`. Diagnostics recorded so far are kept.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        self.write(|inner| {
            if inner.status.is_done() {
                return false;
            }
            inner.status = JobStatus::Error;
            inner.message = Some(message);
            inner.done_at = Some(Instant::now());
            true
        })
        .unwrap_or(false)
    }

    /// Informational message shown while the job is still alive.
    pub fn set_message(&self, message: impl Into<String>) {
        let message = message.into();
        self.write(|inner| {
            if !inner.status.is_done() {
                inner.message = Some(message);
            }
        });
    }

    pub fn push_diagnostic(&self, severity: Severity, owner: impl Into<String>, item: ReportItem) {
        let owner = owner.into();
        self.write(|inner| {
            if !inner.status.is_done() {
                inner.diagnostics.push(severity, owner, item);
            }
        });
    }

    pub fn extend_diagnostics(&self, severity: Severity, diagnostics: &Diagnostics) {
        self.write(|inner| {
            if !inner.status.is_done() {
                inner.diagnostics.extend(severity, diagnostics);
            }
        });
    }

    pub fn status(&self) -> JobStatus {
        self.read(|inner| inner.status).unwrap_or(JobStatus::Error)
    }

    pub fn snapshot(&self) -> JobStatusSnapshot {
        self.read(|inner| JobStatusSnapshot {
            done: inner.status.is_done(),
            status: inner.status,
            message: inner.message.clone(),
            errors: inner.diagnostics.has(Severity::Error),
            warnings: inner.diagnostics.has(Severity::Warning),
            notifications: inner.diagnostics.has(Severity::Notification),
        })
        .unwrap_or(JobStatusSnapshot {
            done: true,
            status: JobStatus::Error,
            message: Some("Job state unavailable".to_string()),
            errors: false,
            warnings: false,
            notifications: false,
        })
    }

    pub fn diagnostics(&self) -> JobDiagnostics {
        self.read(|inner| inner.diagnostics.clone()).unwrap_or_default()
    }

    pub fn artifact(&self) -> Option<StoredArtifact> {
        self.read(|inner| inner.artifact.clone()).flatten()
    }

    /// Instant of the terminal transition, if any.
    pub fn done_at(&self) -> Option<Instant> {
        self.read(|inner| inner.done_at).flatten()
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn artifact() -> StoredArtifact {
        StoredArtifact {
            path: PathBuf::from("/tmp/x"),
            filename: "export.csv".into(),
            content_type: "text/csv".into(),
        }
    }

    #[test]
    fn test_lifecycle() {
        let state = JobState::new();
        let snap = state.snapshot();
        assert_eq!(snap.status, JobStatus::Waiting);
        assert!(!snap.done);

        assert!(state.set_running());
        assert_eq!(state.status(), JobStatus::Running);

        assert!(state.finish(artifact()));
        let snap = state.snapshot();
        assert!(snap.done);
        assert_eq!(snap.status, JobStatus::Finished);
        assert!(state.done_at().is_some());
        assert_eq!(state.artifact().unwrap().filename, "export.csv");
    }

    #[test]
    fn test_transitions_never_go_backwards() {
        let state = JobState::new();
        assert!(!state.finish(artifact()));
        state.set_running();
        assert!(!state.set_running());
        assert!(state.fail("boom"));
        assert!(!state.finish(artifact()));
        assert!(!state.fail("again"));
        assert_eq!(state.snapshot().message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_waiting_job_can_fail() {
        let state = JobState::new();
        assert!(state.fail("cancelled"));
        assert_eq!(state.status(), JobStatus::Error);
    }

    #[test]
    fn test_diagnostics_kept_on_failure_and_frozen_after() {
        let state = JobState::new();
        state.set_running();
        state.push_diagnostic(Severity::Warning, "a.laf", ReportItem::new("ort", "x", 631));
        state.fail("boom");
        state.push_diagnostic(Severity::Error, "a.laf", ReportItem::new("late", "x", 1));

        let snap = state.snapshot();
        assert!(snap.warnings);
        assert!(!snap.errors);
        assert_eq!(state.diagnostics().warnings["a.laf"].len(), 1);
    }
}
