// crates/server-jobs/src/job.rs
//! The unit of asynchronous work and the context it runs in.

use std::sync::Arc;

use async_trait::async_trait;
use lada_core::diagnostics::{Diagnostics, ReportItem, Severity};
use lada_core::store::TransactionManager;
use lada_core::UserInfo;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;
use crate::state::JobState;
use crate::types::{JobOutput, RefId};

/// A unit of asynchronous work.
///
/// The registry owns the lifecycle: it runs [`Job::execute`] at most once,
/// inside a transaction, and stores the returned output.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Short name used in logs (`csv-export`, `laf-import`, ...).
    fn kind(&self) -> &'static str;

    /// Identity captured at creation.
    fn owner(&self) -> &UserInfo;

    async fn execute(&self, ctx: &JobContext) -> Result<JobOutput, JobError>;

    /// Release job-held resources when the job is evicted without download.
    fn cleanup(&self) {}
}

/// Handle a running job body uses to report progress.
#[derive(Clone)]
pub struct JobContext {
    ref_id: RefId,
    state: Arc<JobState>,
    cancel: CancellationToken,
    transactions: Arc<dyn TransactionManager>,
}

impl JobContext {
    pub(crate) fn new(
        ref_id: RefId,
        state: Arc<JobState>,
        cancel: CancellationToken,
        transactions: Arc<dyn TransactionManager>,
    ) -> Self {
        Self {
            ref_id,
            state,
            cancel,
            transactions,
        }
    }

    pub fn ref_id(&self) -> &RefId {
        &self.ref_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fails with [`JobError::Cancelled`] once the job was cancelled.
    pub fn check_cancelled(&self) -> Result<(), JobError> {
        if self.cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        Ok(())
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.state.set_message(message);
    }

    pub fn report(&self, severity: Severity, owner: impl Into<String>, item: ReportItem) {
        self.state.push_diagnostic(severity, owner, item);
    }

    pub fn report_all(&self, severity: Severity, diagnostics: &Diagnostics) {
        self.state.extend_diagnostics(severity, diagnostics);
    }

    /// Transaction manager for writes that need their own unit of work.
    pub fn transactions(&self) -> &Arc<dyn TransactionManager> {
        &self.transactions
    }
}
