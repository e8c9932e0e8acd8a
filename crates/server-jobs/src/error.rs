// crates/server-jobs/src/error.rs
use lada_core::{CharsetError, ExportError, ImportError, StoreError};
use thiserror::Error;

use crate::types::{JobStatus, RefId};

/// Failure of a job body or of the worker running it. The display string
/// becomes the job's status message.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Charset(#[from] CharsetError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cancelled")]
    Cancelled,

    #[error("Job aborted unexpectedly: {0}")]
    Panicked(String),

    #[error("Failed storing job result: {0}")]
    ResultStorage(#[source] std::io::Error),

    #[error("Transaction failed: {0}")]
    Transaction(#[source] StoreError),
}

/// Errors of registry lookups and downloads.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No job found for reference id {0}")]
    NotFound(RefId),

    #[error("Job {0} belongs to another user")]
    Forbidden(RefId),

    #[error("Job {ref_id} is {status}")]
    NotReady { ref_id: RefId, status: JobStatus },

    #[error("Result of job {ref_id} could not be read: {source}")]
    ArtifactUnreadable {
        ref_id: RefId,
        #[source]
        source: std::io::Error,
    },

    #[error("Job registry unavailable: {0}")]
    Unavailable(String),
}
