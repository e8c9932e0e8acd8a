// crates/server-jobs/src/lib.rs
//! Asynchronous job registry.
//!
//! Provides:
//! - `JobRegistry` - reference-id keyed map of jobs with a bounded worker pool
//! - `Job` - trait implemented by every concrete import/export job
//! - `JobState` - lifecycle state and diagnostics of one job
//! - `JobStatusSnapshot` - status document served to polling clients

pub mod error;
pub mod job;
pub mod registry;
pub mod state;
pub mod types;

pub use error::{JobError, RegistryError};
pub use job::{Job, JobContext};
pub use registry::{JobEntry, JobRegistry, RegistryConfig};
pub use state::JobState;
pub use types::{Artifact, JobOutput, JobStatus, JobStatusSnapshot, RefId, StoredArtifact};
