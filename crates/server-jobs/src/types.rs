// crates/server-jobs/src/types.rs
//! Types for the asynchronous job registry.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Opaque reference id handed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RefId(String);

impl RefId {
    pub fn generate() -> Self {
        RefId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RefId {
    fn from(s: String) -> Self {
        RefId(s)
    }
}

impl From<&str> for RefId {
    fn from(s: &str) -> Self {
        RefId(s.to_string())
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a job. Transitions only move forward:
/// `Waiting -> Running -> Finished | Error`, or `Waiting -> Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Running,
    Finished,
    Error,
}

impl JobStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result produced by a job body, before the registry stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutput {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

impl JobOutput {
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            filename: filename.into(),
            content_type: content_type.into(),
        }
    }
}

/// A job result written to the result directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub path: PathBuf,
    pub filename: String,
    pub content_type: String,
}

/// A claimed result, read back for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

/// Status document returned to polling clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatusSnapshot {
    pub done: bool,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub errors: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub warnings: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub notifications: bool,
}
