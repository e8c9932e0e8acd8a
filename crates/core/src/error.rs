// crates/core/src/error.rs
use thiserror::Error;

/// Errors raised by the collaborators behind the job framework
/// (query layer, tag store, transactions, LAF codecs).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Errors resolving or applying a character set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CharsetError {
    #[error("Invalid or unknown encoding requested: {0}")]
    Unknown(String),

    #[error("Encoding {0} can not be used for output")]
    NotWritable(String),

    #[error("Content not representable in {0}")]
    Unmappable(String),

    #[error("File content not in valid {0}")]
    Malformed(String),
}

/// Errors of the export pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Invalid export parameters: {0}")]
    Validation(String),

    /// The message is user-facing; the underlying cause is logged only.
    #[error("{message}")]
    Query {
        message: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed merging sub data: {0}")]
    Merge(String),

    #[error(transparent)]
    Encoding(#[from] CharsetError),

    #[error("Failed writing export data: {0}")]
    Serialize(String),
}

impl ExportError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Wrap a fetch failure into the query-export error clients see.
    pub fn query(source: StoreError) -> Self {
        Self::Query {
            message: "Failed loading query result".to_string(),
            source,
        }
    }
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}

/// Errors that abort a whole import job.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("No valid encoding name given")]
    InvalidEncoding(#[source] CharsetError),

    #[error("No valid file given")]
    NoValidFile,

    #[error("Import failed")]
    Domain(#[source] StoreError),

    #[error("Tagging of imported records failed")]
    Tag(#[source] StoreError),

    #[error("Failed writing import result: {0}")]
    Serialize(#[from] serde_json::Error),
}
