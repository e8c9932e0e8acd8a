// crates/core/src/store.rs
//! Collaborator interfaces of the persistence layer.
//!
//! Implementations live outside this workspace apart from the in-memory
//! doubles in [`crate::memory`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::params::{ChildKind, QuerySpec};
use crate::record::Record;

/// Runs a stored query with the client's column filters applied.
#[async_trait]
pub trait QueryTools: Send + Sync {
    /// Fetch the primary records for `spec`, in query order.
    async fn fetch(&self, spec: &QuerySpec) -> Result<Vec<Record>, StoreError>;
}

/// Loads child records of a fixed kind.
#[async_trait]
pub trait SubDataSource: Send + Sync {
    /// Children whose link field is one of `parent_ids`.
    async fn fetch_children(
        &self,
        kind: ChildKind,
        parent_ids: &[String],
    ) -> Result<Vec<Record>, StoreError>;
}

/// A tag attached to imported records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub network_id: String,
}

#[async_trait]
pub trait TagStore: Send + Sync {
    /// Create a new tag named from `prefix` for a measurement network.
    async fn generate_tag(&self, prefix: &str, network_id: &str) -> Result<Tag, StoreError>;

    /// Attach `tag` to every sample in `probe_ids`.
    async fn assign(&self, tag: &Tag, probe_ids: &[i64]) -> Result<(), StoreError>;
}

/// A measurement facility ("Messstelle").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub id: String,
    pub network_id: String,
}

/// Per-facility import rule applied by the LAF importer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportConfig {
    pub name: String,
    pub attribute: String,
    pub action: String,
    #[serde(default)]
    pub from_val: Option<String>,
    #[serde(default)]
    pub to_val: Option<String>,
}

#[async_trait]
pub trait FacilityDirectory: Send + Sync {
    async fn lookup(&self, facility_id: &str) -> Result<Option<Facility>, StoreError>;

    async fn import_config(&self, facility_id: &str) -> Result<Vec<ImportConfig>, StoreError>;
}

/// An open unit of work. Consumed by commit or rollback.
#[async_trait]
pub trait Transaction: Send {
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TransactionManager: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;
}

/// Transaction manager for read-only collaborators.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTransactions;

struct NoopTransaction;

#[async_trait]
impl Transaction for NoopTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl TransactionManager for NoTransactions {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        Ok(Box::new(NoopTransaction))
    }
}
