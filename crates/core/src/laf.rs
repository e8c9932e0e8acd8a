// crates/core/src/laf.rs
//! LAF codec collaborators. Parsing and serializing the format itself is
//! done elsewhere; the jobs only drive these traits.

use async_trait::async_trait;

use crate::diagnostics::{contains_item_key, Diagnostics};
use crate::error::StoreError;
use crate::store::{Facility, ImportConfig};
use crate::user::UserInfo;

/// Item keys that mark a file as failed even when the importer returns.
pub const FATAL_ITEM_KEYS: [&str; 2] = ["validation#probe", "Parser"];

/// Outcome of importing one LAF document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub errors: Diagnostics,
    pub warnings: Diagnostics,
    pub notifications: Diagnostics,
    /// Ids of samples created or updated by this document.
    pub imported_ids: Vec<i64>,
}

impl ImportReport {
    pub fn is_success(&self) -> bool {
        !contains_item_key(&self.errors, &FATAL_ITEM_KEYS)
    }
}

#[async_trait]
pub trait LafImporter: Send + Sync {
    async fn import(
        &self,
        content: &str,
        user: &UserInfo,
        facility: &Facility,
        config: &[ImportConfig],
    ) -> Result<ImportReport, StoreError>;
}

#[async_trait]
pub trait LafExporter: Send + Sync {
    /// Render the given samples and measurements as one LAF document.
    async fn export(
        &self,
        probe_ids: &[i64],
        messung_ids: &[i64],
        user: &UserInfo,
    ) -> Result<String, StoreError>;
}
