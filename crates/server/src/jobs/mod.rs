// crates/server/src/jobs/mod.rs
//! Concrete import and export jobs.
//!
//! Provides:
//! - `CsvExportJob`, `JsonExportJob` - query exports sharing `QueryExport`
//! - `LafExportJob` - LAF rendering of selected samples and measurements
//! - `LafImportJob` - multi-file LAF import with tagging
//! - `Collaborators` - the persistence interfaces the jobs are built with

pub mod export;
pub mod import;

use std::sync::Arc;

use lada_core::laf::{LafExporter, LafImporter};
use lada_core::memory::InMemoryStore;
use lada_core::store::{FacilityDirectory, QueryTools, SubDataSource, TagStore, TransactionManager};

pub use export::{CsvExportJob, ExportBase, JsonExportJob, LafExportJob, QueryExport};
pub use import::{FileReport, ImportRequest, LafImportJob};

/// Job kinds served by the export endpoints.
pub const EXPORT_KINDS: &[&str] = &[
    export::csv::KIND,
    export::json::KIND,
    export::laf::KIND,
];

/// Job kinds served by the import endpoints.
pub const IMPORT_KINDS: &[&str] = &[import::KIND];

/// Persistence collaborators shared by all jobs.
#[derive(Clone)]
pub struct Collaborators {
    pub queries: Arc<dyn QueryTools>,
    pub sub_data: Arc<dyn SubDataSource>,
    pub laf_exporter: Arc<dyn LafExporter>,
    pub laf_importer: Arc<dyn LafImporter>,
    pub tags: Arc<dyn TagStore>,
    pub facilities: Arc<dyn FacilityDirectory>,
    pub transactions: Arc<dyn TransactionManager>,
}

impl Collaborators {
    /// Every collaborator backed by the same in-memory store.
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            queries: store.clone(),
            sub_data: store.clone(),
            laf_exporter: store.clone(),
            laf_importer: store.clone(),
            tags: store.clone(),
            facilities: store.clone(),
            transactions: store,
        }
    }
}
