// crates/server/src/managers.rs
//! Factories turning parsed requests into submitted jobs.
//!
//! Both managers submit into the same registry but only answer for the job
//! kinds they create: an import reference id is unknown to the export
//! endpoints and vice versa.

use std::sync::Arc;

use lada_core::store::Facility;
use lada_core::{Charset, Locale, UserInfo};
use lada_server_jobs::{Artifact, Job, JobRegistry, JobStatusSnapshot, RefId, RegistryError};
use serde_json::{Map, Value};

use crate::jobs::{
    Collaborators, CsvExportJob, ExportBase, JsonExportJob, LafExportJob, LafImportJob,
    QueryExport, EXPORT_KINDS, IMPORT_KINDS,
};

/// Registry access restricted to one family of job kinds.
#[derive(Clone)]
struct JobFamily {
    registry: Arc<JobRegistry>,
    kinds: &'static [&'static str],
}

impl JobFamily {
    fn check_kind(&self, ref_id: &RefId) -> Result<(), RegistryError> {
        let entry = self.registry.lookup(ref_id)?;
        if !self.kinds.contains(&entry.kind()) {
            return Err(RegistryError::NotFound(ref_id.clone()));
        }
        Ok(())
    }

    fn submit(&self, job: Arc<dyn Job>) -> Result<RefId, RegistryError> {
        self.registry.submit(job)
    }

    fn status(&self, ref_id: &RefId, requester: &UserInfo) -> Result<JobStatusSnapshot, RegistryError> {
        self.check_kind(ref_id)?;
        self.registry.status(ref_id, requester)
    }

    async fn take_result(&self, ref_id: &RefId, requester: &UserInfo) -> Result<Artifact, RegistryError> {
        self.check_kind(ref_id)?;
        self.registry.take_result(ref_id, requester).await
    }
}

/// Creates CSV, JSON and LAF export jobs.
#[derive(Clone)]
pub struct ExportJobManager {
    family: JobFamily,
    collaborators: Collaborators,
}

impl ExportJobManager {
    pub fn new(registry: Arc<JobRegistry>, collaborators: Collaborators) -> Self {
        Self {
            family: JobFamily {
                registry,
                kinds: EXPORT_KINDS,
            },
            collaborators,
        }
    }

    fn query_export(&self) -> QueryExport {
        QueryExport::new(
            Arc::clone(&self.collaborators.queries),
            Arc::clone(&self.collaborators.sub_data),
        )
    }

    pub fn create_csv_export(
        &self,
        owner: UserInfo,
        payload: Value,
        charset: Charset,
        locale: Locale,
    ) -> Result<RefId, RegistryError> {
        let base = ExportBase::new(owner, payload, charset, locale);
        self.family
            .submit(Arc::new(CsvExportJob::new(base, self.query_export())))
    }

    pub fn create_json_export(
        &self,
        owner: UserInfo,
        payload: Value,
        locale: Locale,
    ) -> Result<RefId, RegistryError> {
        let base = ExportBase::new(owner, payload, Charset::utf8(), locale);
        self.family
            .submit(Arc::new(JsonExportJob::new(base, self.query_export())))
    }

    pub fn create_laf_export(
        &self,
        owner: UserInfo,
        payload: Value,
        charset: Charset,
        locale: Locale,
    ) -> Result<RefId, RegistryError> {
        let base = ExportBase::new(owner, payload, charset, locale);
        let exporter = Arc::clone(&self.collaborators.laf_exporter);
        self.family.submit(Arc::new(LafExportJob::new(base, exporter)))
    }

    pub fn status(&self, ref_id: &RefId, requester: &UserInfo) -> Result<JobStatusSnapshot, RegistryError> {
        self.family.status(ref_id, requester)
    }

    /// Claim the export file. Succeeds once per job.
    pub async fn take_result(&self, ref_id: &RefId, requester: &UserInfo) -> Result<Artifact, RegistryError> {
        self.family.take_result(ref_id, requester).await
    }
}

/// Creates LAF import jobs.
#[derive(Clone)]
pub struct ImportJobManager {
    family: JobFamily,
    collaborators: Collaborators,
}

impl ImportJobManager {
    pub fn new(registry: Arc<JobRegistry>, collaborators: Collaborators) -> Self {
        Self {
            family: JobFamily {
                registry,
                kinds: IMPORT_KINDS,
            },
            collaborators,
        }
    }

    pub fn create_import_job(
        &self,
        owner: UserInfo,
        facility: Facility,
        encoding: String,
        files: Map<String, Value>,
    ) -> Result<RefId, RegistryError> {
        let job = LafImportJob::new(
            owner,
            facility,
            encoding,
            files,
            Arc::clone(&self.collaborators.laf_importer),
            Arc::clone(&self.collaborators.tags),
            Arc::clone(&self.collaborators.facilities),
        );
        self.family.submit(Arc::new(job))
    }

    pub fn status(&self, ref_id: &RefId, requester: &UserInfo) -> Result<JobStatusSnapshot, RegistryError> {
        self.family.status(ref_id, requester)
    }

    /// Claim the per-file import report. Succeeds once per job.
    pub async fn take_result(&self, ref_id: &RefId, requester: &UserInfo) -> Result<Artifact, RegistryError> {
        self.family.take_result(ref_id, requester).await
    }
}
