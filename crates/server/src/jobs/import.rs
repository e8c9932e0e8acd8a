// crates/server/src/jobs/import.rs
//! Multi-file LAF import.
//!
//! All files are decoded before the first import runs. A file that fails to
//! decode or to import is reported and skipped; the job only fails when the
//! charset is unusable or no file decodes at all. Records created across all
//! files are tagged together in a separate transaction.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use lada_core::diagnostics::{Diagnostics, ReportItem, Severity};
use lada_core::laf::LafImporter;
use lada_core::store::{Facility, FacilityDirectory, Tag, TagStore};
use lada_core::{Charset, ImportError, StoreError, UserInfo};
use lada_server_jobs::{Job, JobContext, JobError, JobOutput};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const KIND: &str = "laf-import";
const RESULT_FILENAME: &str = "import-result.json";
const TAG_PREFIX: &str = "IMP";

/// Code attached to decode failures.
pub const IMP_INVALID_VALUE: i32 = 673;
/// Code attached to a failed tag assignment.
pub const IMP_TAG_FAILED: i32 = 690;

/// Body of a multi-file import request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub encoding: String,
    /// File name to base64 content, in request order.
    #[serde(default)]
    pub files: Option<Map<String, Value>>,
}

/// Import outcome of one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub success: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: Diagnostics,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub warnings: Diagnostics,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub notifications: Diagnostics,
    pub probe_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl FileReport {
    fn failed(owner: &str, item: ReportItem) -> Self {
        let mut errors = Diagnostics::new();
        errors.insert(owner.to_string(), vec![item]);
        Self {
            errors,
            ..Default::default()
        }
    }
}

pub struct LafImportJob {
    owner: UserInfo,
    facility: Facility,
    encoding: String,
    files: Map<String, Value>,
    importer: Arc<dyn LafImporter>,
    tags: Arc<dyn TagStore>,
    facilities: Arc<dyn FacilityDirectory>,
}

impl LafImportJob {
    pub fn new(
        owner: UserInfo,
        facility: Facility,
        encoding: String,
        files: Map<String, Value>,
        importer: Arc<dyn LafImporter>,
        tags: Arc<dyn TagStore>,
        facilities: Arc<dyn FacilityDirectory>,
    ) -> Self {
        Self {
            owner,
            facility,
            encoding,
            files,
            importer,
            tags,
            facilities,
        }
    }

    /// Decode every file. Failures are written into `reports` and reported on
    /// the job; only successfully decoded contents are returned.
    fn decode_all(
        &self,
        ctx: &JobContext,
        charset: Charset,
        reports: &mut Vec<(String, FileReport)>,
    ) -> Vec<(String, String)> {
        let mut decoded = Vec::with_capacity(self.files.len());
        for (name, value) in &self.files {
            match decode_file(value, charset) {
                Ok(content) => decoded.push((name.clone(), content)),
                Err(message) => {
                    tracing::warn!(ref_id = %ctx.ref_id(), file = %name, message = %message, "Skipping undecodable file");
                    let item = ReportItem::new("file", message, IMP_INVALID_VALUE);
                    ctx.report(Severity::Error, name.clone(), item.clone());
                    reports.push((name.clone(), FileReport::failed(name, item)));
                }
            }
        }
        decoded
    }

    async fn tag_imported(&self, ctx: &JobContext, probe_ids: &[i64]) -> Result<Tag, StoreError> {
        let tx = ctx.transactions().begin().await?;
        let tagged = async {
            let tag = self
                .tags
                .generate_tag(TAG_PREFIX, &self.facility.network_id)
                .await?;
            self.tags.assign(&tag, probe_ids).await?;
            Ok::<_, StoreError>(tag)
        }
        .await;
        match tagged {
            Ok(tag) => {
                tx.commit().await?;
                Ok(tag)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::error!(ref_id = %ctx.ref_id(), error = %rollback, "Rollback of tagging failed");
                }
                Err(e)
            }
        }
    }
}

fn decode_file(value: &Value, charset: Charset) -> Result<String, String> {
    const NOT_BASE64: &str = "File content not in valid Base64 scheme";
    let encoded = value.as_str().ok_or_else(|| NOT_BASE64.to_string())?;
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|_| NOT_BASE64.to_string())?;
    charset.decode_strict(&bytes).map_err(|e| e.to_string())
}

#[async_trait]
impl Job for LafImportJob {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn owner(&self) -> &UserInfo {
        &self.owner
    }

    async fn execute(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
        let charset = Charset::for_label(&self.encoding).map_err(ImportError::InvalidEncoding)?;

        let mut reports: Vec<(String, FileReport)> = Vec::with_capacity(self.files.len());
        let decoded = self.decode_all(ctx, charset, &mut reports);
        if decoded.is_empty() {
            return Err(ImportError::NoValidFile.into());
        }

        let config = self
            .facilities
            .import_config(&self.facility.id)
            .await
            .map_err(|e| {
                tracing::error!(ref_id = %ctx.ref_id(), error = %e, "Failed loading import config");
                ImportError::Domain(e)
            })?;
        tracing::debug!(ref_id = %ctx.ref_id(), files = decoded.len(), "Starting LAF import");

        let mut imported: Vec<i64> = Vec::new();
        for (name, content) in decoded {
            ctx.check_cancelled()?;
            tracing::debug!(
                ref_id = %ctx.ref_id(),
                facility = %self.facility.id,
                file = %name,
                bytes = content.len(),
                "Importing LAF file"
            );
            let report = match self
                .importer
                .import(&content, &self.owner, &self.facility, &config)
                .await
            {
                Ok(result) => {
                    ctx.report_all(Severity::Error, &result.errors);
                    ctx.report_all(Severity::Warning, &result.warnings);
                    ctx.report_all(Severity::Notification, &result.notifications);
                    imported.extend(&result.imported_ids);
                    FileReport {
                        success: result.is_success(),
                        probe_ids: result.imported_ids.clone(),
                        errors: result.errors,
                        warnings: result.warnings,
                        notifications: result.notifications,
                        tag: None,
                    }
                }
                Err(e) => {
                    tracing::warn!(ref_id = %ctx.ref_id(), file = %name, error = %e, "LAF import failed");
                    let message = ImportError::Domain(e).to_string();
                    let item = ReportItem::new("Parser", message, IMP_INVALID_VALUE);
                    ctx.report(Severity::Error, name.clone(), item.clone());
                    FileReport::failed(&name, item)
                }
            };
            tracing::debug!(ref_id = %ctx.ref_id(), file = %name, success = report.success, "Finished LAF file");
            reports.push((name, report));
        }

        if !imported.is_empty() {
            match self.tag_imported(ctx, &imported).await {
                Ok(tag) => {
                    tracing::info!(ref_id = %ctx.ref_id(), tag = %tag.name, records = imported.len(), "Tagged imported records");
                    for (_, report) in &mut reports {
                        report.tag = Some(tag.name.clone());
                    }
                }
                Err(e) => {
                    tracing::warn!(ref_id = %ctx.ref_id(), error = %e, "Tagging failed");
                    let message = ImportError::Tag(e).to_string();
                    ctx.report(
                        Severity::Warning,
                        "tag",
                        ReportItem::new("tag", message.clone(), IMP_TAG_FAILED),
                    );
                    ctx.set_message(message);
                }
            }
        }

        let mut document = Map::new();
        for (name, report) in reports {
            document.insert(name, serde_json::to_value(report).map_err(ImportError::from)?);
        }
        let bytes = serde_json::to_vec(&Value::Object(document)).map_err(ImportError::from)?;
        Ok(JobOutput::new(bytes, RESULT_FILENAME, "application/json"))
    }
}
