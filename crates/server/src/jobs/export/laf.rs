// crates/server/src/jobs/export/laf.rs
use std::sync::Arc;

use async_trait::async_trait;
use lada_core::laf::LafExporter;
use lada_core::params::LafExportRequest;
use lada_core::UserInfo;
use lada_server_jobs::{Job, JobContext, JobError, JobOutput};

use super::{filename_or, ExportBase};

pub const KIND: &str = "laf-export";
const DEFAULT_FILENAME: &str = "export.laf";

/// Samples and measurements rendered as a LAF document.
pub struct LafExportJob {
    base: ExportBase,
    exporter: Arc<dyn LafExporter>,
}

impl LafExportJob {
    pub fn new(base: ExportBase, exporter: Arc<dyn LafExporter>) -> Self {
        Self { base, exporter }
    }
}

#[async_trait]
impl Job for LafExportJob {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn owner(&self) -> &UserInfo {
        &self.base.owner
    }

    async fn execute(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
        let request = LafExportRequest::parse(&self.base.payload)?;
        let proben = request.proben.unwrap_or_default();
        let messungen = request.messungen.unwrap_or_default();
        tracing::debug!(
            ref_id = %ctx.ref_id(),
            proben = proben.len(),
            messungen = messungen.len(),
            "Starting LAF export"
        );

        let text = self
            .exporter
            .export(&proben, &messungen, &self.base.owner)
            .await?;
        ctx.check_cancelled()?;
        let bytes = self.base.encode(&text)?;

        Ok(JobOutput::new(
            bytes,
            filename_or(request.filename.as_deref(), DEFAULT_FILENAME),
            format!("text/plain; charset={}", self.base.charset.name()),
        ))
    }
}
