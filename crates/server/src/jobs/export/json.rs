// crates/server/src/jobs/export/json.rs
use async_trait::async_trait;
use lada_core::format::json::write_json;
use lada_core::merge::{merge_json, NestedRecord};
use lada_core::params::ExportParameters;
use lada_core::UserInfo;
use lada_server_jobs::{Job, JobContext, JobError, JobOutput};

use super::{filename_or, ExportBase, QueryExport};

pub const KIND: &str = "json-export";
const DEFAULT_FILENAME: &str = "export.json";

/// Query result export as one JSON object keyed by record id. Always UTF-8.
pub struct JsonExportJob {
    base: ExportBase,
    query: QueryExport,
}

impl JsonExportJob {
    pub fn new(base: ExportBase, query: QueryExport) -> Self {
        Self { base, query }
    }
}

#[async_trait]
impl Job for JsonExportJob {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn owner(&self) -> &UserInfo {
        &self.base.owner
    }

    async fn execute(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
        let params = ExportParameters::parse(&self.base.payload, self.base.locale)?;
        let primary = self.query.fetch_primary(&params).await?;
        ctx.check_cancelled()?;

        let rows = match &params.sub_data {
            Some(sub) => {
                let children = self
                    .query
                    .fetch_children(sub.kind, &params.id_field, &primary)
                    .await?;
                merge_json(&primary, &children, &params.id_field, sub)?
            }
            None => primary.into_iter().map(NestedRecord::childless).collect(),
        };
        ctx.check_cancelled()?;

        let text = write_json(&rows, &params)?;
        tracing::debug!(ref_id = %ctx.ref_id(), rows = rows.len(), "JSON export written");

        Ok(JobOutput::new(
            text.into_bytes(),
            filename_or(params.filename.as_deref(), DEFAULT_FILENAME),
            "application/json; charset=utf-8",
        ))
    }
}
