// crates/server/src/jobs/export/csv.rs
use async_trait::async_trait;
use lada_core::format::csv::write_csv;
use lada_core::merge::merge_csv;
use lada_core::params::ExportParameters;
use lada_core::UserInfo;
use lada_server_jobs::{Job, JobContext, JobError, JobOutput};

use super::{filename_or, ExportBase, QueryExport};

pub const KIND: &str = "csv-export";
const DEFAULT_FILENAME: &str = "export.csv";

/// Query result export as delimited text, one row per child record.
pub struct CsvExportJob {
    base: ExportBase,
    query: QueryExport,
}

impl CsvExportJob {
    pub fn new(base: ExportBase, query: QueryExport) -> Self {
        Self { base, query }
    }
}

#[async_trait]
impl Job for CsvExportJob {
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
                merge_csv(&primary, &children, &params.id_field, sub)?
            }
            None => primary,
        };
        ctx.check_cancelled()?;

        let text = write_csv(&rows, &params)?;
        let bytes = self.base.encode(&text)?;
        tracing::debug!(ref_id = %ctx.ref_id(), rows = rows.len(), "CSV export written");

        Ok(JobOutput::new(
            bytes,
            filename_or(params.filename.as_deref(), DEFAULT_FILENAME),
            format!("text/csv; charset={}", self.base.charset.name()),
        ))
    }
}
