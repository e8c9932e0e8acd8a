// crates/server/src/jobs/export/mod.rs
//! Export jobs and the pipeline pieces they share.

pub mod csv;
pub mod json;
pub mod laf;

use std::sync::Arc;

use lada_core::params::{ChildKind, ExportParameters};
use lada_core::store::{QueryTools, SubDataSource};
use lada_core::{Charset, ExportError, FieldValue, Locale, Record, UserInfo};
use serde_json::Value;

pub use self::csv::CsvExportJob;
pub use self::json::JsonExportJob;
pub use self::laf::LafExportJob;

/// What every export job captures at creation: the caller, the raw payload
/// and the output settings taken from request headers.
#[derive(Debug, Clone)]
pub struct ExportBase {
    pub owner: UserInfo,
    pub payload: Value,
    pub charset: Charset,
    pub locale: Locale,
}

impl ExportBase {
    pub fn new(owner: UserInfo, payload: Value, charset: Charset, locale: Locale) -> Self {
        Self {
            owner,
            payload,
            charset,
            locale,
        }
    }

    /// Encode `text` in the requested charset.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, ExportError> {
        Ok(self.charset.encode_strict(text)?)
    }
}

/// Download name: the requested one, or `default`.
pub fn filename_or(requested: Option<&str>, default: &str) -> String {
    requested
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Query-backed part of the CSV and JSON exports.
#[derive(Clone)]
pub struct QueryExport {
    queries: Arc<dyn QueryTools>,
    sub_data: Arc<dyn SubDataSource>,
}

impl QueryExport {
    pub fn new(queries: Arc<dyn QueryTools>, sub_data: Arc<dyn SubDataSource>) -> Self {
        Self { queries, sub_data }
    }

    /// Primary records of the export query, in query order.
    pub async fn fetch_primary(&self, params: &ExportParameters) -> Result<Vec<Record>, ExportError> {
        let rows = self.queries.fetch(&params.query).await.map_err(|e| {
            tracing::warn!(query_id = ?params.query.query_id, error = %e, "Export query failed");
            ExportError::query(e)
        })?;
        tracing::debug!(rows = rows.len(), "Loaded primary records");
        Ok(rows)
    }

    /// Children of `primary` linked through `id_field`.
    pub async fn fetch_children(
        &self,
        kind: ChildKind,
        id_field: &str,
        primary: &[Record],
    ) -> Result<Vec<Record>, ExportError> {
        let parent_ids: Vec<String> = primary
            .iter()
            .filter_map(|r| r.get(id_field).and_then(FieldValue::link_key))
            .collect();
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let children = self
            .sub_data
            .fetch_children(kind, &parent_ids)
            .await
            .map_err(|e| {
                tracing::warn!(kind = kind.as_str(), error = %e, "Sub data query failed");
                ExportError::query(e)
            })?;
        tracing::debug!(kind = kind.as_str(), rows = children.len(), "Loaded sub data");
        Ok(children)
    }
}
