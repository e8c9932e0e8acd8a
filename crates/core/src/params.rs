// crates/core/src/params.rs
//! Export request payloads and their validated, immutable form.
//!
//! Request bodies are accepted as raw JSON at the service boundary and parsed
//! inside the job, so a malformed payload ends the job in `error` instead of
//! being rejected synchronously.

use std::collections::BTreeMap;

use chrono::format::{Item, StrftimeItems};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExportError;
use crate::locale::Locale;
use crate::record::FieldValue;

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One grid column as sent by the client.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnRequest {
    #[serde(default, alias = "gridColMpId")]
    pub grid_column_id: Option<i64>,
    pub data_index: String,
    /// Header label for CSV output. Falls back to `data_index`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub export: bool,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub sort_index: Option<i32>,
    #[serde(default, alias = "filterVal")]
    pub filter_value: String,
    #[serde(default, alias = "isFilterActive")]
    pub filter_active: bool,
}

/// Raw CSV formatting options. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvOptionsRequest {
    pub field_separator: Option<String>,
    pub row_delimiter: Option<String>,
    pub quote_type: Option<String>,
    pub decimal_separator: Option<String>,
}

/// Body of a CSV or JSON export request.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryExportRequest {
    pub columns: Vec<ColumnRequest>,
    #[serde(default)]
    pub export_sub_data: bool,
    #[serde(default)]
    pub sub_data_columns: Option<Vec<String>>,
    #[serde(default)]
    pub sub_data_column_names: BTreeMap<String, String>,
    #[serde(default)]
    pub id_field: Option<String>,
    #[serde(default)]
    pub id_filter: Vec<Value>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub date_format: Option<String>,
    #[serde(default)]
    pub csv_options: Option<CsvOptionsRequest>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub query_id: Option<i64>,
}

/// Body of a LAF export request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LafExportRequest {
    #[serde(default)]
    pub proben: Option<Vec<i64>>,
    #[serde(default)]
    pub messungen: Option<Vec<i64>>,
    #[serde(default)]
    pub filename: Option<String>,
}

impl LafExportRequest {
    /// Whether the raw payload names any sample or measurement list.
    ///
    /// Checked before a job is created; the lists are only typed inside the job.
    pub fn names_records(raw: &Value) -> bool {
        ["proben", "messungen"]
            .iter()
            .any(|key| raw.get(key).is_some_and(|v| !v.is_null()))
    }

    pub fn parse(raw: &Value) -> Result<Self, ExportError> {
        let request: LafExportRequest = serde_json::from_value(raw.clone())
            .map_err(|e| ExportError::validation(e.to_string()))?;
        if request.proben.is_none() && request.messungen.is_none() {
            return Err(ExportError::validation("No records to export given"));
        }
        Ok(request)
    }
}

/// Child record kinds reachable from a primary id field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildKind {
    /// Measurements of a sample (`probeId`).
    Measurement,
    /// Measured values of a measurement (`messungId`).
    MeasurementValue,
}

impl ChildKind {
    pub fn for_id_field(id_field: &str) -> Option<Self> {
        match id_field {
            "probeId" => Some(ChildKind::Measurement),
            "messungId" => Some(ChildKind::MeasurementValue),
            _ => None,
        }
    }

    /// Field on the child record holding the parent id.
    pub fn link_field(&self) -> &'static str {
        match self {
            ChildKind::Measurement => "probeId",
            ChildKind::MeasurementValue => "messungId",
        }
    }

    /// Key of the nested array in JSON output.
    pub fn json_key(&self) -> &'static str {
        match self {
            ChildKind::Measurement => "Messungen",
            ChildKind::MeasurementValue => "messwerte",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChildKind::Measurement => "messung",
            ChildKind::MeasurementValue => "messwert",
        }
    }
}

/// A column as handed to the query layer.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryColumn {
    pub grid_column_id: Option<i64>,
    pub data_index: String,
    pub sort: Option<String>,
    pub sort_index: Option<i32>,
    pub filter_value: String,
    pub filter_active: bool,
    /// `filter_value` is a comma separated id list.
    pub list_filter: bool,
}

/// Opaque fetch-by-filter description passed to [`crate::store::QueryTools`].
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub query_id: Option<i64>,
    pub columns: Vec<QueryColumn>,
}

impl QuerySpec {
    /// The active list filter on `data_index`, split into ids.
    pub fn id_list(&self, data_index: &str) -> Option<Vec<String>> {
        self.columns
            .iter()
            .find(|c| c.data_index == data_index && c.filter_active && c.list_filter)
            .map(|c| {
                c.filter_value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowDelimiter {
    Windows,
    Linux,
}

impl RowDelimiter {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowDelimiter::Windows => "\r\n",
            RowDelimiter::Linux => "\n",
        }
    }
}

/// Validated CSV formatting options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub field_separator: u8,
    pub row_delimiter: RowDelimiter,
    pub quote: u8,
    pub decimal_separator: char,
}

impl CsvOptions {
    pub fn for_locale(locale: Locale) -> Self {
        Self {
            field_separator: b',',
            row_delimiter: RowDelimiter::Windows,
            quote: b'"',
            decimal_separator: locale.decimal_separator(),
        }
    }

    pub fn parse(request: Option<&CsvOptionsRequest>, locale: Locale) -> Result<Self, ExportError> {
        let mut options = Self::for_locale(locale);
        let Some(request) = request else {
            return Ok(options);
        };
        if let Some(sep) = request.field_separator.as_deref() {
            options.field_separator = match sep {
                "comma" => b',',
                "semicolon" => b';',
                "period" => b'.',
                "space" => b' ',
                other => {
                    return Err(ExportError::validation(format!(
                        "Unknown field separator: {other}"
                    )))
                }
            };
        }
        if let Some(delim) = request.row_delimiter.as_deref() {
            options.row_delimiter = match delim {
                "windows" => RowDelimiter::Windows,
                "linux" => RowDelimiter::Linux,
                other => {
                    return Err(ExportError::validation(format!(
                        "Unknown row delimiter: {other}"
                    )))
                }
            };
        }
        if let Some(quote) = request.quote_type.as_deref() {
            options.quote = match quote {
                "doublequote" => b'"',
                "singlequote" => b'\'',
                other => {
                    return Err(ExportError::validation(format!("Unknown quote type: {other}")))
                }
            };
        }
        if let Some(dec) = request.decimal_separator.as_deref() {
            options.decimal_separator = match dec {
                "comma" => ',',
                "period" => '.',
                other => {
                    return Err(ExportError::validation(format!(
                        "Unknown decimal separator: {other}"
                    )))
                }
            };
        }
        Ok(options)
    }
}

/// Sub-data part of an export.
#[derive(Debug, Clone, PartialEq)]
pub struct SubDataSpec {
    pub kind: ChildKind,
    pub columns: Vec<String>,
    /// Optional CSV header labels keyed by sub-data column.
    pub column_names: BTreeMap<String, String>,
}

/// Validated, immutable export parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportParameters {
    pub query: QuerySpec,
    /// Data indexes of columns with `export=true`, in request order.
    pub export_columns: Vec<String>,
    /// CSV header label per data index.
    pub column_names: BTreeMap<String, String>,
    pub id_field: String,
    pub sub_data: Option<SubDataSpec>,
    pub timezone: Tz,
    pub date_format: String,
    pub csv: CsvOptions,
    pub filename: Option<String>,
    pub locale: Locale,
}

impl ExportParameters {
    /// Parse and validate a raw export payload.
    pub fn parse(raw: &Value, locale: Locale) -> Result<Self, ExportError> {
        let request: QueryExportRequest = serde_json::from_value(raw.clone())
            .map_err(|e| ExportError::validation(e.to_string()))?;
        Self::from_request(request, locale)
    }

    pub fn from_request(request: QueryExportRequest, locale: Locale) -> Result<Self, ExportError> {
        let export_columns: Vec<String> = request
            .columns
            .iter()
            .filter(|c| c.export)
            .map(|c| c.data_index.clone())
            .collect();
        if export_columns.is_empty() {
            return Err(ExportError::validation("No columns to export given"));
        }

        let id_field = request
            .id_field
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| ExportError::validation("No id field given"))?;
        if !request.columns.iter().any(|c| c.data_index == id_field) {
            return Err(ExportError::validation(format!(
                "Id field {id_field} is not among the requested columns"
            )));
        }

        let sub_data = if request.export_sub_data {
            let columns = request.sub_data_columns.unwrap_or_default();
            if columns.is_empty() {
                return Err(ExportError::validation(
                    "Subdata is exported but no subdata columns are present",
                ));
            }
            let kind = ChildKind::for_id_field(&id_field).ok_or_else(|| {
                ExportError::validation(format!("No sub data available for id field {id_field}"))
            })?;
            Some(SubDataSpec {
                kind,
                columns,
                column_names: request.sub_data_column_names,
            })
        } else {
            None
        };

        let id_filter: Vec<String> = request
            .id_filter
            .iter()
            .filter_map(|v| FieldValue::from_json(v).link_key())
            .filter(|s| !s.is_empty())
            .collect();

        let column_names = request
            .columns
            .iter()
            .map(|c| {
                let label = c.name.clone().unwrap_or_else(|| c.data_index.clone());
                (c.data_index.clone(), label)
            })
            .collect();

        let columns = request
            .columns
            .into_iter()
            .map(|c| {
                let mut column = QueryColumn {
                    grid_column_id: c.grid_column_id,
                    data_index: c.data_index,
                    sort: c.sort,
                    sort_index: c.sort_index,
                    filter_value: c.filter_value,
                    filter_active: c.filter_active,
                    list_filter: false,
                };
                if column.data_index == id_field && !id_filter.is_empty() {
                    column.filter_value = id_filter.join(",");
                    column.filter_active = true;
                    column.list_filter = true;
                }
                column
            })
            .collect();

        let timezone = match request.timezone.as_deref().map(str::trim) {
            None | Some("") => Tz::UTC,
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| ExportError::validation(format!("Unknown timezone: {name}")))?,
        };

        let date_format = request
            .date_format
            .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
        if StrftimeItems::new(&date_format).any(|item| matches!(item, Item::Error)) {
            return Err(ExportError::validation(format!(
                "Invalid date format: {date_format}"
            )));
        }

        Ok(Self {
            query: QuerySpec {
                query_id: request.query_id,
                columns,
            },
            export_columns,
            column_names,
            id_field,
            sub_data,
            timezone,
            date_format,
            csv: CsvOptions::parse(request.csv_options.as_ref(), locale)?,
            filename: request.filename.filter(|f| !f.trim().is_empty()),
            locale,
        })
    }

    /// Columns written to CSV: the export columns followed by sub-data columns.
    pub fn csv_columns(&self) -> Vec<String> {
        let mut columns = self.export_columns.clone();
        if let Some(sub) = &self.sub_data {
            columns.extend(sub.columns.iter().cloned());
        }
        columns
    }

    /// CSV header labels matching [`Self::csv_columns`].
    pub fn csv_headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = self
            .export_columns
            .iter()
            .map(|c| self.column_names.get(c).cloned().unwrap_or_else(|| c.clone()))
            .collect();
        if let Some(sub) = &self.sub_data {
            headers.extend(
                sub.columns
                    .iter()
                    .map(|c| sub.column_names.get(c).cloned().unwrap_or_else(|| c.clone())),
            );
        }
        headers
    }
}
