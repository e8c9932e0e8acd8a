// crates/core/src/format/csv.rs
use ::csv::{Terminator, WriterBuilder};

use crate::error::ExportError;
use crate::format::render_timestamp;
use crate::params::{ExportParameters, RowDelimiter};
use crate::record::{FieldValue, Record};

fn render_field(value: &FieldValue, params: &ExportParameters) -> Result<String, ExportError> {
    Ok(match value {
        FieldValue::Null => String::new(),
        FieldValue::Float(v) => {
            let text = v.to_string();
            if params.csv.decimal_separator == '.' {
                text
            } else {
                text.replace('.', &params.csv.decimal_separator.to_string())
            }
        }
        FieldValue::Timestamp(ts) => render_timestamp(ts, params.timezone, &params.date_format)?,
        other => other.to_string(),
    })
}

/// Write `rows` as CSV text.
///
/// The header row carries [`ExportParameters::csv_headers`]; each row the
/// values of [`ExportParameters::csv_columns`] with missing fields empty.
pub fn write_csv(rows: &[Record], params: &ExportParameters) -> Result<String, ExportError> {
    let columns = params.csv_columns();
    let terminator = match params.csv.row_delimiter {
        RowDelimiter::Windows => Terminator::CRLF,
        RowDelimiter::Linux => Terminator::Any(b'\n'),
    };

    let mut writer = WriterBuilder::new()
        .delimiter(params.csv.field_separator)
        .quote(params.csv.quote)
        .terminator(terminator)
        .from_writer(Vec::new());

    writer.write_record(params.csv_headers())?;
    for row in rows {
        let fields = columns
            .iter()
            .map(|c| match row.get(c) {
                Some(value) => render_field(value, params),
                None => Ok(String::new()),
            })
            .collect::<Result<Vec<_>, _>>()?;
        writer.write_record(&fields)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Serialize(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::Serialize(e.to_string()))
}
