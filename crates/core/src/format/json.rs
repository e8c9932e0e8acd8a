// crates/core/src/format/json.rs
use chrono_tz::Tz;
use serde_json::{Map, Number, Value};

use crate::error::ExportError;
use crate::format::render_timestamp;
use crate::merge::NestedRecord;
use crate::params::{ExportParameters, DEFAULT_DATE_FORMAT};
use crate::record::{FieldValue, Record};

fn to_json(value: Option<&FieldValue>, tz: Tz) -> Result<Value, ExportError> {
    Ok(match value {
        None | Some(FieldValue::Null) => Value::Null,
        Some(FieldValue::Bool(b)) => Value::Bool(*b),
        Some(FieldValue::Int(i)) => Value::Number((*i).into()),
        Some(FieldValue::Float(f)) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        Some(FieldValue::Text(s)) => Value::String(s.clone()),
        Some(FieldValue::Timestamp(ts)) => {
            Value::String(render_timestamp(ts, tz, DEFAULT_DATE_FORMAT)?)
        }
    })
}

fn object(record: &Record, columns: &[String], tz: Tz) -> Result<Map<String, Value>, ExportError> {
    columns
        .iter()
        .map(|c| Ok((c.clone(), to_json(record.get(c), tz)?)))
        .collect()
}

/// Build the export document: one object per primary record keyed by its id.
pub fn to_document(rows: &[NestedRecord], params: &ExportParameters) -> Result<Value, ExportError> {
    let mut document = Map::new();
    for row in rows {
        let key = row
            .record
            .get(&params.id_field)
            .and_then(FieldValue::link_key)
            .unwrap_or_default();
        let mut entry = object(&row.record, &params.export_columns, params.timezone)?;
        if let Some(sub) = params.sub_data.as_ref().filter(|_| !row.children.is_empty()) {
            let children = row
                .children
                .iter()
                .map(|child| object(child, &sub.columns, params.timezone).map(Value::Object))
                .collect::<Result<Vec<_>, _>>()?;
            entry.insert(sub.kind.json_key().to_string(), Value::Array(children));
        }
        document.insert(key, Value::Object(entry));
    }
    Ok(Value::Object(document))
}

/// Serialize the export document as compact UTF-8 JSON.
pub fn write_json(rows: &[NestedRecord], params: &ExportParameters) -> Result<String, ExportError> {
    Ok(serde_json::to_string(&to_document(rows, params)?)?)
}
