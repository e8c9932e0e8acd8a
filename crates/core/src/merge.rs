// crates/core/src/merge.rs
//! Denormalization of a primary record set with its child records.
//!
//! Ordering: CSV rows follow child fetch order, with childless parents
//! appended afterwards in primary order. JSON objects follow primary order and
//! each nested array follows child fetch order.

use std::collections::HashMap;

use crate::error::ExportError;
use crate::params::SubDataSpec;
use crate::record::{FieldValue, Record};

/// A primary record with its projected children, as written to JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedRecord {
    pub record: Record,
    pub children: Vec<Record>,
}

impl NestedRecord {
    pub fn childless(record: Record) -> Self {
        Self {
            record,
            children: Vec::new(),
        }
    }
}

/// Map of parent link key to its position in `primary`.
fn index_primary(primary: &[Record], id_field: &str) -> HashMap<String, usize> {
    let mut index = HashMap::with_capacity(primary.len());
    for (pos, record) in primary.iter().enumerate() {
        if let Some(key) = record.get(id_field).and_then(FieldValue::link_key) {
            index.entry(key).or_insert(pos);
        }
    }
    index
}

fn parent_position(
    index: &HashMap<String, usize>,
    child: &Record,
    sub: &SubDataSpec,
) -> Result<usize, ExportError> {
    let link = sub.kind.link_field();
    let key = child
        .get(link)
        .and_then(FieldValue::link_key)
        .ok_or_else(|| ExportError::Merge(format!("{} record without {link}", sub.kind.as_str())))?;
    index.get(&key).copied().ok_or_else(|| {
        tracing::error!(parent = %key, kind = sub.kind.as_str(), "Can not get primary record for merging");
        ExportError::Merge(format!("No primary record with {link} {key}"))
    })
}

fn project(child: &Record, columns: &[String]) -> Record {
    columns
        .iter()
        .map(|c| (c.clone(), child.get(c).cloned().unwrap_or(FieldValue::Null)))
        .collect()
}

/// Merge children into flat rows: one row per child, padded rows for
/// parents without children. Parent fields win on name collisions.
pub fn merge_csv(
    primary: &[Record],
    children: &[Record],
    id_field: &str,
    sub: &SubDataSpec,
) -> Result<Vec<Record>, ExportError> {
    let index = index_primary(primary, id_field);
    let mut has_child = vec![false; primary.len()];
    let mut merged = Vec::with_capacity(primary.len().max(children.len()));

    for child in children {
        let pos = parent_position(&index, child, sub)?;
        let mut row = project(child, &sub.columns);
        row.extend(primary[pos].iter().map(|(k, v)| (k.clone(), v.clone())));
        has_child[pos] = true;
        merged.push(row);
    }

    for (record, _) in primary.iter().zip(&has_child).filter(|(_, used)| !**used) {
        let mut row: Record = sub
            .columns
            .iter()
            .map(|c| (c.clone(), FieldValue::Null))
            .collect();
        row.extend(record.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged.push(row);
    }

    Ok(merged)
}

/// Nest children projected on the sub-data columns under their parent.
pub fn merge_json(
    primary: &[Record],
    children: &[Record],
    id_field: &str,
    sub: &SubDataSpec,
) -> Result<Vec<NestedRecord>, ExportError> {
    let index = index_primary(primary, id_field);
    let mut nested: Vec<NestedRecord> = primary.iter().cloned().map(NestedRecord::childless).collect();

    for child in children {
        let pos = parent_position(&index, child, sub)?;
        nested[pos].children.push(project(child, &sub.columns));
    }

    Ok(nested)
}
