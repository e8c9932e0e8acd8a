// crates/core/src/memory.rs
//! In-memory collaborators backed by a JSON seed.
//!
//! Used by the binary when no database is attached and by tests, which read
//! the call counters to verify which collaborators a job touched.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::diagnostics::ReportItem;
use crate::error::StoreError;
use crate::laf::{ImportReport, LafExporter, LafImporter};
use crate::params::{ChildKind, QuerySpec};
use crate::record::{record_from_json, FieldValue, Record};
use crate::store::{
    Facility, FacilityDirectory, ImportConfig, QueryTools, SubDataSource, Tag, TagStore,
    Transaction, TransactionManager,
};
use crate::user::UserInfo;

/// Query used when a request carries no `queryId`.
pub const DEFAULT_QUERY_ID: i64 = 1;

/// Computed column on measurements: number of their measured values.
pub const MESSWERTE_COUNT: &str = "messwerteCount";

/// Seed document for [`InMemoryStore`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seed {
    /// Result rows per query id.
    #[serde(default)]
    pub queries: BTreeMap<i64, Vec<Value>>,
    #[serde(default)]
    pub measurements: Vec<Value>,
    #[serde(default)]
    pub measurement_values: Vec<Value>,
    #[serde(default)]
    pub facilities: Vec<Facility>,
    #[serde(default)]
    pub import_config: BTreeMap<String, Vec<ImportConfig>>,
}

impl Seed {
    /// Two samples, two measurements of sample 1000 and two values of
    /// measurement 1200.
    pub fn demo() -> Self {
        let doc = json!({
            "queries": {
                "1": [
                    {"probeId": 1000, "hauptproben_nr": "120510002", "umw_id": "L6"},
                    {"probeId": 1001, "hauptproben_nr": "120510001", "umw_id": "L6"}
                ],
                "2": [
                    {"messungId": 1200, "probeId": 1000, "extId": 453},
                    {"messungId": 1201, "probeId": 1000, "extId": 454}
                ]
            },
            "measurements": [
                {"messungId": 1200, "probeId": 1000, "extId": 453},
                {"messungId": 1201, "probeId": 1000, "extId": 454}
            ],
            "measurementValues": [
                {"id": 1000, "messungId": 1200, "measUnitId": "Sv", "measdId": "test"},
                {"id": 1001, "messungId": 1200, "measUnitId": "Sv", "measdId": "test"}
            ],
            "facilities": [
                {"id": "06010", "networkId": "06"}
            ]
        });
        serde_json::from_value(doc).unwrap_or_default()
    }
}

/// Number of calls each collaborator received.
#[derive(Debug, Default)]
pub struct CallCounters {
    pub fetch: AtomicUsize,
    pub fetch_children: AtomicUsize,
    pub import: AtomicUsize,
    pub export_laf: AtomicUsize,
    pub begin: AtomicUsize,
    pub commit: AtomicUsize,
    pub rollback: AtomicUsize,
}

impl CallCounters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// All collaborator traits over one in-memory dataset.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    queries: BTreeMap<i64, Vec<Record>>,
    measurements: Vec<Record>,
    measurement_values: Vec<Record>,
    facilities: Vec<Facility>,
    import_config: BTreeMap<String, Vec<ImportConfig>>,
    tags: Mutex<Vec<(Tag, Vec<i64>)>>,
    next_id: AtomicI64,
    fail_queries: AtomicBool,
    fail_tagging: AtomicBool,
    fail_imports: AtomicBool,
    delay: RwLock<Option<Duration>>,
    pub calls: Arc<CallCounters>,
}

impl InMemoryStore {
    pub fn new(seed: Seed) -> Self {
        fn rows(values: &[Value]) -> Vec<Record> {
            values.iter().map(record_from_json).collect()
        }
        Self {
            queries: seed
                .queries
                .iter()
                .map(|(id, values)| (*id, rows(values)))
                .collect(),
            measurements: rows(&seed.measurements),
            measurement_values: rows(&seed.measurement_values),
            facilities: seed.facilities,
            import_config: seed.import_config,
            next_id: AtomicI64::new(10_000),
            ..Default::default()
        }
    }

    pub fn demo() -> Self {
        Self::new(Seed::demo())
    }

    /// Make every subsequent query fail.
    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent tag operation fail.
    pub fn fail_tagging(&self, fail: bool) {
        self.fail_tagging.store(fail, Ordering::SeqCst);
    }

    /// Make the LAF importer fail for every subsequent file.
    pub fn fail_imports(&self, fail: bool) {
        self.fail_imports.store(fail, Ordering::SeqCst);
    }

    /// Delay every query by `delay`.
    pub fn set_delay(&self, delay: Option<Duration>) {
        if let Ok(mut guard) = self.delay.write() {
            *guard = delay;
        }
    }

    /// Tags created so far with the sample ids assigned to them.
    pub fn tags(&self) -> Vec<(Tag, Vec<i64>)> {
        self.tags.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// Number of measured values linked to `measurement`.
    fn values_of(&self, measurement: &Record) -> i64 {
        let Some(id) = measurement.get("messungId").and_then(FieldValue::link_key) else {
            return 0;
        };
        let link = ChildKind::MeasurementValue.link_field();
        self.measurement_values
            .iter()
            .filter(|v| v.get(link).and_then(FieldValue::link_key).as_deref() == Some(id.as_str()))
            .count() as i64
    }

    async fn pause(&self) {
        let delay = self.delay.read().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn matches(record: &Record, spec: &QuerySpec) -> bool {
        spec.columns.iter().filter(|c| c.filter_active).all(|column| {
            let value = record.get(&column.data_index).and_then(FieldValue::link_key);
            if column.list_filter {
                let ids = spec.id_list(&column.data_index).unwrap_or_default();
                value.is_some_and(|v| ids.contains(&v))
            } else if column.filter_value.is_empty() {
                true
            } else {
                value.as_deref() == Some(column.filter_value.trim())
            }
        })
    }

    fn probe(&self, id: i64) -> Option<&Record> {
        self.queries
            .get(&DEFAULT_QUERY_ID)?
            .iter()
            .find(|r| r.get("probeId") == Some(&FieldValue::Int(id)))
    }
}

#[async_trait]
impl QueryTools for InMemoryStore {
    async fn fetch(&self, spec: &QuerySpec) -> Result<Vec<Record>, StoreError> {
        self.calls.fetch.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(StoreError::Query("relation does not exist".into()));
        }
        let query_id = spec.query_id.unwrap_or(DEFAULT_QUERY_ID);
        let rows = self
            .queries
            .get(&query_id)
            .ok_or_else(|| StoreError::NotFound(format!("query {query_id}")))?;
        Ok(rows
            .iter()
            .filter(|r| Self::matches(r, spec))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SubDataSource for InMemoryStore {
    async fn fetch_children(
        &self,
        kind: ChildKind,
        parent_ids: &[String],
    ) -> Result<Vec<Record>, StoreError> {
        self.calls.fetch_children.fetch_add(1, Ordering::SeqCst);
        let source = match kind {
            ChildKind::Measurement => &self.measurements,
            ChildKind::MeasurementValue => &self.measurement_values,
        };
        let mut children: Vec<Record> = source
            .iter()
            .filter(|r| {
                r.get(kind.link_field())
                    .and_then(FieldValue::link_key)
                    .is_some_and(|k| parent_ids.contains(&k))
            })
            .cloned()
            .collect();
        if kind == ChildKind::Measurement {
            for measurement in &mut children {
                let count = self.values_of(measurement);
                measurement.insert(MESSWERTE_COUNT.into(), FieldValue::Int(count));
            }
        }
        Ok(children)
    }
}

#[async_trait]
impl TagStore for InMemoryStore {
    async fn generate_tag(&self, prefix: &str, network_id: &str) -> Result<Tag, StoreError> {
        if self.fail_tagging.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("tag store".into()));
        }
        let mut tags = self
            .tags
            .lock()
            .map_err(|_| StoreError::Unavailable("tag store lock poisoned".into()))?;
        let tag = Tag {
            id: tags.len() as i64 + 1,
            name: format!("{prefix}_{network_id}_{:04}", tags.len() + 1),
            network_id: network_id.to_string(),
        };
        tags.push((tag.clone(), Vec::new()));
        Ok(tag)
    }

    async fn assign(&self, tag: &Tag, probe_ids: &[i64]) -> Result<(), StoreError> {
        let mut tags = self
            .tags
            .lock()
            .map_err(|_| StoreError::Unavailable("tag store lock poisoned".into()))?;
        let (_, assigned) = tags
            .iter_mut()
            .find(|(t, _)| t.id == tag.id)
            .ok_or_else(|| StoreError::NotFound(format!("tag {}", tag.id)))?;
        assigned.extend_from_slice(probe_ids);
        Ok(())
    }
}

#[async_trait]
impl FacilityDirectory for InMemoryStore {
    async fn lookup(&self, facility_id: &str) -> Result<Option<Facility>, StoreError> {
        Ok(self.facilities.iter().find(|f| f.id == facility_id).cloned())
    }

    async fn import_config(&self, facility_id: &str) -> Result<Vec<ImportConfig>, StoreError> {
        Ok(self.import_config.get(facility_id).cloned().unwrap_or_default())
    }
}

/// Imports one sample per `%PROBE%` block. A document without any block is
/// reported as a parser error.
#[async_trait]
impl LafImporter for InMemoryStore {
    async fn import(
        &self,
        content: &str,
        _user: &UserInfo,
        facility: &Facility,
        _config: &[ImportConfig],
    ) -> Result<ImportReport, StoreError> {
        self.calls.import.fetch_add(1, Ordering::SeqCst);
        if self.fail_imports.load(Ordering::SeqCst) {
            return Err(StoreError::Transaction("deadlock detected on table probe".into()));
        }
        let mut report = ImportReport::default();
        let blocks = content.matches("%PROBE%").count();
        if blocks == 0 {
            report.errors.insert(
                "parser".into(),
                vec![ReportItem::new("Parser", "No %PROBE% block found", 670)],
            );
            return Ok(report);
        }
        for _ in 0..blocks {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            report.imported_ids.push(id);
        }
        if !content.contains("%ENDE%") {
            report.warnings.insert(
                facility.id.clone(),
                vec![ReportItem::new("%ENDE%", "missing end marker", 631)],
            );
        }
        Ok(report)
    }
}

#[async_trait]
impl LafExporter for InMemoryStore {
    async fn export(
        &self,
        probe_ids: &[i64],
        messung_ids: &[i64],
        _user: &UserInfo,
    ) -> Result<String, StoreError> {
        self.calls.export_laf.fetch_add(1, Ordering::SeqCst);
        let mut out = String::new();
        for id in probe_ids {
            let probe = self
                .probe(*id)
                .ok_or_else(|| StoreError::NotFound(format!("probe {id}")))?;
            out.push_str("%PROBE%\n");
            for (field, value) in probe {
                out.push_str(&format!("{} \"{}\"\n", field.to_uppercase(), value));
            }
        }
        for id in messung_ids {
            let messung = self
                .measurements
                .iter()
                .find(|r| r.get("messungId") == Some(&FieldValue::Int(*id)))
                .ok_or_else(|| StoreError::NotFound(format!("messung {id}")))?;
            out.push_str("%MESSUNG%\n");
            for (field, value) in messung {
                out.push_str(&format!("{} \"{}\"\n", field.to_uppercase(), value));
            }
        }
        out.push_str("%ENDE%");
        Ok(out)
    }
}

/// Transaction stub counting begin / commit / rollback on the store.
struct CountingTransaction {
    calls: Arc<CallCounters>,
}

#[async_trait]
impl Transaction for CountingTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.calls.commit.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.calls.rollback.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl TransactionManager for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        self.calls.begin.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingTransaction {
            calls: Arc::clone(&self.calls),
        }))
    }
}
