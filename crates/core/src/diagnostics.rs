// crates/core/src/diagnostics.rs
//! Errors, warnings and notifications collected while a job runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single diagnostic entry.
///
/// `key` names the offending field (or `Parser`, `validation#probe`, ...),
/// `value` carries the offending value or a readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportItem {
    pub key: String,
    pub value: String,
    pub code: i32,
}

impl ReportItem {
    pub fn new(key: impl Into<String>, value: impl Into<String>, code: i32) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            code,
        }
    }
}

/// Append-only diagnostics of one severity, grouped by an owner key
/// (record identifier or file name).
pub type Diagnostics = BTreeMap<String, Vec<ReportItem>>;

/// Severity classes kept separately on every job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Notification,
}

/// The three diagnostic collections of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobDiagnostics {
    pub errors: Diagnostics,
    pub warnings: Diagnostics,
    pub notifications: Diagnostics,
}

impl JobDiagnostics {
    pub fn push(&mut self, severity: Severity, owner: impl Into<String>, item: ReportItem) {
        self.bucket_mut(severity)
            .entry(owner.into())
            .or_default()
            .push(item);
    }

    /// Append every entry of `other` under the same owner keys.
    pub fn extend(&mut self, severity: Severity, other: &Diagnostics) {
        let bucket = self.bucket_mut(severity);
        for (owner, items) in other {
            bucket
                .entry(owner.clone())
                .or_default()
                .extend(items.iter().cloned());
        }
    }

    pub fn has(&self, severity: Severity) -> bool {
        match severity {
            Severity::Error => !self.errors.is_empty(),
            Severity::Warning => !self.warnings.is_empty(),
            Severity::Notification => !self.notifications.is_empty(),
        }
    }

    fn bucket_mut(&mut self, severity: Severity) -> &mut Diagnostics {
        match severity {
            Severity::Error => &mut self.errors,
            Severity::Warning => &mut self.warnings,
            Severity::Notification => &mut self.notifications,
        }
    }
}

/// Whether any item in `diagnostics` carries one of `keys`.
pub fn contains_item_key(diagnostics: &Diagnostics, keys: &[&str]) -> bool {
    diagnostics
        .values()
        .flatten()
        .any(|item| keys.contains(&item.key.as_str()))
}
