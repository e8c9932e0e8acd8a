// crates/core/src/lib.rs
pub mod charset;
pub mod diagnostics;
pub mod error;
pub mod format;
pub mod laf;
pub mod locale;
pub mod memory;
pub mod merge;
pub mod params;
pub mod record;
pub mod store;
pub mod user;

pub use charset::Charset;
pub use diagnostics::{Diagnostics, JobDiagnostics, ReportItem, Severity};
pub use error::*;
pub use locale::Locale;
pub use record::{FieldValue, Record};
pub use user::UserInfo;
