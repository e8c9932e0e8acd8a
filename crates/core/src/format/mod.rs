// crates/core/src/format/mod.rs
//! Writers turning merged records into export documents.

pub mod csv;
pub mod json;

use std::fmt::Write;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::ExportError;

/// Render `ts` in `tz` using a strftime `format`.
pub fn render_timestamp(ts: &DateTime<Utc>, tz: Tz, format: &str) -> Result<String, ExportError> {
    let mut out = String::new();
    write!(out, "{}", ts.with_timezone(&tz).format(format))
        .map_err(|_| ExportError::validation(format!("Invalid date format: {format}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_render_timestamp_in_timezone() {
        let ts = Utc.with_ymd_and_hms(2024, 7, 1, 10, 30, 0).unwrap();
        assert_eq!(
            render_timestamp(&ts, Tz::UTC, "%Y-%m-%d %H:%M:%S").unwrap(),
            "2024-07-01 10:30:00"
        );
        assert_eq!(
            render_timestamp(&ts, chrono_tz::Europe::Berlin, "%d.%m.%Y %H:%M").unwrap(),
            "01.07.2024 12:30"
        );
    }
}
