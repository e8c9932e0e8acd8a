// crates/core/src/locale.rs
//! Locale negotiation from `Accept-Language` style ranges.

use std::fmt;

/// Locales the exporters render for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    German,
    English,
}

impl Locale {
    /// Supported locales in preference order for wildcard ranges.
    pub const SUPPORTED: [Locale; 2] = [Locale::German, Locale::English];

    pub fn tag(&self) -> &'static str {
        match self {
            Locale::German => "de",
            Locale::English => "en",
        }
    }

    /// Decimal separator used when the request does not choose one.
    pub fn decimal_separator(&self) -> char {
        match self {
            Locale::German => ',',
            Locale::English => '.',
        }
    }

    fn from_primary_subtag(tag: &str) -> Option<Locale> {
        let primary = tag.split(['-', '_']).next()?.to_ascii_lowercase();
        match primary.as_str() {
            "de" => Some(Locale::German),
            "en" => Some(Locale::English),
            "*" => Some(Self::SUPPORTED[0]),
            _ => None,
        }
    }

    /// Negotiate a locale.
    ///
    /// A missing or blank header falls back to `default_ranges`. Ranges are
    /// tried by descending quality (`q=0` excluded) and matched on their
    /// primary language subtag. Without any match the result is English.
    pub fn negotiate(header: Option<&str>, default_ranges: &str) -> Locale {
        let ranges = match header.map(str::trim) {
            Some(h) if !h.is_empty() => h,
            _ => default_ranges,
        };

        let mut weighted: Vec<(f32, &str)> = ranges
            .split(',')
            .filter_map(|part| {
                let mut pieces = part.split(';');
                let tag = pieces.next()?.trim();
                if tag.is_empty() {
                    return None;
                }
                let q = pieces
                    .filter_map(|p| p.trim().strip_prefix("q="))
                    .find_map(|q| q.trim().parse::<f32>().ok())
                    .unwrap_or(1.0);
                (q > 0.0).then_some((q, tag))
            })
            .collect();
        // Stable sort keeps header order among equal weights.
        weighted.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        weighted
            .into_iter()
            .find_map(|(_, tag)| Self::from_primary_subtag(tag))
            .unwrap_or(Locale::English)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
