// crates/server/src/identity.rs
//! Caller identity and request metadata taken from headers.
//!
//! Authentication happens in the upstream Shibboleth proxy, which forwards
//! the user id and roles as plain headers.

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use lada_core::{Charset, Locale, UserInfo};

use crate::error::ApiError;

pub const USER_HEADER: &str = "X-SHIB-user";
pub const ROLES_HEADER: &str = "X-SHIB-roles";
pub const FILE_ENCODING_HEADER: &str = "X-FILE-ENCODING";
pub const FACILITY_HEADER: &str = "X-LADA-MST";

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct Caller(pub UserInfo);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_str(&parts.headers, USER_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {USER_HEADER} header")))?;
        let roles = header_str(&parts.headers, ROLES_HEADER)
            .map(|roles| {
                roles
                    .split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Ok(Caller(UserInfo::new(user_id).with_roles(roles)))
    }
}

/// Non-empty, trimmed value of a header.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Output charset requested via `X-FILE-ENCODING`, or `default_label`.
pub fn requested_charset(headers: &HeaderMap, default_label: &str) -> Result<Charset, ApiError> {
    let label = header_str(headers, FILE_ENCODING_HEADER).unwrap_or(default_label);
    Charset::for_output(label).map_err(|e| {
        tracing::warn!(label, error = %e, "Rejected export encoding");
        ApiError::BadRequest("Invalid or unknown encoding requested".to_string())
    })
}

pub fn requested_locale(headers: &HeaderMap, default_ranges: &str) -> Locale {
    Locale::negotiate(header_str(headers, header::ACCEPT_LANGUAGE.as_str()), default_ranges)
}
