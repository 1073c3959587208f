use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header::{self, HeaderName};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::EntityDescriptor;

/// The request headers that steer a download, captured as raw strings.
///
/// Values are not parsed here: a malformed `Range` still has to be seen by
/// the planner so it can answer `416`, and dates are compared as the exact
/// `Last-Modified` text. Repeated header lines are joined with `", "`.
///
/// Usable directly as an axum extractor; extraction never fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestConditions {
    pub range: Option<String>,
    pub if_range: Option<String>,
    pub if_match: Option<String>,
    pub if_unmodified_since: Option<String>,
    pub if_modified_since: Option<String>,
    pub if_none_match: Option<String>,
}

impl RequestConditions {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        RequestConditions {
            range: joined(headers, header::RANGE),
            if_range: joined(headers, header::IF_RANGE),
            if_match: joined(headers, header::IF_MATCH),
            if_unmodified_since: joined(headers, header::IF_UNMODIFIED_SINCE),
            if_modified_since: joined(headers, header::IF_MODIFIED_SINCE),
            if_none_match: joined(headers, header::IF_NONE_MATCH),
        }
    }

    /// Conditions carrying only a `Range` header.
    pub fn range(range: impl Into<String>) -> Self {
        RequestConditions { range: Some(range.into()), ..Default::default() }
    }
}

fn joined(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    let values: Vec<String> = headers
        .get_all(name)
        .iter()
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestConditions {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestConditions::from_headers(&parts.headers))
    }
}

/// Whether a comma separated entity-tag list names `etag`. `*` matches anything.
pub fn etag_matches(list: &str, etag: &str) -> bool {
    list.split(',')
        .map(str::trim)
        .any(|token| token == "*" || token == etag)
}

/// Whether a `Range` request may be answered with a partial response.
///
/// Every validator the client sent has to agree with the current entity.
/// A failure here means "send the whole entity", never an error status.
pub fn range_precondition_holds(conditions: &RequestConditions, entity: &EntityDescriptor) -> bool {
    if let Some(if_match) = &conditions.if_match {
        if !etag_matches(if_match, entity.etag()) {
            tracing::debug!(%if_match, etag = entity.etag(), "If-Match failed, ignoring range");
            return false;
        }
    }

    if let Some(since) = &conditions.if_unmodified_since {
        if since.trim() != entity.last_modified() {
            tracing::debug!(%since, last_modified = entity.last_modified(), "If-Unmodified-Since failed, ignoring range");
            return false;
        }
    }

    if let Some(if_range) = &conditions.if_range {
        let validator = if_range.trim();
        if validator != entity.etag() && validator != entity.last_modified() {
            tracing::debug!(%if_range, "If-Range validator is stale, ignoring range");
            return false;
        }
    }

    true
}

/// Whether the client's cached copy is current, i.e. the answer is `304`.
pub fn is_not_modified(conditions: &RequestConditions, entity: &EntityDescriptor) -> bool {
    let none_match = conditions
        .if_none_match
        .as_deref()
        .is_some_and(|list| etag_matches(list, entity.etag()));

    let not_modified_since = conditions
        .if_modified_since
        .as_deref()
        .is_some_and(|since| since.trim() == entity.last_modified());

    none_match || not_modified_since
}
