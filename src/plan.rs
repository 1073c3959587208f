use axum::http::StatusCode;

use crate::conditional::{is_not_modified, range_precondition_holds};
use crate::range::{covers_whole_entity, satisfiable_spans};
use crate::{ByteSpan, EntityDescriptor, RequestConditions};

/// What a request gets answered with. Decided before any body byte is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseDecision {
    NotModified,
    FullContent { length: u64 },
    /// One or more spans, in the order the client asked for them.
    PartialContent { spans: Vec<ByteSpan> },
    RangeNotSatisfiable,
}

impl ResponseDecision {
    pub fn status(&self) -> StatusCode {
        match self {
            ResponseDecision::NotModified => StatusCode::NOT_MODIFIED,
            ResponseDecision::FullContent { .. } => StatusCode::OK,
            ResponseDecision::PartialContent { .. } => StatusCode::PARTIAL_CONTENT,
            ResponseDecision::RangeNotSatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
        }
    }
}

/// Decide how to answer a request for `entity`.
///
/// Cache validation wins over everything, a refused range precondition falls
/// back to the whole entity, and a range that cannot be served at all is a
/// `416`.
pub fn plan(entity: &EntityDescriptor, conditions: &RequestConditions) -> ResponseDecision {
    let length = entity.length();

    if is_not_modified(conditions, entity) {
        tracing::debug!(etag = entity.etag(), "client copy is current");
        return ResponseDecision::NotModified;
    }

    let Some(range) = conditions.range.as_deref() else {
        return ResponseDecision::FullContent { length };
    };

    if !range_precondition_holds(conditions, entity) {
        return ResponseDecision::FullContent { length };
    }

    match satisfiable_spans(range, length) {
        Err(e) => {
            tracing::debug!(%range, length, error = %e, "range not satisfiable");
            ResponseDecision::RangeNotSatisfiable
        }
        Ok(spans) if covers_whole_entity(&spans, length) => {
            tracing::debug!(%range, length, "range covers the whole entity");
            ResponseDecision::FullContent { length }
        }
        Ok(spans) => ResponseDecision::PartialContent { spans },
    }
}
