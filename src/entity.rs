use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::HeaderValue;

use crate::DownloadError;

/// Last second representable as an HTTP-date (9999-12-31T23:59:59Z).
const MAX_HTTP_DATE_SECS: u64 = 253_402_300_799;

/// Immutable facts about the payload served by one response.
///
/// `last_modified` is kept in its formatted `Last-Modified` form because the
/// conditional headers are compared against exactly that string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    length: u64,
    modified_secs: u64,
    last_modified: String,
    etag: String,
}

impl EntityDescriptor {
    /// Describe an entity with an explicit entity tag.
    pub fn new(length: u64, last_modified: SystemTime, etag: impl Into<String>) -> Result<Self, DownloadError> {
        let modified_secs = http_date_secs(last_modified)?;
        let etag = etag.into();
        let trimmed = etag.trim();
        if trimmed.is_empty() || HeaderValue::from_str(trimmed).is_err() {
            return Err(DownloadError::InvalidEntityMetadata(format!("unusable entity tag {etag:?}")));
        }

        Ok(EntityDescriptor {
            length,
            modified_secs,
            last_modified: httpdate::fmt_http_date(UNIX_EPOCH + Duration::from_secs(modified_secs)),
            etag: trimmed.to_string(),
        })
    }

    /// Describe an entity, deriving a strong tag from length and modification time.
    pub fn with_derived_etag(length: u64, last_modified: SystemTime) -> Result<Self, DownloadError> {
        let secs = http_date_secs(last_modified)?;
        Self::new(length, last_modified, format!("\"{length:x}-{secs:x}\""))
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    /// The `Last-Modified` header value.
    pub fn last_modified(&self) -> &str {
        &self.last_modified
    }

    pub fn modified(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.modified_secs)
    }

    pub fn etag(&self) -> &str {
        &self.etag
    }
}

fn http_date_secs(time: SystemTime) -> Result<u64, DownloadError> {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .map_err(|_| DownloadError::InvalidEntityMetadata("last-modified precedes the unix epoch".into()))?
        .as_secs();
    if secs > MAX_HTTP_DATE_SECS {
        return Err(DownloadError::InvalidEntityMetadata(format!("last-modified {secs}s is past year 9999")));
    }
    Ok(secs)
}
