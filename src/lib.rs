//! # axum-download
//!
//! HTTP downloads for [`axum`][1] with range requests and cache revalidation.
//!
//! A [`Download`] wraps a [`ByteSource`] (a file, an in-memory buffer or any
//! seekable handle) together with the [`EntityDescriptor`] of the payload.
//! Given the client's [`RequestConditions`] it decides, before a single body
//! byte is produced, between `200`, `206` (single span or
//! `multipart/byteranges`), `304` and `416`, then streams the selected spans
//! in bounded chunks, optionally throttled.
//!
//! [`AsyncSeekStart`] is a trait defined by this crate which only allows
//! seeking from the start of a source. It is automatically implemented for
//! any type implementing [`AsyncSeek`].
//!
//! ```
//! use axum::Router;
//! use axum::routing::get;
//!
//! use axum_download::{Download, DownloadError, RequestConditions};
//!
//! async fn document(conditions: RequestConditions) -> Result<Download, DownloadError> {
//!     Ok(Download::file("document.pdf").await?.conditions(conditions))
//! }
//!
//! let _app = Router::<()>::new().route("/document", get(document));
//! ```
//!
//! [1]: https://docs.rs/axum

mod conditional;
mod config;
mod entity;
mod error;
mod plan;
mod range;
mod source;
mod stream;

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::headers::{AcceptRanges, ContentLength, ContentRange, HeaderMapExt};
use bytes::Bytes;
use mime_guess::mime;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tokio::io::AsyncSeek;

pub use conditional::{etag_matches, is_not_modified, range_precondition_holds, RequestConditions};
pub use config::{DownloadConfig, DEFAULT_CHUNK_SIZE};
pub use entity::EntityDescriptor;
pub use error::DownloadError;
pub use plan::{plan, ResponseDecision};
pub use range::{
    covers_whole_entity, normalize, parse_range_header, resolve, satisfiable_spans, ByteSpan, ParseRangeError,
    RangeError, RawRangeSpec,
};
pub use source::{ByteSource, SeekableHandle};
pub use stream::{MultipartStream, RangedStream};

/// [`AsyncSeek`] narrowed to only allow seeking from start.
pub trait AsyncSeekStart {
    /// Same semantics as [`AsyncSeek::start_seek`], always passing position as the `SeekFrom::Start` variant.
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()>;

    /// Same semantics as [`AsyncSeek::poll_complete`], returning `()` instead of the new stream position.
    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>>;
}

impl<T: AsyncSeek> AsyncSeekStart for T {
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()> {
        AsyncSeek::start_seek(self, io::SeekFrom::Start(position))
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncSeek::poll_complete(self, cx).map_ok(|_| ())
    }
}

/// RFC 5987 `attr-char`: everything else is percent-encoded in `filename*`.
const ATTR_CHAR_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// How the client should present the download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Disposition {
    /// Save to disk.
    #[default]
    Attachment,
    /// Display in the browser.
    Inline,
}

impl Disposition {
    fn as_str(self) -> &'static str {
        match self {
            Disposition::Attachment => "attachment",
            Disposition::Inline => "inline",
        }
    }
}

/// The main responder type. Implements [`IntoResponse`].
#[derive(Debug)]
pub struct Download {
    source: ByteSource,
    entity: EntityDescriptor,
    conditions: RequestConditions,
    content_type: Option<String>,
    disposition: Disposition,
    filename: Option<String>,
    custom_etag: bool,
    config: DownloadConfig,
}

impl Download {
    /// Serve `source`, described by `entity`.
    pub fn new(source: ByteSource, entity: EntityDescriptor) -> Self {
        Download {
            source,
            entity,
            conditions: RequestConditions::default(),
            content_type: None,
            disposition: Disposition::default(),
            filename: None,
            custom_etag: false,
            config: DownloadConfig::default(),
        }
    }

    /// Serve the file at `path`.
    ///
    /// Length and modification time come from the file's metadata, the
    /// content type is guessed from the extension and the file name is
    /// offered as the download name.
    pub async fn file(path: impl AsRef<Path>) -> Result<Self, DownloadError> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            let message = format!("{} is not a regular file", path.display());
            return Err(io::Error::new(io::ErrorKind::NotFound, message).into());
        }

        let entity = EntityDescriptor::with_derived_etag(metadata.len(), metadata.modified()?)?;
        let mut download = Download::new(ByteSource::File(file), entity);
        download.content_type = mime_guess::from_path(path).first().map(|mime| mime.to_string());
        download.filename = path.file_name().map(|name| name.to_string_lossy().into_owned());
        Ok(download)
    }

    /// Serve bytes held in memory.
    pub fn data(data: impl Into<Bytes>, last_modified: SystemTime) -> Result<Self, DownloadError> {
        let data = data.into();
        let entity = EntityDescriptor::with_derived_etag(data.len() as u64, last_modified)?;
        Ok(Download::new(ByteSource::buffer(data), entity))
    }

    /// Serve an already open handle. Its length is found by seeking to the end.
    pub async fn handle(handle: impl SeekableHandle + 'static, last_modified: SystemTime) -> Result<Self, DownloadError> {
        let mut source = ByteSource::handle(handle);
        let length = source.length().await?;
        let entity = EntityDescriptor::with_derived_etag(length, last_modified)?;
        Ok(Download::new(source, entity))
    }

    /// Attach the request's range and conditional headers.
    pub fn conditions(mut self, conditions: RequestConditions) -> Self {
        self.conditions = conditions;
        self
    }

    /// Set the media type, rejecting anything that does not parse as one.
    pub fn content_type(mut self, content_type: &str) -> Result<Self, DownloadError> {
        let invalid = || DownloadError::InvalidContentType(content_type.to_string());
        content_type.parse::<mime::Mime>().map_err(|_| invalid())?;
        HeaderValue::from_str(content_type).map_err(|_| invalid())?;
        self.content_type = Some(content_type.to_string());
        Ok(self)
    }

    pub fn disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = disposition;
        self
    }

    /// Name offered to the client when saving.
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Replace the modification time.
    ///
    /// A tag set with [`Download::etag`] is kept; otherwise the default tag
    /// is derived again from the new time.
    pub fn last_modified(mut self, last_modified: SystemTime) -> Result<Self, DownloadError> {
        let length = self.entity.length();
        self.entity = if self.custom_etag {
            EntityDescriptor::new(length, last_modified, self.entity.etag())?
        } else {
            EntityDescriptor::with_derived_etag(length, last_modified)?
        };
        Ok(self)
    }

    /// Replace the entity tag. Later calls to [`Download::last_modified`] keep it.
    pub fn etag(mut self, etag: impl Into<String>) -> Result<Self, DownloadError> {
        self.entity = EntityDescriptor::new(self.entity.length(), self.entity.modified(), etag)?;
        self.custom_etag = true;
        Ok(self)
    }

    pub fn config(mut self, config: DownloadConfig) -> Self {
        self.config = config;
        self
    }

    pub fn entity(&self) -> &EntityDescriptor {
        &self.entity
    }

    /// What [`Download::respond`] would answer, without consuming the download.
    pub fn decision(&self) -> ResponseDecision {
        plan(&self.entity, &self.conditions)
    }

    /// Decides the response and prepares its headers and body.
    pub fn respond(self) -> DownloadResponse {
        let decision = self.decision();
        tracing::debug!(
            status = %decision.status(),
            length = self.entity.length(),
            range = self.conditions.range.as_deref(),
            "planned download response"
        );

        let mut headers = HeaderMap::new();
        let media_type = self
            .content_type
            .clone()
            .unwrap_or_else(|| self.config.default_content_type.clone());
        let length = self.entity.length();

        let body = match &decision {
            ResponseDecision::NotModified => {
                self.write_entity_headers(&mut headers);
                ResponseBody::Empty
            }
            ResponseDecision::RangeNotSatisfiable => {
                headers.typed_insert(ContentRange::unsatisfied_bytes(length));
                ResponseBody::Empty
            }
            ResponseDecision::FullContent { length } => {
                self.write_entity_headers(&mut headers);
                self.write_content_headers(&mut headers, &media_type);
                headers.typed_insert(ContentLength(*length));
                ResponseBody::Ranged(RangedStream::new(self.source, 0, *length, &self.config))
            }
            ResponseDecision::PartialContent { spans } => match spans.as_slice() {
                [span] => {
                    self.write_entity_headers(&mut headers);
                    self.write_content_headers(&mut headers, &media_type);
                    let content_range = ContentRange::bytes(span.offset..=span.last_byte, length)
                        .expect("span lies within the entity");
                    headers.typed_insert(content_range);
                    headers.typed_insert(ContentLength(span.len()));
                    ResponseBody::Ranged(RangedStream::new(self.source, span.offset, span.len(), &self.config))
                }
                _ => {
                    self.write_entity_headers(&mut headers);
                    let boundary = generate_boundary(&self.config.boundary_prefix);
                    let multipart_type = format!("multipart/byteranges; boundary={boundary}");
                    self.write_content_headers(&mut headers, &multipart_type);
                    ResponseBody::Multipart(MultipartStream::new(
                        self.source,
                        spans.clone(),
                        length,
                        media_type,
                        boundary,
                        &self.config,
                    ))
                }
            },
        };

        DownloadResponse { decision, headers, body }
    }

    /// Validators and caching headers, shared by 200, 206 and 304.
    fn write_entity_headers(&self, headers: &mut HeaderMap) {
        headers.typed_insert(AcceptRanges::bytes());
        if let Ok(etag) = HeaderValue::from_str(self.entity.etag()) {
            headers.insert(ETAG, etag);
        }
        if let Ok(last_modified) = HeaderValue::from_str(self.entity.last_modified()) {
            headers.insert(LAST_MODIFIED, last_modified);
        }
        match HeaderValue::from_str(&self.config.cache_control) {
            Ok(cache_control) => {
                headers.insert(CACHE_CONTROL, cache_control);
            }
            Err(_) => tracing::warn!(cache_control = %self.config.cache_control, "skipping invalid Cache-Control"),
        }
    }

    fn write_content_headers(&self, headers: &mut HeaderMap, content_type: &str) {
        match HeaderValue::from_str(content_type) {
            Ok(value) => {
                headers.insert(CONTENT_TYPE, value);
            }
            Err(_) => {
                tracing::warn!(%content_type, "invalid content type, sending application/octet-stream");
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
            }
        }
        headers.insert(CONTENT_DISPOSITION, self.content_disposition());
    }

    fn content_disposition(&self) -> HeaderValue {
        let disposition = self.disposition.as_str();
        if let Some(filename) = &self.filename {
            let fallback: String = filename
                .chars()
                .map(|c| if c.is_ascii() { c } else { '_' })
                .collect();
            let escaped = fallback.replace('\\', "\\\\").replace('"', "\\\"");
            let mut value = format!("{disposition}; filename=\"{escaped}\"");
            if !filename.is_ascii() {
                let encoded = utf8_percent_encode(filename, ATTR_CHAR_ENCODE_SET);
                value.push_str(&format!("; filename*=UTF-8''{encoded}"));
            }
            match HeaderValue::from_str(&value) {
                Ok(value) => return value,
                Err(_) => tracing::warn!(%filename, "file name is not a valid header value, omitting it"),
            }
        }
        HeaderValue::from_static(disposition)
    }
}

impl IntoResponse for Download {
    fn into_response(self) -> Response {
        self.respond().into_response()
    }
}

/// Body of a [`DownloadResponse`].
#[derive(Debug)]
pub enum ResponseBody {
    /// `304` and `416` carry no body.
    Empty,
    Ranged(RangedStream),
    Multipart(MultipartStream),
}

impl IntoResponse for ResponseBody {
    fn into_response(self) -> Response {
        match self {
            ResponseBody::Empty => Response::new(axum::body::Body::empty()),
            ResponseBody::Ranged(stream) => stream.into_response(),
            ResponseBody::Multipart(stream) => stream.into_response(),
        }
    }
}

/// A decided response: status, finished headers and the body still to be
/// streamed. Implements [`IntoResponse`].
#[derive(Debug)]
pub struct DownloadResponse {
    decision: ResponseDecision,
    headers: HeaderMap,
    body: ResponseBody,
}

impl DownloadResponse {
    pub fn status(&self) -> StatusCode {
        self.decision.status()
    }

    pub fn decision(&self) -> &ResponseDecision {
        &self.decision
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Hands every header of this response to `sink`. Nothing of the body
    /// has been read at this point.
    pub fn write_headers(&self, sink: &mut HeaderMap) {
        for (name, value) in &self.headers {
            sink.insert(name.clone(), value.clone());
        }
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }
}

impl IntoResponse for DownloadResponse {
    fn into_response(self) -> Response {
        (self.decision.status(), self.headers, self.body).into_response()
    }
}

static BOUNDARY_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// generate a unique boundary string for multipart responses
fn generate_boundary(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let sequence = BOUNDARY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let prefix: String = prefix
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(32)
        .collect();
    format!("{prefix}-{nanos:x}.{sequence:x}")
}

/// The `boundary` parameter of a `multipart/*` content type.
pub fn extract_boundary(content_type: &str) -> Option<String> {
    let mime = content_type.parse::<mime::Mime>().ok()?;
    if mime.type_() != mime::MULTIPART {
        return None;
    }
    mime.get_param(mime::BOUNDARY).map(|boundary| boundary.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use axum::http::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE};

    use super::*;

    const COMPLETE: &str = "1234567890123456789012345678901234567890123456789012345678901234567890123456789012345678901234567890";

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
        response.headers().get(name).map(|value| value.to_str().unwrap())
    }

    async fn file(conditions: RequestConditions) -> Download {
        Download::file("test/fixture.txt").await.unwrap().conditions(conditions)
    }

    fn range(header: &str) -> RequestConditions {
        RequestConditions::range(header)
    }

    #[tokio::test]
    async fn test_full_response() {
        let response = file(RequestConditions::default()).await.into_response();
        assert_eq!(StatusCode::OK, response.status());

        assert_eq!(Some("bytes"), header(&response, "Accept-Ranges"));
        assert_eq!(Some("100"), header(&response, "Content-Length"));
        assert_eq!(Some("text/plain"), header(&response, "Content-Type"));
        assert_eq!(Some("public"), header(&response, "Cache-Control"));
        assert_eq!(Some("attachment; filename=\"fixture.txt\""), header(&response, "Content-Disposition"));
        assert!(header(&response, "ETag").is_some());
        assert!(header(&response, "Last-Modified").is_some());
        assert_eq!(None, header(&response, "Content-Range"));

        assert_eq!(COMPLETE, body_string(response).await);
    }

    #[tokio::test]
    async fn test_suffix_from_offset() {
        let response = file(range("bytes=95-")).await.into_response();
        assert_eq!(StatusCode::PARTIAL_CONTENT, response.status());
        assert_eq!(Some("bytes 95-99/100"), header(&response, "Content-Range"));
        assert_eq!(Some("5"), header(&response, "Content-Length"));
        assert_eq!("67890", body_string(response).await);
    }

    #[tokio::test]
    async fn test_partial_responses() {
        let tests = [
            ("bytes=1-5", "bytes 1-5/100", "23456"),
            ("bytes=-5", "bytes 95-99/100", "67890"),
            ("bytes=30-30", "bytes 30-30/100", "1"),
            ("bytes=90-999", "bytes 90-99/100", "1234567890"),
        ];

        for (header_value, content_range, expected) in tests {
            let response = file(range(header_value)).await.into_response();
            assert_eq!(StatusCode::PARTIAL_CONTENT, response.status(), "{header_value}");
            assert_eq!(Some(content_range), header(&response, "Content-Range"));
            assert_eq!(expected, body_string(response).await);
        }
    }

    #[tokio::test]
    async fn test_whole_range_is_plain_ok() {
        let response = file(range("bytes=0-99")).await.into_response();
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(None, header(&response, "Content-Range"));
        assert_eq!(COMPLETE, body_string(response).await);
    }

    #[tokio::test]
    async fn test_unsatisfiable_range() {
        for header_value in ["bytes=451-510, -0", "bytes=1000-2000", "bytes=2-23 24-"] {
            let response = file(range(header_value)).await.into_response();
            assert_eq!(StatusCode::RANGE_NOT_SATISFIABLE, response.status(), "{header_value}");
            assert_eq!(Some("bytes */100"), header(&response, "Content-Range"));
            assert_eq!("", body_string(response).await);
        }
    }

    #[tokio::test]
    async fn test_if_modified_since_not_modified() {
        let download = file(RequestConditions::default()).await;
        let conditions = RequestConditions {
            if_modified_since: Some(download.entity().last_modified().to_string()),
            ..Default::default()
        };

        let response = download.conditions(conditions).into_response();
        assert_eq!(StatusCode::NOT_MODIFIED, response.status());
        assert!(header(&response, "ETag").is_some());
        assert_eq!(None, header(&response, "Content-Length"));
        assert_eq!(None, header(&response, "Content-Type"));
        assert_eq!("", body_string(response).await);
    }

    #[tokio::test]
    async fn test_if_none_match_beats_range() {
        let download = file(RequestConditions::default()).await;
        let mut conditions = range("bytes=0-4");
        conditions.if_none_match = Some(download.entity().etag().to_string());

        let response = download.conditions(conditions).into_response();
        assert_eq!(StatusCode::NOT_MODIFIED, response.status());
        assert_eq!("", body_string(response).await);
    }

    #[tokio::test]
    async fn test_if_match_mismatch_sends_everything() {
        let mut conditions = range("bytes=0-4");
        conditions.if_match = Some("\"something-else\"".into());

        let response = file(conditions).await.into_response();
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(Some("100"), header(&response, "Content-Length"));
        assert_eq!(COMPLETE, body_string(response).await);
    }

    #[tokio::test]
    async fn test_multiple_ranges() {
        let response = file(range("bytes=2-23,45-51, 24-44")).await.into_response();
        assert_eq!(StatusCode::PARTIAL_CONTENT, response.status());
        assert_eq!(None, header(&response, "Content-Length"));

        let content_type = header(&response, "Content-Type").unwrap().to_string();
        assert!(content_type.starts_with("multipart/byteranges; boundary=DOWNLOAD_BOUNDARY-"));
        let boundary = extract_boundary(&content_type).unwrap();

        let body = body_string(response).await;
        assert!(body.starts_with(&format!("--{boundary}\r\n")));
        assert!(body.ends_with(&format!("\r\n--{boundary}--\r\n")));
        assert!(body.contains("Content-Range: bytes 2-23/100"));
        assert_eq!(3, body.matches("Content-Type: text/plain\r\n").count());
    }

    #[tokio::test]
    async fn test_multipart_parts_parse() {
        let response = file(range("bytes=0-0,-1")).await.into_response();
        let content_type = header(&response, "Content-Type").unwrap().to_string();
        let boundary = extract_boundary(&content_type).unwrap();

        let mut multipart = multer::Multipart::new(response.into_body().into_data_stream(), boundary);
        let mut parts = Vec::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            let content_range = field.headers().get("content-range").unwrap().to_str().unwrap().to_string();
            let data = field.bytes().await.unwrap();
            parts.push((content_range, data));
        }

        assert_eq!(
            vec![
                ("bytes 0-0/100".to_string(), Bytes::from_static(b"1")),
                ("bytes 99-99/100".to_string(), Bytes::from_static(b"0")),
            ],
            parts
        );
    }

    #[tokio::test]
    async fn test_every_source_kind() {
        let modified = UNIX_EPOCH + Duration::from_secs(1_000_000_000);
        let handle = tokio::fs::File::open("test/fixture.txt").await.unwrap();
        let downloads = [
            Download::file("test/fixture.txt").await.unwrap(),
            Download::data(COMPLETE, modified).unwrap(),
            Download::handle(handle, modified).await.unwrap(),
        ];

        for download in downloads {
            assert_eq!(100, download.entity().length());
            let config = DownloadConfig::default().with_chunk_size(33);

            let response = download.config(config).conditions(range("bytes=1-5")).into_response();
            assert_eq!(StatusCode::PARTIAL_CONTENT, response.status());
            assert_eq!("23456", body_string(response).await);
        }
    }

    #[tokio::test]
    async fn test_handle_is_rewound_for_full_content() {
        let handle = tokio::fs::File::open("test/fixture.txt").await.unwrap();
        let download = Download::handle(handle, SystemTime::now()).await.unwrap();
        assert_eq!(COMPLETE, body_string(download.into_response()).await);
    }

    #[tokio::test]
    async fn test_empty_entity() {
        let download = Download::data(Bytes::new(), SystemTime::now()).unwrap();
        let response = download.into_response();
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(Some("0"), header(&response, "Content-Length"));
        assert_eq!("", body_string(response).await);

        let download = Download::data(Bytes::new(), SystemTime::now()).unwrap().conditions(range("bytes=0-"));
        assert_eq!(StatusCode::RANGE_NOT_SATISFIABLE, download.into_response().status());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = Download::file("test/missing.txt").await.unwrap_err();
        assert_matches!(&err, DownloadError::SourceIo(e) if e.kind() == io::ErrorKind::NotFound);
        assert_eq!(StatusCode::NOT_FOUND, err.into_response().status());

        let err = Download::file("test").await.unwrap_err();
        assert_matches!(err, DownloadError::SourceIo(_));
    }

    #[test]
    fn test_content_type_validation() {
        let download = Download::data("x", SystemTime::now()).unwrap();
        let download = download.content_type("text/html;charset=iso-8859-1").unwrap();
        assert_eq!(Some("text/html;charset=iso-8859-1"), download.content_type.as_deref());

        let err = download.content_type("##++***!§§§§?°°^^}][{").unwrap_err();
        assert_matches!(err, DownloadError::InvalidContentType(_));
    }

    #[test]
    fn test_content_disposition() {
        let download = Download::data("x", SystemTime::now()).unwrap();
        let response = download.respond();
        assert_eq!(Some(&HeaderValue::from_static("attachment")), response.headers().get(CONTENT_DISPOSITION));

        let download = Download::data("x", SystemTime::now())
            .unwrap()
            .disposition(Disposition::Inline)
            .filename("report \"final\".pdf");
        let response = download.respond();
        assert_eq!(
            Some(&HeaderValue::from_static("inline; filename=\"report \\\"final\\\".pdf\"")),
            response.headers().get(CONTENT_DISPOSITION)
        );

        let download = Download::data("x", SystemTime::now()).unwrap().filename("r\u{e9}sum\u{e9} 1.pdf");
        let response = download.respond();
        assert_eq!(
            Some(&HeaderValue::from_static(
                "attachment; filename=\"r_sum_ 1.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9%201.pdf"
            )),
            response.headers().get(CONTENT_DISPOSITION)
        );
        assert!(response.headers()[CONTENT_DISPOSITION].to_str().is_ok());

        let download = Download::data("x", SystemTime::now()).unwrap().filename("bad\nname.pdf");
        let response = download.respond();
        assert_eq!(Some(&HeaderValue::from_static("attachment")), response.headers().get(CONTENT_DISPOSITION));
    }

    #[test]
    fn test_etag_and_last_modified_overrides() {
        let download = Download::data("abc", UNIX_EPOCH).unwrap().etag("\"custom\"").unwrap();
        assert_eq!("\"custom\"", download.entity().etag());
        assert_eq!("Thu, 01 Jan 1970 00:00:00 GMT", download.entity().last_modified());

        let download = download.last_modified(UNIX_EPOCH + Duration::from_secs(784111777)).unwrap();
        assert_eq!("Sun, 06 Nov 1994 08:49:37 GMT", download.entity().last_modified());
        assert_eq!("\"custom\"", download.entity().etag());

        // without a custom tag the default one follows the new time
        let download = Download::data("abc", UNIX_EPOCH)
            .unwrap()
            .last_modified(UNIX_EPOCH + Duration::from_secs(784111777))
            .unwrap();
        assert_eq!("\"3-2ebc98a1\"", download.entity().etag());
    }

    #[test]
    fn test_headers_are_final_before_body() {
        let download = Download::data(COMPLETE, SystemTime::now()).unwrap().conditions(range("bytes=95-"));
        let response = download.respond();
        assert_matches!(response.decision(), ResponseDecision::PartialContent { spans } if spans.len() == 1);

        let mut sink = HeaderMap::new();
        response.write_headers(&mut sink);
        assert_eq!("bytes 95-99/100", sink.get(CONTENT_RANGE).unwrap().to_str().unwrap());
        assert_eq!("5", sink.get(CONTENT_LENGTH).unwrap().to_str().unwrap());
        assert_eq!("bytes", sink.get(ACCEPT_RANGES).unwrap().to_str().unwrap());
        assert_matches!(response.into_body(), ResponseBody::Ranged(_));
    }

    #[test]
    fn test_boundaries_are_unique() {
        let first = generate_boundary("DOWNLOAD_BOUNDARY");
        let second = generate_boundary("DOWNLOAD_BOUNDARY");
        assert_ne!(first, second);
        assert!(first.starts_with("DOWNLOAD_BOUNDARY-"));

        assert!(generate_boundary("bad prefix; \"x\"").starts_with("badprefixx-"));
    }

    #[test]
    fn test_extract_boundary() {
        assert_eq!(Some("abc-1".to_string()), extract_boundary("multipart/byteranges; boundary=abc-1"));
        assert_eq!(Some("abc".to_string()), extract_boundary("multipart/byteranges; boundary=\"abc\""));
        assert_eq!(None, extract_boundary("text/plain; boundary=abc"));
        assert_eq!(None, extract_boundary("multipart/byteranges"));
    }
}
