//! `Range` header parsing and normalization.
//!
//! Parsing only checks syntax. Normalization resolves the parsed specs
//! against the entity length and keeps them in request order.

use thiserror::Error;

/// One `first-last` spec as written in the header, before resolution.
///
/// `bytes=5-9` is `Some(5), Some(9)`, `bytes=5-` is `Some(5), None`, and
/// the suffix form `bytes=-5` is `None, Some(5)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRangeSpec {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

/// An inclusive byte interval inside the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSpan {
    pub offset: u64,
    pub last_byte: u64,
}

impl ByteSpan {
    pub fn new(offset: u64, last_byte: u64) -> Self {
        ByteSpan { offset, last_byte }
    }

    pub fn len(&self) -> u64 {
        self.last_byte - self.offset + 1
    }

    /// `Content-Range` value for this span of an entity of `complete_length` bytes.
    pub fn content_range(&self, complete_length: u64) -> String {
        format!("bytes {}-{}/{}", self.offset, self.last_byte, complete_length)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseRangeError {
    #[error("range header does not start with 'bytes='")]
    MissingUnit,
    #[error("range header has no range specs")]
    Empty,
    #[error("malformed range spec '{0}'")]
    InvalidSpec(String),
}

/// Why a `Range` header cannot be honored. Both cases answer with `416`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("malformed range: {0}")]
    Malformed(#[from] ParseRangeError),
    #[error("no requested range overlaps the {length} byte entity")]
    Unsatisfiable { length: u64 },
}

const BYTES_UNIT: &str = "bytes=";

/// Parse a raw `Range` header value into its specs, in order.
pub fn parse_range_header(range_header: &str) -> Result<Vec<RawRangeSpec>, ParseRangeError> {
    let header = range_header.trim();
    let specs = match header.get(..BYTES_UNIT.len()) {
        Some(unit) if unit.eq_ignore_ascii_case(BYTES_UNIT) => &header[BYTES_UNIT.len()..],
        _ => return Err(ParseRangeError::MissingUnit),
    };

    if specs.trim().is_empty() {
        return Err(ParseRangeError::Empty);
    }

    specs.split(',').map(parse_spec).collect()
}

fn parse_spec(spec: &str) -> Result<RawRangeSpec, ParseRangeError> {
    let invalid = || ParseRangeError::InvalidSpec(spec.trim().to_string());

    let (start, end) = spec.trim().split_once('-').ok_or_else(invalid)?;
    let start = parse_bound(start).ok_or_else(invalid)?;
    let end = parse_bound(end).ok_or_else(invalid)?;

    if start.is_none() && end.is_none() {
        return Err(invalid());
    }
    Ok(RawRangeSpec { start, end })
}

/// `Some(None)` for an empty bound, `None` when the bound is not a number.
/// Digits past `u64::MAX` saturate; resolution clamps them to the entity.
fn parse_bound(bound: &str) -> Option<Option<u64>> {
    if bound.is_empty() {
        return Some(None);
    }
    if !bound.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(Some(bound.parse().unwrap_or(u64::MAX)))
}

/*
   If the last-byte-pos value is absent, or if the value is greater than or
   equal to the current length of the representation data, the byte range
   is interpreted as the remainder of the representation.

   If the selected representation is shorter than the specified
   suffix-length, the entire representation is used.
*/

/// Resolve one spec against an entity of `length` bytes.
///
/// Returns `None` when the spec starts at or past the end of the entity, or
/// when its last byte precedes its first.
pub fn resolve(spec: RawRangeSpec, length: u64) -> Option<ByteSpan> {
    let end_index = length.checked_sub(1)?;

    let (offset, last_byte) = match (spec.start, spec.end) {
        (Some(start), Some(end)) => (start, end.min(end_index)),
        (Some(start), None) => (start, end_index),
        (None, Some(suffix)) => (length - suffix.min(length), end_index),
        (None, None) => return None,
    };

    if offset >= length {
        return None;
    }
    if let (Some(start), Some(end)) = (spec.start, spec.end) {
        if start > end {
            return None;
        }
    }
    Some(ByteSpan::new(offset, last_byte))
}

/// Resolve every spec, dropping the ones that cannot be served.
///
/// Fails only when no spec survives. Request order is preserved and
/// overlapping spans are left as they are.
pub fn normalize(specs: &[RawRangeSpec], length: u64) -> Result<Vec<ByteSpan>, RangeError> {
    let spans: Vec<ByteSpan> = specs
        .iter()
        .filter_map(|spec| {
            let span = resolve(*spec, length);
            if span.is_none() {
                tracing::debug!(?spec, length, "dropping unsatisfiable range spec");
            }
            span
        })
        .collect();

    if spans.is_empty() {
        return Err(RangeError::Unsatisfiable { length });
    }
    Ok(spans)
}

/// Parse and normalize a `Range` header in one go.
pub fn satisfiable_spans(range_header: &str, length: u64) -> Result<Vec<ByteSpan>, RangeError> {
    let specs = parse_range_header(range_header)?;
    normalize(&specs, length)
}

/// True when the spans amount to the entire entity, i.e. the range adds nothing.
pub fn covers_whole_entity(spans: &[ByteSpan], length: u64) -> bool {
    matches!(spans, [span] if span.offset == 0 && span.last_byte + 1 == length)
}
