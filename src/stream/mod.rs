//! Byte-range streaming of track files.
//!
//! [`StreamPlan::resolve`] turns an optional `Range` header and the file's
//! current size into the response shape; [`respond`] opens the file and
//! builds the axum response for that plan.
//!
//! Accepted range syntax is a single `bytes=<start>-<end>` with `start`
//! required and `end` optional (defaulting to the last byte). An `end`
//! past the last byte is clamped. Everything else that arrives in a
//! `Range` header (suffix ranges, multiple ranges, other units, garbage)
//! gets a 416 with `Content-Range: bytes */<size>` rather than a silent
//! full response.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::library::StreamTarget;

/// Read buffer size for file bodies.
const CHUNK_SIZE: usize = 64 * 1024;

/// Response shape for one stream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPlan {
    /// No range requested: 200 with the whole file
    Full { size: u64 },
    /// 206 with bytes `start..=end`
    Partial { start: u64, end: u64, size: u64 },
    /// 416; the range was malformed or outside the file
    Unsatisfiable { size: u64 },
}

impl StreamPlan {
    /// Pick the plan for a request against a file of `size` bytes.
    pub fn resolve(range: Option<&str>, size: u64) -> Self {
        match range {
            None => Self::Full { size },
            Some(header) => match parse_range(header, size) {
                Some((start, end)) => Self::Partial { start, end, size },
                None => Self::Unsatisfiable { size },
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Full { .. } => StatusCode::OK,
            Self::Partial { .. } => StatusCode::PARTIAL_CONTENT,
            Self::Unsatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
        }
    }

    /// Offset of the first byte sent.
    pub fn start(&self) -> u64 {
        match self {
            Self::Partial { start, .. } => *start,
            _ => 0,
        }
    }

    /// Number of body bytes sent.
    pub fn content_length(&self) -> u64 {
        match self {
            Self::Full { size } => *size,
            Self::Partial { start, end, .. } => end - start + 1,
            Self::Unsatisfiable { .. } => 0,
        }
    }

    /// `Content-Range` value, if the plan carries one.
    pub fn content_range(&self) -> Option<String> {
        match self {
            Self::Full { .. } => None,
            Self::Partial { start, end, size } => Some(format!("bytes {start}-{end}/{size}")),
            Self::Unsatisfiable { size } => Some(format!("bytes */{size}")),
        }
    }
}

/// Parse a single `bytes=<start>-<end>` range against a file of `len`
/// bytes, returning the inclusive window.
pub fn parse_range(header: &str, len: u64) -> Option<(u64, u64)> {
    let (unit, spec) = header.trim().split_once('=')?;
    if !unit.trim().eq_ignore_ascii_case("bytes") || spec.contains(',') {
        return None;
    }
    let (a, b) = spec.trim().split_once('-')?;

    let start = parse_offset(a)?;
    if start >= len {
        return None;
    }
    let last = len - 1;

    let end = match b.trim() {
        "" => last,
        b => parse_offset(b)?.min(last),
    };
    if end < start {
        return None;
    }
    Some((start, end))
}

/// Decimal digits only; rejects signs, blanks and overflow.
fn parse_offset(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Serve `target` honouring the optional `Range` header.
///
/// The file size is read from the open handle, never from the cached
/// track, so a file that changed since the last scan is still served
/// byte-exact. With `head_only` the headers are computed the same way
/// and the body is empty. Dropping the response body (client went away)
/// closes the file.
pub async fn respond(target: &StreamTarget, range: Option<&str>, head_only: bool) -> Response {
    let mut file = match tokio::fs::File::open(&target.path).await {
        Ok(f) => f,
        Err(e) => {
            debug!(id = %target.id, error = %e, "Track file missing");
            return (StatusCode::NOT_FOUND, "file not found").into_response();
        }
    };
    let size = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(_) => return (StatusCode::NOT_FOUND, "file not found").into_response(),
    };

    let plan = StreamPlan::resolve(range, size);
    debug!(id = %target.id, range = ?range, plan = ?plan, "Stream request");

    let headers = plan_headers(&plan, &target.mime_type);
    if head_only || matches!(plan, StreamPlan::Unsatisfiable { .. }) {
        return (plan.status(), headers, Body::empty()).into_response();
    }

    if plan.start() > 0 && file.seek(std::io::SeekFrom::Start(plan.start())).await.is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "seek failed").into_response();
    }

    let body = ReaderStream::with_capacity(file.take(plan.content_length()), CHUNK_SIZE);
    (plan.status(), headers, Body::from_stream(body)).into_response()
}

fn plan_headers(plan: &StreamPlan, mime_type: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(content_range) = plan.content_range() {
        headers.insert(
            header::CONTENT_RANGE,
            HeaderValue::from_str(&content_range).unwrap_or(HeaderValue::from_static("bytes */0")),
        );
    }
    if matches!(plan, StreamPlan::Unsatisfiable { .. }) {
        return headers;
    }

    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime_type).unwrap_or(HeaderValue::from_static("audio/mpeg")),
    );
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(plan.content_length()));
    headers
}


/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any in-bounds window is returned exactly and its length adds up
        #[test]
        fn in_bounds_window_is_exact(size in 1u64..1_000_000, a in any::<u64>(), b in any::<u64>()) {
            let (start, end) = {
                let (x, y) = (a % size, b % size);
                (x.min(y), x.max(y))
            };
            let header = format!("bytes={start}-{end}");
            let plan = StreamPlan::resolve(Some(&header), size);
            prop_assert_eq!(plan, StreamPlan::Partial { start, end, size });
            prop_assert_eq!(plan.content_length(), end - start + 1);
        }

        /// A start at or past the end of the file is never served
        #[test]
        fn start_past_end_is_unsatisfiable(size in 0u64..1_000_000, past in 0u64..1_000) {
            let header = format!("bytes={}-", size + past);
            prop_assert_eq!(
                StreamPlan::resolve(Some(&header), size),
                StreamPlan::Unsatisfiable { size }
            );
        }

        /// Served windows always stay inside the file
        #[test]
        fn window_stays_inside_file(size in 1u64..10_000, start in 0u64..20_000, end in 0u64..20_000) {
            let header = format!("bytes={start}-{end}");
            if let Some((s, e)) = parse_range(&header, size) {
                prop_assert!(s <= e);
                prop_assert!(e < size);
            }
        }
    }
}
