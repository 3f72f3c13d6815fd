//! File download replies with conditional request support.
//!
//! # Responsibilities
//! - `Content-Disposition: attachment` with the given file name
//! - Validators: `ETag` (content hash) and `Last-Modified`
//! - `If-None-Match` / `If-Modified-Since` → 304 Not Modified
//! - Single `Range: bytes=...` → 206 Partial Content, 416 when unsatisfiable
//! - `If-Range` disables the range unless it matches a validator
//!
//! # Design Decisions
//! - Content is in memory (`Bytes`); ranges are zero-copy slices
//! - Multi-range requests are served as the full content
//! - HTTP dates have second precision; modification times are truncated before comparing

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    http::{header, request::Parts, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;

use crate::http::response::Respond;

/// A downloadable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResponse {
    pub file_name: String,
    pub content: Bytes,
    pub modified: SystemTime,
}

impl FileResponse {
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>, modified: SystemTime) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
            modified,
        }
    }
}

impl Respond for FileResponse {
    fn respond(self, request: &Parts) -> Response {
        let size = self.content.len();
        let etag = content_etag(&self.content);
        let modified = known_modified(self.modified);
        let headers = &request.headers;

        let builder = Response::builder()
            .header(
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", self.file_name),
            )
            .header(header::ETAG, &etag)
            .header(header::ACCEPT_RANGES, "bytes");
        let builder = match modified {
            Some(t) => builder.header(header::LAST_MODIFIED, httpdate::fmt_http_date(t)),
            None => builder,
        };

        let conditional = matches!(request.method, Method::GET | Method::HEAD);
        let result = if conditional && is_not_modified(headers, &etag, modified) {
            builder.status(StatusCode::NOT_MODIFIED).body(Body::empty())
        } else {
            let range = if conditional && range_applies(headers, &etag, modified) {
                parse_range_header(
                    headers.get(header::RANGE).and_then(|v| v.to_str().ok()),
                    size,
                )
            } else {
                RangeParseResult::None
            };

            let builder = builder.header(header::CONTENT_TYPE, content_type(&self.file_name));
            match range {
                RangeParseResult::Valid(range) => {
                    let end = range.end_position(size);
                    builder
                        .status(StatusCode::PARTIAL_CONTENT)
                        .header(
                            header::CONTENT_RANGE,
                            format!("bytes {}-{}/{}", range.start, end, size),
                        )
                        .body(Body::from(self.content.slice(range.start..=end)))
                }
                RangeParseResult::NotSatisfiable => builder
                    .status(StatusCode::RANGE_NOT_SATISFIABLE)
                    .header(header::CONTENT_RANGE, format!("bytes */{size}"))
                    .body(Body::empty()),
                RangeParseResult::None => builder.status(StatusCode::OK).body(Body::from(self.content)),
            }
        };

        match result {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(file_name = %self.file_name, error = %e, "Failed to build file response");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Modification time truncated to whole seconds; the Unix epoch means unknown.
fn known_modified(modified: SystemTime) -> Option<SystemTime> {
    let secs = modified.duration_since(UNIX_EPOCH).ok()?.as_secs();
    (secs > 0).then(|| UNIX_EPOCH + Duration::from_secs(secs))
}

/// Quoted `ETag` from a fast content hash, e.g. `"3f2a9c"`.
pub fn content_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("\"{:x}\"", hasher.finish())
}

/// `If-None-Match` takes precedence; `If-Modified-Since` is consulted only without it.
fn is_not_modified(headers: &HeaderMap, etag: &str, modified: Option<SystemTime>) -> bool {
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH) {
        return if_none_match.to_str().is_ok_and(|v| etag_matches(v, etag));
    }

    match (header_date(headers, header::IF_MODIFIED_SINCE), modified) {
        (Some(since), Some(modified)) => modified <= since,
        _ => false,
    }
}

fn etag_matches(list: &str, etag: &str) -> bool {
    list.split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate.trim_start_matches("W/") == etag)
}

/// Without `If-Range` a range always applies; with it, the validator must match.
fn range_applies(headers: &HeaderMap, etag: &str, modified: Option<SystemTime>) -> bool {
    let Some(if_range) = headers.get(header::IF_RANGE).and_then(|v| v.to_str().ok()) else {
        return true;
    };

    if if_range.starts_with('"') {
        return if_range == etag;
    }

    match (httpdate::parse_http_date(if_range).ok(), modified) {
        (Some(date), Some(modified)) => date == modified,
        _ => false,
    }
}

fn header_date(headers: &HeaderMap, name: header::HeaderName) -> Option<SystemTime> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| httpdate::parse_http_date(v).ok())
}

/// Parsed single byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRequest {
    pub start: usize,
    /// Inclusive end; `None` means until the end of the content.
    pub end: Option<usize>,
}

impl RangeRequest {
    pub fn end_position(&self, size: usize) -> usize {
        self.end.unwrap_or_else(|| size.saturating_sub(1))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RangeParseResult {
    Valid(RangeRequest),
    /// Should be answered with 416.
    NotSatisfiable,
    /// No header, unsupported unit, multiple ranges or malformed: serve everything.
    None,
}

/// Parse a `Range` header (single range, bytes unit).
///
/// Supported forms: `bytes=start-end`, `bytes=start-`, `bytes=-suffix`.
pub fn parse_range_header(range_header: Option<&str>, size: usize) -> RangeParseResult {
    let Some(spec) = range_header.and_then(|h| h.strip_prefix("bytes=")) else {
        return RangeParseResult::None;
    };

    if spec.contains(',') {
        return RangeParseResult::None;
    }

    let Some((start, end)) = spec.split_once('-') else {
        return RangeParseResult::None;
    };
    let (start, end) = (start.trim(), end.trim());

    if start.is_empty() {
        let Ok(suffix) = end.parse::<usize>() else {
            return RangeParseResult::None;
        };
        if suffix == 0 || size == 0 {
            return RangeParseResult::NotSatisfiable;
        }
        return RangeParseResult::Valid(RangeRequest {
            start: size.saturating_sub(suffix),
            end: Some(size - 1),
        });
    }

    let Ok(start) = start.parse::<usize>() else {
        return RangeParseResult::None;
    };
    if start >= size {
        return RangeParseResult::NotSatisfiable;
    }

    let end = if end.is_empty() {
        None
    } else {
        let Ok(end) = end.parse::<usize>() else {
            return RangeParseResult::None;
        };
        if start > end {
            return RangeParseResult::NotSatisfiable;
        }
        Some(end.min(size - 1))
    };

    RangeParseResult::Valid(RangeRequest { start, end })
}

/// Content type by file extension.
pub fn content_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("txt" | "log" | "md") => "text/plain; charset=utf-8",
        Some("csv") => "text/csv; charset=utf-8",
        Some("xml") => "application/xml",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz" | "gzip") => "application/gzip",
        Some("tar") => "application/x-tar",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("mp3") => "audio/mpeg",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    fn file() -> FileResponse {
        FileResponse::new(
            "report.txt",
            "hello, world!",
            UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        )
    }

    fn head(headers: &[(header::HeaderName, &str)]) -> Parts {
        let mut builder = Request::builder().method(Method::GET);
        for (name, value) in headers {
            builder = builder.header(name, HeaderValue::from_str(value).unwrap());
        }
        builder.body(()).unwrap().into_parts().0
    }

    async fn body(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    #[tokio::test]
    async fn test_full_download() {
        let response = file().respond(&head(&[]));
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=report.txt"
        );
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(headers[header::LAST_MODIFIED], "Tue, 14 Nov 2023 22:13:20 GMT");
        assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
        assert_eq!(body(response).await, "hello, world!");
    }

    #[tokio::test]
    async fn test_range_request() {
        let response = file().respond(&head(&[(header::RANGE, "bytes=7-11")]));
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 7-11/13");
        assert_eq!(body(response).await, "world");
    }

    #[tokio::test]
    async fn test_unsatisfiable_range() {
        let response = file().respond(&head(&[(header::RANGE, "bytes=100-")]));
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */13");
    }

    #[test]
    fn test_if_modified_since() {
        let response = file().respond(&head(&[(
            header::IF_MODIFIED_SINCE,
            "Tue, 14 Nov 2023 22:13:20 GMT",
        )]));
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

        let response = file().respond(&head(&[(
            header::IF_MODIFIED_SINCE,
            "Tue, 14 Nov 2023 22:13:19 GMT",
        )]));
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_if_none_match() {
        let etag = content_etag(b"hello, world!");
        let response = file().respond(&head(&[(header::IF_NONE_MATCH, etag.as_str())]));
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

        // If-None-Match wins over a matching If-Modified-Since.
        let response = file().respond(&head(&[
            (header::IF_NONE_MATCH, "\"other\""),
            (header::IF_MODIFIED_SINCE, "Tue, 14 Nov 2023 22:13:20 GMT"),
        ]));
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_if_range_mismatch_serves_full_content() {
        let response = file().respond(&head(&[
            (header::RANGE, "bytes=0-4"),
            (header::IF_RANGE, "\"stale\""),
        ]));
        assert_eq!(response.status(), StatusCode::OK);

        let etag = content_etag(b"hello, world!");
        let response = file().respond(&head(&[(header::RANGE, "bytes=0-4"), (header::IF_RANGE, etag.as_str())]));
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    }

    #[test]
    fn test_unknown_modification_time() {
        let f = FileResponse::new("a.bin", "x", UNIX_EPOCH);
        let response = f.respond(&head(&[(
            header::IF_MODIFIED_SINCE,
            "Tue, 14 Nov 2023 22:13:20 GMT",
        )]));
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::LAST_MODIFIED).is_none());
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/octet-stream");
    }

    #[test]
    fn test_parse_range_forms() {
        assert_eq!(parse_range_header(None, 100), RangeParseResult::None);
        assert_eq!(
            parse_range_header(Some("bytes=0-9"), 100),
            RangeParseResult::Valid(RangeRequest { start: 0, end: Some(9) })
        );
        assert_eq!(
            parse_range_header(Some("bytes=50-"), 100),
            RangeParseResult::Valid(RangeRequest { start: 50, end: None })
        );
        assert_eq!(
            parse_range_header(Some("bytes=-20"), 100),
            RangeParseResult::Valid(RangeRequest { start: 80, end: Some(99) })
        );
        assert_eq!(
            parse_range_header(Some("bytes=90-500"), 100),
            RangeParseResult::Valid(RangeRequest { start: 90, end: Some(99) })
        );
        assert_eq!(parse_range_header(Some("bytes=0-9,20-29"), 100), RangeParseResult::None);
        assert_eq!(parse_range_header(Some("items=0-9"), 100), RangeParseResult::None);
        assert_eq!(parse_range_header(Some("bytes=a-b"), 100), RangeParseResult::None);
        assert_eq!(parse_range_header(Some("bytes=9-0"), 100), RangeParseResult::NotSatisfiable);
        assert_eq!(parse_range_header(Some("bytes=-5"), 0), RangeParseResult::NotSatisfiable);
    }
}
