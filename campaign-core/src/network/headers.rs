//! Conditional fetch headers.
//!
//! Translates between the cache's freshness token and the HTTP validators
//! `ETag`/`Last-Modified` (response) and `If-None-Match`/`If-Modified-Since`
//! (request).

use chrono::{DateTime, Utc};

use super::{HttpResponse, NetworkRequest};
use crate::cache::CacheMetadata;

pub const ETAG: &str = "ETag";
pub const LAST_MODIFIED: &str = "Last-Modified";
pub const IF_NONE_MATCH: &str = "If-None-Match";
pub const IF_MODIFIED_SINCE: &str = "If-Modified-Since";

/// HTTP status for an unchanged resource.
pub const NOT_MODIFIED: u16 = 304;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Formats epoch millis as an IMF-fixdate.
pub fn format_http_date(epoch_ms: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms)
        .map(|date| date.format(HTTP_DATE_FORMAT).to_string())
}

/// Parses an HTTP date into epoch millis.
pub fn parse_http_date(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.timestamp_millis())
}

/// Adds the validators of a cached entry to `request`.
pub fn apply_conditional_headers(
    mut request: NetworkRequest,
    metadata: &CacheMetadata,
) -> NetworkRequest {
    if let Some(etag) = metadata.etag.as_deref().filter(|e| !e.is_empty()) {
        request = request.with_header(IF_NONE_MATCH, etag);
    }
    if let Some(date) = metadata.last_modified.and_then(format_http_date) {
        request = request.with_header(IF_MODIFIED_SINCE, date);
    }
    request
}

/// Freshness token carried by a response.
pub fn response_metadata(response: &HttpResponse) -> CacheMetadata {
    CacheMetadata {
        etag: response
            .header(ETAG)
            .map(str::to_string)
            .filter(|e| !e.is_empty()),
        last_modified: response.header(LAST_MODIFIED).and_then(parse_http_date),
        expiry: None,
    }
}
