//! Single-file responses with `Range` support.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use std::fs::Metadata;
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::files::models::epoch_millis;
use crate::sanitize::{content_disposition, DispositionKind};

/// Streams the file at `path` with caching headers and a `Content-Disposition`
/// built from `name`. Honors a single `Range: bytes=a-b` request.
pub async fn file_response(
    path: &Path,
    metadata: &Metadata,
    name: &str,
    kind: DispositionKind,
    request_headers: &HeaderMap,
) -> Result<Response> {
    let file_size = metadata.len();
    let modified = metadata.modified().ok();
    let last_modified = modified.map(http_date);
    let etag = format!(
        "\"{}-{}\"",
        file_size,
        modified.map(epoch_millis).unwrap_or(0)
    );
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, header_value(mime.essence_str())?);
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::ETAG, header_value(&etag)?);
    headers.insert(
        header::CONTENT_DISPOSITION,
        header_value(&content_disposition(kind, name))?,
    );
    if let Some(value) = last_modified.as_deref() {
        headers.insert(header::LAST_MODIFIED, header_value(value)?);
    }

    // a stale If-Range validator downgrades the request to a full response
    let if_range_matches = match request_headers
        .get(header::IF_RANGE)
        .and_then(|value| value.to_str().ok())
    {
        Some(validator) => validator == etag || Some(validator) == last_modified.as_deref(),
        None => true,
    };
    let range = if if_range_matches {
        parse_range(request_headers.get(header::RANGE), file_size)?
    } else {
        None
    };

    let mut file = File::open(path)
        .await
        .map_err(|err| AppError::io(path, err))?;

    if let Some((start, end)) = range {
        let length = end - start + 1;
        debug!(path = %path.display(), start, end, length, "serving byte range");
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|err| AppError::io(path, err))?;
        headers.insert(
            header::CONTENT_RANGE,
            header_value(&format!("bytes {}-{}/{}", start, end, file_size))?,
        );
        headers.insert(header::CONTENT_LENGTH, header_value(&length.to_string())?);

        let stream = ReaderStream::new(file.take(length));
        return Ok((StatusCode::PARTIAL_CONTENT, headers, Body::from_stream(stream)).into_response());
    }

    headers.insert(header::CONTENT_LENGTH, header_value(&file_size.to_string())?);
    debug!(path = %path.display(), size = file_size, "serving file");
    Ok((StatusCode::OK, headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

/// Resolves a `Range` header into inclusive offsets within `file_size`.
///
/// Anything other than one well-formed `bytes` range is ignored and yields
/// `None`, so the caller answers with the whole file. A valid range that
/// selects no byte of the file is `RangeNotSatisfiable`.
pub fn parse_range(value: Option<&HeaderValue>, file_size: u64) -> Result<Option<(u64, u64)>> {
    let Some(byte_range) = value
        .and_then(|value| value.to_str().ok())
        .and_then(ByteRange::from_header)
    else {
        return Ok(None);
    };

    byte_range
        .within(file_size)
        .map(Some)
        .ok_or(AppError::RangeNotSatisfiable(file_size))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteRange {
    /// `first-` or `first-last`
    From { first: u64, last: Option<u64> },
    /// `-length`, the final `length` bytes
    Suffix(u64),
}

impl ByteRange {
    fn from_header(header: &str) -> Option<Self> {
        let (unit, set) = header.split_once('=')?;
        if !unit.trim().eq_ignore_ascii_case("bytes") || set.contains(',') {
            return None;
        }

        let (first, last) = set.trim().split_once('-')?;
        match (first.trim(), last.trim()) {
            ("", "") => None,
            ("", length) => length.parse().ok().map(Self::Suffix),
            (first, last) => {
                let first: u64 = first.parse().ok()?;
                let last = match last {
                    "" => None,
                    last => Some(last.parse::<u64>().ok()?),
                };
                // `last < first` is a malformed spec, not an unsatisfiable one
                last.map_or(true, |last| last >= first)
                    .then_some(Self::From { first, last })
            }
        }
    }

    fn within(self, file_size: u64) -> Option<(u64, u64)> {
        let final_byte = file_size.checked_sub(1)?;
        match self {
            Self::Suffix(0) => None,
            Self::Suffix(length) => Some((file_size.saturating_sub(length), final_byte)),
            Self::From { first, last } => {
                let last = last.map_or(final_byte, |last| last.min(final_byte));
                (first <= last).then_some((first, last))
            }
        }
    }
}

pub fn http_date(time: std::time::SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| AppError::Other(anyhow::anyhow!("invalid header value: {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn range(value: &str, size: u64) -> Result<Option<(u64, u64)>> {
        parse_range(Some(&HeaderValue::from_str(value).unwrap()), size)
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range(None, 10).unwrap(), None);
        assert_eq!(range("bytes=0-4", 10).unwrap(), Some((0, 4)));
        assert_eq!(range("bytes=5-", 10).unwrap(), Some((5, 9)));
        assert_eq!(range("bytes=-3", 10).unwrap(), Some((7, 9)));
        assert_eq!(range("bytes=-30", 10).unwrap(), Some((0, 9)));
        assert_eq!(range("bytes=8-100", 10).unwrap(), Some((8, 9)));
        assert_eq!(range("Bytes = 2-3", 10).unwrap(), Some((2, 3)));
    }

    #[test]
    fn test_unservable_range_is_ignored() {
        assert_eq!(range("items=0-1", 10).unwrap(), None);
        assert_eq!(range("bytes=0-1,3-4", 10).unwrap(), None);
        assert_eq!(range("bytes=a-b", 10).unwrap(), None);
        assert_eq!(range("bytes=4-2", 10).unwrap(), None);
        assert_eq!(range("bytes=-", 10).unwrap(), None);
        assert_eq!(range("bytes 0-1", 10).unwrap(), None);
        assert_eq!(range("items=0-1", 0).unwrap(), None);
    }

    #[test]
    fn test_unsatisfiable_range() {
        assert!(matches!(range("bytes=10-12", 10), Err(AppError::RangeNotSatisfiable(10))));
        assert!(matches!(range("bytes=-0", 10), Err(AppError::RangeNotSatisfiable(10))));
        assert!(matches!(range("bytes=0-1", 0), Err(AppError::RangeNotSatisfiable(0))));
        assert!(matches!(range("bytes=-5", 0), Err(AppError::RangeNotSatisfiable(0))));
    }

    #[test]
    fn test_http_date() {
        let time = UNIX_EPOCH + Duration::from_secs(784_111_777);
        assert_eq!(http_date(time), "Sun, 06 Nov 1994 08:49:37 GMT");
    }
}
