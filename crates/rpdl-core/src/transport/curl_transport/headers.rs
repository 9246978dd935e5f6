//! Parse the final response's header lines into the fields the session probes.

use chrono::{DateTime, NaiveDateTime};

/// Status and metadata of the final (post-redirect) response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ResponseHead {
    pub status: Option<u32>,
    pub content_length: Option<u64>,
    /// `Last-Modified` in Unix seconds.
    pub last_modified: Option<i64>,
}

/// Parse collected header lines into a ResponseHead.
pub(crate) fn parse_head(lines: &[String]) -> ResponseHead {
    let mut head = ResponseHead::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            head.status = parse_status_line(line);
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                if let Ok(n) = value.parse::<u64>() {
                    head.content_length = Some(n);
                }
            }
            if name.eq_ignore_ascii_case("last-modified") {
                head.last_modified = parse_http_date(value);
            }
        }
    }

    head
}

/// "HTTP/1.1 200 OK" -> 200
fn parse_status_line(line: &str) -> Option<u32> {
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Obsolete HTTP-date layouts, applied to whitespace-collapsed input.
const OBSOLETE_DATE_FORMATS: [&str; 2] = [
    // RFC 850: "Sunday, 06-Nov-94 08:49:37 GMT"
    "%A, %d-%b-%y %H:%M:%S GMT",
    // asctime: "Sun Nov  6 08:49:37 1994"
    "%a %b %d %H:%M:%S %Y",
];

/// HTTP-date to Unix seconds: IMF-fixdate ("Wed, 01 Jan 2020 00:00:00 GMT")
/// first, then the RFC 850 and asctime forms.
pub(crate) fn parse_http_date(value: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.timestamp());
    }
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    OBSOLETE_DATE_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(&collapsed, fmt)
            .ok()
            .map(|naive| naive.and_utc().timestamp())
    })
}
