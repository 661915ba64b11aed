//! Request classification.
//!
//! Requests are not parsed: the raw bytes are searched for two literal
//! markers, and threshold values are scanned from the first `min=` and
//! `max=` found anywhere in the request.

use crate::config::ThresholdConfig;

pub const LIMITS_MARKER: &[u8] = b"GET /limites";
pub const STATUS_MARKER: &[u8] = b"GET /estado";

/// Longest numeric token considered after `min=` / `max=`.
const MAX_NUMBER_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request {
    /// Threshold update. `None` when either value is missing or unreadable.
    Limits(Option<ThresholdConfig>),
    Status,
    Index,
}

pub fn classify(raw: &[u8]) -> Request {
    if find(raw, LIMITS_MARKER).is_some() {
        let min = scan_token(raw, b"min=");
        let max = scan_token(raw, b"max=");
        Request::Limits(min.zip(max).map(|(min, max)| ThresholdConfig::new(min, max)))
    } else if find(raw, STATUS_MARKER).is_some() {
        Request::Status
    } else {
        Request::Index
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Value following the first occurrence of `key`, if it starts with a number.
pub fn scan_token(raw: &[u8], key: &[u8]) -> Option<f32> {
    let start = find(raw, key)? + key.len();
    scan_float(&raw[start..])
}

/// Parse the longest numeric prefix of `bytes`, after leading whitespace.
fn scan_float(bytes: &[u8]) -> Option<f32> {
    let skip = bytes.iter().take_while(|b| b.is_ascii_whitespace()).count();
    let bytes = &bytes[skip..];

    let candidate_len = bytes
        .iter()
        .take(MAX_NUMBER_LEN)
        .take_while(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
        .count();

    (1..=candidate_len).rev().find_map(|len| {
        core::str::from_utf8(&bytes[..len])
            .ok()
            .and_then(|s| s.parse::<f32>().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_limits() {
        let req = b"GET /limites?min=10&max=90 HTTP/1.1\r\nHost: 192.168.0.5\r\n\r\n";
        assert_eq!(
            classify(req),
            Request::Limits(Some(ThresholdConfig::new(10.0, 90.0)))
        );
    }

    #[test]
    fn test_classify_limits_fractional() {
        let req = b"GET /limites?min=12.5&max=87.25 HTTP/1.1\r\n\r\n";
        assert_eq!(
            classify(req),
            Request::Limits(Some(ThresholdConfig::new(12.5, 87.25)))
        );
    }

    #[test]
    fn test_classify_limits_missing_token() {
        let req = b"GET /limites?min=10 HTTP/1.1\r\n\r\n";
        assert_eq!(classify(req), Request::Limits(None));
    }

    #[test]
    fn test_classify_limits_unreadable_value() {
        let req = b"GET /limites?min=abc&max=90 HTTP/1.1\r\n\r\n";
        assert_eq!(classify(req), Request::Limits(None));
    }

    #[test]
    fn test_classify_limits_inverted_kept() {
        let req = b"GET /limites?min=80&max=20 HTTP/1.1\r\n\r\n";
        assert_eq!(
            classify(req),
            Request::Limits(Some(ThresholdConfig::new(80.0, 20.0))),
            "ordering is not validated"
        );
    }

    #[test]
    fn test_classify_status_and_default() {
        assert_eq!(classify(b"GET /estado HTTP/1.1\r\n\r\n"), Request::Status);
        assert_eq!(classify(b"GET / HTTP/1.1\r\n\r\n"), Request::Index);
        assert_eq!(classify(b"GET /favicon.ico HTTP/1.1\r\n\r\n"), Request::Index);
        assert_eq!(classify(b"POST /estado HTTP/1.1\r\n\r\n"), Request::Index);
        assert_eq!(classify(b""), Request::Index);
    }

    #[test]
    fn test_scan_float_prefixes() {
        assert_eq!(scan_float(b"42&max=1"), Some(42.0));
        assert_eq!(scan_float(b"-3.5 HTTP"), Some(-3.5));
        assert_eq!(scan_float(b"  7"), Some(7.0));
        assert_eq!(scan_float(b"1e"), Some(1.0));
        assert_eq!(scan_float(b"2.5e1x"), Some(25.0));
        assert_eq!(scan_float(b"."), None);
        assert_eq!(scan_float(b""), None);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let req = b"GET /limites?min=5&max=95&min=50 HTTP/1.1\r\n\r\n";
        assert_eq!(scan_token(req, b"min="), Some(5.0));
    }
}
