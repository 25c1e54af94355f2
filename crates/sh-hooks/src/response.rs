//! Raw HTTP response transcripts
//!
//! History entries keep the response as received: status line, headers, a
//! blank line, then the body. This module builds such transcripts and reads
//! the status code back out of them.

use std::sync::OnceLock;

use regex::Regex;

/// Status codes that count as a successful delivery
pub const SUCCESS_STATUSES: [u16; 2] = [200, 201];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: Option<u16>,
    pub head: String,
    pub body: String,
}

impl RawResponse {
    /// Split a transcript at the first blank line and read the status code
    /// from its first line.
    pub fn parse(raw: &str) -> Self {
        let (head, body) = match raw.split_once("\r\n\r\n") {
            Some((head, body)) => (head, body),
            None => (raw, ""),
        };
        let status_line = head.split("\r\n").next().unwrap_or_default();

        Self {
            status: parse_status_line(status_line),
            head: head.to_string(),
            body: body.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_some_and(is_success_status)
    }
}

pub fn is_success_status(status: u16) -> bool {
    SUCCESS_STATUSES.contains(&status)
}

/// Extract the code from a line such as `HTTP/1.1 201 Created`
pub fn parse_status_line(line: &str) -> Option<u16> {
    static STATUS: OnceLock<Regex> = OnceLock::new();
    let pattern = STATUS.get_or_init(|| Regex::new(r"HTTP/[0-9.]+\s+([0-9]+)").expect("valid status pattern"));
    pattern
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|code| code.as_str().parse().ok())
}

/// Render a transcript from response parts
pub fn format_transcript(
    version: &str,
    status: u16,
    reason: Option<&str>,
    headers: &[(String, String)],
    body: &str,
) -> String {
    let mut raw = format!("{} {}", version, status);
    if let Some(reason) = reason {
        raw.push(' ');
        raw.push_str(reason);
    }
    raw.push_str("\r\n");
    for (name, value) in headers {
        raw.push_str(name);
        raw.push_str(": ");
        raw.push_str(value);
        raw.push_str("\r\n");
    }
    raw.push_str("\r\n");
    raw.push_str(body);
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transcript() {
        let raw = "HTTP/1.1 201 Created\r\nContent-Type: application/json\r\n\r\n{\"id\":1}";
        let parsed = RawResponse::parse(raw);

        assert_eq!(parsed.status, Some(201));
        assert_eq!(parsed.body, "{\"id\":1}");
        assert!(parsed.head.contains("Content-Type"));
        assert!(parsed.is_success());
    }

    #[test]
    fn test_body_keeps_later_blank_lines() {
        let parsed = RawResponse::parse("HTTP/2 200\r\n\r\nline one\r\n\r\nline two");
        assert_eq!(parsed.status, Some(200));
        assert_eq!(parsed.body, "line one\r\n\r\nline two");
    }

    #[test]
    fn test_non_success_statuses() {
        assert!(!RawResponse::parse("HTTP/1.1 204 No Content\r\n\r\n").is_success());
        assert!(!RawResponse::parse("HTTP/1.0 500 Internal Server Error\r\n\r\n").is_success());
    }

    #[test]
    fn test_garbage_has_no_status() {
        let parsed = RawResponse::parse("");
        assert_eq!(parsed.status, None);
        assert!(!parsed.is_success());
        assert_eq!(parse_status_line("200 OK"), None);
    }

    #[test]
    fn test_format_round_trips_status() {
        let raw = format_transcript(
            "HTTP/1.1",
            404,
            Some("Not Found"),
            &[("content-length".to_string(), "0".to_string())],
            "",
        );
        assert_eq!(raw, "HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\n\r\n");
        assert_eq!(RawResponse::parse(&raw).status, Some(404));
    }
}
