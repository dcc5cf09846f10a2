// SPDX-License-Identifier: Apache-2.0

//! Parser for syslog wire formats
//!
//! Handles both common line formats, detected automatically per message:
//! - RFC 3164 (BSD): `<PRI>Mmm dd hh:mm:ss HOST TAG[PID]: MSG`
//! - RFC 5424 (IETF): `<PRI>1 TIMESTAMP HOST APP PROCID MSGID SD [MSG]`
//!
//! PRI encodes facility and severity as `facility * 8 + severity` and must
//! be present; everything after it degrades gracefully to optional fields.
//!
//! Example: `<34>Jan  1 00:00:00 myhost myapp[100]: hello world`
//! Example: `<165>1 2003-10-11T22:14:15.003Z host app 1860 ID47 - entry`

use crate::receivers::syslog::error::{Result, SyslogReceiverError};
use crate::receivers::syslog::message::SyslogMessage;
use chrono::{DateTime, Datelike, TimeZone, Utc};

/// Highest encodable priority: facility 23, severity 7
const MAX_PRI: u16 = 191;

/// Longest tag accepted in an RFC 3164 header
const MAX_TAG_LEN: usize = 32;

/// Syslog severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Emergency = 0, // System is unusable
    Alert = 1,     // Action must be taken immediately
    Critical = 2,  // Critical conditions
    Error = 3,     // Error conditions
    Warning = 4,   // Warning conditions
    Notice = 5,    // Normal but significant condition
    Info = 6,      // Informational
    Debug = 7,     // Debug-level messages
}

impl Severity {
    /// Extract severity from the raw priority value (bits 0-2)
    pub fn from_u8(value: u8) -> Self {
        match value & 0x07 {
            0 => Severity::Emergency,
            1 => Severity::Alert,
            2 => Severity::Critical,
            3 => Severity::Error,
            4 => Severity::Warning,
            5 => Severity::Notice,
            6 => Severity::Info,
            // 7 is the only remaining possibility after & 0x07
            _ => Severity::Debug,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Emergency => "emergency",
            Severity::Alert => "alert",
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Notice => "notice",
            Severity::Info => "info",
            Severity::Debug => "debug",
        }
    }
}

/// Syslog facility codes
/// See: https://datatracker.ietf.org/doc/html/rfc5424#section-6.2.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facility {
    Kern = 0,      // Kernel messages
    User = 1,      // User-level messages
    Mail = 2,      // Mail system
    Daemon = 3,    // System daemons
    Auth = 4,      // Security/authorization messages
    Syslog = 5,    // Syslogd internal messages
    Lpr = 6,       // Line printer subsystem
    News = 7,      // Network news subsystem
    Uucp = 8,      // UUCP subsystem
    Cron = 9,      // Clock daemon
    Authpriv = 10, // Security/authorization (private)
    Ftp = 11,      // FTP daemon
    Ntp = 12,      // NTP subsystem
    Audit = 13,    // Log audit
    Alert = 14,    // Log alert
    Clock = 15,    // Clock daemon (note 2)
    Local0 = 16,   // Local use 0
    Local1 = 17,   // Local use 1
    Local2 = 18,   // Local use 2
    Local3 = 19,   // Local use 3
    Local4 = 20,   // Local use 4
    Local5 = 21,   // Local use 5
    Local6 = 22,   // Local use 6
    Local7 = 23,   // Local use 7
}

impl Facility {
    /// Extract facility from the raw priority value (bits 3-7)
    pub fn from_u8(value: u8) -> Self {
        match value >> 3 {
            0 => Facility::Kern,
            1 => Facility::User,
            2 => Facility::Mail,
            3 => Facility::Daemon,
            4 => Facility::Auth,
            5 => Facility::Syslog,
            6 => Facility::Lpr,
            7 => Facility::News,
            8 => Facility::Uucp,
            9 => Facility::Cron,
            10 => Facility::Authpriv,
            11 => Facility::Ftp,
            12 => Facility::Ntp,
            13 => Facility::Audit,
            14 => Facility::Alert,
            15 => Facility::Clock,
            16 => Facility::Local0,
            17 => Facility::Local1,
            18 => Facility::Local2,
            19 => Facility::Local3,
            20 => Facility::Local4,
            21 => Facility::Local5,
            22 => Facility::Local6,
            _ => Facility::Local7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Facility::Kern => "kern",
            Facility::User => "user",
            Facility::Mail => "mail",
            Facility::Daemon => "daemon",
            Facility::Auth => "auth",
            Facility::Syslog => "syslog",
            Facility::Lpr => "lpr",
            Facility::News => "news",
            Facility::Uucp => "uucp",
            Facility::Cron => "cron",
            Facility::Authpriv => "authpriv",
            Facility::Ftp => "ftp",
            Facility::Ntp => "ntp",
            Facility::Audit => "audit",
            Facility::Alert => "alert",
            Facility::Clock => "clock",
            Facility::Local0 => "local0",
            Facility::Local1 => "local1",
            Facility::Local2 => "local2",
            Facility::Local3 => "local3",
            Facility::Local4 => "local4",
            Facility::Local5 => "local5",
            Facility::Local6 => "local6",
            Facility::Local7 => "local7",
        }
    }
}

/// Parse one inbound syslog message into a [`SyslogMessage`]
pub fn parse_message(data: &[u8]) -> Result<SyslogMessage> {
    parse_with_year(data, Utc::now().year())
}

// RFC 3164 timestamps carry no year; it is injected so tests can pin it.
fn parse_with_year(data: &[u8], year: i32) -> Result<SyslogMessage> {
    let data = trim_trailing_newline(data);
    let line = std::str::from_utf8(data)
        .map_err(|_| SyslogReceiverError::ParseError("message is not valid UTF-8".to_string()))?;

    let (pri, rest) = parse_pri(line)?;
    let facility = Facility::from_u8(pri);
    let severity = Severity::from_u8(pri);

    match rest.strip_prefix("1 ") {
        Some(rest) => parse_rfc5424(facility, severity, rest),
        None => parse_rfc3164(facility, severity, rest, year),
    }
}

/// Trim trailing newline from message (LF or CRLF)
#[inline]
pub fn trim_trailing_newline(data: &[u8]) -> &[u8] {
    let mut end = data.len();

    if end > 0 && data[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && data[end - 1] == b'\r' {
            end -= 1;
        }
    }

    &data[..end]
}

fn parse_pri(line: &str) -> Result<(u8, &str)> {
    let rest = line
        .strip_prefix('<')
        .ok_or_else(|| SyslogReceiverError::ParseError("missing priority".to_string()))?;

    let end = rest
        .find('>')
        .ok_or_else(|| SyslogReceiverError::ParseError("unterminated priority".to_string()))?;
    if end == 0 || end > 3 {
        return Err(SyslogReceiverError::ParseError(format!(
            "invalid priority length: {}",
            end
        )));
    }

    let value: u16 = rest[..end].parse().map_err(|_| {
        SyslogReceiverError::ParseError(format!("invalid priority '{}'", &rest[..end]))
    })?;
    if value > MAX_PRI {
        return Err(SyslogReceiverError::ParseError(format!(
            "priority {} out of range",
            value
        )));
    }

    Ok((value as u8, &rest[end + 1..]))
}

fn parse_rfc5424(facility: Facility, severity: Severity, rest: &str) -> Result<SyslogMessage> {
    let mut parts = rest.splitn(6, ' ');

    let mut next = |field: &'static str| {
        parts.next().ok_or_else(|| {
            SyslogReceiverError::ParseError(format!("RFC 5424 header is missing {}", field))
        })
    };

    let ts = next("a timestamp")?;
    let hostname = next("a hostname")?;
    let app_name = next("an app-name")?;
    let proc_id = next("a procid")?;
    let _msg_id = next("a msgid")?;
    let remainder = next("structured data")?;

    let timestamp = if ts == "-" {
        Utc::now()
    } else {
        DateTime::parse_from_rfc3339(ts)
            .map_err(|e| {
                SyslogReceiverError::ParseError(format!("invalid timestamp '{}': {}", ts, e))
            })?
            .with_timezone(&Utc)
    };

    let (_sd, after_sd) = split_structured_data(remainder)?;

    let message = match after_sd.strip_prefix(' ') {
        None if after_sd.is_empty() => None,
        None => {
            return Err(SyslogReceiverError::ParseError(
                "expected a space between structured data and message".to_string(),
            ));
        }
        Some(m) => {
            let m = m.strip_prefix('\u{feff}').unwrap_or(m);
            non_empty(m)
        }
    };

    Ok(SyslogMessage {
        facility,
        severity,
        timestamp,
        hostname: nil(hostname),
        app_name: nil(app_name),
        proc_id: nil(proc_id),
        pid: None,
        message,
    })
}

// Walks SD-ELEMENTs, honoring the \], \" and \\ escapes inside param values.
fn split_structured_data(input: &str) -> Result<(&str, &str)> {
    if let Some(rest) = input.strip_prefix('-') {
        return Ok(("-", rest));
    }
    if !input.starts_with('[') {
        return Err(SyslogReceiverError::ParseError(
            "malformed structured data".to_string(),
        ));
    }

    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i] == b'[' {
        i += 1;
        let mut escaped = false;
        let mut closed = false;
        while i < bytes.len() {
            let b = bytes[i];
            i += 1;
            if escaped {
                escaped = false;
                continue;
            }
            match b {
                b'\\' => escaped = true,
                b']' => {
                    closed = true;
                    break;
                }
                _ => {}
            }
        }
        if !closed {
            return Err(SyslogReceiverError::ParseError(
                "unterminated structured data".to_string(),
            ));
        }
    }

    Ok((&input[..i], &input[i..]))
}

fn parse_rfc3164(
    facility: Facility,
    severity: Severity,
    rest: &str,
    year: i32,
) -> Result<SyslogMessage> {
    if rest.len() < 15 || !rest.is_char_boundary(15) {
        return Err(SyslogReceiverError::ParseError(
            "truncated RFC 3164 header".to_string(),
        ));
    }

    let (ts, rest) = rest.split_at(15);
    let timestamp = parse_rfc3164_timestamp(ts, year)?;

    let rest = rest.strip_prefix(' ').ok_or_else(|| {
        SyslogReceiverError::ParseError("missing space after timestamp".to_string())
    })?;

    let (hostname, rest) = match rest.split_once(' ') {
        Some((h, r)) => (non_empty(h), r),
        None => (non_empty(rest), ""),
    };

    let (app_name, pid, message) = parse_rfc3164_tag(rest);

    Ok(SyslogMessage {
        facility,
        severity,
        timestamp,
        hostname,
        app_name,
        proc_id: None,
        pid,
        message,
    })
}

// A tag is a short token terminated by '[' or ':'. Anything else means the
// remainder is free-form content, as produced by relays that strip the tag.
fn parse_rfc3164_tag(input: &str) -> (Option<String>, Option<String>, Option<String>) {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len()
        && i < MAX_TAG_LEN
        && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'_' | b'-' | b'.' | b'/'))
    {
        i += 1;
    }

    if i == 0 || i >= bytes.len() {
        return (None, None, content(input));
    }

    match bytes[i] {
        b'[' => {
            let tag = &input[..i];
            match input[i + 1..].find(']') {
                Some(close) => {
                    let pid = &input[i + 1..i + 1 + close];
                    let rest = &input[i + 1 + close + 1..];
                    let rest = rest.strip_prefix(':').unwrap_or(rest);
                    (Some(tag.to_string()), non_empty(pid), content(rest))
                }
                None => (None, None, content(input)),
            }
        }
        b':' => {
            let tag = &input[..i];
            (Some(tag.to_string()), None, content(&input[i + 1..]))
        }
        _ => (None, None, content(input)),
    }
}

// "Mmm dd hh:mm:ss", day space-padded
fn parse_rfc3164_timestamp(ts: &str, year: i32) -> Result<DateTime<Utc>> {
    let invalid =
        || SyslogReceiverError::ParseError(format!("invalid RFC 3164 timestamp '{}'", ts));

    let bytes = ts.as_bytes();
    if bytes.len() != 15
        || bytes[3] != b' '
        || bytes[6] != b' '
        || bytes[9] != b':'
        || bytes[12] != b':'
    {
        return Err(invalid());
    }

    let month = match &ts[..3] {
        "Jan" => 1,
        "Feb" => 2,
        "Mar" => 3,
        "Apr" => 4,
        "May" => 5,
        "Jun" => 6,
        "Jul" => 7,
        "Aug" => 8,
        "Sep" => 9,
        "Oct" => 10,
        "Nov" => 11,
        "Dec" => 12,
        _ => return Err(invalid()),
    };

    let day: u32 = ts[4..6].trim_start().parse().map_err(|_| invalid())?;
    let hour: u32 = ts[7..9].parse().map_err(|_| invalid())?;
    let minute: u32 = ts[10..12].parse().map_err(|_| invalid())?;
    let second: u32 = ts[13..15].parse().map_err(|_| invalid())?;

    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .ok_or_else(invalid)
}

fn nil(value: &str) -> Option<String> {
    if value == "-" {
        None
    } else {
        Some(value.to_string())
    }
}

fn content(input: &str) -> Option<String> {
    non_empty(input.strip_prefix(' ').unwrap_or(input))
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3164_with_pid() {
        let msg = parse_with_year(b"<34>Jan  1 00:00:00 myhost myapp[100]: hello world", 2026)
            .unwrap();

        assert_eq!(msg.facility, Facility::Auth);
        assert_eq!(msg.severity, Severity::Critical);
        assert_eq!(
            msg.timestamp,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(msg.hostname.as_deref(), Some("myhost"));
        assert_eq!(msg.app_name.as_deref(), Some("myapp"));
        assert_eq!(msg.pid.as_deref(), Some("100"));
        assert_eq!(msg.proc_id, None);
        assert_eq!(msg.message.as_deref(), Some("hello world"));
    }

    #[test]
    fn test_parse_rfc3164_without_pid() {
        let msg =
            parse_with_year(b"<13>Oct 11 22:14:15 mymachine su: 'su root' failed", 2003).unwrap();

        assert_eq!(msg.facility, Facility::User);
        assert_eq!(msg.severity, Severity::Notice);
        assert_eq!(msg.hostname.as_deref(), Some("mymachine"));
        assert_eq!(msg.app_name.as_deref(), Some("su"));
        assert_eq!(msg.pid, None);
        assert_eq!(msg.message.as_deref(), Some("'su root' failed"));
    }

    #[test]
    fn test_parse_rfc3164_without_tag() {
        let msg = parse_with_year(b"<13>Feb  5 17:32:18 10.0.0.99 use the BFG!", 2026).unwrap();

        assert_eq!(msg.hostname.as_deref(), Some("10.0.0.99"));
        assert_eq!(msg.app_name, None);
        assert_eq!(msg.pid, None);
        assert_eq!(msg.message.as_deref(), Some("use the BFG!"));
    }

    #[test]
    fn test_parse_rfc3164_trims_newline() {
        let msg = parse_with_year(b"<34>Jan  1 00:00:00 myhost myapp: hi\r\n", 2026).unwrap();

        assert_eq!(msg.message.as_deref(), Some("hi"));
    }

    #[test]
    fn test_parse_rfc5424_full() {
        let msg = parse_with_year(
            b"<165>1 2003-10-11T22:14:15.003Z mymachine.example.com evntslog 1860 ID47 \
              [exampleSDID@32473 iut=\"3\" eventSource=\"Application\"] \
              \xEF\xBB\xBFAn application event log entry",
            2026,
        )
        .unwrap();

        assert_eq!(msg.facility, Facility::Local4);
        assert_eq!(msg.severity, Severity::Notice);
        assert_eq!(
            msg.timestamp,
            Utc.with_ymd_and_hms(2003, 10, 11, 22, 14, 15).unwrap()
                + chrono::Duration::milliseconds(3)
        );
        assert_eq!(msg.hostname.as_deref(), Some("mymachine.example.com"));
        assert_eq!(msg.app_name.as_deref(), Some("evntslog"));
        assert_eq!(msg.proc_id.as_deref(), Some("1860"));
        assert_eq!(msg.pid, None);
        assert_eq!(
            msg.message.as_deref(),
            Some("An application event log entry")
        );
    }

    #[test]
    fn test_parse_rfc5424_nil_fields() {
        let msg = parse_with_year(b"<34>1 2003-10-11T22:14:15Z - - - - -", 2026).unwrap();

        assert_eq!(msg.hostname, None);
        assert_eq!(msg.app_name, None);
        assert_eq!(msg.proc_id, None);
        assert_eq!(msg.message, None);
    }

    #[test]
    fn test_parse_rfc5424_escaped_bracket_in_sd() {
        let msg = parse_with_year(
            b"<34>1 2003-10-11T22:14:15Z host app - - [id q=\"a\\]b\"] payload",
            2026,
        )
        .unwrap();

        assert_eq!(msg.message.as_deref(), Some("payload"));
    }

    #[test]
    fn test_parse_rfc5424_offset_timestamp() {
        let msg =
            parse_with_year(b"<34>1 2003-08-24T05:14:15.000003-07:00 host app - - -", 2026)
                .unwrap();

        assert_eq!(
            msg.timestamp,
            Utc.with_ymd_and_hms(2003, 8, 24, 12, 14, 15).unwrap()
                + chrono::Duration::microseconds(3)
        );
    }

    #[test]
    fn test_priority_out_of_range_is_rejected() {
        assert!(parse_with_year(b"<192>Jan  1 00:00:00 h a: m", 2026).is_err());
    }

    #[test]
    fn test_missing_priority_is_rejected() {
        assert!(parse_with_year(b"Jan  1 00:00:00 h a: m", 2026).is_err());
        assert!(parse_with_year(b"<34 no closing bracket", 2026).is_err());
    }

    #[test]
    fn test_invalid_timestamp_is_rejected() {
        assert!(parse_with_year(b"<34>Foo  1 00:00:00 h a: m", 2026).is_err());
        assert!(parse_with_year(b"<34>1 not-a-timestamp h a - - -", 2026).is_err());
    }

    #[test]
    fn test_facility_severity_decode() {
        // 34 = facility 4 (auth) * 8 + severity 2 (critical)
        let msg = parse_with_year(b"<34>Jan  1 00:00:00 h a: m", 2026).unwrap();

        assert_eq!(msg.facility.as_str(), "auth");
        assert_eq!(msg.severity.as_str(), "critical");
    }

    #[test]
    fn test_trim_trailing_newline() {
        assert_eq!(trim_trailing_newline(b"abc\n"), b"abc");
        assert_eq!(trim_trailing_newline(b"abc\r\n"), b"abc");
        assert_eq!(trim_trailing_newline(b"abc"), b"abc");
        assert_eq!(trim_trailing_newline(b"\n"), b"");
    }
}
