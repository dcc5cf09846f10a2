// SPDX-License-Identifier: Apache-2.0

//! Renders a parsed syslog message into the single-line text form shipped
//! to CloudWatch: `<hostname> <app_name|->[<id>]: <message>`

use crate::receivers::syslog::message::SyslogMessage;

/// Format a syslog message as one delivery-ready line. Pure and total:
/// missing fields degrade to placeholders, never to an error.
pub fn format_message(msg: &SyslogMessage) -> String {
    let mut out = String::new();

    if let Some(hostname) = present(&msg.hostname) {
        out.push_str(hostname);
        out.push(' ');
    }

    match present(&msg.app_name) {
        Some(app_name) => out.push_str(app_name),
        None => out.push('-'),
    }

    // RFC 5424 procid wins over an RFC 3164 bracketed pid
    if let Some(id) = ident(&msg.proc_id).or_else(|| ident(&msg.pid)) {
        out.push('[');
        out.push_str(id);
        out.push(']');
    }

    out.push_str(": ");

    if let Some(message) = present(&msg.message) {
        out.push_str(message);
    }

    out
}

/// Epoch milliseconds of the message timestamp, as the remote sink expects
pub fn milli_timestamp(msg: &SyslogMessage) -> i64 {
    msg.timestamp.timestamp_millis()
}

// A lone space counts as absent; parsers emit it for skipped fields
fn present(field: &Option<String>) -> Option<&str> {
    match field.as_deref() {
        Some(" ") | None => None,
        Some(v) => Some(v),
    }
}

// Identifiers additionally treat the nil placeholder as absent
fn ident(field: &Option<String>) -> Option<&str> {
    match present(field) {
        Some("-") => None,
        v => v,
    }
}
