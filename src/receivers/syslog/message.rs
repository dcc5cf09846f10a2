// SPDX-License-Identifier: Apache-2.0

use crate::receivers::syslog::parser::{Facility, Severity};
use chrono::{DateTime, Utc};

/// A parsed syslog message. Header fields that were absent from the wire
/// format (or nil in RFC 5424 terms) are `None`; consumers decide how to
/// render missing fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SyslogMessage {
    pub facility: Facility,
    pub severity: Severity,

    /// Message timestamp. RFC 3164 timestamps carry no year or zone and are
    /// interpreted as the current year, UTC.
    pub timestamp: DateTime<Utc>,

    pub hostname: Option<String>,

    /// RFC 5424 APP-NAME, or the RFC 3164 tag.
    pub app_name: Option<String>,

    /// RFC 5424 PROCID.
    pub proc_id: Option<String>,

    /// Bracketed pid from an RFC 3164 tag, e.g. `sshd[4721]`.
    pub pid: Option<String>,

    pub message: Option<String>,
}
