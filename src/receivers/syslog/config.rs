// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;

/// Default maximum syslog message size (8KB)
const DEFAULT_MAX_MESSAGE_SIZE: usize = 8192;

/// Configuration for the syslog receiver
#[derive(Debug, Clone)]
pub struct SyslogReceiverConfig {
    /// Address the UDP and TCP sockets are bound to
    pub endpoint: SocketAddr,

    /// Maximum accepted syslog message size
    pub max_message_size: usize,
}

impl SyslogReceiverConfig {
    pub fn new(endpoint: SocketAddr) -> Self {
        Self {
            endpoint,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }
}
