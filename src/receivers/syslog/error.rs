// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyslogReceiverError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse message: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, SyslogReceiverError>;
