// SPDX-License-Identifier: Apache-2.0

use crate::aws_api::creds::AwsCredsProvider;
use crate::bounded_channel::BoundedReceiver;
use crate::exporters::cloudwatch::client::{CloudwatchClient, LogEvent};
use crate::exporters::cloudwatch::errors::DeliveryError;
use crate::exporters::cloudwatch::format::{format_message, milli_timestamp};
use crate::receivers::syslog::message::SyslogMessage;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::{debug, error, warn};

mod client;
mod errors;
pub mod format;

#[derive(Clone)]
pub struct CloudwatchExporterConfig {
    pub region: String,
    pub log_group_name: String,
    pub log_stream_name: String,
    pub log_retention: u16,
    pub custom_endpoint: Option<String>,
}

pub struct CloudwatchExporterConfigBuilder {
    config: CloudwatchExporterConfig,
}

impl Default for CloudwatchExporterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudwatchExporterConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CloudwatchExporterConfig {
                region: "us-east-1".to_string(),
                log_group_name: "/syslog/default".to_string(),
                log_stream_name: "default".to_string(),
                log_retention: 0,
                custom_endpoint: None,
            },
        }
    }

    pub fn with_region<S: Into<String>>(mut self, region: S) -> Self {
        self.config.region = region.into();
        self
    }

    pub fn with_log_group_name<S: Into<String>>(mut self, log_group_name: S) -> Self {
        self.config.log_group_name = log_group_name.into();
        self
    }

    pub fn with_log_stream_name<S: Into<String>>(mut self, log_stream_name: S) -> Self {
        self.config.log_stream_name = log_stream_name.into();
        self
    }

    pub fn with_log_retention(mut self, log_retention: u16) -> Self {
        self.config.log_retention = log_retention;
        self
    }

    pub fn with_custom_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.config.custom_endpoint = Some(endpoint.into());
        self
    }

    pub fn build(
        self,
        rx: BoundedReceiver<SyslogMessage>,
        creds_provider: AwsCredsProvider,
    ) -> Result<CloudwatchExporter, BoxError> {
        let client = CloudwatchClient::new(
            &self.config.region,
            creds_provider,
            self.config.custom_endpoint.clone(),
        )?;

        Ok(CloudwatchExporter {
            config: self.config,
            client,
            rx,
            next_sequence_token: None,
        })
    }
}

/// Delivers syslog records to a CloudWatch Logs stream, one event per
/// request, in channel order.
///
/// CloudWatch rejects writes whose sequence token does not match its own
/// cursor, so this exporter must be the stream's only writer: it owns the
/// token, and every delivery runs to completion before the next record is
/// taken from the channel.
pub struct CloudwatchExporter {
    config: CloudwatchExporterConfig,
    client: CloudwatchClient,
    rx: BoundedReceiver<SyslogMessage>,
    next_sequence_token: Option<String>,
}

impl CloudwatchExporter {
    /// Create the destination stream if it does not exist yet. An
    /// already-existing stream is fine; any other failure is returned so
    /// startup can abort.
    pub async fn ensure_stream(&self) -> Result<(), BoxError> {
        self.client
            .create_stream(
                &self.config.log_group_name,
                &self.config.log_stream_name,
                self.config.log_retention,
            )
            .await
    }

    /// Run the forwarding loop until the input channel is closed and drained,
    /// or the exporter is cancelled.
    pub async fn start(mut self, cancel_token: CancellationToken) -> Result<(), BoxError> {
        loop {
            select! {
                biased;

                _ = cancel_token.cancelled() => {
                    debug!("CloudWatch exporter cancelled");
                    break;
                }

                msg = self.rx.next() => {
                    match msg {
                        Some(msg) => self.deliver(msg).await,
                        None => {
                            debug!("Input channel closed, exiting CloudWatch exporter");
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    // One attempt per record: a failed delivery is logged and dropped,
    // keeping the loop alive for the next record.
    async fn deliver(&mut self, msg: SyslogMessage) {
        let event = LogEvent {
            message: format_message(&msg),
            timestamp: milli_timestamp(&msg),
        };

        let result = self
            .client
            .put_log_events(
                &self.config.log_group_name,
                &self.config.log_stream_name,
                std::slice::from_ref(&event),
                self.next_sequence_token.as_ref(),
            )
            .await;

        match result {
            Ok(ack) => {
                if let Some(token) = ack.next_sequence_token {
                    self.next_sequence_token = Some(token);
                }
            }
            Err(e) => {
                // A rejected write can still tell us the token the stream
                // expects next; adopt it so later deliveries recover instead
                // of failing until restart.
                if let DeliveryError::Api { response, .. } = &e {
                    if let Some(expected) = response.expected_sequence_token() {
                        warn!("Resynchronizing sequence token from rejected write");
                        self.next_sequence_token = Some(expected.clone());
                    }
                }

                error!(error = e.to_string(), "Failed to deliver log event, dropping message");
            }
        }
    }
}
