use crate::aws_api::config::AwsConfig;
use crate::aws_api::creds::AwsCredsProvider;
use crate::bounded_channel::bounded;
use crate::crypto::init_crypto_provider;
use crate::exporters::cloudwatch::CloudwatchExporterConfigBuilder;
use crate::init::args::RelayRun;
use crate::init::misc::BoundSockets;
use crate::init::wait;
use crate::receivers::syslog::config::SyslogReceiverConfig;
use crate::receivers::syslog::message::SyslogMessage;
use crate::receivers::syslog::receiver::SyslogReceiver;
use std::time::Duration;
use tokio::select;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct Agent {
    config: Box<RelayRun>,
    sockets: BoundSockets,
    sending_queue_size: usize,
    environment: String,
}

impl Agent {
    pub fn new(
        config: Box<RelayRun>,
        sockets: BoundSockets,
        sending_queue_size: usize,
        environment: String,
    ) -> Self {
        Self {
            config,
            sockets,
            sending_queue_size,
            environment,
        }
    }

    pub async fn run(self, agent_cancel: CancellationToken) -> Result<(), BoxError> {
        let config = self.config;
        let BoundSockets { tcp, udp } = self.sockets;

        info!(environment = self.environment, "Starting sluice.");

        // Initialize the TLS library, we may want to do this conditionally
        init_crypto_provider()?;

        let log_stream_name = match &config.log_stream_name {
            Some(name) => name.clone(),
            None => Uuid::new_v4().to_string(),
        };

        info!(
            log_group = config.log_group_name.as_str(),
            log_stream = log_stream_name.as_str(),
            "Logging to CloudWatch stream."
        );

        let mut receivers_task_set = JoinSet::new();
        let mut exporters_task_set = JoinSet::new();

        let receivers_cancel = CancellationToken::new();
        let exporters_cancel = CancellationToken::new();

        let (syslog_tx, syslog_rx) = bounded::<SyslogMessage>(self.sending_queue_size);

        let aws_config = AwsConfig::from_env();
        let mut exporter_builder = CloudwatchExporterConfigBuilder::new()
            .with_region(aws_config.region)
            .with_log_group_name(config.log_group_name.clone())
            .with_log_stream_name(log_stream_name)
            .with_log_retention(config.log_retention);
        if let Some(endpoint) = &config.custom_endpoint {
            exporter_builder = exporter_builder.with_custom_endpoint(endpoint.clone());
        }

        let exporter = exporter_builder.build(syslog_rx, AwsCredsProvider::from_env())?;

        // Nothing can be delivered without the stream, so creation failures
        // abort startup.
        exporter.ensure_stream().await?;

        let receiver_config = SyslogReceiverConfig::new(tcp.bound_address()?)
            .with_max_message_size(config.max_message_size);
        let receiver = SyslogReceiver::new(receiver_config, syslog_tx);
        receiver
            .start(tcp, udp, &mut receivers_task_set, &receivers_cancel)
            .await?;

        {
            let token = exporters_cancel.clone();
            exporters_task_set.spawn(async move { exporter.start(token).await });
        }

        let mut result = Ok(());
        select! {
            _ = agent_cancel.cancelled() => {
                debug!("Agent cancellation signaled.");
            },
            e = wait::wait_for_any_task(&mut receivers_task_set) => {
                match e {
                    Ok(()) => info!("Unexpected early exit of receiver."),
                    Err(e) => result = Err(e),
                }
            },
            e = wait::wait_for_any_task(&mut exporters_task_set) => {
                match e {
                    Ok(()) => warn!("Unexpected early exit of exporter."),
                    Err(e) => result = Err(e),
                }
            }
        }
        result?;

        // Step one, cancel the receivers and wait for their termination. As
        // the listener tasks exit they drop their channel senders, which
        // closes the pipe into the exporter.
        receivers_cancel.cancel();

        let res =
            wait::wait_for_tasks_with_timeout(&mut receivers_task_set, Duration::from_secs(1))
                .await;
        if let Err(e) = res {
            return Err(format!("timed out waiting for receiver exit: {}", e).into());
        }

        // Set a maximum duration for the exporter to exit, this way if the
        // channel drains quickly the entire wall time is left for in-flight
        // deliveries to finish (which may take longer if the endpoint is slow).
        let exporters_hard_stop = Instant::now() + Duration::from_secs(3);

        // The exporter exits on its own once the closed channel is drained.
        let res =
            wait::wait_for_tasks_with_timeout(&mut exporters_task_set, Duration::from_millis(500))
                .await;
        if res.is_err() {
            warn!("Exporter did not exit on channel close, cancelling.");

            // force cancel
            exporters_cancel.cancel();

            let res =
                wait::wait_for_tasks_with_deadline(&mut exporters_task_set, exporters_hard_stop)
                    .await;
            if let Err(e) = res {
                return Err(format!("timed out waiting for exporters to exit: {}", e).into());
            }
        }

        Ok(())
    }
}
