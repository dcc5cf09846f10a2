use clap::Args;

#[derive(Debug, Args, Clone)]
pub struct RelayRun {
    /// CloudWatch Logs log group to deliver into
    #[arg(long, env = "SLUICE_LOG_GROUP_NAME")]
    pub log_group_name: String,

    /// CloudWatch Logs log stream name, generated when unset
    #[arg(long, env = "SLUICE_LOG_STREAM_NAME")]
    pub log_stream_name: Option<String>,

    /// Port the syslog UDP and TCP listeners bind to
    #[arg(long, env = "SLUICE_PORT", default_value = "514")]
    pub port: u16,

    /// Retention in days applied when the log group is created, 0 means never expire
    #[arg(long, env = "SLUICE_LOG_RETENTION", default_value = "0")]
    pub log_retention: u16,

    /// Override the CloudWatch Logs endpoint (for local stacks and tests)
    #[arg(long, env = "SLUICE_CUSTOM_ENDPOINT")]
    pub custom_endpoint: Option<String>,

    /// Maximum accepted syslog message size in bytes
    #[arg(long, env = "SLUICE_MAX_MESSAGE_SIZE", default_value = "8192")]
    pub max_message_size: usize,
}

impl Default for RelayRun {
    fn default() -> Self {
        RelayRun {
            log_group_name: String::new(),
            log_stream_name: None,
            port: 514,
            log_retention: 0,
            custom_endpoint: None,
            max_message_size: 8192,
        }
    }
}
