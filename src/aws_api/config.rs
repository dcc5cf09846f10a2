const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone)]
pub struct AwsConfig {
    pub region: String,
    pub(crate) aws_access_key_id: String,
    pub(crate) aws_secret_access_key: String,
    pub(crate) aws_session_token: Option<String>,
}

impl AwsConfig {
    pub fn new(
        region: String,
        aws_access_key_id: String,
        aws_secret_access_key: String,
        aws_session_token: Option<String>,
    ) -> Self {
        AwsConfig {
            region,
            aws_access_key_id,
            aws_secret_access_key,
            aws_session_token,
        }
    }

    pub fn from_env() -> Self {
        Self {
            region: std::env::var("AWS_REGION")
                .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
                .unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            aws_access_key_id: std::env::var("AWS_ACCESS_KEY_ID").unwrap_or_default(),
            aws_secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
            aws_session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
        }
    }
}
