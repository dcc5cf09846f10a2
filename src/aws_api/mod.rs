pub mod auth;
pub mod config;
pub mod creds;

pub const CLOUDWATCH_LOGS_SERVICE: &str = "logs";
