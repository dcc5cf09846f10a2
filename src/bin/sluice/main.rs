// SPDX-License-Identifier: Apache-2.0

use clap::{Parser, ValueEnum};
use sluice::init::agent::Agent;
use sluice::init::args::RelayRun;
use sluice::init::misc::{BoundSockets, bind_endpoint};
use sluice::init::wait;
use std::error::Error;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;
use tokio::select;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::metadata::LevelFilter;
use tracing::{error, info, warn};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

const SENDING_QUEUE_SIZE: usize = 1_000;

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Run relay
    Start(Box<RelayRun>),

    /// Return version
    Version,
}

#[derive(Debug, Parser)]
#[command(name = "sluice")]
#[command(bin_name = "sluice")]
#[command(version, about, long_about = None)]
#[command(subcommand_required = true)]
struct Arguments {
    #[arg(
        value_enum,
        long,
        global = true,
        env = "SLUICE_LOG_FORMAT",
        default_value = "text"
    )]
    /// Log format
    log_format: LogFormatArg,

    #[arg(long, global = true, env = "SLUICE_ENVIRONMENT", default_value = "dev")]
    /// Environment
    environment: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

fn main() -> ExitCode {
    let opt = Arguments::parse();

    match opt.command {
        Some(Commands::Version) => {
            println!("{}", get_version())
        }
        Some(Commands::Start(relay)) => {
            // Bind the syslog sockets up front so bind failures surface
            // before the runtime spins up.
            let endpoint: SocketAddr = match format!("0.0.0.0:{}", relay.port).parse() {
                Ok(addr) => addr,
                Err(e) => {
                    eprintln!("ERROR: invalid listen endpoint: {}", e);
                    return ExitCode::from(1);
                }
            };

            let sockets = match bind_endpoint(endpoint) {
                Ok(sockets) => sockets,
                Err(e) => {
                    eprintln!("ERROR: {}", e);
                    return ExitCode::from(1);
                }
            };

            let _guard = match setup_logging(&opt.log_format) {
                Ok(guard) => guard,
                Err(e) => {
                    eprintln!("ERROR: failed to setup logging: {}", e);
                    return ExitCode::from(1);
                }
            };

            match run_relay(relay, sockets, &opt.environment) {
                Ok(_) => {}
                Err(e) => {
                    error!(error = e, "Failed to run relay.");
                    return ExitCode::from(1);
                }
            }
        }
        _ => {
            // it shouldn't be possible to get here since we mark a subcommand as
            // required
            error!("Must specify a command");
            return ExitCode::from(2);
        }
    }

    ExitCode::SUCCESS
}

#[tokio::main]
async fn run_relay(
    relay_args: Box<RelayRun>,
    sockets: BoundSockets,
    env: &String,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut relay_join_set = JoinSet::new();

    let cancel_token = CancellationToken::new();
    {
        let token = cancel_token.clone();
        let env = env.clone();
        let relay_fut = async move {
            let agent = Agent::new(relay_args, sockets, SENDING_QUEUE_SIZE, env);
            agent.run(token).await
        };

        relay_join_set.spawn(relay_fut);
    };

    select! {
        _ = signal_wait() => {
            info!("Shutdown signal received.");
            cancel_token.cancel();
        },
        e = wait::wait_for_any_task(&mut relay_join_set) => {
            match e {
                Ok(()) => warn!("Unexpected early exit of relay."),
                Err(e) => return Err(e),
            }
        },
    }

    // Wait for tasks to complete, we use a large timeout here because the
    // agent enforces lower timeouts.
    wait::wait_for_tasks_with_timeout(&mut relay_join_set, Duration::from_secs(10)).await?;

    Ok(())
}

type LoggerGuard = tracing_appender::non_blocking::WorkerGuard;

fn setup_logging(log_format: &LogFormatArg) -> Result<LoggerGuard, BoxError> {
    LogTracer::init().expect("Unable to setup log tracer!");

    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?
        .add_directive("hyper=warn".parse()?)
        .add_directive("rustls=warn".parse()?);

    if *log_format == LogFormatArg::Json {
        let app_name = format!("{}-{}", env!("CARGO_PKG_NAME"), get_version());
        let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, non_blocking_writer);

        let subscriber = Registry::default()
            .with(filter)
            .with(JsonStorageLayer)
            .with(bunyan_formatting_layer);
        tracing::subscriber::set_global_default(subscriber).unwrap();
    } else {
        use std::io;
        use std::io::IsTerminal;

        // Skip color codes when not in a terminal
        let use_ansi = io::stdout().is_terminal();

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_target(false)
            .with_level(true)
            .with_ansi(use_ansi)
            .compact();

        let subscriber = Registry::default().with(filter).with(file_layer);
        tracing::subscriber::set_global_default(subscriber).unwrap();
    }
    Ok(guard)
}

fn get_version() -> String {
    // Set during CI
    let version_build = option_env!("BUILD_SHORT_SHA").unwrap_or("dev");

    format!("{}-{}", env!("CARGO_PKG_VERSION"), version_build)
}

async fn signal_wait() {
    let mut sig_term = sig(SignalKind::terminate());
    let mut sig_int = sig(SignalKind::interrupt());

    select! {
        _ = sig_term.recv() => {},
        _ = sig_int.recv() => {},
    }
}

fn sig(kind: SignalKind) -> tokio::signal::unix::Signal {
    signal(kind).unwrap()
}
