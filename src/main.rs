//! # followee-broker
//!
//! Binary entry point: speaks the broker protocol on stdin/stdout and logs to
//! stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use followee_broker::capability::{CapabilityError, HelperProcess};
use followee_broker::config::DEFAULT_BATCH_CAP;
use followee_broker::lifecycle::listen_for_signals;
use followee_broker::{BrokerConfig, Dispatcher, SessionManager, ShutdownTrigger};

/// Single-session followee broker.
#[derive(Parser, Debug)]
#[command(name = "followee-broker", about = "Single-session followee broker speaking JSON lines on stdio")]
struct Cli {
    /// Capability helper program (defaults to $FOLLOWEE_BROKER_HELPER).
    #[arg(long)]
    helper: Option<PathBuf>,

    /// Argument passed to the helper (repeatable).
    #[arg(long = "helper-arg", allow_hyphen_values = true)]
    helper_args: Vec<String>,

    /// Maximum profiles per fetch_batch message.
    #[arg(long, default_value_t = DEFAULT_BATCH_CAP)]
    batch_cap: usize,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Do not emit `info` progress events.
    #[arg(long)]
    quiet: bool,
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(cli: Cli) -> Result<BrokerConfig> {
    let mut builder = BrokerConfig::builder()
        .batch_cap(cli.batch_cap)
        .helper_args(cli.helper_args)
        .announce_progress(!cli.quiet)
        .require_helper(true);
    if let Some(helper) = cli.helper {
        builder = builder.helper(helper);
    }
    builder.build().context("invalid broker configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = build_config(cli)?;
    let helper = config
        .helper()
        .cloned()
        .context("no capability helper configured")?;
    tracing::info!(helper = %helper.program().display(), batch_cap = config.batch_cap(), "starting broker");

    let sessions = SessionManager::new(move || {
        HelperProcess::spawn(&helper).map_err(CapabilityError::from)
    });

    let shutdown = ShutdownTrigger::new();
    let _signals = listen_for_signals(shutdown.clone());

    let mut dispatcher = Dispatcher::new(
        sessions,
        tokio::io::stdin(),
        tokio::io::stdout(),
        &config,
        shutdown,
    );
    if let Err(e) = dispatcher.run().await {
        tracing::error!(error = %e, "command channel failed");
    }

    // The blocking stdin reader cannot be cancelled, so leave without
    // waiting for the runtime to wind down.
    std::process::exit(0);
}
