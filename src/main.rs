//! eventhook - forwards structured server events to a chat webhook
//!
//! Reads newline-delimited JSON events from stdin and posts one message per
//! event to the configured incoming webhook.

use anyhow::Result;
use clap::Parser;
use eventhook::{app::App, cli::Cli, config::Config, source::LineEventSource};
use std::process::ExitCode;
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            init_tracing("info");
            error!("Failed to load configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log_level);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(config));
    // A blocked stdin read must not hold the process open.
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initializes the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(config: Config) -> Result<()> {
    info!("eventhook starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Time Format: {}", config.reporter.format);
    info!("Basic Mode: {}", config.reporter.basic);
    info!("Static Payload Fields: {}", config.reporter.slack.len());
    if config.events.is_empty() {
        info!("Subscriptions: all events");
    } else {
        info!("Subscriptions: {:?}", config.events.keys().collect::<Vec<_>>());
    }
    info!("Metrics: {}", if config.metrics.enabled { "Enabled" } else { "Disabled" });
    info!("Event Queue Capacity: {}", config.performance.queue_capacity);
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let (app, events_tx) = App::builder(config).build(shutdown_rx.clone()).await?;

    let source = LineEventSource::new(BufReader::new(tokio::io::stdin()), events_tx, app.metrics());
    let source_task = tokio::spawn(async move {
        if let Err(e) = source.run(shutdown_rx).await {
            error!("Failed to read events from stdin: {}", e);
        }
    });

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received. Shutting down gracefully...");
                let _ = shutdown_tx.send(());
            }
            Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
        }
    });

    info!("eventhook initialized. Reading events from stdin...");
    app.run().await?;

    if !source_task.is_finished() {
        source_task.abort();
    }
    info!("Exiting.");
    Ok(())
}
