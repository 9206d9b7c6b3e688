//! bankmap - bank-switched MIDI translation between devices

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bankmap::config::AppConfig;
use bankmap::mapping;
use bankmap::ports::{self, MultiSink};
use bankmap::translator::Translator;

/// Translate control-surface MIDI between devices via a CSV mapping table
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Mappings directory (overrides the config file)
    #[arg(short, long)]
    mappings: Option<PathBuf>,

    /// Bank to activate at startup (overrides the config file)
    #[arg(short = 'b', long)]
    initial_bank: Option<u8>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Echo every inbound and outbound message (same as --log-level debug)
    #[arg(short, long)]
    verbose: bool,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let level = if args.verbose { "debug" } else { &args.log_level };
    init_logging(level)?;

    if args.list_ports {
        return ports::list_ports();
    }

    info!("Configuration file: {}", args.config);
    let config = AppConfig::load(Path::new(&args.config)).await?;

    let mappings_dir = args.mappings.unwrap_or_else(|| config.mappings_dir.clone());
    let initial_bank = args.initial_bank.unwrap_or(config.initial_bank);

    let table = mapping::load_mappings(&mappings_dir)
        .with_context(|| format!("Failed to load mappings from {}", mappings_dir.display()))?;
    info!("Mapping table has {} rows", table.len());

    // The queue serializes all input ports into one consumer, so every
    // event is fully dispatched before the next one is looked at.
    let (tx, mut rx) = mpsc::channel(1024);
    let _inputs = ports::open_inputs(&config.midi.inputs, tx)?;
    let sink = MultiSink::open(&config.midi.outputs)?;

    let mut engine = Translator::new(table, initial_bank, sink);
    engine.set_initial_bank(initial_bank);

    info!("Ready, translating on bank {initial_bank}");

    loop {
        tokio::select! {
            Some(message) = rx.recv() => {
                engine.handle_message(&message);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping");
                break;
            }
        }
    }

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}
