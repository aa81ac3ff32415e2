//! ALDL Monitor - command-line front end for ALDL telemetry
//!
//! Compiles an ADX definition, opens a serial port (or the simulated ECM)
//! and prints decoded snapshots.

mod config;
mod output;

use aldl_core::definition::{compile_file, DecoderSchema};
use aldl_core::demo::SimulatedEcm;
use aldl_core::protocol::{connect, list_ports, AcquisitionEngine, ByteStream};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "aldl-monitor")]
#[command(author, version, about = "ALDL telemetry monitor")]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available serial ports
    Ports,

    /// Compile a definition and show what it describes
    Inspect {
        /// ADX definition file
        definition: PathBuf,

        /// Print the compiled schema as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stream snapshots until interrupted
    Stream {
        /// ADX definition file
        definition: PathBuf,

        /// Serial port
        #[arg(short, long, env = "ALDL_PORT", conflicts_with = "demo")]
        port: Option<String>,

        /// Stream from the simulated ECM instead of a port
        #[arg(long)]
        demo: bool,

        /// Baud rate override
        #[arg(short, long)]
        baud: Option<u32>,

        /// JSON connection config file
        #[arg(short, long, env = "ALDL_CONFIG")]
        config: Option<PathBuf>,

        /// Stop after this many snapshots
        #[arg(short = 'n', long)]
        count: Option<u64>,

        /// One JSON object per snapshot
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Ports => {
            let ports = list_ports();
            if ports.is_empty() {
                println!("No serial ports found");
            }
            for port in &ports {
                println!("{}", output::port_line(port));
            }
        }

        Commands::Inspect { definition, json } => {
            let schema = load_definition(&definition)?;
            if json {
                output::print_json(&schema);
            } else {
                output::print_kv(&output::schema_summary(&schema));
            }
        }

        Commands::Stream {
            definition,
            port,
            demo,
            baud,
            config,
            count,
            json,
        } => {
            let schema = Arc::new(load_definition(&definition)?);
            let loaded = config::load(config.as_deref())?;
            let connection = config::merge_with_args(loaded, port.as_deref(), baud);

            if demo {
                let (host, _device) = SimulatedEcm::new(schema.clone()).spawn();
                let engine =
                    AcquisitionEngine::with_config(host, schema, connection.engine.clone());
                stream(engine, count, json).await?;
            } else {
                let engine = connect(&connection, schema).with_context(|| {
                    format!("Failed to open port '{}'", connection.port_name)
                })?;
                stream(engine, count, json).await?;
            }
        }
    }

    Ok(())
}

fn load_definition(path: &Path) -> Result<DecoderSchema> {
    compile_file(path)
        .with_context(|| format!("Failed to compile definition: {}", path.display()))
}

/// Run `engine` and print snapshots as they arrive
async fn stream<T>(engine: AcquisitionEngine<T>, count: Option<u64>, json: bool) -> Result<()>
where
    T: ByteStream + 'static,
{
    let schema = engine.schema().clone();
    let mut latest = engine.subscribe();
    let counter = engine.frame_counter();
    let cancel = CancellationToken::new();
    let task = engine.spawn(cancel.clone());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut printed = 0u64;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = latest.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = latest.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    if json {
                        println!("{}", output::snapshot_json(&snapshot));
                    } else {
                        println!("{}", output::snapshot_line(&snapshot, &schema));
                    }
                    printed += 1;
                }
                if count.is_some_and(|n| printed >= n) {
                    break;
                }
            }
        }
    }

    cancel.cancel();
    task.await.context("Acquisition task failed")?;
    eprintln!("{}", output::stats_line(&counter.stats()));
    Ok(())
}
