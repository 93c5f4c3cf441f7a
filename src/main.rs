//! Bedside Monitor
//!
//! Command line front end of the monitor client. `monitor` follows the live
//! telemetry and logs every published snapshot; the other subcommands issue a
//! single request against the monitoring service.

use anyhow::{Context, Result};
use bedside_monitor::{
    api::{controller::BackendApi, model::MonitorModelApi},
    components::{backend::HttpBackend, bootstrap::spawn_bootstrap, monitor::MonitorState},
    core::events::AppEvent,
    model::{command::PumpCommand, report::EmailReport},
    MonitorClient, MonitorConfig,
};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{info, warn};
use std::{path::PathBuf, sync::Arc};
use tokio::{runtime::Runtime, sync::mpsc};

#[derive(Debug, Parser)]
#[command(name = "bedside-monitor", version, about = "Bedside IV fluid and vital-sign monitor client")]
struct Cli {
    /// Base address of the monitoring service.
    #[arg(long, env = "BEDSIDE_API_URL")]
    api_url: Option<String>,
    /// JSON configuration file; command line flags take precedence.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Follow the live telemetry until interrupted.
    Monitor {
        /// Feed the client with simulated telemetry instead of the live channel.
        #[arg(long)]
        simulate: bool,
        /// Print every snapshot as JSON on stdout.
        #[arg(long)]
        json: bool,
    },
    /// Send a command to the backup pump: on, off or reset.
    Pump { command: PumpCommand },
    /// Clear the service's alert table.
    ClearAlerts,
    /// Email the current reading and recent alerts.
    Report {
        /// Recipient address.
        #[arg(long)]
        to: String,
    },
}

fn load_config(cli: &Cli) -> Result<MonitorConfig> {
    let mut config = match &cli.config {
        Some(path) => MonitorConfig::from_file(path)
            .with_context(|| format!("could not read {}", path.display()))?,
        None => MonitorConfig::default(),
    };
    if let Some(url) = &cli.api_url {
        config.base_url = url.clone();
    }
    Ok(config)
}

async fn monitor(config: MonitorConfig, simulate: bool, json: bool) -> Result<()> {
    let client = if simulate {
        MonitorClient::simulated(config)?
    } else {
        MonitorClient::start(config)?
    };
    let mut snapshots = client.subscribe();
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    warn!("monitor client stopped");
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if json {
                    println!("{}", serde_json::to_string(&snapshot)?);
                } else {
                    info!(
                        "[{:?}] {} | {} alert(s)",
                        snapshot.connection,
                        snapshot.reading,
                        snapshot.alerts.len()
                    );
                    if let Some(alert) = snapshot.alerts.first() {
                        info!("latest alert: {} {}", alert.severity, alert.message);
                    }
                }
            }
            _ = &mut interrupted => {
                info!("interrupted, shutting down");
                break;
            }
        }
    }
    client.shutdown().await
}

/// Builds the report from freshly bootstrapped state and sends it.
async fn report(config: MonitorConfig, recipient: String) -> Result<()> {
    let backend = Arc::new(HttpBackend::new(config.api_base())?);
    let mut state = MonitorState::from_config(&config);

    let (tx, mut rx) = mpsc::unbounded_channel();
    spawn_bootstrap(backend.clone(), config.history_limit, config.alert_limit, tx);
    while let Some(event) = rx.recv().await {
        if let AppEvent::Bootstrap(event) = event {
            event.forward_to(&mut state);
        }
    }

    let report = EmailReport {
        recipient,
        payload: state.get_reading().clone(),
        alerts: state.get_alerts().to_vec(),
    };
    backend.send_report(&report).await?;
    info!("report sent to {}", report.recipient);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Command::Monitor { simulate, json } => monitor(config, simulate, json).await,
        Command::Pump { command } => {
            let ack = HttpBackend::new(config.api_base())?
                .send_command(command)
                .await?;
            info!("pump command {} accepted at {:?}", command, ack.timestamp);
            Ok(())
        }
        Command::ClearAlerts => {
            HttpBackend::new(config.api_base())?.clear_alerts().await?;
            info!("service alerts cleared");
            Ok(())
        }
        Command::Report { to } => report(config, to).await,
    }
}

/// Main entry point of the application.
///
/// Initializes logging, sets up the asynchronous runtime and runs the selected
/// subcommand.
fn main() -> Result<()> {
    env_logger::Builder::from_env(
        Env::default()
            .filter_or("BEDSIDE_LOG_LEVEL", "info")
            .write_style_or("BEDSIDE_LOG_STYLE", "always"),
    )
    .init();

    let cli = Cli::parse();
    let rt = Runtime::new().context("Unable to create Runtime")?;
    rt.block_on(run(cli))
}
