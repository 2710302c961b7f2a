// SPDX-FileCopyrightText: 2026 Painel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Painel - CRM metrics dashboard service.
//!
//! This is the binary entry point for the Painel service.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use painel_bitrix::export::export_records;
use painel_bitrix::{CityResolver, ProxyClient};
use painel_config::{ConfigError, PainelConfig};
use painel_core::{PainelError, RecordSource, ReportWindow};
use painel_metrics::Coordinator;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Painel - CRM metrics dashboard service.
#[derive(Parser, Debug)]
#[command(name = "painel", version, about, long_about = None)]
struct Cli {
    /// Explicit config file path; defaults to the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the metrics service (the default).
    Serve,
    /// Print the resolved configuration as TOML.
    Config,
    /// Fetch records sent in a date range and print them as JSON.
    Export {
        /// Window start (YYYY-MM-DD).
        start: NaiveDate,
        /// Window end, inclusive; defaults to the start date.
        end: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            painel_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) | None => serve(&config).await,
        Some(Commands::Config) => print_config(&config),
        Some(Commands::Export { start, end }) => {
            export(&config, start, end.unwrap_or(start)).await
        }
    };
    if let Err(e) = result {
        eprintln!("painel: {e}");
        std::process::exit(1);
    }
}

fn load(path: Option<&Path>) -> Result<PainelConfig, Vec<ConfigError>> {
    match path {
        Some(path) => painel_config::load_and_validate_path(path),
        None => painel_config::load_and_validate(),
    }
}

/// Wires the proxy client, the optional city resolver, and the coordinator,
/// then polls until the process is killed.
async fn serve(config: &PainelConfig) -> Result<(), PainelError> {
    let source: Arc<dyn RecordSource> = Arc::new(ProxyClient::from_config(&config.crm)?);
    let resolver = config
        .metrics
        .city_breakdown
        .then(|| Arc::new(CityResolver::new(source.clone(), config.fields.city.clone())));
    let coordinator = Arc::new(Coordinator::new(source, resolver, config)?);
    info!(
        proxy = %config.crm.proxy_url,
        poll_secs = config.metrics.poll_interval_secs,
        city_breakdown = config.metrics.city_breakdown,
        "painel starting"
    );

    // A failed first cycle is not fatal: the periodic driver retries and the
    // zeroed summary stands in until data arrives.
    if let Err(e) = coordinator.refresh().await {
        warn!(error = %e, "initial metrics cycle failed");
    }

    let mut updates = coordinator.subscribe();
    tokio::spawn(coordinator.clone().run_periodic());
    while updates.changed().await.is_ok() {
        let summary = coordinator.summary();
        info!(
            total_sent = summary.total_sent,
            total_released = summary.total_released,
            responsible = summary.by_responsible.len(),
            "summary updated"
        );
    }
    Ok(())
}

fn print_config(config: &PainelConfig) -> Result<(), PainelError> {
    let rendered =
        toml::to_string_pretty(config).map_err(|e| PainelError::Internal(e.to_string()))?;
    println!("{rendered}");
    Ok(())
}

async fn export(config: &PainelConfig, start: NaiveDate, end: NaiveDate) -> Result<(), PainelError> {
    let client = ProxyClient::from_config(&config.crm)?;
    let window = ReportWindow::new(start, end);
    let fields = config.fields.record_fields();
    let rows = export_records(&client, &fields, &window, config.crm.page_size).await?;
    info!(records = rows.len(), "export fetched");
    let rendered =
        serde_json::to_string_pretty(&rows).map_err(|e| PainelError::Internal(e.to_string()))?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn binary_loads_config_defaults() {
        // Verify config loads with defaults (no config file needed)
        let config = painel_config::load_and_validate().expect("default config should be valid");
        assert_eq!(config.crm.page_size, 50);
        assert_eq!(config.metrics.poll_interval_secs, 30);
    }
}
