//! tsmetad: the tsmeta worker.
//!
//! Each subcommand runs one job against the catalog and exits; the
//! scheduler invoking it owns retries.
//!
//! # Usage
//!
//! ```text
//! tsmetad access-vm --config tsmeta.toml --bk-biz-id 2 --table-id 2_bkmonitor.cpu --data-id 50010
//! tsmetad refresh-metrics --config tsmeta.toml --tenant system --group-id 7 \
//!     --table-id 2_bkmonitor_time_series_7.__default__ --metrics metrics.json --auto-discovery
//! tsmetad check-config --config tsmeta.toml
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(name = "tsmetad", about = "tsmeta metadata worker", version)]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Access a result table into VM storage.
    AccessVm {
        #[arg(long)]
        config: PathBuf,
        /// Business id; non-positive values refer to a space by primary key.
        #[arg(long, allow_hyphen_values = true)]
        bk_biz_id: i64,
        #[arg(long)]
        table_id: String,
        #[arg(long)]
        data_id: u32,
    },
    /// Reconcile a report group's metrics with an observation file.
    RefreshMetrics {
        #[arg(long)]
        config: PathBuf,
        #[arg(long, default_value = "system")]
        tenant: String,
        #[arg(long)]
        group_id: u64,
        #[arg(long)]
        table_id: String,
        /// JSON array of observed metrics.
        #[arg(long)]
        metrics: PathBuf,
        #[arg(long)]
        auto_discovery: bool,
    },
    /// Load and validate a configuration file.
    CheckConfig {
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    match cli.command {
        Command::AccessVm {
            config,
            bk_biz_id,
            table_id,
            data_id,
        } => commands::access::run(&config, bk_biz_id, &table_id, data_id).await,
        Command::RefreshMetrics {
            config,
            tenant,
            group_id,
            table_id,
            metrics,
            auto_discovery,
        } => commands::metrics::run(&config, &tenant, group_id, &table_id, &metrics, auto_discovery),
        Command::CheckConfig { config } => commands::config::check(&config),
    }
}

/// Used when `RUST_LOG` is unset. The `tsmeta` target covers every library crate.
const DEFAULT_LOG_FILTER: &str = "info,tsmeta=debug,tsmetad=debug";

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(DEFAULT_LOG_FILTER))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_filter_enables_library_debug() {
        let filter = tracing_subscriber::EnvFilter::try_new(DEFAULT_LOG_FILTER).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("tsmeta=debug"));
        assert!(rendered.contains("tsmetad=debug"));
    }
}
