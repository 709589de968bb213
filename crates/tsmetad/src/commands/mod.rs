pub mod access;
pub mod config;
pub mod metrics;

use std::path::Path;

use anyhow::Context;
use tsmeta_catalog::Catalog;
use tsmeta_core::WorkerConfig;
use tracing::info;

/// Load the configuration and open the catalog it points at.
pub fn open(config_path: &Path) -> anyhow::Result<(WorkerConfig, Catalog)> {
    let config = WorkerConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(dir) = config.catalog.path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let catalog = Catalog::open(&config.catalog.path)?;
    info!(path = ?config.catalog.path, "catalog opened");
    Ok((config, catalog))
}
