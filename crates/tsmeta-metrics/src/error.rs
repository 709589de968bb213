use thiserror::Error;
use tsmeta_catalog::CatalogError;
use tsmeta_core::ConfigError;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid metric name pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("failed to parse observed metrics: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type MetricsResult<T> = Result<T, MetricsError>;
