pub mod config;
pub mod duration;
pub mod types;

pub use config::{BkdataConfig, CatalogConfig, ConfigError, MetricsConfig, VmConfig, WorkerConfig};
pub use duration::parse_duration;
pub use types::*;
