//! Worker configuration (`tsmeta.toml`) parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::duration::parse_duration;
use crate::types::{ETL_CONFIG_BK_EXPORTER, ETL_CONFIG_BK_STANDARD};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid duration for {field}: {value:?}")]
    InvalidDuration { field: &'static str, value: String },
    #[error("metrics.push_threshold ({push:?}) must be larger than metrics.update_throttle ({throttle:?})")]
    ThresholdOrder { throttle: Duration, push: Duration },
    #[error("bkdata.base_url must not be empty")]
    MissingBaseUrl,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub catalog: CatalogConfig,
    pub bkdata: BkdataConfig,
    pub vm: VmConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Location of the catalog database file.
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/tsmeta/catalog.redb"),
        }
    }
}

/// Remote data-processing platform settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BkdataConfig {
    pub base_url: String,
    pub app_code: String,
    pub username: String,
    /// Business every VM access is registered under on the remote platform.
    pub default_biz_id: i64,
    /// Prefix of raw data and consumer-group names.
    pub rt_id_prefix: String,
    /// Broker used when a kafka cluster row lacks domain or port.
    pub kafka_broker_url: String,
    /// Tag used to query the platform's registered kafka brokers.
    pub kafka_tag: String,
    /// Per-request timeout (e.g., "30s").
    pub timeout: String,
}

impl Default for BkdataConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/".to_string(),
            app_code: "bk_monitorv3".to_string(),
            username: "admin".to_string(),
            default_biz_id: 2,
            rt_id_prefix: "bkm".to_string(),
            kafka_broker_url: String::new(),
            kafka_tag: "bkmonitor_outer".to_string(),
            timeout: "30s".to_string(),
        }
    }
}

impl BkdataConfig {
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        duration_field("bkdata.timeout", &self.timeout)
    }
}

/// Long-term storage access settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Retention written into storage configs and new space bindings.
    pub retention_time: String,
    /// Legacy data ids whose records carry nanosecond timestamps.
    pub ns_timestamp_data_ids: Vec<u32>,
    /// ETL configs whose records carry second timestamps.
    pub second_etl_configs: Vec<String>,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            retention_time: "30d".to_string(),
            ns_timestamp_data_ids: vec![1100006, 1100007, 1100015, 1100016],
            second_etl_configs: vec![
                ETL_CONFIG_BK_EXPORTER.to_string(),
                ETL_CONFIG_BK_STANDARD.to_string(),
            ],
        }
    }
}

/// Metric reconciliation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Minimum gap before an unchanged metric's timestamp is rewritten.
    pub update_throttle: String,
    /// Gap after which a refreshed metric requires a routing push.
    pub push_threshold: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            update_throttle: "24h".to_string(),
            push_threshold: "30d".to_string(),
        }
    }
}

impl MetricsConfig {
    pub fn update_throttle(&self) -> Result<Duration, ConfigError> {
        duration_field("metrics.update_throttle", &self.update_throttle)
    }

    pub fn push_threshold(&self) -> Result<Duration, ConfigError> {
        duration_field("metrics.push_threshold", &self.push_threshold)
    }

    /// `(update_throttle, push_threshold)`, with the push threshold strictly larger.
    pub fn thresholds(&self) -> Result<(Duration, Duration), ConfigError> {
        let throttle = self.update_throttle()?;
        let push = self.push_threshold()?;
        if push <= throttle {
            return Err(ConfigError::ThresholdOrder { throttle, push });
        }
        Ok((throttle, push))
    }
}

impl WorkerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: WorkerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bkdata.base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        self.bkdata.timeout()?;
        self.metrics.thresholds()?;
        Ok(())
    }
}

fn duration_field(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).ok_or_else(|| ConfigError::InvalidDuration {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WorkerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.bkdata.default_biz_id, 2);
        assert_eq!(config.vm.retention_time, "30d");
        assert!(config.vm.ns_timestamp_data_ids.contains(&1100007));
    }

    #[test]
    fn test_parse_partial() {
        let toml_str = r#"
[bkdata]
base_url = "http://bkbase.example.com/prod/"
default_biz_id = 100147

[metrics]
push_threshold = "7d"
"#;
        let config: WorkerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bkdata.default_biz_id, 100147);
        assert_eq!(config.bkdata.username, "admin");
        assert_eq!(
            config.metrics.push_threshold().unwrap(),
            Duration::from_secs(7 * 86_400)
        );
        assert_eq!(
            config.metrics.update_throttle().unwrap(),
            Duration::from_secs(86_400)
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_push_threshold_below_throttle() {
        let mut config = WorkerConfig::default();
        config.metrics.push_threshold = "1h".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdOrder { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_duration() {
        let mut config = WorkerConfig::default();
        config.bkdata.timeout = "fast".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDuration { field: "bkdata.timeout", .. })
        ));
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = WorkerConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("[bkdata]"));
        let parsed: WorkerConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.bkdata.rt_id_prefix, "bkm");
    }
}
