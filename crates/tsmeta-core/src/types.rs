//! Shared constants and small types used across tsmeta crates.

use serde::{Deserialize, Serialize};

/// Space type for CMDB business spaces (positive business ids).
pub const SPACE_TYPE_BKCC: &str = "bkcc";

/// Suffix marking the default sub-table of a result table.
pub const DEFAULT_TABLE_SUFFIX: &str = ".__default__";

/// ETL config of exporter-style data sources (second precision).
pub const ETL_CONFIG_BK_EXPORTER: &str = "bk_exporter";

/// ETL config of standard data sources (second precision).
pub const ETL_CONFIG_BK_STANDARD: &str = "bk_standard";

/// Kind of cluster registered in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterType {
    Kafka,
    #[serde(rename = "victoria_metrics")]
    Vm,
    Influxdb,
    Elasticsearch,
}

impl ClusterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterType::Kafka => "kafka",
            ClusterType::Vm => "victoria_metrics",
            ClusterType::Influxdb => "influxdb",
            ClusterType::Elasticsearch => "elasticsearch",
        }
    }
}

impl std::fmt::Display for ClusterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin of the data feeding a result table that gets accessed into VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmDataType {
    /// Plain custom report, not tied to a container cluster.
    UserCustom,
    /// Built-in k8s metrics channel of a container cluster.
    BcsClusterK8s,
    /// Custom metrics channel of a container cluster.
    BcsClusterCustom,
}

impl VmDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VmDataType::UserCustom => "user_custom",
            VmDataType::BcsClusterK8s => "bcs_cluster_k8s",
            VmDataType::BcsClusterCustom => "bcs_cluster_custom",
        }
    }
}
