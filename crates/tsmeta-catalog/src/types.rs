//! Row types persisted in the tsmeta catalog.
//!
//! Every row knows its own `table_key()`. Rows are JSON-serialized into
//! redb tables, so fields added later must carry a serde default.

use serde::{Deserialize, Serialize};
use tsmeta_core::{ClusterType, VmDataType};

/// Tenant assumed for rows written before tenancy existed.
pub const DEFAULT_TENANT_ID: &str = "system";

fn default_tenant() -> String {
    DEFAULT_TENANT_ID.to_string()
}

fn default_true() -> bool {
    true
}

// ── Spaces ─────────────────────────────────────────────────────────

/// A space: the logical tenant unit metadata is scoped to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Space {
    /// Numeric primary key. Negative business ids refer to it as `-id`.
    pub id: u64,
    pub space_type_id: String,
    pub space_id: String,
    pub space_name: String,
    #[serde(default)]
    pub is_bcs_valid: bool,
    #[serde(default = "default_tenant")]
    pub bk_tenant_id: String,
}

impl Space {
    pub fn table_key(&self) -> String {
        space_key(&self.space_type_id, &self.space_id)
    }
}

/// Binding of a space to the VM cluster its data lands in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpaceVmInfo {
    pub space_type: String,
    pub space_id: String,
    pub vm_cluster_id: u64,
    pub vm_retention_time: String,
    #[serde(default)]
    pub created_at: u64,
}

impl SpaceVmInfo {
    pub fn table_key(&self) -> String {
        space_key(&self.space_type, &self.space_id)
    }
}

pub fn space_key(space_type: &str, space_id: &str) -> String {
    format!("{space_type}/{space_id}")
}

// ── Clusters ───────────────────────────────────────────────────────

/// A storage or queue cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterInfo {
    pub cluster_id: u64,
    pub cluster_name: String,
    pub cluster_type: ClusterType,
    #[serde(default)]
    pub domain_name: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub is_default_cluster: bool,
    /// Whether consumers must authenticate (SASL).
    #[serde(default)]
    pub is_ssl_verify: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl ClusterInfo {
    pub fn table_key(&self) -> String {
        self.cluster_id.to_string()
    }

    /// `domain:port` when both are known.
    pub fn broker_address(&self) -> Option<String> {
        if self.domain_name.is_empty() || self.port == 0 {
            return None;
        }
        Some(format!("{}:{}", self.domain_name, self.port))
    }
}

// ── Storage bindings ───────────────────────────────────────────────

/// The queue leg of a result table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KafkaStorage {
    pub table_id: String,
    pub topic: String,
    #[serde(default = "default_partition")]
    pub partition: u32,
    pub storage_cluster_id: u64,
}

fn default_partition() -> u32 {
    1
}

impl KafkaStorage {
    pub fn table_key(&self) -> String {
        self.table_id.clone()
    }
}

/// Binding of a result table to a raw data source on the remote platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BkDataStorage {
    pub table_id: String,
    /// `-1` until the platform has registered the raw data.
    pub raw_data_id: i64,
    #[serde(default)]
    pub etl_json_config: String,
    #[serde(default)]
    pub bk_data_result_table_id: String,
}

impl BkDataStorage {
    /// A fresh binding the platform has not registered yet.
    pub fn not_accessed(table_id: &str) -> Self {
        Self {
            table_id: table_id.to_string(),
            raw_data_id: -1,
            etl_json_config: String::new(),
            bk_data_result_table_id: String::new(),
        }
    }

    pub fn table_key(&self) -> String {
        self.table_id.clone()
    }

    pub fn access_state(&self) -> BkDataAccessState {
        match self.raw_data_id {
            -1 => BkDataAccessState::NotAccessed,
            id if id > 0 => BkDataAccessState::Accessed(id as u64),
            other => BkDataAccessState::Invalid(other),
        }
    }
}

/// Registration state of a [`BkDataStorage`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BkDataAccessState {
    NotAccessed,
    Accessed(u64),
    /// Zero or a negative id other than the `-1` sentinel.
    Invalid(i64),
}

// ── Access records ─────────────────────────────────────────────────

/// Marks a result table as fully accessed into VM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessVmRecord {
    pub result_table_id: String,
    pub data_type: VmDataType,
    #[serde(default)]
    pub bcs_cluster_id: String,
    pub storage_cluster_id: u64,
    pub vm_cluster_id: u64,
    pub bk_base_data_id: u64,
    pub vm_result_table_id: String,
    #[serde(default = "default_tenant")]
    pub bk_tenant_id: String,
    #[serde(default)]
    pub created_at: u64,
}

impl AccessVmRecord {
    pub fn table_key(&self) -> String {
        self.result_table_id.clone()
    }
}

// ── Data sources and tables ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataSource {
    pub bk_data_id: u32,
    pub data_name: String,
    #[serde(default)]
    pub etl_config: String,
}

impl DataSource {
    pub fn table_key(&self) -> String {
        self.bk_data_id.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultTable {
    pub table_id: String,
    #[serde(default)]
    pub table_name_zh: String,
    pub bk_biz_id: i64,
}

impl ResultTable {
    pub fn table_key(&self) -> String {
        self.table_id.clone()
    }
}

/// A container cluster with its two metric channels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BcsClusterInfo {
    pub cluster_id: String,
    pub k8s_metric_data_id: u32,
    pub custom_metric_data_id: u32,
}

impl BcsClusterInfo {
    pub fn table_key(&self) -> String {
        self.cluster_id.clone()
    }
}

// ── Time-series metrics ────────────────────────────────────────────

/// A metric discovered for a custom report group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSeriesMetric {
    pub group_id: u64,
    pub table_id: String,
    pub field_name: String,
    /// Dimension names as a JSON array string.
    pub tag_list: String,
    /// Unix seconds. `0` marks the metric as expired.
    pub last_modify_time: u64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_tenant")]
    pub bk_tenant_id: String,
}

impl TimeSeriesMetric {
    pub fn table_key(&self) -> String {
        ts_metric_key(self.group_id, &self.field_name)
    }

    /// Decode the stored dimension list.
    pub fn tags(&self) -> Result<Vec<String>, serde_json::Error> {
        serde_json::from_str(&self.tag_list)
    }

    pub fn set_tags(&mut self, tags: &[String]) -> Result<(), serde_json::Error> {
        self.tag_list = serde_json::to_string(tags)?;
        Ok(())
    }
}

pub fn ts_metric_key(group_id: u64, field_name: &str) -> String {
    format!("{group_id}:{field_name}")
}

pub fn ts_metric_group_prefix(group_id: u64) -> String {
    format!("{group_id}:")
}
