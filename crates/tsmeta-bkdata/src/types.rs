//! Request and response records of the remote platform.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

pub use crate::clean::{
    AssignRule, CleanConfig, CleanField, EtlConf, EtlNode, JsonConfig, StorageConfig, StorageField,
};

// ── Envelope ───────────────────────────────────────────────────────

/// Envelope wrapping every platform response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub result: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Value,
}

impl<T> ApiResponse<T> {
    /// Fail on `result = false`, otherwise hand back `data`.
    pub fn into_data(self, operation: &'static str) -> ApiResult<T> {
        self.check(operation)?;
        self.data.ok_or(ApiError::MissingField {
            operation,
            field: "data",
        })
    }

    pub fn check(&self, operation: &'static str) -> ApiResult<()> {
        if self.result {
            return Ok(());
        }
        let code = match &self.code {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        Err(ApiError::Rejected {
            operation,
            code,
            message: self.message.clone(),
        })
    }
}

/// Caller identity attached to every request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caller {
    pub bk_app_code: String,
    pub bk_username: String,
}

// ── Data hub ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateDataHubRequest {
    #[serde(flatten)]
    pub caller: Caller,
    pub common: DataHubCommon,
    pub raw_data: DataHubRawData,
    pub clean: Vec<CleanConfig>,
    pub storage: Vec<StorageConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataHubCommon {
    pub bk_biz_id: i64,
    pub data_scenario: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataHubRawData {
    pub raw_data_name: String,
    pub raw_data_alias: String,
    pub data_source_tags: Vec<String>,
    pub description: String,
    /// Always an empty object for custom data.
    pub data_scenario: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateDataHubData {
    pub raw_data_id: u64,
    #[serde(default)]
    pub clean_rt_id: Vec<String>,
}

// ── Deploy plan ────────────────────────────────────────────────────

/// Registers a kafka topic as a raw data source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessDeployPlanRequest {
    #[serde(flatten)]
    pub caller: Caller,
    pub bk_biz_id: i64,
    pub data_scenario: String,
    pub description: String,
    pub access_raw_data: AccessRawData,
    pub access_conf_info: AccessConfInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessRawData {
    pub raw_data_name: String,
    pub raw_data_alias: String,
    pub maintainer: String,
    pub data_source: String,
    pub data_encoding: String,
    pub sensitivity: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessConfInfo {
    pub collection_model: CollectionModel,
    pub resource: AccessResource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionModel {
    pub collection_type: String,
    pub start_at: i64,
    pub period: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub scope: Vec<KafkaScope>,
}

/// Consumer settings for one kafka topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KafkaScope {
    pub master: String,
    pub group: String,
    pub topic: String,
    pub tasks: u32,
    pub use_sasl: bool,
    pub security_protocol: String,
    pub sasl_mechanism: String,
    pub user: String,
    pub password: String,
    pub auto_offset_reset: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccessDeployPlanData {
    #[serde(default)]
    pub raw_data_id: i64,
}

// ── Databus cleans ─────────────────────────────────────────────────

/// Creates a clean on an already registered raw data source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabusCleanRequest {
    #[serde(flatten)]
    pub caller: Caller,
    pub bk_biz_id: i64,
    pub raw_data_id: i64,
    pub clean_config_name: String,
    /// The clean's `JsonConfig`, serialized to a string.
    pub json_config: String,
    pub result_table_name: String,
    pub result_table_name_alias: String,
    pub processing_id: String,
    pub description: String,
    pub fields: Vec<CleanField>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatabusCleanData {
    #[serde(default)]
    pub result_table_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartDatabusCleanRequest {
    #[serde(flatten)]
    pub caller: Caller,
    pub result_table_id: String,
    pub storages: Vec<String>,
}

// ── Data storages ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataStorageRequest {
    #[serde(flatten)]
    pub caller: Caller,
    pub raw_data_id: i64,
    pub data_type: String,
    pub result_table_name: String,
    pub result_table_name_alias: String,
    pub storage_type: String,
    pub storage_cluster: String,
    pub expires: String,
    pub fields: Vec<StorageField>,
    pub config: StorageOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageOptions {
    pub schemaless: bool,
}

// ── Kafka info ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KafkaInfoQuery {
    #[serde(flatten)]
    pub caller: Caller,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KafkaInfo {
    /// Comma-separated broker hosts.
    #[serde(default)]
    pub ip_list: String,
}

impl KafkaInfo {
    pub fn hosts(&self) -> Vec<String> {
        self.ip_list
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect()
    }
}
