//! redb table definitions for the tsmeta catalog.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized rows).

use redb::TableDefinition;

/// Shape shared by every catalog table.
pub type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Spaces keyed by `{space_type_id}/{space_id}`.
pub const SPACES: JsonTable = TableDefinition::new("spaces");

/// Space to VM cluster bindings keyed by `{space_type}/{space_id}`.
pub const SPACE_VM_INFO: JsonTable = TableDefinition::new("space_vm_info");

/// Storage and queue clusters keyed by `{cluster_id}`.
pub const CLUSTERS: JsonTable = TableDefinition::new("clusters");

/// Queue legs keyed by `{table_id}`.
pub const KAFKA_STORAGES: JsonTable = TableDefinition::new("kafka_storages");

/// Platform raw data bindings keyed by `{table_id}`.
pub const BKDATA_STORAGES: JsonTable = TableDefinition::new("bkdata_storages");

/// VM access completion markers keyed by `{result_table_id}`.
pub const ACCESS_VM_RECORDS: JsonTable = TableDefinition::new("access_vm_records");

/// Data sources keyed by `{bk_data_id}`.
pub const DATA_SOURCES: JsonTable = TableDefinition::new("data_sources");

/// Result tables keyed by `{table_id}`.
pub const RESULT_TABLES: JsonTable = TableDefinition::new("result_tables");

/// Container clusters keyed by `{cluster_id}`.
pub const BCS_CLUSTERS: JsonTable = TableDefinition::new("bcs_clusters");

/// Time-series metrics keyed by `{group_id}:{field_name}`.
pub const TS_METRICS: JsonTable = TableDefinition::new("ts_metrics");

pub const ALL_TABLES: [JsonTable; 10] = [
    SPACES,
    SPACE_VM_INFO,
    CLUSTERS,
    KAFKA_STORAGES,
    BKDATA_STORAGES,
    ACCESS_VM_RECORDS,
    DATA_SOURCES,
    RESULT_TABLES,
    BCS_CLUSTERS,
    TS_METRICS,
];
