//! Builders for the clean and storage payloads of a VM access.
//!
//! Raw records look like
//! `{"time": .., "dimensions": {..}, "metrics": {"name": value, ..}}`;
//! the clean flattens each entry of `metrics` into one row of
//! `time, value, metric, dimensions`.

use tsmeta_bkdata::{
    AssignRule, Caller, CleanConfig, CleanField, CreateDataHubRequest, DataHubCommon,
    DataHubRawData, DataStorageRequest, EtlConf, EtlNode, JsonConfig, StorageConfig,
    StorageField, StorageOptions,
};

use crate::naming::clean_result_table_id;
use crate::timestamp::TimestampLen;

pub const CLEAN_DESCRIPTION: &str = "tsdb";
pub const STORAGE_TYPE_VM: &str = "vm";
const CLEAN_TIMEZONE: i32 = 8;

/// Output columns of every VM clean.
pub fn clean_fields() -> Vec<CleanField> {
    vec![
        CleanField::new("time", "long", 1),
        CleanField::new("value", "double", 2),
        CleanField::new("metric", "string", 3),
        CleanField::new("dimensions", "text", 4),
    ]
}

fn extract_tree() -> EtlNode {
    let dimensions = EtlNode::Assign {
        subtype: "assign_json".to_string(),
        label: "label86a168".to_string(),
        assign: vec![AssignRule::new("text", "dimensions", "dimensions")],
        next: None,
    };
    let metric_items = EtlNode::Fun {
        method: "items".to_string(),
        label: "label1dd4f4".to_string(),
        result: "item".to_string(),
        args: vec![],
        next: Some(Box::new(EtlNode::Assign {
            subtype: "assign_obj".to_string(),
            label: "labelec6235".to_string(),
            assign: vec![
                AssignRule::new("double", "value", "value"),
                AssignRule::new("string", "metric", "key"),
            ],
            next: None,
        })),
    };
    let metrics = EtlNode::Access {
        subtype: "access_obj".to_string(),
        label: "labelb7a4b1".to_string(),
        key: "metrics".to_string(),
        result: "metrics".to_string(),
        default_type: "null".to_string(),
        default_value: String::new(),
        next: Some(Box::new(metric_items)),
    };
    let time = EtlNode::Assign {
        subtype: "assign_obj".to_string(),
        label: "labelc08700".to_string(),
        assign: vec![AssignRule::new("long", "time", "time")],
        next: None,
    };

    EtlNode::Fun {
        method: "from_json".to_string(),
        label: "label3d0181".to_string(),
        result: "json".to_string(),
        args: vec![],
        next: Some(Box::new(EtlNode::Branch {
            name: String::new(),
            label: None,
            next: vec![dimensions, metrics, time],
        })),
    }
}

/// Clean producing `result_table_name` under `bk_biz_id`.
pub fn build_clean_config(
    result_table_name: &str,
    result_table_name_alias: &str,
    bk_biz_id: i64,
    timestamp_len: TimestampLen,
) -> CleanConfig {
    CleanConfig {
        json_config: JsonConfig {
            extract: extract_tree(),
            conf: EtlConf {
                time_format: timestamp_len.time_format().to_string(),
                timezone: CLEAN_TIMEZONE,
                time_field_name: "time".to_string(),
                output_field_name: "timestamp".to_string(),
                timestamp_len: timestamp_len.digits(),
                encoding: "UTF-8".to_string(),
            },
        },
        result_table_name: result_table_name.to_string(),
        result_table_name_alias: result_table_name_alias.to_string(),
        processing_id: clean_result_table_id(bk_biz_id, result_table_name),
        description: CLEAN_DESCRIPTION.to_string(),
        fields: clean_fields(),
    }
}

pub fn vm_storage_config(result_table_name: &str, vm_cluster: &str, expires: &str) -> StorageConfig {
    StorageConfig {
        result_table_name: result_table_name.to_string(),
        storage_type: STORAGE_TYPE_VM.to_string(),
        expires: expires.to_string(),
        storage_cluster: vm_cluster.to_string(),
    }
}

/// Settings shared by a single-call data hub access.
#[derive(Debug, Clone)]
pub struct DataHubSpec<'a> {
    pub data_hub_name: &'a str,
    pub bk_biz_id: i64,
    pub vm_cluster: &'a str,
    pub expires: &'a str,
    pub description: &'a str,
    pub timestamp_len: TimestampLen,
}

/// Raw data, clean and VM storage created in one call.
pub fn data_hub_request(caller: Caller, spec: &DataHubSpec<'_>) -> CreateDataHubRequest {
    CreateDataHubRequest {
        caller,
        common: DataHubCommon {
            bk_biz_id: spec.bk_biz_id,
            data_scenario: "custom".to_string(),
        },
        raw_data: DataHubRawData {
            raw_data_name: spec.data_hub_name.to_string(),
            raw_data_alias: spec.data_hub_name.to_string(),
            data_source_tags: vec!["server".to_string()],
            description: spec.description.to_string(),
            data_scenario: serde_json::Map::new(),
        },
        clean: vec![build_clean_config(
            spec.data_hub_name,
            spec.data_hub_name,
            spec.bk_biz_id,
            spec.timestamp_len,
        )],
        storage: vec![vm_storage_config(
            spec.data_hub_name,
            spec.vm_cluster,
            spec.expires,
        )],
    }
}

/// VM storage for the clean output of an existing raw data.
pub fn data_storage_request(
    caller: Caller,
    raw_data_id: i64,
    result_table_name: &str,
    vm_cluster: &str,
    expires: &str,
) -> DataStorageRequest {
    DataStorageRequest {
        caller,
        raw_data_id,
        data_type: "clean".to_string(),
        result_table_name: result_table_name.to_string(),
        result_table_name_alias: result_table_name.to_string(),
        storage_type: STORAGE_TYPE_VM.to_string(),
        storage_cluster: vm_cluster.to_string(),
        expires: expires.to_string(),
        fields: clean_fields().into_iter().map(StorageField::from).collect(),
        config: StorageOptions { schemaless: true },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn caller() -> Caller {
        Caller {
            bk_app_code: "bk_monitorv3".to_string(),
            bk_username: "admin".to_string(),
        }
    }

    #[test]
    fn clean_config_matches_platform_shape() {
        let clean = build_clean_config("vm_cpu", "vm_cpu", 2, TimestampLen::Millisecond);
        let expected = json!({
            "json_config": {
                "extract": {
                    "type": "fun",
                    "method": "from_json",
                    "result": "json",
                    "label": "label3d0181",
                    "args": [],
                    "next": {
                        "type": "branch",
                        "name": "",
                        "label": null,
                        "next": [
                            {
                                "type": "assign",
                                "subtype": "assign_json",
                                "label": "label86a168",
                                "assign": [{"type": "text", "assign_to": "dimensions", "key": "dimensions"}],
                                "next": null
                            },
                            {
                                "type": "access",
                                "subtype": "access_obj",
                                "label": "labelb7a4b1",
                                "key": "metrics",
                                "result": "metrics",
                                "default_type": "null",
                                "default_value": "",
                                "next": {
                                    "type": "fun",
                                    "label": "label1dd4f4",
                                    "result": "item",
                                    "args": [],
                                    "method": "items",
                                    "next": {
                                        "type": "assign",
                                        "subtype": "assign_obj",
                                        "label": "labelec6235",
                                        "assign": [
                                            {"type": "double", "assign_to": "value", "key": "value"},
                                            {"type": "string", "assign_to": "metric", "key": "key"}
                                        ],
                                        "next": null
                                    }
                                }
                            },
                            {
                                "type": "assign",
                                "subtype": "assign_obj",
                                "label": "labelc08700",
                                "assign": [{"type": "long", "assign_to": "time", "key": "time"}],
                                "next": null
                            }
                        ]
                    }
                },
                "conf": {
                    "time_format": "Unix Time Stamp(milliseconds)",
                    "timezone": 8,
                    "time_field_name": "time",
                    "output_field_name": "timestamp",
                    "timestamp_len": 13,
                    "encoding": "UTF-8"
                }
            },
            "result_table_name": "vm_cpu",
            "result_table_name_alias": "vm_cpu",
            "processing_id": "2_vm_cpu",
            "description": "tsdb",
            "fields": [
                {"field_name": "time", "field_type": "long", "field_alias": "time", "is_dimension": false, "field_index": 1},
                {"field_name": "value", "field_type": "double", "field_alias": "value", "is_dimension": false, "field_index": 2},
                {"field_name": "metric", "field_type": "string", "field_alias": "metric", "is_dimension": false, "field_index": 3},
                {"field_name": "dimensions", "field_type": "text", "field_alias": "dimensions", "is_dimension": false, "field_index": 4}
            ]
        });
        assert_eq!(serde_json::to_value(&clean).unwrap(), expected);
    }

    #[test]
    fn clean_conf_follows_timestamp_precision() {
        let clean = build_clean_config("vm_cpu", "vm_cpu", 2, TimestampLen::Second);
        assert_eq!(clean.json_config.conf.timestamp_len, 10);
        assert_eq!(clean.json_config.conf.time_format, "Unix Time Stamp(seconds)");
    }

    #[test]
    fn data_hub_request_wires_clean_and_storage() {
        let spec = DataHubSpec {
            data_hub_name: "vm_cpu",
            bk_biz_id: 2,
            vm_cluster: "vm-default",
            expires: "30d",
            description: "vm access",
            timestamp_len: TimestampLen::Nanosecond,
        };
        let value = serde_json::to_value(data_hub_request(caller(), &spec)).unwrap();
        assert_eq!(value["bk_username"], "admin");
        assert_eq!(value["common"], json!({"bk_biz_id": 2, "data_scenario": "custom"}));
        assert_eq!(value["raw_data"]["data_source_tags"], json!(["server"]));
        assert_eq!(value["raw_data"]["data_scenario"], json!({}));
        assert_eq!(value["clean"][0]["json_config"]["conf"]["timestamp_len"], 19);
        assert_eq!(
            value["storage"],
            json!([{
                "result_table_name": "vm_cpu",
                "storage_type": "vm",
                "expires": "30d",
                "storage_cluster": "vm-default"
            }])
        );
    }

    #[test]
    fn data_storage_request_binds_physical_fields() {
        let value =
            serde_json::to_value(data_storage_request(caller(), 525, "vm_cpu", "vm-default", "30d"))
                .unwrap();
        assert_eq!(value["raw_data_id"], 525);
        assert_eq!(value["data_type"], "clean");
        assert_eq!(value["config"], json!({"schemaless": true}));
        assert_eq!(value["fields"][3]["physical_field"], "dimensions");
        assert_eq!(value["fields"].as_array().unwrap().len(), 4);
    }
}
