//! Clean and storage configuration records.
//!
//! A clean turns raw JSON records into a structured result table. Its
//! `json_config.extract` is a tree of ETL nodes evaluated top-down by
//! the platform; `None` children serialize as `null`.

use serde::{Deserialize, Serialize};

/// One node of the extract tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EtlNode {
    Fun {
        method: String,
        label: String,
        result: String,
        args: Vec<String>,
        next: Option<Box<EtlNode>>,
    },
    Branch {
        name: String,
        label: Option<String>,
        next: Vec<EtlNode>,
    },
    Assign {
        subtype: String,
        label: String,
        assign: Vec<AssignRule>,
        next: Option<Box<EtlNode>>,
    },
    Access {
        subtype: String,
        label: String,
        key: String,
        result: String,
        default_type: String,
        default_value: String,
        next: Option<Box<EtlNode>>,
    },
}

/// Copies `key` from the current object into the output field `assign_to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignRule {
    #[serde(rename = "type")]
    pub field_type: String,
    pub assign_to: String,
    pub key: String,
}

impl AssignRule {
    pub fn new(field_type: &str, assign_to: &str, key: &str) -> Self {
        Self {
            field_type: field_type.to_string(),
            assign_to: assign_to.to_string(),
            key: key.to_string(),
        }
    }
}

/// Time handling applied after extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtlConf {
    pub time_format: String,
    pub timezone: i32,
    pub time_field_name: String,
    pub output_field_name: String,
    pub timestamp_len: u32,
    pub encoding: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonConfig {
    pub extract: EtlNode,
    pub conf: EtlConf,
}

/// An output column of a clean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanField {
    pub field_name: String,
    pub field_type: String,
    pub field_alias: String,
    pub is_dimension: bool,
    pub field_index: u32,
}

impl CleanField {
    pub fn new(field_name: &str, field_type: &str, field_index: u32) -> Self {
        Self {
            field_name: field_name.to_string(),
            field_type: field_type.to_string(),
            field_alias: field_name.to_string(),
            is_dimension: false,
            field_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanConfig {
    pub json_config: JsonConfig,
    pub result_table_name: String,
    pub result_table_name_alias: String,
    pub processing_id: String,
    pub description: String,
    pub fields: Vec<CleanField>,
}

/// A storage column, bound to the physical column it is written to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageField {
    #[serde(flatten)]
    pub field: CleanField,
    pub physical_field: String,
}

impl From<CleanField> for StorageField {
    fn from(field: CleanField) -> Self {
        let physical_field = field.field_name.clone();
        Self {
            field,
            physical_field,
        }
    }
}

/// Storage target of a clean inside a data hub request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub result_table_name: String,
    pub storage_type: String,
    pub expires: String,
    pub storage_cluster: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn etl_nodes_serialize_with_type_tag_and_null_children() {
        let node = EtlNode::Assign {
            subtype: "assign_obj".to_string(),
            label: "labelc08700".to_string(),
            assign: vec![AssignRule::new("long", "time", "time")],
            next: None,
        };
        assert_eq!(
            serde_json::to_value(&node).unwrap(),
            json!({
                "type": "assign",
                "subtype": "assign_obj",
                "label": "labelc08700",
                "assign": [{"type": "long", "assign_to": "time", "key": "time"}],
                "next": null
            })
        );
    }

    #[test]
    fn branch_label_is_null() {
        let node = EtlNode::Branch {
            name: String::new(),
            label: None,
            next: vec![],
        };
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["type"], "branch");
        assert!(value["label"].is_null());
    }

    #[test]
    fn storage_field_flattens_clean_field() {
        let field: StorageField = CleanField::new("value", "double", 2).into();
        assert_eq!(
            serde_json::to_value(&field).unwrap(),
            json!({
                "field_name": "value",
                "field_type": "double",
                "field_alias": "value",
                "is_dimension": false,
                "field_index": 2,
                "physical_field": "value"
            })
        );
    }
}
