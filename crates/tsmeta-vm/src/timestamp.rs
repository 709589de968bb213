//! Timestamp precision of records feeding a clean.

use std::collections::HashSet;

use tsmeta_catalog::{Catalog, CatalogResult};
use tsmeta_core::VmConfig;

/// Precision of the `time` field in raw records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimestampLen {
    Second,
    Millisecond,
    Nanosecond,
}

impl TimestampLen {
    /// Number of digits of a current unix timestamp at this precision.
    pub fn digits(&self) -> u32 {
        match self {
            TimestampLen::Second => 10,
            TimestampLen::Millisecond => 13,
            TimestampLen::Nanosecond => 19,
        }
    }

    pub fn time_format(&self) -> &'static str {
        match self {
            TimestampLen::Second => "Unix Time Stamp(seconds)",
            TimestampLen::Millisecond => "Unix Time Stamp(milliseconds)",
            TimestampLen::Nanosecond => "Unix Time Stamp(nanoseconds)",
        }
    }
}

/// Decides the timestamp precision of a data source.
#[derive(Debug, Clone)]
pub struct TimestampPolicy {
    ns_data_ids: HashSet<u32>,
    second_etl_configs: Vec<String>,
}

impl TimestampPolicy {
    pub fn new(config: &VmConfig) -> Self {
        Self {
            ns_data_ids: config.ns_timestamp_data_ids.iter().copied().collect(),
            second_etl_configs: config.second_etl_configs.clone(),
        }
    }

    /// Resolve the precision for `data_id`.
    ///
    /// An empty `etl_hint` is replaced by the data source's own ETL
    /// config. A missing data source falls through to milliseconds.
    pub fn resolve(&self, catalog: &Catalog, data_id: u32, etl_hint: &str) -> CatalogResult<TimestampLen> {
        if data_id != 0 && self.ns_data_ids.contains(&data_id) {
            return Ok(TimestampLen::Nanosecond);
        }
        let mut hint = etl_hint.to_string();
        if hint.is_empty() && data_id != 0 {
            if let Some(source) = catalog.get_data_source(data_id)? {
                hint = source.etl_config;
            }
        }
        if !hint.is_empty() && self.second_etl_configs.iter().any(|c| *c == hint) {
            return Ok(TimestampLen::Second);
        }
        Ok(TimestampLen::Millisecond)
    }
}
