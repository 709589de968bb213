//! Metrics as reported by a custom report group.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::MetricsResult;

/// Dimension every metric carries regardless of what was reported.
pub const TARGET_TAG: &str = "target";

fn default_true() -> bool {
    true
}

/// One observed metric.
///
/// ```json
/// {"field_name": "cpu_usage", "tag_value_list": {"module": {..}},
///  "last_modify_time": 1700000000, "is_active": true}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedMetric {
    pub field_name: String,
    /// Dimension name to recent values. Only the keys are used.
    #[serde(default)]
    pub tag_value_list: Option<Map<String, Value>>,
    /// Unix seconds of the last report.
    #[serde(default)]
    pub last_modify_time: Option<f64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl ObservedMetric {
    pub fn new(field_name: &str, tags: &[&str]) -> Self {
        Self {
            field_name: field_name.to_string(),
            tag_value_list: Some(
                tags.iter()
                    .map(|t| (t.to_string(), Value::Object(Map::new())))
                    .collect(),
            ),
            last_modify_time: None,
            is_active: true,
        }
    }

    /// Sorted, de-duplicated dimension names including [`TARGET_TAG`].
    ///
    /// `None` when the observation carries no `tag_value_list`.
    pub fn tags(&self) -> Option<Vec<String>> {
        let values = self.tag_value_list.as_ref()?;
        let mut tags: BTreeSet<String> = values.keys().cloned().collect();
        tags.insert(TARGET_TAG.to_string());
        Some(tags.into_iter().collect())
    }

    /// When the metric was last seen, falling back to `now`.
    pub fn reported_at(&self, now: u64) -> u64 {
        match self.last_modify_time {
            Some(t) if t.is_finite() && t >= 0.0 => t as u64,
            _ => now,
        }
    }

    /// The time to store for this metric.
    ///
    /// Inactive metrics of auto-discovering groups expire immediately.
    pub fn effective_time(&self, now: u64, auto_discovery: bool) -> EffectiveTime {
        if !self.is_active && auto_discovery {
            EffectiveTime::ExpireNow
        } else {
            EffectiveTime::At(self.reported_at(now))
        }
    }
}

/// Last-modified time derived from an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveTime {
    At(u64),
    /// Stored as `last_modify_time = 0`.
    ExpireNow,
}

impl EffectiveTime {
    pub fn as_secs(&self) -> u64 {
        match self {
            EffectiveTime::At(secs) => *secs,
            EffectiveTime::ExpireNow => 0,
        }
    }
}

/// Parse a JSON array of observations.
pub fn parse_observations(json: &str) -> MetricsResult<Vec<ObservedMetric>> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_keys_plus_target() {
        let metric = ObservedMetric::new("cpu", &["module", "location", "module"]);
        assert_eq!(metric.tags().unwrap(), vec!["location", "module", "target"]);

        let reported_target = ObservedMetric::new("cpu", &["target"]);
        assert_eq!(reported_target.tags().unwrap(), vec!["target"]);
    }

    #[test]
    fn missing_tag_value_list_has_no_tags() {
        let metric: ObservedMetric = serde_json::from_str(r#"{"field_name":"cpu"}"#).unwrap();
        assert!(metric.is_active);
        assert_eq!(metric.tags(), None);
    }

    #[test]
    fn effective_time_defaults_and_sentinel() {
        let mut metric = ObservedMetric::new("cpu", &[]);
        assert_eq!(metric.effective_time(500, false), EffectiveTime::At(500));

        metric.last_modify_time = Some(1234.9);
        assert_eq!(metric.effective_time(500, true), EffectiveTime::At(1234));

        metric.is_active = false;
        assert_eq!(metric.effective_time(500, true), EffectiveTime::ExpireNow);
        assert_eq!(EffectiveTime::ExpireNow.as_secs(), 0);
        assert_eq!(metric.effective_time(500, false), EffectiveTime::At(1234));

        metric.last_modify_time = Some(-3.0);
        assert_eq!(metric.reported_at(500), 500);
    }

    #[test]
    fn parses_report_payload() {
        let json = r#"[
            {"field_name": "cpu_usage", "tag_value_list": {"module": {"last_update_time": 1}},
             "last_modify_time": 1700000000},
            {"field_name": "mem_usage", "tag_value_list": {}, "is_active": false}
        ]"#;
        let metrics = parse_observations(json).unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].tags().unwrap(), vec!["module", "target"]);
        assert_eq!(metrics[0].last_modify_time, Some(1700000000.0));
        assert!(!metrics[1].is_active);
        assert!(parse_observations("{}").is_err());
    }
}
