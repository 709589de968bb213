//! Deterministic names derived from result table ids.
//!
//! Retries rely on these being pure: the same table id always maps to
//! the same platform names, so a second attempt finds what the first
//! one created instead of creating it again.

use tsmeta_core::DEFAULT_TABLE_SUFFIX;

/// Characters of the table id kept in a data hub name.
pub const DATA_HUB_NAME_MAX: usize = 40;
/// Upper bound of a raw data name, prefix included.
pub const RAW_DATA_NAME_MAX: usize = 50;
/// Upper bound of a kafka consumer group name, prefix included.
pub const CONSUMER_GROUP_MAX: usize = 32;

const VM_PREFIX: &str = "vm_";

/// Data hub name and kafka topic for `table_id`.
///
/// `a-b.c--d.__default__` becomes `vm_a_b_c_d` with topic
/// `vm_a_b_c_d{default_biz_id}`.
pub fn data_hub_name_and_topic(table_id: &str, default_biz_id: i64) -> (String, String) {
    let table_id = table_id
        .strip_suffix(DEFAULT_TABLE_SUFFIX)
        .unwrap_or(table_id);
    let name = collapse(&table_id.replace('-', "_"));
    let name = collapse(&name.replace('.', "_"));
    let name = collapse(&format!(
        "{VM_PREFIX}{}",
        keep_suffix(&name, DATA_HUB_NAME_MAX)
    ));
    let topic = format!("{name}{default_biz_id}");
    (name, topic)
}

/// Consumer group the platform uses to read a table's topic.
pub fn consumer_group_name(prefix: &str, table_id: &str) -> String {
    let name = format!("{prefix}_{}", table_id.replace('.', "_"));
    keep_suffix(&name, CONSUMER_GROUP_MAX)
        .to_lowercase()
        .trim_start_matches('_')
        .to_string()
}

/// Raw data name registered through a deploy plan.
pub fn raw_data_name(prefix: &str, table_id: &str) -> String {
    let rt = table_id.replace('.', "__");
    let budget = RAW_DATA_NAME_MAX.saturating_sub(prefix.chars().count() + 1);
    format!("{prefix}_{}", keep_suffix(&rt, budget))
}

/// Result table id the platform assigns to a clean named `name`.
pub fn clean_result_table_id(biz_id: i64, name: &str) -> String {
    format!("{biz_id}_{name}")
}

/// The last `max_chars` characters of `s`.
pub fn keep_suffix(s: &str, max_chars: usize) -> &str {
    let count = s.chars().count();
    if count <= max_chars {
        return s;
    }
    match s.char_indices().nth(count - max_chars) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}

fn collapse(s: &str) -> String {
    s.replace("__", "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_hub_name_strips_default_suffix_and_separators() {
        for _ in 0..3 {
            assert_eq!(
                data_hub_name_and_topic("a-b.c--d.__default__", 2),
                ("vm_a_b_c_d".to_string(), "vm_a_b_c_d2".to_string())
            );
        }
    }

    #[test]
    fn data_hub_name_keeps_table_suffix_within_bound() {
        let table_id = "1001_bkmonitor_time_series_1572999.container_network_receive_bytes_total";
        let (name, topic) = data_hub_name_and_topic(table_id, 100147);
        assert!(name.len() <= DATA_HUB_NAME_MAX + VM_PREFIX.len());
        assert!(name.starts_with("vm_"));
        assert!(name.ends_with("receive_bytes_total"));
        assert_eq!(topic, format!("{name}100147"));
    }

    #[test]
    fn prefixing_cannot_reintroduce_double_underscore() {
        let (name, _) = data_hub_name_and_topic("_leading.metric", 2);
        assert_eq!(name, "vm_leading_metric");
    }

    #[test]
    fn consumer_group_is_bounded_lowercase_and_trimmed() {
        assert_eq!(consumer_group_name("bkm", "2_Sys.CPU"), "bkm_2_sys_cpu");
        assert_eq!(
            consumer_group_name("bkm", "2_bkmonitor_time_series_1572864.__default__"),
            "time_series_1572864___default__"
        );
    }

    #[test]
    fn raw_data_name_never_exceeds_bound() {
        assert_eq!(raw_data_name("bkm", "2_bkmonitor.cpu"), "bkm_2_bkmonitor__cpu");
        let long = "2_bkmonitor_time_series_1572864.a_really_long_metric_group_name.__default__";
        let name = raw_data_name("bkm", long);
        assert_eq!(name.chars().count(), RAW_DATA_NAME_MAX);
        assert!(name.starts_with("bkm_"));
        assert!(name.ends_with("____default__"));
    }

    #[test]
    fn keep_suffix_counts_characters() {
        assert_eq!(keep_suffix("abcdef", 3), "def");
        assert_eq!(keep_suffix("abc", 10), "abc");
        assert_eq!(keep_suffix("日志abc", 4), "志abc");
    }

    #[test]
    fn clean_result_table_id_prefixes_biz() {
        assert_eq!(clean_result_table_id(2, "vm_cpu"), "2_vm_cpu");
    }
}
