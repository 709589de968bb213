//! tsmeta-metrics: reconciliation of custom report metrics.
//!
//! A report group periodically publishes the metrics it has seen, each
//! with its dimension names. The reconciler diffs that observation
//! against the group's `TimeSeriesMetric` rows and brings the catalog in
//! line with it.
//!
//! # Architecture
//!
//! ```text
//! MetricReconciler::bulk_refresh_ts_metrics()
//!   ├── filter_valid()          ← drop malformed metric names
//!   ├── bulk_create_metrics()   ← observed, not yet recorded
//!   ├── bulk_update_metrics()   ← observed and recorded: time, tags, whitelist deletes
//!   └── mark unobserved rows inactive
//! ```
//!
//! Running a refresh twice with the same observation writes nothing the
//! second time.

pub mod error;
pub mod observed;
pub mod reconciler;

pub use error::{MetricsError, MetricsResult};
pub use observed::{EffectiveTime, ObservedMetric, TARGET_TAG};
pub use reconciler::{MetricReconciler, RefreshReport, UpdateOutcome};
