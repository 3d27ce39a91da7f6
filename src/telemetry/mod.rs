//! Pool metrics.
//!
//! Counters are always collected. The task run-time histogram needs the
//! `telemetry` feature.

pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
