//! Observability: per-thread run counters and the sink they flow through.
//!
//! Aggregation code never touches `metrics` state directly; it emits
//! `MetricsEvent`s through `sink::record`.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EventOps, EventPerf, EventReport, EventState, FunctionCounters, FunctionSummary};
pub use sink::{MetricsEvent, MetricsSink, metrics_report, metrics_reset_all};
