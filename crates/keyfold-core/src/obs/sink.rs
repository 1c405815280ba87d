//! Metrics sink boundary.
//!
//! Driver and pipeline code MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
use crate::{function::AggregateFunction, obs::metrics};

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent {
    EngineOpened {
        function: AggregateFunction,
    },
    BatchSubmitted {
        function: AggregateFunction,
        rows: u64,
        bytes: u64,
        oversized: bool,
        stage_micros: u64,
    },
    EngineDrained {
        function: AggregateFunction,
        result_keys: u64,
        drain_micros: u64,
    },
    CapacityExceeded {
        function: AggregateFunction,
    },
    ReferenceAggregated {
        function: AggregateFunction,
        result_keys: u64,
    },
    Verification {
        equal: bool,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default sink writing into the thread's metrics state.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::EngineOpened { function } => {
                metrics::with_state_mut(|m| {
                    m.ops.engines_opened = m.ops.engines_opened.saturating_add(1);
                    let entry = m.functions.entry(function.to_string()).or_default();
                    entry.runs = entry.runs.saturating_add(1);
                });
            }

            MetricsEvent::BatchSubmitted {
                function,
                rows,
                bytes,
                oversized,
                stage_micros,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.batches_submitted = m.ops.batches_submitted.saturating_add(1);
                    m.ops.rows_submitted = m.ops.rows_submitted.saturating_add(rows);
                    m.ops.bytes_staged = m.ops.bytes_staged.saturating_add(bytes);
                    if oversized {
                        m.ops.oversized_batches = m.ops.oversized_batches.saturating_add(1);
                    }
                    metrics::add_micros(
                        &mut m.perf.stage_micros_total,
                        &mut m.perf.stage_micros_max,
                        stage_micros,
                    );

                    let entry = m.functions.entry(function.to_string()).or_default();
                    entry.rows_submitted = entry.rows_submitted.saturating_add(rows);
                });
            }

            MetricsEvent::EngineDrained {
                function,
                result_keys,
                drain_micros,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.engines_drained = m.ops.engines_drained.saturating_add(1);
                    m.ops.result_keys = m.ops.result_keys.saturating_add(result_keys);
                    metrics::add_micros(
                        &mut m.perf.drain_micros_total,
                        &mut m.perf.drain_micros_max,
                        drain_micros,
                    );

                    let entry = m.functions.entry(function.to_string()).or_default();
                    entry.result_keys = entry.result_keys.saturating_add(result_keys);
                });
            }

            MetricsEvent::CapacityExceeded { function } => {
                metrics::with_state_mut(|m| {
                    m.ops.capacity_failures = m.ops.capacity_failures.saturating_add(1);
                    m.functions.entry(function.to_string()).or_default();
                });
            }

            MetricsEvent::ReferenceAggregated { .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.reference_runs = m.ops.reference_runs.saturating_add(1);
                });
            }

            MetricsEvent::Verification { equal } => {
                metrics::with_state_mut(|m| {
                    if equal {
                        m.ops.verifications_passed = m.ops.verifications_passed.saturating_add(1);
                    } else {
                        m.ops.verifications_failed = m.ops.verifications_failed.saturating_add(1);
                    }
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    GLOBAL_METRICS_SINK.record(event);
}

/// Snapshot this thread's metrics.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset all metrics state (counters + perf).
pub fn metrics_reset_all() {
    metrics::reset_all();
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_sink_accumulates_submission_counters() {
        metrics_reset_all();

        for oversized in [false, true] {
            record(MetricsEvent::BatchSubmitted {
                function: AggregateFunction::Count,
                rows: 4,
                bytes: 16,
                oversized,
                stage_micros: 3,
            });
        }
        record(MetricsEvent::Verification { equal: false });

        let counters = metrics_report().counters;
        assert_eq!(counters.ops.batches_submitted, 2);
        assert_eq!(counters.ops.rows_submitted, 8);
        assert_eq!(counters.ops.bytes_staged, 32);
        assert_eq!(counters.ops.oversized_batches, 1);
        assert_eq!(counters.ops.verifications_failed, 1);
        assert_eq!(counters.perf.stage_micros_total, 6);
        assert_eq!(counters.functions["COUNT"].rows_submitted, 8);
    }

    #[test]
    fn reset_clears_counters_between_reports() {
        metrics_reset_all();
        record(MetricsEvent::EngineOpened {
            function: AggregateFunction::UniqHll12,
        });
        assert_eq!(metrics_report().counters.ops.engines_opened, 1);

        metrics_reset_all();
        let report = metrics_report();
        assert_eq!(report.counters.ops.engines_opened, 0);
        assert!(report.function_counters.is_empty());
    }
}
