use serde::{Deserialize, Serialize};
use std::{
    cell::RefCell,
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

///
/// EventState
/// Ephemeral, in-memory counters and timing totals for aggregation runs.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub perf: EventPerf,
    pub functions: BTreeMap<String, FunctionCounters>,
    pub window_start_ms: u64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            perf: EventPerf::default(),
            functions: BTreeMap::new(),
            window_start_ms: now_millis(),
        }
    }
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Driver lifecycle
    pub engines_opened: u64,
    pub engines_drained: u64,
    pub capacity_failures: u64,

    // Submission
    pub batches_submitted: u64,
    pub oversized_batches: u64,
    pub rows_submitted: u64,
    pub bytes_staged: u64,

    // Results
    pub result_keys: u64,

    // Verification
    pub reference_runs: u64,
    pub verifications_passed: u64,
    pub verifications_failed: u64,
}

///
/// FunctionCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FunctionCounters {
    pub runs: u64,
    pub rows_submitted: u64,
    pub result_keys: u64,
}

///
/// EventPerf
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventPerf {
    // Wall-clock totals in microseconds
    pub stage_micros_total: u128,
    pub drain_micros_total: u128,

    // Maximum observed single-call durations
    pub stage_micros_max: u64,
    pub drain_micros_max: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
        })
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters and restart the window.
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

/// Accumulate a duration and track the max.
pub(crate) fn add_micros(total: &mut u128, max: &mut u64, delta: u64) {
    *total = total.saturating_add(u128::from(delta));
    if delta > *max {
        *max = delta;
    }
}

///
/// EventReport
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventReport {
    /// Counters since `window_start_ms`.
    pub counters: EventState,
    /// Per-function counters and averages.
    pub function_counters: Vec<FunctionSummary>,
}

///
/// FunctionSummary
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FunctionSummary {
    pub function: String,
    pub runs: u64,
    pub rows_submitted: u64,
    pub result_keys: u64,
    pub avg_rows_per_run: f64,
    pub avg_keys_per_run: f64,
}

/// Snapshot the current window with per-function averages.
#[must_use]
#[expect(clippy::cast_precision_loss)]
pub(crate) fn report() -> EventReport {
    let snap = with_state(Clone::clone);

    let function_counters = snap
        .functions
        .iter()
        .map(|(function, counters)| {
            let per_run = |total: u64| {
                if counters.runs > 0 {
                    total as f64 / counters.runs as f64
                } else {
                    0.0
                }
            };

            FunctionSummary {
                function: function.clone(),
                runs: counters.runs,
                rows_submitted: counters.rows_submitted,
                result_keys: counters.result_keys,
                avg_rows_per_run: per_run(counters.rows_submitted),
                avg_keys_per_run: per_run(counters.result_keys),
            }
        })
        .collect();

    EventReport {
        counters: snap,
        function_counters,
    }
}

///
/// TESTS
///

#[cfg(test)]
#[expect(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn reset_all_clears_state() {
        with_state_mut(|m| {
            m.ops.batches_submitted = 3;
            m.perf.drain_micros_max = 9;
            m.functions
                .insert("COUNT".to_string(), FunctionCounters::default());
        });

        reset_all();

        with_state(|m| {
            assert_eq!(m.ops.batches_submitted, 0);
            assert_eq!(m.perf.drain_micros_max, 0);
            assert!(m.functions.is_empty());
        });
    }

    #[test]
    fn add_micros_tracks_total_and_max() {
        let (mut total, mut max) = (0u128, 0u64);
        add_micros(&mut total, &mut max, 5);
        add_micros(&mut total, &mut max, 2);

        assert_eq!(total, 7);
        assert_eq!(max, 5);
    }

    #[test]
    fn report_averages_per_function() {
        reset_all();
        with_state_mut(|m| {
            m.functions.insert(
                "COUNT".to_string(),
                FunctionCounters {
                    runs: 2,
                    rows_submitted: 10,
                    result_keys: 3,
                },
            );
            m.functions
                .insert("uniqHLL12".to_string(), FunctionCounters::default());
        });

        let report = report();
        let names: Vec<_> = report
            .function_counters
            .iter()
            .map(|summary| summary.function.as_str())
            .collect();

        assert_eq!(names, ["COUNT", "uniqHLL12"]);
        assert_eq!(report.function_counters[0].avg_rows_per_run, 5.0);
        assert_eq!(report.function_counters[0].avg_keys_per_run, 1.5);
        assert_eq!(report.function_counters[1].avg_rows_per_run, 0.0);
    }
}
