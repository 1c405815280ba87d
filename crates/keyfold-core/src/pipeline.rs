//! Module: pipeline
//! Responsibility: one end-to-end run: load, index, plan, submit, wait,
//! verify, write.
//! Does not own: argument parsing or exit-code policy (see the CLI crate).
//! Boundary: returns a `RunOutcome`; verification mismatches are reported in
//! the outcome, not as errors.

use crate::{
    batch::{BatchBudget, BatchPlanner},
    compare::{Comparison, compare},
    driver::{AggregationDriver, DriverStats},
    engine::{AggregationEngine, EngineConfig, HostEngine},
    error::Error,
    function::AggregateFunction,
    index::RecordSet,
    output::{OutputTarget, write_results_to},
    reference::ReferenceAggregator,
    result::ResultMapping,
    sampling::SamplingPlan,
    store::RecordStore,
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Instant};
use tracing::{debug, info};

///
/// RunConfig
///
/// Everything one run needs, fixed before any input is read.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RunConfig {
    pub engine: EngineConfig,
    pub budget: BatchBudget,
    pub copy_threads: usize,
    pub function: AggregateFunction,
    pub input: PathBuf,
    pub output: OutputTarget,
    pub verify: bool,
}

///
/// StageTimings
/// Wall-clock microseconds per pipeline stage.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct StageTimings {
    pub load_micros: u64,
    pub index_micros: u64,
    pub submit_micros: u64,
    pub wait_micros: u64,
    pub verify_micros: u64,
    pub write_micros: u64,
}

///
/// RunReport
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RunReport {
    pub function: AggregateFunction,
    pub rows_indexed: u64,
    pub sampling_ranges: u64,
    pub sampled_rows: u64,
    pub submitted: DriverStats,
    pub result_keys: u64,
    pub lines_written: u64,
    pub verified: Option<bool>,
    pub timings: StageTimings,
}

///
/// RunOutcome
///

#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub results: ResultMapping,
    pub comparison: Option<Comparison>,
}

impl RunOutcome {
    /// True only when verification ran and found a difference.
    #[must_use]
    pub fn verification_failed(&self) -> bool {
        self.comparison
            .as_ref()
            .is_some_and(|comparison| !comparison.is_equal())
    }
}

/// Run on the in-process host engine.
pub fn run(config: &RunConfig) -> Result<RunOutcome, Error> {
    run_with_engine::<HostEngine>(config)
}

/// Read `config.input` and run on engine `E`.
pub fn run_with_engine<E: AggregationEngine>(config: &RunConfig) -> Result<RunOutcome, Error> {
    // configuration errors win over input errors
    config.budget.validate()?;

    let started = Instant::now();
    let store = RecordStore::read_from(&config.input)?;
    let load_micros = elapsed_micros(started);
    info!(
        input = %config.input.display(),
        key_bytes = store.keys().len(),
        value_bytes = store.values().len(),
        ranges = store.ranges().len(),
        "record store loaded"
    );

    let mut outcome = run_store::<E>(config, store)?;
    outcome.report.timings.load_micros = load_micros;

    Ok(outcome)
}

/// Run an already-loaded store on engine `E`; `config.input` is ignored.
pub fn run_store<E: AggregationEngine>(
    config: &RunConfig,
    store: RecordStore,
) -> Result<RunOutcome, Error> {
    let planner = BatchPlanner::new(config.budget)?;
    let mut timings = StageTimings::default();

    // index
    let started = Instant::now();
    let (keys, values, ranges) = store.into_parts();
    let records = RecordSet::index(keys, values)?;
    let plan = SamplingPlan::resolve(Some(ranges.as_slice()), records.len())?;
    timings.index_micros = elapsed_micros(started);
    info!(
        rows = records.len(),
        ranges = plan.ranges().len(),
        sampled_rows = plan.total_row_count(),
        "records indexed"
    );

    // submit + wait
    let (results, submitted) = aggregate::<E>(config, planner, &records, &plan, &mut timings)?;

    // verify
    let comparison = if config.verify {
        let started = Instant::now();
        let expected = ReferenceAggregator::new(config.function).aggregate(&records, &plan)?;
        let comparison = compare(&expected, &results, config.function)?;
        timings.verify_micros = elapsed_micros(started);
        info!(equal = comparison.is_equal(), "verification finished");

        Some(comparison)
    } else {
        None
    };

    // write
    let started = Instant::now();
    let lines_written = write_results_to(&config.output, &results, config.function)?;
    timings.write_micros = elapsed_micros(started);
    if !config.output.is_discard() {
        info!(output = %config.output, lines = lines_written, "results written");
    }

    let report = RunReport {
        function: config.function,
        rows_indexed: records.len() as u64,
        sampling_ranges: plan.ranges().len() as u64,
        sampled_rows: plan.total_row_count() as u64,
        submitted,
        result_keys: results.len() as u64,
        lines_written: lines_written as u64,
        verified: comparison.as_ref().map(Comparison::is_equal),
        timings,
    };

    Ok(RunOutcome {
        report,
        results,
        comparison,
    })
}

fn aggregate<E: AggregationEngine>(
    config: &RunConfig,
    planner: BatchPlanner,
    records: &RecordSet,
    plan: &SamplingPlan,
    timings: &mut StageTimings,
) -> Result<(ResultMapping, DriverStats), Error> {
    let mut driver = AggregationDriver::<E>::new(config.engine, config.function);
    driver.start()?;

    let started = Instant::now();
    for batch in planner.plan(records, plan) {
        driver.submit(batch, config.copy_threads)?;
    }
    timings.submit_micros = elapsed_micros(started);
    let submitted = *driver.stats();
    debug!(batches = submitted.batches, rows = submitted.rows, "batches submitted");

    let started = Instant::now();
    driver.wait()?;
    timings.wait_micros = elapsed_micros(started);

    Ok((driver.into_result()?, submitted))
}

fn elapsed_micros(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX)
}

/// Engine configuration with unbounded capacity, for callers that only
/// need correct results.
#[must_use]
pub const fn unbounded_engine(lanes: usize) -> EngineConfig {
    EngineConfig::new(
        0,
        lanes,
        crate::engine::TableCapacity::unbounded(),
        usize::MAX,
        usize::MAX,
    )
}
