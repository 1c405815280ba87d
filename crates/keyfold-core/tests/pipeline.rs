use keyfold_core::{
    ErrorKind,
    batch::BatchBudget,
    engine::{EngineConfig, HostEngine, TableCapacity},
    function::AggregateFunction,
    output::OutputTarget,
    pipeline::{RunConfig, RunOutcome, run, run_store, unbounded_engine},
    sampling::SamplingRange,
    store::RecordStore,
};
use proptest::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn scratch_dir() -> TempDir {
    tempfile::tempdir().expect("scratch dir")
}

fn five_records() -> RecordStore {
    RecordStore::from_records([("a", "1"), ("b", "2"), ("a", "3"), ("c", "4"), ("b", "5")])
        .expect("fixture builds")
}

fn config(function: AggregateFunction, max_rows: usize) -> RunConfig {
    RunConfig {
        engine: unbounded_engine(2),
        budget: BatchBudget::new(max_rows, 1 << 20),
        copy_threads: 2,
        function,
        input: PathBuf::new(),
        output: OutputTarget::Discard,
        verify: false,
    }
}

fn pairs(outcome: &RunOutcome, function: AggregateFunction) -> Vec<(String, u64)> {
    outcome
        .results
        .results(function)
        .map(|row| {
            let (key, value) = row.expect("result");
            (String::from_utf8_lossy(key).into_owned(), value)
        })
        .collect()
}

fn expected_five() -> Vec<(String, u64)> {
    vec![
        ("a".to_string(), 2),
        ("b".to_string(), 2),
        ("c".to_string(), 1),
    ]
}

#[test]
fn five_records_count_end_to_end() {
    let dir = scratch_dir();
    let input = dir.path().join("five.kfrs");
    let output = dir.path().join("five.txt");
    five_records().write_to(&input).expect("write input");

    let mut config = config(AggregateFunction::Count, 16);
    config.input = input;
    config.output = OutputTarget::file(&output);
    config.verify = true;

    let outcome = run(&config).expect("run succeeds");
    let written = std::fs::read_to_string(&output).expect("read output");

    assert_eq!(pairs(&outcome, AggregateFunction::Count), expected_five());
    assert_eq!(written, "a 2\nb 2\nc 1\n");
    assert_eq!(outcome.report.rows_indexed, 5);
    assert_eq!(outcome.report.sampled_rows, 5);
    assert_eq!(outcome.report.result_keys, 3);
    assert_eq!(outcome.report.lines_written, 3);
    assert_eq!(outcome.report.verified, Some(true));
    assert!(!outcome.verification_failed());
}

#[test]
fn verification_passes_for_distinct_counts() {
    let mut config = config(AggregateFunction::UniqHll12, 16);
    config.verify = true;

    let outcome = run_store::<HostEngine>(&config, five_records()).expect("run succeeds");

    assert_eq!(
        pairs(&outcome, AggregateFunction::UniqHll12),
        expected_five()
    );
    assert_eq!(outcome.report.verified, Some(true));
}

#[test]
fn empty_input_yields_no_results() {
    let mut config = config(AggregateFunction::Count, 16);
    config.verify = true;
    let empty = RecordStore::from_records(Vec::<(&str, &str)>::new()).expect("empty store");

    let outcome = run_store::<HostEngine>(&config, empty).expect("run succeeds");

    assert!(outcome.results.is_empty());
    assert_eq!(outcome.report.sampling_ranges, 0);
    assert_eq!(outcome.report.submitted.batches, 0);
    assert_eq!(outcome.report.verified, Some(true));
}

#[test]
fn capacity_of_one_with_two_keys_fails() {
    let mut config = config(AggregateFunction::Count, 16);
    config.engine = EngineConfig::new(
        0,
        1,
        TableCapacity::with_hard_limits(1, 1 << 20),
        64,
        1 << 20,
    );
    let store = RecordStore::from_records([("a", "1"), ("b", "1")]).expect("store");

    let err = run_store::<HostEngine>(&config, store).expect_err("two keys exceed one");

    assert_eq!(err.kind, ErrorKind::CapacityExceeded);
}

#[test]
fn zero_budget_is_reported_before_reading_input() {
    let mut config = config(AggregateFunction::Count, 0);
    let dir = scratch_dir();
    config.input = dir.path().join("never-created.kfrs");

    let err = run(&config).expect_err("zero row budget");

    assert_eq!(err.kind, ErrorKind::Config);
}

#[test]
fn missing_input_is_an_io_error() {
    let mut config = config(AggregateFunction::Count, 16);
    let dir = scratch_dir();
    config.input = dir.path().join("absent.kfrs");

    let err = run(&config).expect_err("input is absent");

    assert_eq!(err.kind, ErrorKind::Io);
}

#[test]
fn truncated_input_is_malformed() {
    let dir = scratch_dir();
    let input = dir.path().join("truncated.kfrs");
    let mut bytes = five_records().encode();
    bytes.truncate(bytes.len() - 3);
    std::fs::write(&input, bytes).expect("write input");

    let mut config = config(AggregateFunction::Count, 16);
    config.input = input;
    let err = run(&config).expect_err("truncated store");

    assert_eq!(err.kind, ErrorKind::MalformedInput);
}

#[test]
fn header_ranges_select_rows() {
    let store = five_records().with_ranges(vec![SamplingRange::new(1, 3), SamplingRange::new(4, 4)]);

    let outcome =
        run_store::<HostEngine>(&config(AggregateFunction::Count, 16), store).expect("run");

    // rows 1..=4: b, a, c, b
    assert_eq!(
        pairs(&outcome, AggregateFunction::Count),
        vec![
            ("a".to_string(), 1),
            ("b".to_string(), 2),
            ("c".to_string(), 1),
        ]
    );
    assert_eq!(outcome.report.sampled_rows, 4);
}

#[test]
fn out_of_bounds_header_range_is_malformed() {
    let store = five_records().with_ranges(vec![SamplingRange::new(0, 5)]);

    let err = run_store::<HostEngine>(&config(AggregateFunction::Count, 16), store)
        .expect_err("row 5 does not exist");

    assert_eq!(err.kind, ErrorKind::MalformedInput);
}

#[test]
fn report_serializes_to_json() {
    let outcome = run_store::<HostEngine>(&config(AggregateFunction::Count, 16), five_records())
        .expect("run");

    let json = serde_json::to_value(&outcome.report).expect("serialize");

    assert_eq!(json["rows_indexed"], 5);
    assert_eq!(json["function"], "Count");
    assert_eq!(json["verified"], serde_json::Value::Null);
}

#[test]
fn batch_size_does_not_change_results() {
    let records = (0..2_000)
        .map(|i| (format!("key-{}", i % 97), format!("value-{}", i % 13)))
        .collect::<Vec<_>>();

    for function in [AggregateFunction::Count, AggregateFunction::UniqHll12] {
        let small = run_store::<HostEngine>(
            &config(function, 10),
            RecordStore::from_records(records.clone()).expect("store"),
        )
        .expect("small batches");
        let large = run_store::<HostEngine>(
            &config(function, 1000),
            RecordStore::from_records(records.clone()).expect("store"),
        )
        .expect("large batches");

        assert!(small.report.submitted.batches > large.report.submitted.batches);
        assert_eq!(pairs(&small, function), pairs(&large, function));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn count_matches_reference_for_any_budget(
        keys in prop::collection::vec(0u8..12, 0..200),
        max_rows in 1usize..64,
        lanes in 1usize..4,
    ) {
        let records = keys
            .iter()
            .map(|k| (format!("k{k}"), "v".to_string()))
            .collect::<Vec<_>>();
        let mut config = config(AggregateFunction::Count, max_rows);
        config.engine = unbounded_engine(lanes);
        config.verify = true;

        let outcome = run_store::<HostEngine>(
            &config,
            RecordStore::from_records(records).expect("store"),
        )
        .expect("run");

        prop_assert!(!outcome.verification_failed());
        let total: u64 = pairs(&outcome, AggregateFunction::Count).iter().map(|(_, n)| n).sum();
        prop_assert_eq!(total, keys.len() as u64);
    }
}
