//! Keyfold CLI (`keyfold`)
//!
//! Runs one batch aggregation over a record-store file:
//!
//! ```text
//! keyfold <device> <lanes> <max-rows> <max-bytes> <table-capacity> \
//!         <key-buffer-capacity> <copy-threads> <COUNT|uniqHLL12> \
//!         <input> <output|none> <verify 1|0>
//! ```
//!
//! Exit codes: 0 success, 1 runtime error, 2 usage error, 3 verification
//! mismatch. Logs go to stderr and honor `RUST_LOG` (default `info`).

mod args;

use args::Cli;
use clap::Parser;
use keyfold_core::{
    Error, ErrorKind, ErrorOrigin,
    obs::{EventReport, metrics_report},
    pipeline::{self, RunOutcome, RunReport},
};
use serde::Serialize;
use std::{fs::File, io::BufWriter, path::Path, process::ExitCode};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EXIT_RUNTIME_ERROR: u8 = 1;
const EXIT_USAGE_ERROR: u8 = 2;
const EXIT_VERIFICATION_MISMATCH: u8 = 3;

///
/// CliReport
/// JSON document written by `--report`.
///

#[derive(Serialize)]
struct CliReport<'a> {
    run: &'a RunReport,
    metrics: EventReport,
}

fn main() -> ExitCode {
    // clap prints usage and exits with status 2 on malformed arguments
    let cli = Cli::parse();
    init_tracing();

    match execute(&cli) {
        Ok(outcome) => {
            if let Some(comparison) = outcome.comparison.as_ref().filter(|c| !c.is_equal()) {
                error!(mismatch = %comparison, "engine results differ from reference");
                eprintln!("keyfold: verification failed: {comparison}");
            }

            ExitCode::from(outcome_code(&outcome))
        }
        Err(err) => {
            error!(kind = %err.kind, origin = %err.origin, "{}", err.message);
            eprintln!("keyfold: {}", err.display_with_kind());

            ExitCode::from(error_code(err.kind))
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn execute(cli: &Cli) -> Result<RunOutcome, Error> {
    let config = cli.run_config()?;
    info!(
        function = %config.function,
        input = %config.input.display(),
        output = %config.output,
        verify = config.verify,
        "run configured"
    );

    let outcome = pipeline::run(&config)?;
    info!(
        rows = outcome.report.rows_indexed,
        batches = outcome.report.submitted.batches,
        result_keys = outcome.report.result_keys,
        "run finished"
    );

    if let Some(path) = cli.report.as_deref() {
        write_report(path, &outcome.report)?;
    }

    Ok(outcome)
}

fn write_report(path: &Path, run: &RunReport) -> Result<(), Error> {
    let report = CliReport {
        run,
        metrics: metrics_report(),
    };
    let file = File::create(path).map_err(|err| Error::io(ErrorOrigin::Cli, &err))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &report).map_err(|err| {
        Error::new(
            ErrorKind::Io,
            ErrorOrigin::Cli,
            format!("cannot write report to {}: {err}", path.display()),
        )
    })?;
    info!(report = %path.display(), "report written");

    Ok(())
}

const fn error_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Usage => EXIT_USAGE_ERROR,
        _ => EXIT_RUNTIME_ERROR,
    }
}

fn outcome_code(outcome: &RunOutcome) -> u8 {
    if outcome.verification_failed() {
        EXIT_VERIFICATION_MISMATCH
    } else {
        0
    }
}

///
/// TESTS
///
