use clap::Parser;
use keyfold_core::{
    Error,
    batch::{BatchBudget, DEFAULT_SUBDIVISION_FACTOR},
    engine::{EngineConfig, TableCapacity},
    function::AggregateFunction,
    output::OutputTarget,
    pipeline::RunConfig,
};
use std::path::PathBuf;

///
/// Cli
/// Positional surface of one aggregation run.
///

#[derive(Debug, Parser)]
#[command(name = "keyfold", version, about = "Batch key/value aggregation runner")]
pub(crate) struct Cli {
    /// Engine device index
    pub(crate) device: u32,

    /// Concurrent engine lanes
    pub(crate) lanes: usize,

    /// Maximum rows per batch
    pub(crate) max_rows_per_batch: usize,

    /// Maximum bytes per batch (advisory)
    pub(crate) max_bytes_per_batch: usize,

    /// Maximum distinct keys in the engine hash table
    pub(crate) hash_table_capacity: u64,

    /// Maximum distinct-key bytes, terminators included
    pub(crate) key_buffer_capacity: u64,

    /// Worker threads used to stage each batch
    pub(crate) copy_threads: usize,

    /// Aggregate function: COUNT or uniqHLL12
    pub(crate) function: String,

    /// Record-store file
    pub(crate) input: PathBuf,

    /// Result file, or `none`
    pub(crate) output: String,

    /// Cross-check against the reference aggregation: 1 or 0
    pub(crate) verify: String,

    /// Batch rows per range are max-rows / factor, capped by range rows / factor
    #[arg(long, default_value_t = DEFAULT_SUBDIVISION_FACTOR)]
    pub(crate) subdivision_factor: usize,

    /// Write a JSON run report to this path
    #[arg(long)]
    pub(crate) report: Option<PathBuf>,
}

impl Cli {
    /// Resolve the function first so an unknown name fails before any
    /// input is touched.
    pub(crate) fn run_config(&self) -> Result<RunConfig, Error> {
        let function = AggregateFunction::from_name(&self.function)?;
        let verify = parse_flag(&self.verify)?;

        let capacity =
            TableCapacity::with_hard_limits(self.hash_table_capacity, self.key_buffer_capacity);
        let engine = EngineConfig::new(
            self.device,
            self.lanes,
            capacity,
            self.max_rows_per_batch,
            self.max_bytes_per_batch,
        );
        let budget = BatchBudget::new(self.max_rows_per_batch, self.max_bytes_per_batch)
            .with_subdivision_factor(self.subdivision_factor);

        let Ok(output) = self.output.parse::<OutputTarget>();

        Ok(RunConfig {
            engine,
            budget,
            copy_threads: self.copy_threads,
            function,
            input: self.input.clone(),
            output,
            verify,
        })
    }
}

fn parse_flag(raw: &str) -> Result<bool, Error> {
    match raw {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(Error::usage(format!(
            "verification flag must be 1 or 0, got '{other}'"
        ))),
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use keyfold_core::ErrorKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("keyfold").chain(args.iter().copied()))
    }

    const VALID: [&str; 11] = [
        "0", "2", "1000", "65536", "100", "4096", "2", "COUNT", "in.kfrs", "none", "1",
    ];

    #[test]
    fn eleven_positionals_build_a_run_config() {
        let cli = parse(&VALID).expect("valid arguments");
        let config = cli.run_config().expect("valid config");

        assert_eq!(config.function, AggregateFunction::Count);
        assert_eq!(config.engine.lanes(), 2);
        assert_eq!(config.engine.capacity().max_keys(), 100);
        assert_eq!(config.engine.capacity().max_key_bytes(), 4096);
        assert_eq!(config.budget.max_rows_per_batch(), 1000);
        assert_eq!(config.budget.subdivision_factor(), DEFAULT_SUBDIVISION_FACTOR);
        assert_eq!(config.output, OutputTarget::Discard);
        assert!(config.verify);
    }

    #[test]
    fn wrong_arity_is_a_clap_error() {
        assert!(parse(&VALID[..10]).is_err());

        let mut extra = VALID.to_vec();
        extra.push("surplus");
        assert!(parse(&extra).is_err());
    }

    #[test]
    fn unknown_function_is_a_config_error() {
        let mut args = VALID;
        args[7] = "FOO";
        let err = parse(&args)
            .expect("arity is fine")
            .run_config()
            .expect_err("FOO is unknown");

        assert_eq!(err.kind, ErrorKind::Config);
    }

    #[test]
    fn verify_flag_accepts_only_one_or_zero() {
        assert_eq!(parse_flag("0").ok(), Some(false));
        assert_eq!(parse_flag("1").ok(), Some(true));
        assert_eq!(
            parse_flag("yes").expect_err("not a flag").kind,
            ErrorKind::Usage
        );
    }

    #[test]
    fn subdivision_factor_flag_overrides_default() {
        let mut args = VALID.to_vec();
        args.extend(["--subdivision-factor", "2"]);
        let config = parse(&args)
            .expect("valid arguments")
            .run_config()
            .expect("valid config");

        assert_eq!(config.budget.subdivision_factor(), 2);
    }
}
