//! Module: driver
//! Responsibility: engine lifecycle, batch staging, and the
//! start/submit/wait/result protocol.
//! Does not own: batch planning or capacity enforcement.
//! Boundary: pipeline code drives one `AggregationDriver` per run.


use crate::{
    batch::Batch,
    engine::{AggregationEngine, EngineConfig, EngineError, HostEngine, StagedBatch},
    error::{Error, ErrorKind, ErrorOrigin},
    function::AggregateFunction,
    obs::sink::{self, MetricsEvent},
    result::ResultMapping,
};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error as ThisError;
use tracing::{debug, info, warn};

///
/// DriverError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum DriverError {
    #[error("cannot {op} while driver is {state}")]
    InvalidState { op: &'static str, state: DriverState },

    #[error("{0}")]
    Engine(#[from] EngineError),
}

impl DriverError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Engine(err) => err.kind(),
        }
    }
}

impl From<DriverError> for Error {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::InvalidState { .. } => {
                Self::new(ErrorKind::InvalidState, ErrorOrigin::Driver, err.to_string())
            }
            DriverError::Engine(err) => err.into(),
        }
    }
}

///
/// DriverState
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum DriverState {
    #[display("created")]
    Created,
    #[display("started")]
    Started,
    #[display("submitting")]
    Submitting,
    #[display("waiting")]
    Waiting,
    #[display("completed")]
    Completed,
    #[display("failed")]
    Failed,
}

///
/// DriverStats
///
/// Volume counters for batches accepted by `submit`.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DriverStats {
    pub batches: u64,
    pub rows: u64,
    pub bytes: u64,
    pub oversized_batches: u64,
}

///
/// AggregationDriver
///
/// Exclusively owns one engine. Calls must follow
/// `start → submit* → wait → result`; anything else is rejected with
/// `DriverError::InvalidState`.
///

pub struct AggregationDriver<E: AggregationEngine = HostEngine> {
    config: EngineConfig,
    function: AggregateFunction,
    state: DriverState,
    engine: Option<E>,
    result: Option<ResultMapping>,
    stats: DriverStats,
}

impl<E: AggregationEngine> AggregationDriver<E> {
    #[must_use]
    pub const fn new(config: EngineConfig, function: AggregateFunction) -> Self {
        Self {
            config,
            function,
            state: DriverState::Created,
            engine: None,
            result: None,
            stats: DriverStats {
                batches: 0,
                rows: 0,
                bytes: 0,
                oversized_batches: 0,
            },
        }
    }

    #[must_use]
    pub const fn state(&self) -> DriverState {
        self.state
    }

    #[must_use]
    pub const fn stats(&self) -> &DriverStats {
        &self.stats
    }

    /// Open the engine.
    pub fn start(&mut self) -> Result<(), DriverError> {
        self.expect_state("start", &[DriverState::Created])?;

        match E::open(&self.config, self.function) {
            Ok(engine) => {
                self.engine = Some(engine);
                self.state = DriverState::Started;
                sink::record(MetricsEvent::EngineOpened {
                    function: self.function,
                });
                info!(
                    device = self.config.device(),
                    lanes = self.config.lanes(),
                    function = %self.function,
                    "engine started"
                );

                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Stage `batch` across `copy_threads` workers and hand it to the
    /// engine. Returns before the engine has processed it.
    pub fn submit(&mut self, batch: Batch<'_>, copy_threads: usize) -> Result<(), DriverError> {
        self.expect_state("submit", &[DriverState::Started, DriverState::Submitting])?;

        let rows = batch.row_count() as u64;
        let bytes = (batch.keys().len() + batch.values().len()) as u64;
        let oversized = batch.is_oversized();
        if oversized {
            warn!(
                rows,
                bytes,
                first_row = batch.rows().start,
                "batch exceeds byte budget"
            );
        }

        let started = Instant::now();
        let staged = StagedBatch::stage(batch, copy_threads);
        let stage_micros = elapsed_micros(started);

        let Some(engine) = self.engine.as_mut() else {
            return Err(self.invalid("submit"));
        };
        if let Err(err) = engine.enqueue(staged) {
            return Err(self.fail(err));
        }

        self.state = DriverState::Submitting;
        self.stats.batches += 1;
        self.stats.rows += rows;
        self.stats.bytes += bytes;
        self.stats.oversized_batches += u64::from(oversized);
        sink::record(MetricsEvent::BatchSubmitted {
            function: self.function,
            rows,
            bytes,
            oversized,
            stage_micros,
        });
        debug!(rows, bytes, stage_micros, "batch submitted");

        Ok(())
    }

    /// Block until every submitted batch is merged.
    pub fn wait(&mut self) -> Result<(), DriverError> {
        self.expect_state("wait", &[DriverState::Started, DriverState::Submitting])?;
        self.state = DriverState::Waiting;

        let Some(mut engine) = self.engine.take() else {
            return Err(self.invalid("wait"));
        };
        let started = Instant::now();
        let drained = engine.drain();
        let drain_micros = elapsed_micros(started);
        drop(engine);

        match drained {
            Ok(mapping) => {
                let result_keys = mapping.len() as u64;
                self.result = Some(mapping);
                self.state = DriverState::Completed;
                sink::record(MetricsEvent::EngineDrained {
                    function: self.function,
                    result_keys,
                    drain_micros,
                });
                info!(
                    batches = self.stats.batches,
                    rows = self.stats.rows,
                    result_keys,
                    drain_micros,
                    "engine drained"
                );

                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Borrow the result mapping.
    pub fn result(&self) -> Result<&ResultMapping, DriverError> {
        match (&self.result, self.state) {
            (Some(mapping), DriverState::Completed) => Ok(mapping),
            _ => Err(self.invalid("read result")),
        }
    }

    /// Take the result mapping, consuming the driver.
    pub fn into_result(mut self) -> Result<ResultMapping, DriverError> {
        match (self.result.take(), self.state) {
            (Some(mapping), DriverState::Completed) => Ok(mapping),
            _ => Err(self.invalid("read result")),
        }
    }

    fn expect_state(&self, op: &'static str, allowed: &[DriverState]) -> Result<(), DriverError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.invalid(op))
        }
    }

    const fn invalid(&self, op: &'static str) -> DriverError {
        DriverError::InvalidState {
            op,
            state: self.state,
        }
    }

    fn fail(&mut self, err: EngineError) -> DriverError {
        if err.kind() == ErrorKind::CapacityExceeded {
            sink::record(MetricsEvent::CapacityExceeded {
                function: self.function,
            });
        }
        warn!(error = %err, state = %self.state, "driver failed");

        self.state = DriverState::Failed;
        self.engine = None;

        DriverError::Engine(err)
    }
}

fn elapsed_micros(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX)
}
