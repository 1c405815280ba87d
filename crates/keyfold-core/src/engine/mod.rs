//! Module: engine
//! Responsibility: the narrow aggregation-engine contract, engine
//! configuration, staged batches, and the in-process `HostEngine`.
//! Does not own: submission sequencing or lifecycle state (see `driver`).
//! Boundary: the driver is the only caller; one engine per driver.

mod host;
mod stage;
mod table;


pub use host::{HOST_DEVICE_COUNT, HostEngine, LANE_QUEUE_DEPTH};
pub use stage::StagedBatch;
pub use table::{AggregateTable, TableBudget, TableCapacity};

use crate::{
    error::{Error, ErrorKind, ErrorOrigin},
    function::{AggregateFunction, FunctionError},
    result::ResultMapping,
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// EngineError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum EngineError {
    #[error("engine device {device} is not available ({available} device(s) present)")]
    DeviceUnavailable { device: u32, available: u32 },

    #[error("engine configuration field {field} must be greater than zero")]
    InvalidConfig { field: &'static str },

    #[error("engine capacity exceeded ({resource}): attempted={attempted}, limit={limit}")]
    CapacityExceeded {
        resource: &'static str,
        attempted: u64,
        limit: u64,
    },

    #[error("engine lane {lane} could not be spawned: {reason}")]
    LaneSpawn { lane: usize, reason: String },

    #[error("engine lane {lane} stopped unexpectedly")]
    LaneFailed { lane: usize },

    #[error("engine already drained; no further batches are accepted")]
    Drained,

    #[error("{0}")]
    Function(#[from] FunctionError),
}

impl EngineError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::DeviceUnavailable { .. }
            | Self::InvalidConfig { .. }
            | Self::LaneSpawn { .. } => ErrorKind::EngineInit,
            Self::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Self::Drained => ErrorKind::InvalidState,
            Self::LaneFailed { .. } | Self::Function(_) => ErrorKind::Internal,
        }
    }
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        Self::new(err.kind(), ErrorOrigin::Engine, err.to_string())
    }
}

///
/// EngineConfig
///
/// Fixed engine parameters supplied at construction. Staging capacities
/// size one transfer buffer; a batch larger than them still runs but
/// forces the buffer to grow. Host lanes queue at most `LANE_QUEUE_DEPTH`
/// such buffers each.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EngineConfig {
    device: u32,
    lanes: usize,
    capacity: TableCapacity,
    staging_rows: usize,
    staging_bytes: usize,
}

impl EngineConfig {
    #[must_use]
    pub const fn new(
        device: u32,
        lanes: usize,
        capacity: TableCapacity,
        staging_rows: usize,
        staging_bytes: usize,
    ) -> Self {
        Self {
            device,
            lanes,
            capacity,
            staging_rows,
            staging_bytes,
        }
    }

    #[must_use]
    pub const fn device(&self) -> u32 {
        self.device
    }

    #[must_use]
    pub const fn lanes(&self) -> usize {
        self.lanes
    }

    #[must_use]
    pub const fn capacity(&self) -> TableCapacity {
        self.capacity
    }

    #[must_use]
    pub const fn staging_rows(&self) -> usize {
        self.staging_rows
    }

    #[must_use]
    pub const fn staging_bytes(&self) -> usize {
        self.staging_bytes
    }

    /// Check parameters that must be positive for any engine.
    pub const fn validate(&self) -> Result<(), EngineError> {
        let field = if self.lanes == 0 {
            "lanes"
        } else if self.capacity.max_keys() == 0 {
            "max_keys"
        } else if self.capacity.max_key_bytes() == 0 {
            "max_key_bytes"
        } else if self.staging_rows == 0 {
            "staging_rows"
        } else if self.staging_bytes == 0 {
            "staging_bytes"
        } else {
            return Ok(());
        };

        Err(EngineError::InvalidConfig { field })
    }
}

///
/// AggregationEngine
///
/// Narrow contract between the driver and an accumulation engine.
/// `enqueue` may return before the batch is processed; `drain` blocks until
/// every enqueued batch is merged and hands back the result mapping.
/// Capacity failures may surface from either call but are only guaranteed
/// to surface from `drain`.
///

pub trait AggregationEngine: Sized {
    /// Acquire and initialize one engine instance.
    fn open(config: &EngineConfig, function: AggregateFunction) -> Result<Self, EngineError>;

    /// Hand one staged batch to the engine.
    fn enqueue(&mut self, batch: StagedBatch) -> Result<(), EngineError>;

    /// Block until all enqueued work is merged and return the results.
    fn drain(&mut self) -> Result<ResultMapping, EngineError>;
}
