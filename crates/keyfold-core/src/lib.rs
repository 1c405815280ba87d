//! Core runtime for Keyfold: record stores, record indexing, sampling plans,
//! batch planning, aggregate functions, the engine contract, the dispatch
//! driver, reference verification, and observability.
#![warn(unreachable_pub)]

pub mod batch;
pub mod compare;
pub mod driver;
pub mod engine;
pub mod error;
pub mod function;
pub mod index;
pub mod obs;
pub mod output;
pub mod pipeline;
pub mod reference;
pub mod result;
pub mod sampling;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

// re-exports
pub use error::{Error, ErrorKind, ErrorOrigin};

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///
/// Prelude contains the pipeline vocabulary most callers need.
///

pub mod prelude {
    pub use crate::{
        batch::{Batch, BatchBudget, BatchPlanner},
        compare::{Comparison, compare},
        driver::{AggregationDriver, DriverState},
        engine::{AggregationEngine, EngineConfig, HostEngine},
        function::{AggregateFunction, AggregateState},
        index::{RecordIndex, RecordSet},
        pipeline::{RunConfig, RunOutcome, RunReport},
        reference::ReferenceAggregator,
        result::ResultMapping,
        sampling::{SamplingPlan, SamplingRange},
        store::{RecordStore, StringBlock},
    };
}
