//! Module: engine::host
//! Responsibility: in-process engine running one worker thread per lane.
//! Does not own: batch planning or submission order.
//! Boundary: implements `AggregationEngine` for the driver.

use crate::{
    engine::{
        AggregateTable, AggregationEngine, EngineConfig, EngineError, StagedBatch, TableCapacity,
    },
    function::AggregateFunction,
    result::ResultMapping,
};
use std::{
    sync::mpsc::{self, Receiver, SyncSender, TrySendError},
    thread::{self, JoinHandle},
};
use tracing::{debug, warn};

/// Number of devices the host engine exposes.
pub const HOST_DEVICE_COUNT: u32 = 1;

/// Staged batches a lane holds before `enqueue` blocks on it.
pub const LANE_QUEUE_DEPTH: usize = 2;

type LaneHandle = JoinHandle<Result<AggregateTable, EngineError>>;

/// Runs on the lane thread before it takes its first batch.
pub(crate) type LaneStart = Box<dyn FnOnce() + Send>;

///
/// Lane
///

struct Lane {
    sender: SyncSender<StagedBatch>,
    handle: LaneHandle,
}

///
/// HostEngine
///
/// Batches are dealt round-robin to lanes. Each lane queue holds at most
/// `LANE_QUEUE_DEPTH` staged batches, so `enqueue` waits on a lane that
/// falls behind. Each lane folds into a private table that fails fast once
/// the lane alone exceeds capacity; `drain` merges lane tables under the
/// global capacity.
///

pub struct HostEngine {
    config: EngineConfig,
    function: AggregateFunction,
    lanes: Vec<Lane>,
    next_lane: usize,
    drained: bool,
}

impl HostEngine {
    /// Open with a start hook per lane.
    pub(crate) fn open_with(
        config: &EngineConfig,
        function: AggregateFunction,
        lane_start: impl Fn() -> LaneStart,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        if config.device() >= HOST_DEVICE_COUNT {
            return Err(EngineError::DeviceUnavailable {
                device: config.device(),
                available: HOST_DEVICE_COUNT,
            });
        }

        let mut engine = Self {
            config: *config,
            function,
            lanes: Vec::with_capacity(config.lanes()),
            next_lane: 0,
            drained: false,
        };
        for index in 0..config.lanes() {
            let lane = Self::spawn_lane(index, function, config.capacity(), lane_start())?;
            engine.lanes.push(lane);
        }

        debug!(
            device = config.device(),
            lanes = config.lanes(),
            queue_depth = LANE_QUEUE_DEPTH,
            function = %function,
            "host engine opened"
        );

        Ok(engine)
    }

    fn spawn_lane(
        index: usize,
        function: AggregateFunction,
        capacity: TableCapacity,
        start: LaneStart,
    ) -> Result<Lane, EngineError> {
        let (sender, receiver) = mpsc::sync_channel(LANE_QUEUE_DEPTH);
        let handle = thread::Builder::new()
            .name(format!("keyfold-lane-{index}"))
            .spawn(move || {
                start();
                run_lane(&receiver, function, capacity)
            })
            .map_err(|err| EngineError::LaneSpawn {
                lane: index,
                reason: err.to_string(),
            })?;

        Ok(Lane { sender, handle })
    }

    // Dropping the senders ends every lane loop; then collect outcomes.
    fn close_lanes(&mut self) -> Vec<Result<AggregateTable, EngineError>> {
        let (senders, handles): (Vec<_>, Vec<_>) = self
            .lanes
            .drain(..)
            .map(|lane| (lane.sender, lane.handle))
            .unzip();
        drop(senders);

        handles
            .into_iter()
            .enumerate()
            .map(|(lane, handle)| {
                handle
                    .join()
                    .unwrap_or(Err(EngineError::LaneFailed { lane }))
            })
            .collect()
    }
}

impl AggregationEngine for HostEngine {
    fn open(config: &EngineConfig, function: AggregateFunction) -> Result<Self, EngineError> {
        Self::open_with(config, function, || Box::new(|| {}))
    }

    fn enqueue(&mut self, batch: StagedBatch) -> Result<(), EngineError> {
        if self.drained {
            return Err(EngineError::Drained);
        }

        if batch.rows() > self.config.staging_rows()
            || batch.key_bytes() + batch.value_bytes() > self.config.staging_bytes()
        {
            warn!(
                rows = batch.rows(),
                bytes = batch.key_bytes() + batch.value_bytes(),
                staging_rows = self.config.staging_rows(),
                staging_bytes = self.config.staging_bytes(),
                "batch exceeds staging capacity"
            );
        }

        let lane = self.next_lane;
        self.next_lane = (self.next_lane + 1) % self.lanes.len();

        // A closed channel means the lane already failed; drain reports why.
        let sender = &self.lanes[lane].sender;
        let sent = match sender.try_send(batch) {
            Ok(()) => true,
            Err(TrySendError::Full(batch)) => {
                debug!(lane, depth = LANE_QUEUE_DEPTH, "lane queue full; waiting");
                sender.send(batch).is_ok()
            }
            Err(TrySendError::Disconnected(_)) => false,
        };
        if !sent {
            debug!(lane, "lane stopped early; batch discarded");
        }

        Ok(())
    }

    fn drain(&mut self) -> Result<ResultMapping, EngineError> {
        if self.drained {
            return Err(EngineError::Drained);
        }
        self.drained = true;

        let mut merged = AggregateTable::new(self.function, self.config.capacity());
        let mut first_error = None;
        for outcome in self.close_lanes() {
            if first_error.is_some() {
                continue;
            }
            match outcome.and_then(|table| merged.merge(table)) {
                Ok(()) => {}
                Err(err) => first_error = Some(err),
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        debug!(keys = merged.len(), "host engine drained");

        Ok(merged.into_mapping())
    }
}

impl Drop for HostEngine {
    fn drop(&mut self) {
        if !self.lanes.is_empty() {
            let _ = self.close_lanes();
        }
    }
}

fn run_lane(
    batches: &Receiver<StagedBatch>,
    function: AggregateFunction,
    capacity: TableCapacity,
) -> Result<AggregateTable, EngineError> {
    let mut table = AggregateTable::new(function, capacity);
    for batch in batches {
        table.fold_batch(&batch)?;
    }

    Ok(table)
}
