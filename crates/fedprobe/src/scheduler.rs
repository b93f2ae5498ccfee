//! Repeating rounds.
//!
//! The scheduler alternates between two states. The next round is armed
//! only after the previous one has been published, so at most one round is
//! ever in flight and a slow round pushes the following one back.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info};

use crate::engine::Aggregator;
use crate::instance::InstanceConfig;
use crate::metrics::Round;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    RoundInFlight,
}

/// Receives every completed round
pub trait RoundSink: Send {
    fn publish(&mut self, round: &Round) -> std::io::Result<()>;
}

impl<F> RoundSink for F
where
    F: FnMut(&Round) -> std::io::Result<()> + Send,
{
    fn publish(&mut self, round: &Round) -> std::io::Result<()> {
        self(round)
    }
}

pub struct Scheduler<S> {
    aggregator: Aggregator,
    instances: Vec<Arc<InstanceConfig>>,
    interval: Duration,
    sink: S,
    state: SchedulerState,
    rounds_completed: u64,
}

impl<S: RoundSink> Scheduler<S> {
    pub fn new(
        aggregator: Aggregator,
        instances: Vec<InstanceConfig>,
        interval: Duration,
        sink: S,
    ) -> Self {
        Self {
            aggregator,
            instances: instances.into_iter().map(Arc::new).collect(),
            interval,
            sink,
            state: SchedulerState::Idle,
            rounds_completed: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn rounds_completed(&self) -> u64 {
        self.rounds_completed
    }

    /// Run and publish a single round.
    pub async fn run_once(&mut self) {
        self.state = SchedulerState::RoundInFlight;

        let round = self.aggregator.run_round(&self.instances).await;
        if let Err(publish_error) = self.sink.publish(&round) {
            // A broken sink must not stop probing.
            error!("Failed to publish round: {}", publish_error);
        }

        self.rounds_completed += 1;
        self.state = SchedulerState::Idle;
    }

    /// Run a round now and then one per interval. Never returns.
    pub async fn run(&mut self) {
        info!("Probing {} instances every {:?}", self.instances.len(), self.interval);

        loop {
            self.run_once().await;
            sleep(self.interval).await;
        }
    }
}
