//! Round aggregation.
//!
//! Every (instance, check) pair runs as its own tokio task. Tasks hand back
//! their partial results and the round is folded together only after the
//! last one settles, so no record is ever observed half-written.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use futures::FutureExt;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::checks::{Check, CheckSet};
use crate::instance::InstanceConfig;
use crate::metrics::{InstanceResult, MetricValue, PartialResult, Round};

/// What a settled task reports back
struct Outcome {
    instance: usize,
    partial: Option<PartialResult>,
}

/// Runs every check against every instance and merges the results.
#[derive(Debug, Clone)]
pub struct Aggregator {
    checks: CheckSet,
    check_timeout: Option<Duration>,
}

impl Aggregator {
    pub fn new(checks: CheckSet) -> Self {
        Self { checks, check_timeout: None }
    }

    /// Bound each check invocation; on expiry its metrics become `FAILED`.
    pub fn with_check_timeout(mut self, check_timeout: Option<Duration>) -> Self {
        self.check_timeout = check_timeout;
        self
    }

    pub fn checks(&self) -> &CheckSet {
        &self.checks
    }

    /// Run one round over `instances`.
    ///
    /// Resolves once every task has settled. Records keep the order of
    /// `instances` and contain every metric of the check set.
    pub async fn run_round(&self, instances: &[Arc<InstanceConfig>]) -> Round {
        let started_at = Local::now();
        let start = Instant::now();
        let metrics = self.checks.metrics().to_vec();

        let mut records: Vec<InstanceResult> = instances
            .iter()
            .map(|instance| InstanceResult::pending(instance.key.clone(), &metrics))
            .collect();

        let mut tasks = JoinSet::new();
        for (index, instance) in instances.iter().enumerate() {
            for check in self.checks.checks() {
                let instance = Arc::clone(instance);
                let check = Arc::clone(check);
                let bound = self.check_timeout;

                tasks.spawn(async move {
                    let partial = settle(check.as_ref(), &instance, bound).await;
                    Outcome { instance: index, partial }
                });
            }
        }

        info!("Starting round: {} instances, {} checks", instances.len(), tasks.len());

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(join_error) => error!("Check task did not complete: {}", join_error),
            }
        }

        for outcome in outcomes {
            if let Some(partial) = outcome.partial {
                records[outcome.instance].merge(partial);
            }
        }

        let elapsed = start.elapsed();
        let failed = records
            .iter()
            .flat_map(InstanceResult::iter)
            .filter(|(_, value)| value.is_failed())
            .count();
        info!("Round finished in {:?}, {} failed metrics", elapsed, failed);

        Round { started_at, elapsed, metrics, instances: records }
    }
}

/// Run `check` on `instance`, never failing.
///
/// A timed out check reports all its metrics as `FAILED`. A panicking check
/// reports nothing, leaving its metrics at `N/A`.
async fn settle(
    check: &dyn Check,
    instance: &InstanceConfig,
    bound: Option<Duration>,
) -> Option<PartialResult> {
    let run = AssertUnwindSafe(check.run(instance)).catch_unwind();

    let settled = match bound {
        Some(bound) => match timeout(bound, run).await {
            Ok(settled) => settled,
            Err(_elapsed) => {
                warn!("Check {} on {} exceeded {:?}", check.name(), instance.label(), bound);
                let failed = check
                    .metrics()
                    .iter()
                    .fold(PartialResult::new(), |partial, metric| {
                        partial.with(*metric, MetricValue::Failed)
                    });
                return Some(failed);
            }
        },
        None => run.await,
    };

    match settled {
        Ok(partial) => Some(owned_only(check, instance, partial)),
        Err(_panic) => {
            error!("Check {} panicked on {}", check.name(), instance.label());
            None
        }
    }
}

/// Drop metrics the check does not own
fn owned_only(check: &dyn Check, instance: &InstanceConfig, partial: PartialResult) -> PartialResult {
    let owned = check.metrics();
    let mut kept = PartialResult::new();

    for (metric, value) in partial {
        if owned.contains(&metric) {
            kept.set(metric, value);
        } else {
            debug!("Check {} on {} reported foreign metric {}", check.name(), instance.key, metric);
        }
    }

    kept
}
