use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::http::{BatchOutcome, Dispatcher, Workload};

/// Seam between the orchestrator and whatever sends the requests.
#[async_trait]
pub trait BatchDispatcher: Send + Sync {
    /// # Errors
    ///
    /// Returns an error only when the batch cannot be started at all.
    async fn dispatch(&self, count: usize, max_parallelism: usize) -> AppResult<BatchOutcome>;
}

/// Sends one workload through an HTTP dispatcher.
#[derive(Debug, Clone)]
pub struct HttpBatchDispatcher {
    dispatcher: Dispatcher,
    workload: Workload,
    request_timeout: Duration,
}

impl HttpBatchDispatcher {
    #[must_use]
    pub const fn new(dispatcher: Dispatcher, workload: Workload, request_timeout: Duration) -> Self {
        Self {
            dispatcher,
            workload,
            request_timeout,
        }
    }
}

#[async_trait]
impl BatchDispatcher for HttpBatchDispatcher {
    async fn dispatch(&self, count: usize, max_parallelism: usize) -> AppResult<BatchOutcome> {
        self.dispatcher
            .dispatch_batch(&self.workload, count, max_parallelism, self.request_timeout)
            .await
    }
}

/// One stream of a scenario with its own dispatcher (and concurrency budget).
#[derive(Clone)]
pub struct ScenarioStream {
    pub name: String,
    pub weight: usize,
    pub dispatcher: Arc<dyn BatchDispatcher>,
}

impl ScenarioStream {
    #[must_use]
    pub fn new(name: impl Into<String>, weight: usize, dispatcher: Arc<dyn BatchDispatcher>) -> Self {
        Self {
            name: name.into(),
            weight: weight.max(1),
            dispatcher,
        }
    }
}

/// Splits `total` across weights so the shares add up to `total`.
///
/// Every stream gets at least one slot while `total` allows it; when there
/// are fewer slots than streams, only the first `total` streams get one.
pub(crate) fn split_by_weight(total: usize, weights: &[usize]) -> Vec<usize> {
    if total < weights.len() {
        return (0..weights.len())
            .map(|index| usize::from(index < total))
            .collect();
    }
    let weight_sum: usize = weights
        .iter()
        .fold(0usize, |acc, weight| acc.saturating_add((*weight).max(1)));
    if weight_sum == 0 {
        return Vec::new();
    }
    let mut shares: Vec<usize> = weights
        .iter()
        .map(|weight| {
            total
                .saturating_mul((*weight).max(1))
                .checked_div(weight_sum)
                .unwrap_or(0)
        })
        .collect();
    let assigned = shares
        .iter()
        .fold(0usize, |acc, share| acc.saturating_add(*share));
    if assigned < total
        && let Some(first) = shares.first_mut()
    {
        *first = first.saturating_add(total.saturating_sub(assigned));
    }
    // Lift empty shares to one slot, taken from the largest share.
    while let Some(empty) = shares.iter().position(|share| *share == 0) {
        let Some(donor) = shares
            .iter()
            .enumerate()
            .filter(|(_, share)| **share > 1)
            .max_by_key(|(_, share)| **share)
            .map(|(index, _)| index)
        else {
            break;
        };
        if let Some(share) = shares.get_mut(donor) {
            *share = share.saturating_sub(1);
        }
        if let Some(share) = shares.get_mut(empty) {
            *share = 1;
        }
    }
    shares
}
