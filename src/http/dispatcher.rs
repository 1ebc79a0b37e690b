use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult, HttpError};
use crate::metrics::RequestResult;
use crate::shutdown::{ShutdownReceiver, is_shutdown, wait_for_shutdown};

use super::cache::ResponseCache;
use super::execution::{PreparedRequest, build_request, execute_timed};
use super::spec::Workload;
use super::target::Target;

/// How long in-flight requests may keep running after cancellation.
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Everything a finished batch produced.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub results: Vec<RequestResult>,
    /// Wall clock from first dispatch to last completion.
    pub elapsed: Duration,
    /// Highest number of requests observed in flight at once.
    pub peak_in_flight: usize,
    pub cancelled: bool,
}

#[derive(Debug, Default)]
struct InflightCounter {
    current: AtomicUsize,
    peak: AtomicUsize,
}

struct InflightGuard<'counter> {
    counter: &'counter InflightCounter,
}

impl<'counter> InflightGuard<'counter> {
    fn acquire(counter: &'counter InflightCounter) -> Self {
        let previous = counter.current.fetch_add(1, Ordering::AcqRel);
        counter
            .peak
            .fetch_max(previous.saturating_add(1), Ordering::AcqRel);
        Self { counter }
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        loop {
            let current = self.counter.current.load(Ordering::Acquire);
            let Some(next) = current.checked_sub(1) else {
                break;
            };
            if self
                .counter
                .current
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break;
            }
        }
    }
}

/// Issues request batches against one target with bounded parallelism.
///
/// Each `dispatch_batch` call gets its own semaphore, so independent
/// dispatchers (or concurrent batches) never share concurrency budget.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    target: Target,
    cache: Arc<ResponseCache>,
    cancel: ShutdownReceiver,
    drain_grace: Duration,
}

impl Dispatcher {
    #[must_use]
    pub fn new(target: Target, cache: Arc<ResponseCache>, cancel: ShutdownReceiver) -> Self {
        Self {
            target,
            cache,
            cancel,
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }

    #[must_use]
    pub const fn with_drain_grace(mut self, drain_grace: Duration) -> Self {
        self.drain_grace = drain_grace;
        self
    }

    #[must_use]
    pub const fn target(&self) -> &Target {
        &self.target
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Executes `count` requests with at most `max_parallelism` in flight.
    ///
    /// Per-request transport errors, unexpected statuses and timeouts become
    /// failed results; they never abort the batch. Results arrive in
    /// completion order, not index order.
    ///
    /// # Errors
    ///
    /// Returns an error before anything is sent when the workload is empty,
    /// `max_parallelism` is zero, or an endpoint cannot be resolved against
    /// the target.
    pub async fn dispatch_batch(
        &self,
        workload: &Workload,
        count: usize,
        max_parallelism: usize,
        request_timeout: Duration,
    ) -> AppResult<BatchOutcome> {
        if max_parallelism == 0 {
            return Err(AppError::http(HttpError::ZeroParallelism));
        }
        let prepared = self.prepare(workload)?;

        let permits = Arc::new(Semaphore::new(max_parallelism));
        let in_flight = Arc::new(InflightCounter::default());
        let (results_tx, mut results_rx) = mpsc::unbounded_channel::<RequestResult>();
        let mut tasks = JoinSet::new();
        let mut cancel = self.cancel.clone();
        let started = Instant::now();

        for (index, request) in (0..count).zip(prepared.iter().cycle()) {
            if is_shutdown(&cancel) {
                break;
            }
            let permit = tokio::select! {
                biased;
                () = wait_for_shutdown(&mut cancel) => break,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_closed) => break,
                },
            };

            let context = RequestContext {
                target: self.target.clone(),
                cache: Arc::clone(&self.cache),
                in_flight: Arc::clone(&in_flight),
                cancel: self.cancel.clone(),
                drain_grace: self.drain_grace,
                request_timeout,
            };
            let request = request.clone();
            let results_tx = results_tx.clone();
            let index = u64::try_from(index).unwrap_or(u64::MAX);
            tasks.spawn(async move {
                let result = run_request(&context, &request, index).await;
                drop(permit);
                if results_tx.send(result).is_err() {
                    // Receiver outlives every task; nothing to report.
                }
            });
        }
        drop(results_tx);

        let mut results = Vec::with_capacity(count);
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                warn!("Request task failed: {}", err);
                results.push(RequestResult::transport_failure(
                    None,
                    format!("request task failed: {}", err),
                ));
            }
        }
        while let Some(result) = results_rx.recv().await {
            results.push(result);
        }

        let elapsed = started.elapsed();
        let cancelled = is_shutdown(&self.cancel);
        debug!(
            "Batch finished: {} results in {}ms (peak in flight {})",
            results.len(),
            elapsed.as_millis(),
            in_flight.peak.load(Ordering::Acquire)
        );

        Ok(BatchOutcome {
            results,
            elapsed,
            peak_in_flight: in_flight.peak.load(Ordering::Acquire),
            cancelled,
        })
    }

    fn prepare(&self, workload: &Workload) -> AppResult<Vec<PreparedRequest>> {
        if workload.is_empty() {
            return Err(AppError::http(HttpError::EmptyWorkload));
        }
        workload
            .specs()
            .iter()
            .map(|spec| {
                Ok(PreparedRequest {
                    spec: Arc::clone(spec),
                    url: self.target.endpoint(&spec.endpoint)?,
                })
            })
            .collect()
    }
}

struct RequestContext {
    target: Target,
    cache: Arc<ResponseCache>,
    in_flight: Arc<InflightCounter>,
    cancel: ShutdownReceiver,
    drain_grace: Duration,
    request_timeout: Duration,
}

async fn run_request(context: &RequestContext, prepared: &PreparedRequest, index: u64) -> RequestResult {
    let _in_flight = InflightGuard::acquire(&context.in_flight);
    let start = Instant::now();
    let params = prepared.spec.params.resolve(index);
    let request = match build_request(context.target.client(), prepared, params) {
        Ok(request) => request,
        Err(message) => return RequestResult::transport_failure(None, message),
    };

    let execution = execute_timed(
        context.target.client(),
        request,
        &prepared.spec,
        context.request_timeout,
        &context.cache,
        start,
    );
    tokio::pin!(execution);

    let mut cancel = context.cancel.clone();
    tokio::select! {
        biased;
        result = &mut execution => result,
        () = wait_for_shutdown(&mut cancel) => {
            match tokio::time::timeout(context.drain_grace, &mut execution).await {
                Ok(result) => result,
                Err(_elapsed) => RequestResult::cancelled(),
            }
        }
    }
}
