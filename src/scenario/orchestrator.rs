use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, ConfigError};
use crate::http::BatchOutcome;
use crate::metrics::{
    CapacityReport, LevelResult, MetricSnapshot, MetricTotals, SnapshotContext, SnapshotRecord,
    SnapshotStore, aggregate,
};
use crate::shutdown::{ShutdownReceiver, is_shutdown};

use super::dispatch::{ScenarioStream, split_by_weight};
use super::observer::{Observers, RunObserver};
use super::types::{
    Checkpoint, RunState, ScenarioConfig, ScenarioKind, ScenarioReport, StopReason,
    WARMUP_BATCH_SIZE,
};

const MS_PER_SEC: f64 = 1000.0;
/// Deadline used when a configured duration overflows the clock.
const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Drives scenarios through the run state machine, one at a time.
#[derive(Clone)]
pub struct Orchestrator {
    observers: Observers,
    cancel: ShutdownReceiver,
    store: Option<SnapshotStore>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(cancel: ShutdownReceiver) -> Self {
        Self {
            observers: Observers::default(),
            cancel,
            store: None,
        }
    }

    /// Persist every finished scenario into `store`.
    #[must_use]
    pub fn with_store(mut self, store: SnapshotStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn add_observer(&mut self, observer: Arc<dyn RunObserver>) {
        self.observers.push(observer);
    }

    pub(crate) const fn cancel(&self) -> &ShutdownReceiver {
        &self.cancel
    }

    /// Runs one scenario from `Init` to `Reported`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error before any dispatch when the scenario is
    /// invalid, a dispatch error when a batch cannot be started, or a metrics
    /// error when the snapshot cannot be persisted.
    pub async fn run(
        &self,
        config: &ScenarioConfig,
        streams: &[ScenarioStream],
    ) -> AppResult<ScenarioReport> {
        validate(config, streams)?;
        let mut run = ScenarioRun {
            config,
            streams,
            observers: &self.observers,
            cancel: &self.cancel,
            state: RunState::Init,
            started: Instant::now(),
            iterations: 0,
        };
        info!(
            "Scenario '{}' ({}) starting with concurrency {}",
            config.name, config.kind, config.concurrency
        );

        let mut measured = Measured::default();
        let mut capacity = None;
        let mut stop = None;

        if let Some(warm_up) = config.warm_up {
            run.transition(RunState::Warmup);
            if !run.warm_up(warm_up).await? {
                stop = Some(StopReason::Cancelled);
            }
        }

        if stop.is_none() {
            run.transition(RunState::Running);
            stop = match config.kind {
                ScenarioKind::Smoke => run.run_smoke(&mut measured).await?,
                ScenarioKind::Load | ScenarioKind::Stress | ScenarioKind::Endurance => {
                    run.run_timed(&mut measured).await?
                }
                ScenarioKind::Scalability => {
                    let (report, stop) = run.run_scalability(&mut measured).await?;
                    capacity = Some(report);
                    stop
                }
            };
        }

        let final_state = if stop.is_some() {
            RunState::StoppingEarly
        } else {
            RunState::Completed
        };
        run.transition(final_state);
        if let Some(reason) = stop.as_ref() {
            warn!("Scenario '{}' stopped early: {}", config.name, reason);
        }

        let snapshot = measured.snapshot();
        let performance = config.thresholds.evaluate(&snapshot);
        let snapshot_path = match self.store.as_ref() {
            Some(store) => {
                let record = SnapshotRecord::new(
                    &snapshot,
                    SnapshotContext {
                        scenario: &config.name,
                        kind: config.kind.as_str(),
                        final_state: final_state.as_str(),
                        stop_reason: stop.map(|reason| reason.to_string()),
                        capacity: capacity.clone(),
                        thresholds: config.thresholds,
                        taken_at: Utc::now(),
                    },
                );
                Some(store.persist(&record).await?)
            }
            None => None,
        };
        run.transition(RunState::Reported);

        info!(
            "Scenario '{}' {}: {} requests, {} failed, p95 {:.1}ms, {:.1} req/s",
            config.name,
            final_state,
            snapshot.total_requests,
            snapshot.failed_requests,
            snapshot.latency.p95 * MS_PER_SEC,
            snapshot.throughput
        );

        Ok(ScenarioReport {
            scenario: config.name.clone(),
            kind: config.kind,
            final_state,
            stop_reason: stop,
            iterations: run.iterations,
            snapshot,
            performance,
            capacity,
            snapshot_path,
        })
    }
}

fn validate(config: &ScenarioConfig, streams: &[ScenarioStream]) -> AppResult<()> {
    let scenario = || config.name.clone();
    if config.concurrency == 0 {
        return Err(AppError::config(ConfigError::ConcurrencyZero {
            scenario: scenario(),
        }));
    }
    if config.kind.is_timed() && config.duration.is_none_or(|duration| duration.is_zero()) {
        return Err(AppError::config(ConfigError::DurationRequired {
            scenario: scenario(),
        }));
    }
    if config.kind == ScenarioKind::Scalability && !levels_are_valid(&config.levels) {
        return Err(AppError::config(ConfigError::InvalidLevels {
            scenario: scenario(),
        }));
    }
    if let Some(floor) = config.success_rate_floor
        && !(0.0..=1.0).contains(&floor)
    {
        return Err(AppError::config(ConfigError::FractionOutOfRange {
            scenario: scenario(),
            field: "stop_on_failure",
        }));
    }
    if streams.is_empty() {
        return Err(AppError::config(ConfigError::NoRequests {
            scenario: scenario(),
        }));
    }
    Ok(())
}

pub(crate) fn levels_are_valid(levels: &[usize]) -> bool {
    !levels.is_empty()
        && levels.iter().all(|level| *level > 0)
        && levels.windows(2).all(|pair| match pair {
            [low, high] => low < high,
            _ => false,
        })
}

/// Totals that count towards the final snapshot. Results are folded in per
/// batch and dropped.
#[derive(Debug, Default)]
struct Measured {
    totals: MetricTotals,
    /// Per-batch totals of the most recent batches (endurance window).
    recent: VecDeque<MetricTotals>,
    window: Option<usize>,
}

impl Measured {
    fn record(&mut self, outcome: &BatchOutcome) {
        match self.window {
            Some(window) => {
                let mut batch = MetricTotals::default();
                batch.record(&outcome.results, outcome.elapsed);
                self.recent.push_back(batch);
                while self.recent.len() > window {
                    self.recent.pop_front();
                }
            }
            None => self.totals.record(&outcome.results, outcome.elapsed),
        }
    }

    fn snapshot(&mut self) -> MetricSnapshot {
        if self.window.is_none() {
            return self.totals.snapshot();
        }
        let mut merged = MetricTotals::default();
        for batch in &self.recent {
            merged.merge(batch);
        }
        merged.snapshot()
    }
}

struct ScenarioRun<'run> {
    config: &'run ScenarioConfig,
    streams: &'run [ScenarioStream],
    observers: &'run Observers,
    cancel: &'run ShutdownReceiver,
    state: RunState,
    started: Instant,
    iterations: usize,
}

impl ScenarioRun<'_> {
    fn transition(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        let previous = self.state;
        self.state = next;
        self.observers.transition(&self.config.name, previous, next);
    }

    fn cancelled(&self) -> bool {
        is_shutdown(self.cancel)
    }

    /// Sends `count` requests at `concurrency`, fanned out across streams.
    async fn dispatch(&self, concurrency: usize, count: usize) -> AppResult<BatchOutcome> {
        if let [stream] = self.streams {
            return stream.dispatcher.dispatch(count, concurrency).await;
        }

        let weights: Vec<usize> = self.streams.iter().map(|stream| stream.weight).collect();
        let active: Vec<(&ScenarioStream, usize)> = self
            .streams
            .iter()
            .zip(split_by_weight(concurrency, &weights))
            .filter(|(_, parallelism)| *parallelism > 0)
            .collect();
        let active_weights: Vec<usize> = active.iter().map(|(stream, _)| stream.weight).collect();
        let counts = split_by_weight(count, &active_weights);
        let started = Instant::now();
        let outcomes = join_all(
            active
                .iter()
                .zip(counts)
                .filter(|(_, count)| *count > 0)
                .map(|((stream, parallelism), count)| {
                    stream.dispatcher.dispatch(count, *parallelism)
                }),
        )
        .await;

        let mut merged = BatchOutcome {
            results: Vec::with_capacity(count),
            elapsed: Duration::ZERO,
            peak_in_flight: 0,
            cancelled: false,
        };
        for outcome in outcomes {
            let outcome = outcome?;
            merged.results.extend(outcome.results);
            merged.peak_in_flight = merged.peak_in_flight.saturating_add(outcome.peak_in_flight);
            merged.cancelled |= outcome.cancelled;
        }
        merged.elapsed = started.elapsed();
        Ok(merged)
    }

    /// Fixed-size batches until the warm-up time is spent; results are
    /// dropped. Returns `false` when cancelled.
    async fn warm_up(&mut self, warm_up: Duration) -> AppResult<bool> {
        let deadline = deadline_after(warm_up);
        let parallelism = self.config.concurrency.min(WARMUP_BATCH_SIZE);
        let mut discarded = 0usize;
        loop {
            if self.cancelled() {
                return Ok(false);
            }
            let outcome = self.dispatch(parallelism, WARMUP_BATCH_SIZE).await?;
            discarded = discarded.saturating_add(outcome.results.len());
            if outcome.cancelled {
                return Ok(false);
            }
            if Instant::now() >= deadline {
                break;
            }
        }
        debug!(
            "Scenario '{}': discarded {} warm-up results",
            self.config.name, discarded
        );
        Ok(true)
    }

    async fn run_smoke(&mut self, measured: &mut Measured) -> AppResult<Option<StopReason>> {
        if self.cancelled() {
            return Ok(Some(StopReason::Cancelled));
        }
        let count = self
            .config
            .concurrency
            .saturating_mul(self.config.batch_multiplier)
            .max(1);
        let outcome = self.dispatch(self.config.concurrency, count).await?;
        self.iterations = 1;
        let stop = self.batch_stop(&outcome);
        measured.record(&outcome);
        Ok(stop)
    }

    async fn run_timed(&mut self, measured: &mut Measured) -> AppResult<Option<StopReason>> {
        let config = self.config;
        let deadline = deadline_after(config.duration.unwrap_or_default());
        if config.kind == ScenarioKind::Endurance {
            measured.window = Some(config.checkpoint_interval.max(1));
        }
        let mut concurrency = initial_concurrency(config);

        while Instant::now() < deadline {
            if self.cancelled() {
                return Ok(Some(StopReason::Cancelled));
            }
            let count = concurrency.saturating_mul(config.batch_multiplier).max(1);
            let outcome = self.dispatch(concurrency, count).await?;
            self.iterations = self.iterations.saturating_add(1);
            let stop = self.batch_stop(&outcome);
            measured.record(&outcome);
            if stop.is_some() {
                return Ok(stop);
            }
            self.maybe_checkpoint(concurrency, measured);
            concurrency = next_concurrency(config, concurrency);
        }
        Ok(None)
    }

    async fn run_scalability(
        &mut self,
        measured: &mut Measured,
    ) -> AppResult<(CapacityReport, Option<StopReason>)> {
        let config = self.config;
        let floor = config.scalability_floor(self.streams.len());
        let mut report = CapacityReport {
            success_rate_floor: floor,
            ..CapacityReport::default()
        };

        for level in &config.levels {
            let level = *level;
            if self.cancelled() {
                return Ok((report, Some(StopReason::Cancelled)));
            }
            let count = level.saturating_mul(config.requests_per_level).max(1);
            let outcome = self.dispatch(level, count).await?;
            self.iterations = self.iterations.saturating_add(1);
            let batch = aggregate(&outcome.results, outcome.elapsed);
            let cancelled = outcome.cancelled;
            measured.record(&outcome);

            report.levels.push(LevelResult {
                level,
                success_rate: batch.success_rate,
                p95_ms: batch.latency.p95 * MS_PER_SEC,
                throughput: batch.throughput,
            });
            info!(
                "Scenario '{}' level {}: success {:.1}%, p95 {:.1}ms",
                config.name,
                level,
                batch.success_rate * 100.0,
                batch.latency.p95 * MS_PER_SEC
            );
            if cancelled {
                return Ok((report, Some(StopReason::Cancelled)));
            }
            if batch.success_rate < floor {
                report.breaking_level = Some(level);
                let stop = StopReason::CapacityReached {
                    level,
                    success_rate: batch.success_rate,
                    floor,
                };
                return Ok((report, Some(stop)));
            }
            report.max_passing_level = Some(level);
            self.maybe_checkpoint(level, measured);
        }
        Ok((report, None))
    }

    fn batch_stop(&self, outcome: &BatchOutcome) -> Option<StopReason> {
        if outcome.cancelled {
            return Some(StopReason::Cancelled);
        }
        let floor = self.config.success_rate_floor?;
        let batch = aggregate(&outcome.results, outcome.elapsed);
        (batch.total_requests > 0 && batch.success_rate < floor).then_some(
            StopReason::SuccessRateBelowFloor {
                success_rate: batch.success_rate,
                floor,
            },
        )
    }

    fn maybe_checkpoint(&self, concurrency: usize, measured: &mut Measured) {
        let interval = self.config.checkpoint_interval.max(1);
        if self.iterations.checked_rem(interval) != Some(0) {
            return;
        }
        self.observers.checkpoint(&Checkpoint {
            scenario: self.config.name.clone(),
            iteration: self.iterations,
            concurrency,
            elapsed: self.started.elapsed(),
            snapshot: measured.snapshot(),
        });
    }
}

fn deadline_after(duration: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(duration)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

fn initial_concurrency(config: &ScenarioConfig) -> usize {
    match config.kind {
        ScenarioKind::Load if config.spawn_rate > 0 => config.spawn_rate.min(config.concurrency),
        ScenarioKind::Load
        | ScenarioKind::Smoke
        | ScenarioKind::Stress
        | ScenarioKind::Endurance
        | ScenarioKind::Scalability => config.concurrency,
    }
}

fn next_concurrency(config: &ScenarioConfig, current: usize) -> usize {
    match config.kind {
        ScenarioKind::Load => current
            .saturating_add(config.spawn_rate)
            .min(config.concurrency),
        ScenarioKind::Stress => current
            .saturating_add(config.spawn_rate.max(1))
            .min(config.stress_ceiling().max(config.concurrency)),
        ScenarioKind::Smoke | ScenarioKind::Endurance | ScenarioKind::Scalability => current,
    }
}
