use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::metrics::{CapacityReport, MetricSnapshot, PerformanceStatus, ThresholdConfig};

/// Requests sent per warm-up batch.
pub const WARMUP_BATCH_SIZE: usize = 10;
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 5;
pub const DEFAULT_BATCH_MULTIPLIER: usize = 1;
pub const DEFAULT_REQUESTS_PER_LEVEL: usize = 10;
pub const DEFAULT_SCALABILITY_LEVELS: [usize; 6] = [1, 5, 10, 20, 50, 100];
pub const SINGLE_STREAM_FLOOR: f64 = 0.95;
pub const MIXED_WORKLOAD_FLOOR: f64 = 0.90;
/// Stress runs without `max_concurrency` stop growing at this multiple.
pub const DEFAULT_STRESS_CEILING_FACTOR: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioKind {
    Smoke,
    Load,
    Stress,
    Endurance,
    Scalability,
}

impl ScenarioKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ScenarioKind::Smoke => "smoke",
            ScenarioKind::Load => "load",
            ScenarioKind::Stress => "stress",
            ScenarioKind::Endurance => "endurance",
            ScenarioKind::Scalability => "scalability",
        }
    }

    /// Kinds that loop for a configured duration.
    #[must_use]
    pub const fn is_timed(self) -> bool {
        matches!(
            self,
            ScenarioKind::Load | ScenarioKind::Stress | ScenarioKind::Endurance
        )
    }
}

impl FromStr for ScenarioKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "smoke" => Ok(ScenarioKind::Smoke),
            "load" => Ok(ScenarioKind::Load),
            "stress" => Ok(ScenarioKind::Stress),
            "endurance" | "soak" => Ok(ScenarioKind::Endurance),
            "scalability" => Ok(ScenarioKind::Scalability),
            other => Err(other.to_owned()),
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrator state machine:
/// `Init -> Warmup -> Running -> (StoppingEarly | Completed) -> Reported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Init,
    Warmup,
    Running,
    StoppingEarly,
    Completed,
    Reported,
}

impl RunState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RunState::Init => "init",
            RunState::Warmup => "warmup",
            RunState::Running => "running",
            RunState::StoppingEarly => "stopping_early",
            RunState::Completed => "completed",
            RunState::Reported => "reported",
        }
    }

    #[must_use]
    pub const fn can_transition_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Init, RunState::Warmup | RunState::Running | RunState::StoppingEarly)
                | (RunState::Warmup, RunState::Running | RunState::StoppingEarly)
                | (RunState::Running, RunState::StoppingEarly | RunState::Completed)
                | (RunState::StoppingEarly | RunState::Completed, RunState::Reported)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum StopReason {
    Cancelled,
    SuccessRateBelowFloor { success_rate: f64, floor: f64 },
    CapacityReached { level: usize, success_rate: f64, floor: f64 },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Cancelled => f.write_str("cancelled"),
            StopReason::SuccessRateBelowFloor {
                success_rate,
                floor,
            } => write!(
                f,
                "success rate {:.3} below floor {:.3}",
                success_rate, floor
            ),
            StopReason::CapacityReached {
                level,
                success_rate,
                floor,
            } => write!(
                f,
                "level {} success rate {:.3} below floor {:.3}",
                level, success_rate, floor
            ),
        }
    }
}

/// A validated scenario, ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub name: String,
    pub kind: ScenarioKind,
    pub concurrency: usize,
    /// Concurrency added per iteration while ramping; 0 starts at full load.
    pub spawn_rate: usize,
    pub max_concurrency: Option<usize>,
    pub duration: Option<Duration>,
    pub warm_up: Option<Duration>,
    pub request_timeout: Duration,
    /// Success-rate floor; a batch below it stops the run early.
    pub success_rate_floor: Option<f64>,
    pub levels: Vec<usize>,
    pub requests_per_level: usize,
    pub batch_multiplier: usize,
    pub checkpoint_interval: usize,
    pub thresholds: ThresholdConfig,
}

impl ScenarioConfig {
    /// Defaults for everything but identity and load shape.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ScenarioKind, concurrency: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            concurrency,
            spawn_rate: 0,
            max_concurrency: None,
            duration: None,
            warm_up: None,
            request_timeout: Duration::from_secs(30),
            success_rate_floor: None,
            levels: Vec::new(),
            requests_per_level: DEFAULT_REQUESTS_PER_LEVEL,
            batch_multiplier: DEFAULT_BATCH_MULTIPLIER,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            thresholds: ThresholdConfig::default(),
        }
    }

    /// Mixed workloads (more than one stream) tolerate a lower floor.
    #[must_use]
    pub fn scalability_floor(&self, stream_count: usize) -> f64 {
        self.success_rate_floor.unwrap_or(if stream_count > 1 {
            MIXED_WORKLOAD_FLOOR
        } else {
            SINGLE_STREAM_FLOOR
        })
    }

    #[must_use]
    pub fn stress_ceiling(&self) -> usize {
        self.max_concurrency.unwrap_or_else(|| {
            self.concurrency
                .saturating_mul(DEFAULT_STRESS_CEILING_FACTOR)
        })
    }
}

/// Progress snapshot emitted every `checkpoint_interval` iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub scenario: String,
    pub iteration: usize,
    pub concurrency: usize,
    pub elapsed: Duration,
    pub snapshot: MetricSnapshot,
}

/// Outcome of one scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub scenario: String,
    pub kind: ScenarioKind,
    /// `Completed` or `StoppingEarly`; the state the run left `Running` in.
    pub final_state: RunState,
    pub stop_reason: Option<StopReason>,
    pub iterations: usize,
    pub snapshot: MetricSnapshot,
    pub performance: PerformanceStatus,
    pub capacity: Option<CapacityReport>,
    pub snapshot_path: Option<PathBuf>,
}

impl ScenarioReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.performance.passed()
    }
}
