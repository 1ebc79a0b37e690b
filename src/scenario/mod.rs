//! Scenario Orchestrator: sequences warm-up, load phases, and reporting for
//! each configured scenario.
mod batch;
mod dispatch;
mod observer;
mod orchestrator;
mod types;


pub use batch::{ErrorPolicy, RunSummary, ScenarioFailure, ScenarioPlan};
pub use dispatch::{BatchDispatcher, HttpBatchDispatcher, ScenarioStream};
pub use observer::RunObserver;
pub use orchestrator::Orchestrator;
pub(crate) use orchestrator::levels_are_valid;
pub use types::{
    Checkpoint, DEFAULT_BATCH_MULTIPLIER, DEFAULT_CHECKPOINT_INTERVAL, DEFAULT_REQUESTS_PER_LEVEL,
    DEFAULT_SCALABILITY_LEVELS, MIXED_WORKLOAD_FLOOR, RunState, SINGLE_STREAM_FLOOR,
    ScenarioConfig, ScenarioKind, ScenarioReport, StopReason, WARMUP_BATCH_SIZE,
};
