//! System-under-test lifecycle: launch, health-gate, and tear down the
//! service a run is aimed at.
mod manager;
mod probe;
mod process;


pub use manager::{
    DEFAULT_HEALTH_BACKOFF, DEFAULT_HEALTH_RETRIES, DEFAULT_STOP_TIMEOUT, LifecycleManager,
    StartupPolicy, with_service,
};
pub use probe::{HealthProbe, HttpHealthProbe};
pub use process::{CommandProcess, ExternalService, ServiceCommand, ServiceProcess};
