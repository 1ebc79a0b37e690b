//! Request Dispatcher: bounded-concurrency HTTP batches against the system
//! under test.
mod cache;
mod dispatcher;
mod execution;
mod spec;
mod target;
mod template;

#[cfg(test)]
pub(crate) mod stub_server;

pub use cache::{DEFAULT_CACHE_CAPACITY, ResponseCache};
pub use dispatcher::{BatchOutcome, DEFAULT_DRAIN_GRACE, Dispatcher};
pub use spec::{
    HttpMethod, ParamGenerator, RequestParamSource, RequestParams, RequestSpec, Workload,
};
pub use target::Target;
pub use template::ParamTemplate;
