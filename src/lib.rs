//! Core library for the `stressgate` CLI.
//!
//! The building blocks behind the binary: bounded-concurrency HTTP batch
//! dispatch, metric aggregation and snapshot persistence, service lifecycle
//! management, scenario orchestration, and baseline regression checks. The
//! primary interface is the `stressgate` command; library APIs may evolve
//! with it.
pub mod args;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod metrics;
pub mod regression;
pub mod scenario;
pub mod shutdown;
