//! CLI command handlers wiring config, lifecycle, orchestration, and
//! regression checks together.
mod check;
mod compare;
mod run;
mod summary;


pub(crate) use check::run_check;
pub(crate) use compare::run_compare;
pub(crate) use run::run_scenarios;
