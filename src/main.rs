mod app;
mod args;
mod config;
mod entry;
mod error;
mod http;
mod lifecycle;
mod metrics;
mod regression;
mod scenario;
mod shutdown;
mod system;

use std::process::ExitCode;

fn main() -> ExitCode {
    entry::run()
}
