use std::process::ExitCode;

use clap::Parser;

use crate::app::{run_check, run_compare, run_scenarios};
use crate::args::{Cli, Command};
use crate::error::{AppError, AppResult, ValidationError};

/// How a successful command should end the process.
enum Outcome {
    Success,
    RegressionsFound,
}

pub(crate) fn run() -> ExitCode {
    let cli = Cli::parse();
    crate::system::logger::init_logging(cli.verbose, cli.no_color);

    match execute(cli) {
        Ok(Outcome::Success) => ExitCode::SUCCESS,
        Ok(Outcome::RegressionsFound) => ExitCode::FAILURE,
        Err(err) => {
            tracing::debug!("Command failed: {:?}", err);
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> AppResult<Outcome> {
    match cli.command {
        Command::Check(args) => {
            run_check(&args)?;
            Ok(Outcome::Success)
        }
        Command::Run(args) => {
            build_runtime()?.block_on(run_scenarios(&args))?;
            Ok(Outcome::Success)
        }
        Command::Compare(args) => {
            if build_runtime()?.block_on(run_compare(&args))? {
                Ok(Outcome::Success)
            } else {
                Ok(Outcome::RegressionsFound)
            }
        }
    }
}

fn build_runtime() -> AppResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::validation(ValidationError::RuntimeBuildFailed { source: err }))
}
