use crate::args::CheckArgs;
use crate::config::{RunConfig, build_run_config, load_config};
use crate::error::AppResult;

/// Validates a config file and lists what `run` would execute.
///
/// # Errors
///
/// Returns the first configuration error found.
pub(crate) fn run_check(args: &CheckArgs) -> AppResult<()> {
    let (path, file) = load_config(args.config.as_deref())?;
    let config = build_run_config(file)?;
    println!("{} is valid.", path.display());
    print!("{}", describe(&config));
    Ok(())
}

pub(super) fn describe(config: &RunConfig) -> String {
    let mut lines = vec![format!("target: {}", config.target.base_url)];
    if let Some(service) = config.service.as_ref() {
        let launched = service.command.as_ref().map_or_else(
            || "external".to_owned(),
            |command| format!("`{}`", command.program),
        );
        lines.push(format!("service: {} (health {})", launched, service.health_path));
    }
    for scenario in &config.scenarios {
        let requests: usize = scenario
            .streams
            .iter()
            .map(|stream| stream.requests.len())
            .sum();
        lines.push(format!(
            "scenario {}: type={} concurrency={} streams={} requests={}",
            scenario.config.name,
            scenario.config.kind,
            scenario.config.concurrency,
            scenario.streams.len(),
            requests
        ));
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
