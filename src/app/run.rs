use std::sync::Arc;

use tracing::info;

use crate::args::RunArgs;
use crate::config::{ScenarioDefinition, ServiceSettings, build_run_config, load_config};
use crate::error::AppResult;
use crate::http::{Dispatcher, ResponseCache, Target, Workload};
use crate::lifecycle::{
    CommandProcess, ExternalService, HttpHealthProbe, LifecycleManager, ServiceProcess,
    with_service,
};
use crate::metrics::SnapshotStore;
use crate::scenario::{HttpBatchDispatcher, Orchestrator, ScenarioPlan, ScenarioStream};
use crate::shutdown::{ShutdownReceiver, shutdown_channel};
use crate::system::shutdown_handlers::setup_signal_shutdown_handler;

use super::summary::render_run_summary;

/// Loads the config, brings the service up, runs the selected scenarios,
/// and always tears the service down again.
///
/// # Errors
///
/// Returns configuration, startup, or scenario failures.
pub(crate) async fn run_scenarios(args: &RunArgs) -> AppResult<()> {
    let (path, file) = load_config(args.config.as_deref())?;
    let config = build_run_config(file)?;
    let definitions = config.select(&args.scenarios)?;
    let policy = args.on_error.unwrap_or(config.on_error);
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output_dir.clone());
    info!(
        "Running {} scenario(s) from {} against {}",
        definitions.len(),
        path.display(),
        config.target.base_url
    );

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let signal_task = setup_signal_shutdown_handler(&shutdown_tx);

    let target = Target::resolve(config.target.base_url.as_str(), &config.target.headers).await?;
    let cache = Arc::new(ResponseCache::new(config.cache_capacity));
    let plans = build_plans(&definitions, &target, &cache, &shutdown_rx);
    let startup_cancel = shutdown_rx.clone();
    let orchestrator = Orchestrator::new(shutdown_rx).with_store(SnapshotStore::new(output_dir));

    let outcome = match config.service.as_ref() {
        Some(service) => {
            let mut manager = build_manager(service, &target, args.no_service)?
                .with_cancel(startup_cancel);
            with_service(&mut manager, || async {
                Ok(orchestrator.run_all(&plans, policy).await)
            })
            .await
        }
        None => Ok(orchestrator.run_all(&plans, policy).await),
    };
    signal_task.abort();

    let summary = outcome?;
    print!("{}", render_run_summary(&summary));
    summary.into_result().map(|_reports| ())
}

fn build_plans(
    definitions: &[ScenarioDefinition],
    target: &Target,
    cache: &Arc<ResponseCache>,
    cancel: &ShutdownReceiver,
) -> Vec<ScenarioPlan> {
    definitions
        .iter()
        .map(|definition| {
            let streams = definition
                .streams
                .iter()
                .map(|stream| {
                    let workload = Workload::new(
                        stream
                            .requests
                            .iter()
                            .map(|request| request.to_spec(cache))
                            .collect(),
                    );
                    let dispatcher =
                        Dispatcher::new(target.clone(), Arc::clone(cache), cancel.clone());
                    ScenarioStream::new(
                        stream.name.clone(),
                        stream.weight,
                        Arc::new(HttpBatchDispatcher::new(
                            dispatcher,
                            workload,
                            definition.config.request_timeout,
                        )),
                    )
                })
                .collect();
            ScenarioPlan {
                config: definition.config.clone(),
                streams,
            }
        })
        .collect()
}

fn build_manager(
    service: &ServiceSettings,
    target: &Target,
    no_service: bool,
) -> AppResult<LifecycleManager> {
    let process: Box<dyn ServiceProcess> = match service.command.as_ref() {
        Some(command) if !no_service => {
            info!("Launching service `{}`", command.program);
            Box::new(CommandProcess::new(command.clone()))
        }
        Some(_) | None => {
            info!("Using externally managed service at {}", target.base_url());
            Box::new(ExternalService)
        }
    };
    Ok(LifecycleManager::new(
        process,
        Box::new(health_probe(service, target)?),
        service.policy,
    ))
}

/// Health checks resolve against the same normalized base as the requests.
pub(super) fn health_probe(
    service: &ServiceSettings,
    target: &Target,
) -> AppResult<HttpHealthProbe> {
    HttpHealthProbe::new(
        target.base_url(),
        &service.health_path,
        service.health_timeout,
    )
}
