//! `daemon` command: scheduled incremental syncs and a daily metric refresh.

use std::sync::Arc;

use threadnote_core::AppConfig;
use threadnote_sync::SyncEngine;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::runtime;
use crate::sync::{format_result, SyncMode};

/// Daily at 03:30 UTC.
const PERIODIC_REFRESH_CRON: &str = "0 30 3 * * *";

pub(crate) async fn run_daemon(config: &AppConfig, account: Option<&str>) -> anyhow::Result<()> {
    let runtime = runtime::build(config, account).await?;
    let engines: Arc<Vec<Arc<SyncEngine>>> = Arc::new(
        runtime
            .accounts
            .iter()
            .map(|ctx| Arc::clone(&ctx.engine))
            .collect(),
    );

    let mut scheduler = JobScheduler::new().await?;
    register_job(
        &scheduler,
        &config.schedule,
        SyncMode::Incremental,
        Arc::clone(&engines),
    )
    .await?;
    register_job(
        &scheduler,
        PERIODIC_REFRESH_CRON,
        SyncMode::Refresh,
        engines,
    )
    .await?;
    scheduler.start().await?;
    tracing::info!(accounts = runtime.accounts.len(), "daemon started");

    shutdown_signal().await;
    scheduler.shutdown().await?;
    Ok(())
}

/// Registers one recurring job that runs `mode` for every engine in turn.
/// The engines share one run guard, so a tick that overlaps any running
/// sync joins that run instead of starting a second one.
async fn register_job(
    scheduler: &JobScheduler,
    cron: &str,
    mode: SyncMode,
    engines: Arc<Vec<Arc<SyncEngine>>>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let engines = Arc::clone(&engines);

        Box::pin(async move {
            tracing::info!(?mode, "scheduler: starting run");
            for engine in engines.iter() {
                let result = match mode {
                    SyncMode::Incremental => engine.run_incremental().await,
                    SyncMode::Refresh => engine.run_periodic_refresh().await,
                };
                if result.is_success() {
                    tracing::info!(?mode, summary = %format_result(&result), "scheduler: account run complete");
                } else {
                    tracing::warn!(?mode, summary = %format_result(&result), "scheduler: account run reported errors");
                }
            }
            tracing::info!(?mode, "scheduler: run complete");
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(?mode, cron = %cron, "scheduler: registered job");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c; shutting down");
        return;
    }
    tracing::info!("received shutdown signal, stopping scheduler");
}
