//! Sync command handlers: incremental, periodic refresh, manual, and
//! backfill runs over every selected account.

use std::future::Future;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::ValueEnum;
use threadnote_core::{AppConfig, SyncResult};
use threadnote_sync::SyncEngine;

use crate::runtime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SyncMode {
    /// Mirror the most recent posts
    Incremental,
    /// Re-measure unmeasured posts and those from the last week
    Refresh,
}

pub(crate) async fn run_sync(
    config: &AppConfig,
    account: Option<&str>,
    mode: SyncMode,
) -> anyhow::Result<()> {
    run_accounts(config, account, |engine| async move {
        match mode {
            SyncMode::Incremental => engine.run_incremental().await,
            SyncMode::Refresh => engine.run_periodic_refresh().await,
        }
    })
    .await
}

pub(crate) async fn run_manual(config: &AppConfig, account: Option<&str>) -> anyhow::Result<()> {
    run_accounts(config, account, |engine| async move { engine.run_manual().await }).await
}

pub(crate) async fn run_backfill(
    config: &AppConfig,
    account: Option<&str>,
    since: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let since = since.and_then(|d| d.and_hms_opt(0, 0, 0)).map(|dt| dt.and_utc());
    run_accounts(config, account, |engine| async move {
        engine.run_backfill(since).await
    })
    .await
}

/// Runs `run` for each selected account in turn, prints every result, and
/// fails if any run reported an error.
async fn run_accounts<F, Fut>(
    config: &AppConfig,
    account: Option<&str>,
    run: F,
) -> anyhow::Result<()>
where
    F: Fn(Arc<SyncEngine>) -> Fut,
    Fut: Future<Output = SyncResult>,
{
    let runtime = runtime::build(config, account).await?;

    let mut failed = 0usize;
    for ctx in &runtime.accounts {
        let result = run(Arc::clone(&ctx.engine)).await;
        println!("{}", format_result(&result));
        if !result.is_success() {
            failed += 1;
        }
    }

    if failed > 0 {
        anyhow::bail!(
            "{failed} of {} account runs reported errors",
            runtime.accounts.len()
        );
    }
    Ok(())
}

pub(crate) fn format_result(result: &SyncResult) -> String {
    let mut out = format!(
        "{}: {} synced, {} updated, {} skipped, {} errors",
        result.account_id,
        result.synced_count,
        result.updated_count,
        result.skipped_count,
        result.errors.len()
    );
    if let Some(followers) = result.followers_count {
        out.push_str(&format!(", {followers} followers"));
    }
    for error in &result.errors {
        let subject = error.external_id.as_deref().unwrap_or("run");
        out.push_str(&format!("\n  {subject}: {:?}: {}", error.kind, error.message));
    }
    out
}
