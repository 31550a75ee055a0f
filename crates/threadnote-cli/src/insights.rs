//! `insights` command: windowed engagement totals per account.

use std::sync::Arc;

use threadnote_core::AppConfig;
use threadnote_sync::{InsightsReport, Window};

use crate::runtime;

/// Parses `--window`: `7`, `30`, `90`, or `all`.
pub(crate) fn parse_window(raw: &str) -> Result<Window, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "all" => Ok(Window::AllTime),
        "7" => Ok(Window::Days(7)),
        "30" => Ok(Window::Days(30)),
        "90" => Ok(Window::Days(90)),
        other => Err(format!(
            "unsupported window '{other}' (expected 7, 30, 90, or all)"
        )),
    }
}

pub(crate) async fn run_insights(
    config: &AppConfig,
    account: Option<&str>,
    window: Window,
    json: bool,
) -> anyhow::Result<()> {
    let runtime = runtime::build(config, account).await?;

    for ctx in &runtime.accounts {
        let report = runtime
            .insights
            .aggregate(Arc::clone(&ctx.store), Arc::clone(&ctx.source), window)
            .await;
        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("{}", format_report(&report));
        }
    }
    Ok(())
}

pub(crate) fn format_report(report: &InsightsReport) -> String {
    let followers = report
        .followers_count
        .map_or_else(|| "unknown".to_string(), |n| n.to_string());
    let m = &report.metrics;
    format!(
        "{} ({}): {} posts, {} views, {} likes, {} replies, {} reposts, {} quotes, {} shares, followers {}",
        report.account_id,
        report.window,
        report.post_count,
        m.views,
        m.likes,
        m.replies,
        m.reposts,
        m.quotes,
        m.shares,
        followers
    )
}
