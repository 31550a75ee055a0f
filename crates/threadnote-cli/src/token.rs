//! `token` command: inspect, refresh, and install source credentials.

use clap::Subcommand;
use threadnote_core::AppConfig;
use threadnote_sync::InstallOutcome;

use crate::runtime;

#[derive(Debug, Subcommand)]
pub enum TokenCommands {
    /// Show when each account's credential expires
    Status,
    /// Refresh long-lived credentials now
    Refresh,
    /// Install a newly issued credential, exchanging it for a long-lived one
    Install {
        /// Short-lived credential from the OAuth flow
        token: String,
    },
}

pub(crate) async fn run_token(
    config: &AppConfig,
    account: Option<&str>,
    command: TokenCommands,
) -> anyhow::Result<()> {
    let runtime = runtime::build(config, account).await?;

    match command {
        TokenCommands::Status => {
            for ctx in &runtime.accounts {
                let line = match ctx.tokens.state().await {
                    Some(state) => {
                        let note = if ctx.tokens.is_expiring_soon().await {
                            "expiring soon"
                        } else {
                            "ok"
                        };
                        format!(
                            "{}: expires {} ({note})",
                            ctx.account.id,
                            state.expires_at.format("%Y-%m-%d %H:%M UTC")
                        )
                    }
                    None => format!("{}: no credential", ctx.account.id),
                };
                println!("{line}");
            }
            Ok(())
        }
        TokenCommands::Refresh => {
            let mut failed = 0usize;
            for ctx in &runtime.accounts {
                match ctx.tokens.refresh().await {
                    Ok(state) => println!(
                        "{}: refreshed, expires {}",
                        ctx.account.id,
                        state.expires_at.format("%Y-%m-%d")
                    ),
                    Err(e) => {
                        eprintln!("error: {}: {e}", ctx.account.id);
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} credential refreshes failed");
            }
            Ok(())
        }
        TokenCommands::Install { token } => {
            let [ctx] = runtime.accounts.as_slice() else {
                anyhow::bail!("token install needs --account when several accounts are configured");
            };
            let outcome = ctx.tokens.install(token.trim()).await?;
            let how = match outcome {
                InstallOutcome::Exchanged => "exchanged for a long-lived credential",
                InstallOutcome::AssumedLongLived => "kept as an already long-lived credential",
            };
            println!("{}: credential installed, {how}", ctx.account.id);
            Ok(())
        }
    }
}
