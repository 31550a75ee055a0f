mod daemon;
mod insights;
mod runtime;
mod schema;
mod sync;
mod token;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use threadnote_sync::Window;
use tracing_subscriber::EnvFilter;

use crate::sync::SyncMode;
use crate::token::TokenCommands;

#[derive(Debug, Parser)]
#[command(name = "threadnote")]
#[command(about = "Mirror Threads posts and their engagement metrics into Notion")]
struct Cli {
    /// Only act on the account with this id
    #[arg(long, global = true)]
    account: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sync recent posts, or refresh metrics of recently mirrored ones
    Sync {
        #[arg(long, value_enum, default_value_t = SyncMode::Incremental)]
        mode: SyncMode,
    },
    /// Refresh the last two weeks of metrics, then sync everything newer
    /// than the newest mirrored post
    Manual,
    /// Walk the account history and mirror every missing post
    Backfill {
        /// Only posts published on or after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<NaiveDate>,
    },
    /// Aggregate engagement over a window of mirrored posts
    Insights {
        /// 7, 30, 90, or all
        #[arg(long, default_value = "7", value_parser = insights::parse_window)]
        window: Window,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show how destination fields map onto post attributes
    Schema,
    /// Manage source credentials
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
    /// Run scheduled syncs until interrupted
    Daemon,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let config = threadnote_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let account = cli.account.as_deref();
    match cli.command {
        Commands::Sync { mode } => sync::run_sync(&config, account, mode).await,
        Commands::Manual => sync::run_manual(&config, account).await,
        Commands::Backfill { since } => sync::run_backfill(&config, account, since).await,
        Commands::Insights { window, json } => {
            insights::run_insights(&config, account, window, json).await
        }
        Commands::Schema => schema::run_schema(&config, account).await,
        Commands::Token { command } => token::run_token(&config, account, command).await,
        Commands::Daemon => daemon::run_daemon(&config, account).await,
    }
}
