//! Builds the per-account object graph from configuration.
//!
//! Every account gets its own API clients, mapping store, token manager, and
//! engine. The rate limiter, state file, schema cache, insights cache, and
//! run guard are shared, so only one sync run is in flight per process.

use std::sync::Arc;
use std::time::Duration;

use threadnote_core::{
    load_accounts, Account, AppConfig, Clock, DestinationApi, LogNotifier, Notifier,
    SharedCredential, SourceApi, SystemClock,
};
use threadnote_notion::NotionClient;
use threadnote_store::{FileStore, KvStore, MappingStore};
use threadnote_sync::{
    ApiKey, InsightsCache, RateLimitedDestination, RateLimitedSource, RateLimiter, SchemaCache,
    SingleFlight, SyncEngine, SyncSettings, TokenManager,
};
use threadnote_threads::ThreadsClient;

pub(crate) struct AccountRuntime {
    pub(crate) account: Account,
    pub(crate) source: Arc<dyn SourceApi>,
    pub(crate) destination: Arc<dyn DestinationApi>,
    pub(crate) store: Arc<MappingStore>,
    pub(crate) tokens: Arc<TokenManager>,
    pub(crate) engine: Arc<SyncEngine>,
}

pub(crate) struct Runtime {
    pub(crate) insights: Arc<InsightsCache>,
    pub(crate) accounts: Vec<AccountRuntime>,
}

/// Loads the accounts file and wires up every selected account.
///
/// # Errors
///
/// Returns an error if the accounts file or state file cannot be read, the
/// account filter matches nothing, an account has no Notion credential, or
/// an HTTP client cannot be constructed.
pub(crate) async fn build(config: &AppConfig, only: Option<&str>) -> anyhow::Result<Runtime> {
    let accounts = select_accounts(load_accounts(&config.accounts_path)?.accounts, only)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let kv: Arc<dyn KvStore> = Arc::new(FileStore::open(config.state_path.clone()).await?);
    let limiter = Arc::new(
        RateLimiter::new(Arc::clone(&clock))
            .with_interval(
                ApiKey::Source,
                Duration::from_millis(config.threads_min_interval_ms),
            )
            .with_interval(
                ApiKey::Destination,
                Duration::from_millis(config.notion_min_interval_ms),
            ),
    );
    let insights = Arc::new(InsightsCache::new(Arc::clone(&clock), Arc::clone(&kv)));
    let schemas = Arc::new(SchemaCache::new());
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let flight = Arc::new(SingleFlight::new());
    let settings = SyncSettings::from_config(config);

    let mut built = Vec::with_capacity(accounts.len());
    for account in accounts {
        let credential = SharedCredential::new(account.source_credential.clone());
        let threads = ThreadsClient::new(
            credential.clone(),
            config.threads_app_secret.clone(),
            config.request_timeout_secs,
        )
        .map_err(|e| anyhow::anyhow!("failed to build Threads client: {e}"))?;

        let notion_token = destination_token(&account, config)?;
        let notion = NotionClient::new(notion_token, config.request_timeout_secs)
            .map_err(|e| anyhow::anyhow!("failed to build Notion client: {e}"))?;

        let source: Arc<dyn SourceApi> = Arc::new(RateLimitedSource::new(
            Arc::new(threads),
            Arc::clone(&limiter),
        ));
        let destination: Arc<dyn DestinationApi> = Arc::new(RateLimitedDestination::new(
            Arc::new(notion),
            Arc::clone(&limiter),
        ));
        let store = Arc::new(MappingStore::load(Arc::clone(&kv), &account.id).await?);
        let tokens = Arc::new(
            TokenManager::load(
                &account.id,
                Arc::clone(&source),
                credential.clone(),
                Arc::clone(&kv),
                Arc::clone(&clock),
                Arc::clone(&notifier),
            )
            .await?,
        );
        if credential.is_empty() {
            tracing::warn!(
                account = %account.id,
                "no Threads credential configured or installed; runs will fail identity verification"
            );
        }

        let engine = Arc::new(
            SyncEngine::new(
                account.clone(),
                Arc::clone(&source),
                Arc::clone(&destination),
                Arc::clone(&store),
                Arc::clone(&insights),
                Arc::clone(&clock),
                settings.clone(),
            )
            .with_schema_cache(Arc::clone(&schemas))
            .with_flight(Arc::clone(&flight))
            .with_token_manager(Arc::clone(&tokens)),
        );

        built.push(AccountRuntime {
            account,
            source,
            destination,
            store,
            tokens,
            engine,
        });
    }

    Ok(Runtime {
        insights,
        accounts: built,
    })
}

/// Narrows the configured accounts to `only`, if given.
pub(crate) fn select_accounts(
    accounts: Vec<Account>,
    only: Option<&str>,
) -> anyhow::Result<Vec<Account>> {
    let Some(id) = only else {
        return Ok(accounts);
    };
    let selected: Vec<Account> = accounts.into_iter().filter(|a| a.id == id).collect();
    if selected.is_empty() {
        anyhow::bail!("account '{id}' is not configured");
    }
    Ok(selected)
}

/// The account's own Notion credential, falling back to `NOTION_TOKEN`.
pub(crate) fn destination_token(account: &Account, config: &AppConfig) -> anyhow::Result<String> {
    account
        .destination_credential
        .clone()
        .filter(|t| !t.trim().is_empty())
        .or_else(|| config.notion_token.clone())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "account '{}' has no Notion credential; set destination_credential or NOTION_TOKEN",
                account.id
            )
        })
}
