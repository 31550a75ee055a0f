//! Source credential lifecycle: expiry tracking, refresh, and install.
//!
//! The live credential is a [`SharedCredential`] shared with the source
//! client, so a refresh here is picked up by the next request. State is
//! persisted under `token:{account}`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use threadnote_core::{Clock, Notifier, SharedCredential, SourceApi, SyncError, TokenGrant};
use threadnote_store::{load_json, save_json, KvStore};
use tokio::sync::Mutex;

pub const EXPIRY_WARNING_DAYS: i64 = 7;
/// Lifetime assumed for a credential that could not be exchanged but still
/// authenticates, or that was configured without ever being installed.
pub const ASSUMED_LIFETIME_DAYS: u64 = 60;
const ASSUMED_LIFETIME_SECS: u64 = ASSUMED_LIFETIME_DAYS * 24 * 60 * 60;
pub const REFRESH_ATTEMPTS: u32 = 3;
pub const REFRESH_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    pub credential: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The short-lived credential was exchanged for a long-lived one.
    Exchanged,
    /// The exchange was rejected but the credential authenticates; it is
    /// kept with an assumed 60-day lifetime.
    AssumedLongLived,
}

pub struct TokenManager {
    account_id: String,
    source: Arc<dyn SourceApi>,
    credential: SharedCredential,
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<Option<TokenState>>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Loads persisted state for `account_id`. A persisted credential
    /// replaces whatever `credential` currently holds. A configured
    /// credential with no persisted state is recorded with the assumed
    /// 60-day lifetime starting now, so it is refreshed before it lapses.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if the persisted state cannot be read or the
    /// seeded state cannot be written.
    pub async fn load(
        account_id: &str,
        source: Arc<dyn SourceApi>,
        credential: SharedCredential,
        kv: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, SyncError> {
        let key = token_key(account_id);
        let persisted: Option<TokenState> = load_json(kv.as_ref(), &key).await?;
        let state = match persisted {
            Some(state) => {
                credential.replace(state.credential.clone());
                Some(state)
            }
            None if !credential.is_empty() => {
                let seeded = TokenState {
                    credential: credential.get(),
                    expires_at: expiry_after(clock.now(), ASSUMED_LIFETIME_SECS),
                };
                tracing::warn!(
                    account = %account_id,
                    expires_at = %seeded.expires_at,
                    "configured credential has no recorded expiry, assuming 60 days from now"
                );
                save_json(kv.as_ref(), &key, &seeded).await?;
                Some(seeded)
            }
            None => None,
        };
        Ok(Self {
            account_id: account_id.to_owned(),
            source,
            credential,
            kv,
            clock,
            notifier,
            state: Mutex::new(state),
        })
    }

    pub async fn state(&self) -> Option<TokenState> {
        self.state.lock().await.clone()
    }

    /// `true` when the credential expires within seven days. With no
    /// credential at all there is nothing to refresh, so this is `false`.
    pub async fn is_expiring_soon(&self) -> bool {
        self.state
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| s.expires_at - self.clock.now() <= TimeDelta::days(EXPIRY_WARNING_DAYS))
    }

    /// Refreshes the credential if it is close to expiry.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AuthFailure`] if a needed refresh fails.
    pub async fn ensure_fresh(&self) -> Result<(), SyncError> {
        if self.is_expiring_soon().await {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Refreshes the long-lived credential, trying up to three times two
    /// seconds apart. Exhaustion is reported through the notifier.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AuthFailure`] carrying the last error message
    /// once every attempt failed.
    pub async fn refresh(&self) -> Result<TokenState, SyncError> {
        let current = self.credential.get();
        let mut last_error = None;

        for attempt in 1..=REFRESH_ATTEMPTS {
            match self.source.refresh_credential(&current).await {
                Ok(grant) => {
                    let state = self.adopt(grant).await?;
                    tracing::info!(
                        account = %self.account_id,
                        expires_at = %state.expires_at,
                        "refreshed source credential"
                    );
                    return Ok(state);
                }
                Err(e) => {
                    tracing::warn!(
                        account = %self.account_id,
                        attempt,
                        error = %e,
                        "credential refresh failed"
                    );
                    last_error = Some(e);
                    if attempt < REFRESH_ATTEMPTS {
                        self.clock.sleep(REFRESH_DELAY).await;
                    }
                }
            }
        }

        let message = format!(
            "could not refresh the Threads credential for account {} after {REFRESH_ATTEMPTS} attempts: {}",
            self.account_id,
            last_error.as_ref().map_or("unknown error", SyncError::message)
        );
        self.notifier.notify("Threads credential refresh failed", &message);
        Err(SyncError::AuthFailure(message))
    }

    /// Installs a newly obtained credential.
    ///
    /// The exchange endpoint is tried first. If the API rejects the exchange,
    /// the credential is checked against the identity endpoint; only if that
    /// succeeds is it kept as an already long-lived credential.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AuthFailure`] if both the exchange and the
    /// identity check reject the credential. Transport and configuration
    /// errors from the exchange propagate unchanged.
    pub async fn install(&self, short_lived: &str) -> Result<InstallOutcome, SyncError> {
        match self.source.exchange_credential(short_lived).await {
            Ok(grant) => {
                self.adopt(grant).await?;
                tracing::info!(account = %self.account_id, "exchanged credential for long-lived one");
                Ok(InstallOutcome::Exchanged)
            }
            Err(e @ (SyncError::AuthFailure(_) | SyncError::ValidationFailure(_))) => {
                tracing::warn!(
                    account = %self.account_id,
                    error = %e,
                    "exchange rejected, checking whether credential is already long-lived"
                );
                let previous = self.credential.get();
                self.credential.replace(short_lived);
                if let Err(verify_err) = self.source.verify_identity().await {
                    self.credential.replace(previous);
                    return Err(SyncError::AuthFailure(format!(
                        "credential rejected by exchange ({}) and identity check ({})",
                        e.message(),
                        verify_err.message()
                    )));
                }
                self.adopt(TokenGrant {
                    credential: short_lived.to_owned(),
                    expires_in_secs: ASSUMED_LIFETIME_SECS,
                })
                .await?;
                Ok(InstallOutcome::AssumedLongLived)
            }
            Err(e) => Err(e),
        }
    }

    async fn adopt(&self, grant: TokenGrant) -> Result<TokenState, SyncError> {
        let state = TokenState {
            credential: grant.credential,
            expires_at: expiry_after(self.clock.now(), grant.expires_in_secs),
        };
        self.credential.replace(state.credential.clone());
        save_json(self.kv.as_ref(), &token_key(&self.account_id), &state).await?;
        *self.state.lock().await = Some(state.clone());
        Ok(state)
    }
}

fn expiry_after(now: DateTime<Utc>, lifetime_secs: u64) -> DateTime<Utc> {
    i64::try_from(lifetime_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn token_key(account_id: &str) -> String {
    format!("token:{account_id}")
}
