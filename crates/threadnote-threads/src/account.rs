//! Identity, account insights, and credential lifecycle endpoints.

use threadnote_core::{AccountMetrics, Identity, TimeRange, TokenGrant};

use crate::client::ThreadsClient;
use crate::error::ThreadsError;
use crate::normalize::normalize_account_metrics;
use crate::types::{InsightsResponse, MeResponse, TokenResponse};

const ACCOUNT_METRICS: &str = "views,likes,replies,reposts,quotes,followers_count";
/// Expiry assumed when a token response omits `expires_in` (60 days).
const DEFAULT_LONG_LIVED_SECS: u64 = 60 * 24 * 60 * 60;

impl ThreadsClient {
    /// Returns the id and handle behind the current credential.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadsError`] on HTTP, API, or decode failure.
    pub async fn me(&self) -> Result<Identity, ThreadsError> {
        let url = self.build_url("me", &[("fields", "id,username")])?;
        let me: MeResponse = self.get_json(url).await?;
        Ok(Identity {
            id: me.id,
            username: me.username,
        })
    }

    /// Fetches account totals over `range`, or the platform default window
    /// when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadsError`] on HTTP, API, or decode failure.
    pub async fn account_insights(
        &self,
        range: Option<TimeRange>,
    ) -> Result<AccountMetrics, ThreadsError> {
        let range = range.map(|r| {
            (
                r.since.timestamp().to_string(),
                r.until.timestamp().to_string(),
            )
        });

        let mut params = vec![("metric", ACCOUNT_METRICS)];
        if let Some((since, until)) = range.as_ref() {
            params.push(("since", since.as_str()));
            params.push(("until", until.as_str()));
        }

        let url = self.build_url("me/threads_insights", &params)?;
        let response: InsightsResponse = self.get_json(url).await?;
        Ok(normalize_account_metrics(&response.data))
    }

    /// Exchanges a short-lived credential for a long-lived one.
    ///
    /// # Errors
    ///
    /// - [`ThreadsError::MissingAppSecret`] if no app secret is configured.
    /// - [`ThreadsError::Api`] if the API rejects the exchange (for example
    ///   because the credential is already long-lived, or invalid).
    /// - [`ThreadsError::Http`] on network failure.
    pub async fn exchange_token(&self, short_lived: &str) -> Result<TokenGrant, ThreadsError> {
        let secret = self
            .app_secret
            .as_deref()
            .ok_or(ThreadsError::MissingAppSecret)?;
        let url = self.build_url(
            "access_token",
            &[
                ("grant_type", "th_exchange_token"),
                ("client_secret", secret),
                ("access_token", short_lived),
            ],
        )?;
        let token: TokenResponse = self.get_json_public(url).await?;
        Ok(grant(token))
    }

    /// Refreshes a long-lived credential, extending its expiry.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadsError`] on HTTP, API, or decode failure.
    pub async fn refresh_token(&self, credential: &str) -> Result<TokenGrant, ThreadsError> {
        let url = self.build_url(
            "refresh_access_token",
            &[
                ("grant_type", "th_refresh_token"),
                ("access_token", credential),
            ],
        )?;
        let token: TokenResponse = self.get_json_public(url).await?;
        Ok(grant(token))
    }
}

fn grant(token: TokenResponse) -> TokenGrant {
    TokenGrant {
        credential: token.access_token,
        expires_in_secs: token.expires_in.unwrap_or(DEFAULT_LONG_LIVED_SECS),
    }
}
