//! Schwab REST client with rate limiting and retries.
//!
//! Market data lives under `/marketdata/v1`, account access under
//! `/trader/v1`. Both share one OAuth token.
//!
//! # Example
//!
//! ```ignore
//! use wheel_core::{ConfigLoader, OptionRight};
//! use wheel_schwab::SchwabClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let client = SchwabClient::from_app_config(&config.schwab)?;
//!
//!     if let Some(chain) = client.get_option_chain("AAPL", OptionRight::Put, 80).await? {
//!         println!("{} contracts", chain.contracts.len());
//!     }
//!     Ok(())
//! }
//! ```

use crate::account::{AccountNumber, AccountSnapshot};
use crate::auth::{SchwabAuth, SchwabAuthConfig};
use crate::chain::parse_option_chain;
use crate::error::{Result, SchwabError};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use wheel_core::symbols::normalize_ticker;
use wheel_core::{
    EquityLot, OptionChain, OptionChainProvider, OptionRight, PositionProvider, SchwabConfig,
};

/// Schwab production API host.
pub const SCHWAB_API_URL: &str = "https://api.schwabapi.com";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Schwab client.
#[derive(Debug, Clone)]
pub struct SchwabClientConfig {
    /// API host; `/marketdata/v1` and `/trader/v1` are appended.
    pub base_url: String,

    /// Requests per minute limit.
    pub requests_per_minute: NonZeroU32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Total attempts per request, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff on transient failures.
    pub retry_base_delay: Duration,

    /// Account hash to use instead of resolving the first linked account.
    pub account_hash: Option<String>,
}

impl Default for SchwabClientConfig {
    fn default() -> Self {
        Self {
            base_url: SCHWAB_API_URL.to_string(),
            requests_per_minute: nonzero!(120u32),
            timeout_secs: 30,
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
            account_hash: None,
        }
    }
}

impl SchwabClientConfig {
    #[must_use]
    pub fn from_config(config: &SchwabConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            requests_per_minute: NonZeroU32::new(config.requests_per_minute)
                .unwrap_or(nonzero!(120u32)),
            timeout_secs: config.timeout_secs,
            account_hash: config
                .account_hash
                .as_deref()
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_minute: NonZeroU32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }

    #[must_use]
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    #[must_use]
    pub fn with_account_hash(mut self, hash: impl Into<String>) -> Self {
        self.account_hash = Some(hash.into());
        self
    }
}

// =============================================================================
// SchwabClient
// =============================================================================

/// Schwab market data and trader API client.
///
/// All requests are rate-limited and authenticated. Expired tokens (401)
/// trigger one forced refresh; 429, 5xx and network failures back off and
/// retry up to `max_attempts`.
pub struct SchwabClient {
    config: SchwabClientConfig,
    http: Client,
    rate_limiter: Arc<
        RateLimiter<
            governor::state::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,
    auth: SchwabAuth,
    account_hash: OnceCell<String>,
}

impl std::fmt::Debug for SchwabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchwabClient")
            .field("base_url", &self.config.base_url)
            .field("requests_per_minute", &self.config.requests_per_minute)
            .finish_non_exhaustive()
    }
}

impl SchwabClient {
    /// Creates a new client.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: SchwabClientConfig, auth_config: SchwabAuthConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SchwabError::Network(format!("failed to build HTTP client: {e}")))?;

        let quota = Quota::per_minute(config.requests_per_minute);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));
        let auth = SchwabAuth::new(auth_config, http.clone());

        Ok(Self {
            config,
            http,
            rate_limiter,
            auth,
            account_hash: OnceCell::new(),
        })
    }

    /// Creates a client from application configuration.
    ///
    /// # Errors
    /// Returns error if credentials are missing or the HTTP client cannot be built.
    pub fn from_app_config(config: &SchwabConfig) -> Result<Self> {
        Self::new(
            SchwabClientConfig::from_config(config),
            SchwabAuthConfig::from_config(config)?,
        )
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Rejects account hashes that could escape the URL path.
    fn validate_identifier(id: &str) -> Result<&str> {
        if id.is_empty() || id.len() > 128 {
            return Err(SchwabError::Account(format!(
                "invalid account hash length: {}",
                id.len()
            )));
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(SchwabError::Account(
                "invalid account hash: must be alphanumeric, hyphen, or underscore".to_string(),
            ));
        }
        Ok(id)
    }

    /// Authenticated GET with retries. `Ok(None)` means 404.
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Option<Value>> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut attempt = 1;

        loop {
            self.rate_limiter.until_ready().await;
            let token = self.auth.access_token().await?;
            debug!(%url, attempt, "GET");

            let outcome = match self
                .http
                .get(&url)
                .bearer_auth(&token)
                .header("Accept", "application/json")
                .query(query)
                .send()
                .await
            {
                Ok(response) => Self::handle_response(response).await,
                Err(e) => Err(SchwabError::from(e)),
            };

            let err = match outcome {
                Ok(body) => return Ok(body),
                Err(err) => err,
            };
            if attempt >= self.config.max_attempts {
                return Err(err);
            }

            if err.is_unauthorized() {
                warn!(%url, "Schwab 401; refreshing token and retrying");
                self.auth.force_refresh().await?;
            } else if err.is_transient() {
                let delay = match &err {
                    SchwabError::RateLimit { retry_after_secs } => {
                        Duration::from_secs(*retry_after_secs)
                    }
                    _ => self.config.retry_base_delay * 2u32.pow(attempt - 1),
                };
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                warn!(%url, attempt, error = %err, delay_ms, "Transient Schwab error; backing off");
                tokio::time::sleep(delay).await;
            } else {
                return Err(err);
            }
            attempt += 1;
        }
    }

    /// Converts a response into JSON. 404 maps to `None`, an empty body to
    /// `Value::Null`.
    async fn handle_response(response: reqwest::Response) -> Result<Option<Value>> {
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(2);
            return Err(SchwabError::rate_limit(retry_after));
        }
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SchwabError::api(status.as_u16(), text));
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Some(Value::Null));
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    // =========================================================================
    // Market Data
    // =========================================================================

    /// Fetches a single-right option chain.
    ///
    /// # Errors
    /// Returns error if the request fails after retries.
    pub async fn get_option_chain(
        &self,
        symbol: &str,
        right: OptionRight,
        strike_count: u32,
    ) -> Result<Option<OptionChain>> {
        let symbol = normalize_ticker(symbol);
        let query = [
            ("symbol", symbol.clone()),
            ("contractType", right.contract_type().to_string()),
            ("strikeCount", strike_count.to_string()),
        ];
        let Some(payload) = self.get_json("/marketdata/v1/chains", &query).await? else {
            debug!(symbol = %symbol, "No option chain (404)");
            return Ok(None);
        };

        let chain = parse_option_chain(&symbol, payload);
        if let Some(chain) = &chain {
            debug!(
                symbol = %symbol,
                contracts = chain.contracts.len(),
                expirations = chain.expirations.len(),
                "Fetched option chain"
            );
        }
        Ok(chain)
    }

    // =========================================================================
    // Trader
    // =========================================================================

    /// Lists account number to hash mappings.
    ///
    /// # Errors
    /// Returns error if the request fails after retries.
    pub async fn account_numbers(&self) -> Result<Vec<AccountNumber>> {
        let payload = self
            .get_json("/trader/v1/accounts/accountNumbers", &[])
            .await?
            .unwrap_or(Value::Null);
        if !payload.is_array() {
            warn!("Unexpected accountNumbers payload; expected a list");
            return Ok(Vec::new());
        }
        Ok(serde_json::from_value(payload)?)
    }

    /// The configured account hash, else the first linked account's hash.
    /// The result is cached for the client's lifetime.
    ///
    /// # Errors
    /// Returns an account error if no account is linked.
    pub async fn resolve_account_hash(&self) -> Result<String> {
        if let Some(hash) = &self.config.account_hash {
            return Ok(hash.clone());
        }
        self.account_hash
            .get_or_try_init(|| async {
                let accounts = self.account_numbers().await?;
                if accounts.len() > 1 {
                    warn!(count = accounts.len(), "Multiple Schwab accounts; using the first");
                }
                let hash = accounts
                    .into_iter()
                    .map(|a| a.hash_value)
                    .find(|h| !h.is_empty())
                    .ok_or_else(|| SchwabError::Account("no linked accounts returned".to_string()))?;
                info!("Resolved Schwab account hash");
                Ok::<String, SchwabError>(hash)
            })
            .await
            .cloned()
    }

    /// Fetches an account, optionally including positions.
    ///
    /// # Errors
    /// Returns error if the account does not exist or the request fails.
    pub async fn get_account(&self, hash: &str, with_positions: bool) -> Result<AccountSnapshot> {
        let hash = Self::validate_identifier(hash)?;
        let query: Vec<(&str, String)> = if with_positions {
            vec![("fields", "positions".to_string())]
        } else {
            Vec::new()
        };
        let payload = self
            .get_json(&format!("/trader/v1/accounts/{hash}"), &query)
            .await?
            .ok_or_else(|| SchwabError::Account("account not found".to_string()))?;
        Ok(AccountSnapshot::from_payload(payload))
    }

    /// Resolves the account and fetches it with positions.
    ///
    /// # Errors
    /// Returns error if resolution or the fetch fails.
    pub async fn account_snapshot(&self) -> Result<(String, AccountSnapshot)> {
        let hash = self.resolve_account_hash().await?;
        let snapshot = self.get_account(&hash, true).await?;
        Ok((hash, snapshot))
    }
}

#[async_trait]
impl OptionChainProvider for SchwabClient {
    async fn option_chain(
        &self,
        symbol: &str,
        right: OptionRight,
        strike_count: u32,
    ) -> anyhow::Result<Option<OptionChain>> {
        Ok(self.get_option_chain(symbol, right, strike_count).await?)
    }
}

#[async_trait]
impl PositionProvider for SchwabClient {
    async fn equity_lots(&self, min_shares: i64) -> anyhow::Result<Vec<EquityLot>> {
        let (_, snapshot) = self.account_snapshot().await?;
        Ok(snapshot.equity_lots(min_shares))
    }
}
