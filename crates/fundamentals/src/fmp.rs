//! Financial Modeling Prep "stable" API client.
//!
//! Every request carries the API key as a query parameter, so URLs are
//! passed through [`redact_apikey`](crate::redact_apikey) before logging.

use crate::error::{FmpError, Result};
use crate::redact_apikey;
use crate::types::{
    first_f64, object_list, parse_date, single_object, CompanyProfile, KeyMetricsTtm, NewsItem,
    Quote, RatiosTtm, ScreenerCompany, ScreenerFilters,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use wheel_core::symbols::normalize_for_fmp;
use wheel_core::{EarningsProvider, FmpConfig};

/// FMP stable API base URL.
pub const FMP_STABLE_URL: &str = "https://financialmodelingprep.com/stable";

/// Configuration for the FMP client.
#[derive(Clone)]
pub struct FmpClientConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub requests_per_minute: NonZeroU32,
    pub timeout_secs: u64,
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
}

impl std::fmt::Debug for FmpClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FmpClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("requests_per_minute", &self.requests_per_minute)
            .finish_non_exhaustive()
    }
}

impl FmpClientConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: FMP_STABLE_URL.to_string(),
            api_key: SecretString::from(api_key.into()),
            requests_per_minute: nonzero!(300u32),
            timeout_secs: 30,
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(15),
        }
    }

    /// # Errors
    /// Returns a configuration error when `FMP_API_KEY` is empty.
    pub fn from_config(config: &FmpConfig) -> Result<Self> {
        let key = config.api_key.trim();
        if key.is_empty() {
            return Err(FmpError::Configuration("missing FMP_API_KEY".to_string()));
        }
        let mut out = Self::new(key);
        out.base_url = config.base_url.trim_end_matches('/').to_string();
        out.requests_per_minute =
            NonZeroU32::new(config.requests_per_minute).unwrap_or(nonzero!(300u32));
        out.timeout_secs = config.timeout_secs;
        Ok(out)
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_retry_delays(mut self, base: Duration, max: Duration) -> Self {
        self.retry_base_delay = base;
        self.retry_max_delay = max;
        self
    }
}

/// Maps RSI interval names onto FMP timeframes (`daily` becomes `1day`).
#[must_use]
pub fn fmp_timeframe(interval: &str) -> String {
    match interval.trim().to_ascii_lowercase().as_str() {
        "daily" | "1day" => "1day".to_string(),
        "weekly" | "1week" => "1week".to_string(),
        "monthly" | "1month" => "1month".to_string(),
        other => other.to_string(),
    }
}

pub struct FmpClient {
    config: FmpClientConfig,
    http: Client,
    rate_limiter: Arc<
        RateLimiter<
            governor::state::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,
}

impl std::fmt::Debug for FmpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FmpClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FmpClient {
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: FmpClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FmpError::Network(format!("failed to build HTTP client: {e}")))?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(
            config.requests_per_minute,
        )));
        Ok(Self {
            config,
            http,
            rate_limiter,
        })
    }

    /// # Errors
    /// Returns error if the API key is missing or the HTTP client cannot be built.
    pub fn from_app_config(config: &FmpConfig) -> Result<Self> {
        Self::new(FmpClientConfig::from_config(config)?)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .config
            .retry_base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        exp.min(self.config.retry_max_delay)
    }

    /// GET `{base}/{endpoint}` with retries. 404 maps to `Ok(None)`.
    async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Option<Value>> {
        let url = format!(
            "{}/{}",
            self.config.base_url,
            endpoint.trim_start_matches('/')
        );
        let mut attempt = 1;

        loop {
            self.rate_limiter.until_ready().await;
            let request = self
                .http
                .get(&url)
                .query(params)
                .query(&[("apikey", self.config.api_key.expose_secret())])
                .header("Accept", "application/json")
                .build()?;
            debug!(url = %redact_apikey(request.url().as_str()), attempt, "GET");

            let outcome = match self.http.execute(request).await {
                Ok(response) => Self::handle_response(response).await,
                Err(e) => Err(FmpError::from(e)),
            };
            let err = match outcome {
                Ok(body) => return Ok(body),
                Err(err) => err,
            };

            if !err.is_transient() || attempt >= self.config.max_attempts {
                return Err(err);
            }
            let delay = match &err {
                FmpError::RateLimit { retry_after_secs } => {
                    Duration::from_secs(*retry_after_secs).min(self.config.retry_max_delay)
                }
                _ => self.backoff(attempt),
            };
            warn!(endpoint, attempt, error = %err, "Transient FMP error; backing off");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn handle_response(response: reqwest::Response) -> Result<Option<Value>> {
        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(5);
            return Err(FmpError::rate_limit(retry_after));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FmpError::api(status.as_u16(), text));
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Some(Value::Null));
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    async fn get_object(&self, endpoint: &str, symbol: &str) -> Result<Option<Value>> {
        let symbol = normalize_for_fmp(symbol);
        Ok(self
            .get(endpoint, &[("symbol", symbol)])
            .await?
            .and_then(single_object))
    }

    /// Company screener for one exchange.
    ///
    /// # Errors
    /// Returns error if the request fails after retries.
    pub async fn company_screener(
        &self,
        exchange: &str,
        limit: u32,
        filters: &ScreenerFilters,
    ) -> Result<Vec<ScreenerCompany>> {
        let mut params = vec![
            ("exchange", exchange.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(v) = filters.min_price {
            params.push(("priceMoreThan", v.to_string()));
        }
        if let Some(v) = filters.min_market_cap {
            params.push(("marketCapMoreThan", format!("{v:.0}")));
        }
        if let Some(v) = filters.min_avg_volume {
            params.push(("volumeMoreThan", format!("{v:.0}")));
        }

        let data = self.get("company-screener", &params).await?;
        Ok(data
            .map(object_list)
            .unwrap_or_default()
            .iter()
            .filter_map(ScreenerCompany::from_value)
            .collect())
    }

    /// # Errors
    /// Returns error if the request fails after retries.
    pub async fn profile(&self, symbol: &str) -> Result<Option<CompanyProfile>> {
        Ok(self
            .get_object("profile", symbol)
            .await?
            .map(|v| CompanyProfile::from_value(symbol, v)))
    }

    /// # Errors
    /// Returns error if the request fails after retries.
    pub async fn quote(&self, symbol: &str) -> Result<Option<Quote>> {
        Ok(self
            .get_object("quote", symbol)
            .await?
            .map(|v| Quote::from_value(symbol, v)))
    }

    /// # Errors
    /// Returns error if the request fails after retries.
    pub async fn ratios_ttm(&self, symbol: &str) -> Result<Option<RatiosTtm>> {
        Ok(self
            .get_object("ratios-ttm", symbol)
            .await?
            .map(RatiosTtm::from_value))
    }

    /// # Errors
    /// Returns error if the request fails after retries.
    pub async fn key_metrics_ttm(&self, symbol: &str) -> Result<Option<KeyMetricsTtm>> {
        Ok(self
            .get_object("key-metrics-ttm", symbol)
            .await?
            .map(KeyMetricsTtm::from_value))
    }

    /// Latest headlines, newest first, at most `limit`.
    ///
    /// # Errors
    /// Returns error if the request fails after retries.
    pub async fn stock_news(&self, symbol: &str, limit: u32) -> Result<Vec<NewsItem>> {
        let params = [
            ("tickers", normalize_for_fmp(symbol)),
            ("limit", limit.to_string()),
        ];
        let data = self.get("stock-news", &params).await?;
        Ok(data
            .map(object_list)
            .unwrap_or_default()
            .iter()
            .filter_map(NewsItem::from_value)
            .take(limit as usize)
            .collect())
    }

    /// Earliest reported or scheduled earnings date on or after `today`.
    ///
    /// # Errors
    /// Returns error if the request fails after retries.
    pub async fn next_earnings_date(
        &self,
        symbol: &str,
        today: NaiveDate,
    ) -> Result<Option<NaiveDate>> {
        let data = self
            .get("earnings", &[("symbol", normalize_for_fmp(symbol))])
            .await?;
        Ok(data
            .map(object_list)
            .unwrap_or_default()
            .iter()
            .filter_map(|row| row.get("date").and_then(Value::as_str).and_then(parse_date))
            .filter(|d| *d >= today)
            .min())
    }

    /// Latest RSI from the technical indicators endpoint.
    ///
    /// # Errors
    /// Returns error if the request fails after retries.
    pub async fn rsi(&self, symbol: &str, period: u32, interval: &str) -> Result<Option<f64>> {
        let params = [
            ("symbol", normalize_for_fmp(symbol)),
            ("periodLength", period.to_string()),
            ("timeframe", fmp_timeframe(interval)),
        ];
        let data = self.get("technical-indicators/rsi", &params).await?;
        Ok(data
            .and_then(single_object)
            .and_then(|row| first_f64(&row, &["rsi", "RSI", "value"])))
    }
}

#[async_trait]
impl EarningsProvider for FmpClient {
    async fn next_earnings_date(
        &self,
        symbol: &str,
        today: NaiveDate,
    ) -> anyhow::Result<Option<NaiveDate>> {
        Ok(FmpClient::next_earnings_date(self, symbol, today).await?)
    }
}
