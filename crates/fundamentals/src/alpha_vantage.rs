//! Alpha Vantage RSI client.
//!
//! The free tier allows about 5 requests a minute and 25 a day. Alpha
//! Vantage answers throttled requests with HTTP 200 and a `Note` or
//! `Information` message, which is surfaced as [`FmpError::RateLimit`] so
//! callers can stop for the day.

use crate::error::{FmpError, Result};
use crate::redact_apikey;
use crate::types::value_f64;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use wheel_core::symbols::normalize_ticker;
use wheel_core::AlphaVantageConfig;

pub const ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co";

const RSI_SERIES_KEY: &str = "Technical Analysis: RSI";

#[derive(Clone)]
pub struct AlphaVantageClientConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub requests_per_minute: NonZeroU32,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
}

impl std::fmt::Debug for AlphaVantageClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlphaVantageClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("requests_per_minute", &self.requests_per_minute)
            .finish_non_exhaustive()
    }
}

impl AlphaVantageClientConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: ALPHA_VANTAGE_URL.to_string(),
            api_key: SecretString::from(api_key.into()),
            requests_per_minute: nonzero!(5u32),
            timeout_secs: 30,
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(2),
        }
    }

    /// # Errors
    /// Returns a configuration error when `ALPHA_VANTAGE_API_KEY` is empty.
    pub fn from_config(config: &AlphaVantageConfig) -> Result<Self> {
        let key = config.api_key.trim();
        if key.is_empty() {
            return Err(FmpError::Configuration(
                "missing ALPHA_VANTAGE_API_KEY".to_string(),
            ));
        }
        let mut out = Self::new(key);
        out.base_url = config.base_url.trim_end_matches('/').to_string();
        out.requests_per_minute =
            NonZeroU32::new(config.requests_per_minute).unwrap_or(nonzero!(5u32));
        out.timeout_secs = config.timeout_secs;
        Ok(out)
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
}

/// Maps FMP-style timeframes onto Alpha Vantage intervals (`1day` becomes
/// `daily`); anything else passes through.
#[must_use]
pub fn av_interval(interval: &str) -> String {
    match interval.trim().to_ascii_lowercase().as_str() {
        "1day" | "daily" => "daily".to_string(),
        "1week" | "weekly" => "weekly".to_string(),
        "1month" | "monthly" => "monthly".to_string(),
        other => other.to_string(),
    }
}

/// Extracts the newest RSI value from an indicator payload.
///
/// # Errors
/// Returns `RateLimit` for throttle notices.
pub fn parse_rsi_payload(symbol: &str, data: &Value) -> Result<Option<f64>> {
    if let Some(note) = data
        .get("Note")
        .or_else(|| data.get("Information"))
        .and_then(Value::as_str)
    {
        let note: String = note.chars().take(200).collect();
        warn!(symbol, note = %note, "Alpha Vantage throttled the request");
        return Err(FmpError::rate_limit(60));
    }
    if let Some(message) = data.get("Error Message").and_then(Value::as_str) {
        warn!(symbol, message, "Alpha Vantage rejected RSI request");
        return Ok(None);
    }

    let Some(series) = data.get(RSI_SERIES_KEY).and_then(Value::as_object) else {
        debug!(symbol, "No RSI series in response");
        return Ok(None);
    };
    // ISO date keys sort chronologically
    let latest = series.keys().max().and_then(|k| series.get(k));
    Ok(latest
        .and_then(|point| point.get("RSI"))
        .and_then(value_f64))
}

pub struct AlphaVantageClient {
    config: AlphaVantageClientConfig,
    http: Client,
    rate_limiter: Arc<
        RateLimiter<
            governor::state::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,
}

impl std::fmt::Debug for AlphaVantageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlphaVantageClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AlphaVantageClient {
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: AlphaVantageClientConfig) -> Result<Self> {
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
    pub fn from_app_config(config: &AlphaVantageConfig) -> Result<Self> {
        Self::new(AlphaVantageClientConfig::from_config(config)?)
    }

    /// Latest RSI for `symbol`. `interval` accepts Alpha Vantage names
    /// (`daily`, `60min`) or FMP timeframes (`1day`).
    ///
    /// # Errors
    /// Returns `RateLimit` when throttled; other HTTP failures after retries.
    pub async fn rsi(&self, symbol: &str, interval: &str, period: u32) -> Result<Option<f64>> {
        let symbol = normalize_ticker(symbol);
        let url = format!("{}/query", self.config.base_url);
        let params = [
            ("function", "RSI".to_string()),
            ("symbol", symbol.clone()),
            ("interval", av_interval(interval)),
            ("time_period", period.to_string()),
            ("series_type", "close".to_string()),
        ];
        let mut attempt = 1;

        loop {
            self.rate_limiter.until_ready().await;
            let request = self
                .http
                .get(&url)
                .query(&params)
                .query(&[("apikey", self.config.api_key.expose_secret())])
                .build()?;
            debug!(url = %redact_apikey(request.url().as_str()), attempt, "GET");

            let outcome: Result<Value> = match self.http.execute(request).await {
                Ok(response) if response.status().is_success() => {
                    response.json::<Value>().await.map_err(FmpError::from)
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    Err(FmpError::api(status.as_u16(), text))
                }
                Err(e) => Err(FmpError::from(e)),
            };
            let err = match outcome {
                Ok(data) => return parse_rsi_payload(&symbol, &data),
                Err(err) => err,
            };

            if !err.is_transient() || attempt >= self.config.max_attempts {
                return Err(err);
            }
            let delay = self
                .config
                .retry_base_delay
                .saturating_mul(2u32.saturating_pow(attempt - 1));
            warn!(symbol = %symbol, attempt, error = %err, "Transient Alpha Vantage error; backing off");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> AlphaVantageClient {
        AlphaVantageClient::new(
            AlphaVantageClientConfig::new("av-key")
                .with_base_url(server.uri())
                .with_rate_limit(nonzero!(600u32))
                .with_retry_base_delay(Duration::from_millis(5)),
        )
        .unwrap()
    }

    #[test]
    fn test_interval_mapping() {
        assert_eq!(av_interval("1day"), "daily");
        assert_eq!(av_interval("weekly"), "weekly");
        assert_eq!(av_interval("60min"), "60min");
    }

    #[test]
    fn test_parse_picks_newest_point() {
        let data = json!({
            "Meta Data": {},
            "Technical Analysis: RSI": {
                "2025-06-02": { "RSI": "61.8732" },
                "2025-05-30": { "RSI": "58.0000" },
                "2025-05-29": { "RSI": "55.1000" }
            }
        });
        assert_eq!(parse_rsi_payload("AAPL", &data).unwrap(), Some(61.8732));
    }

    #[test]
    fn test_parse_throttle_and_errors() {
        let note = json!({ "Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute" });
        assert!(matches!(
            parse_rsi_payload("AAPL", &note),
            Err(FmpError::RateLimit { .. })
        ));
        let info = json!({ "Information": "We have detected your API key and our standard API rate limit is 25 requests per day." });
        assert!(parse_rsi_payload("AAPL", &info).is_err());

        let bad = json!({ "Error Message": "Invalid API call" });
        assert_eq!(parse_rsi_payload("XXXX", &bad).unwrap(), None);
        assert_eq!(parse_rsi_payload("XXXX", &json!({})).unwrap(), None);
    }

    #[tokio::test]
    async fn test_rsi_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("function", "RSI"))
            .and(query_param("symbol", "MSFT"))
            .and(query_param("interval", "daily"))
            .and(query_param("time_period", "14"))
            .and(query_param("apikey", "av-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Technical Analysis: RSI": { "2025-06-02": { "RSI": "44.5" } }
            })))
            .mount(&server)
            .await;

        let rsi = client(&server).rsi("msft", "1day", 14).await.unwrap();
        assert_eq!(rsi, Some(44.5));
    }

    #[tokio::test]
    async fn test_throttle_payload_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "Information": "rate limit is 25 requests per day" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        // RateLimit is transient, but the parse result is returned directly
        let err = client(&server).rsi("AAPL", "daily", 14).await.unwrap_err();
        assert!(matches!(err, FmpError::RateLimit { .. }));
    }
}
