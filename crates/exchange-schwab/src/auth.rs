//! OAuth refresh-token authentication for the Schwab APIs.
//!
//! Schwab issues short-lived access tokens (about 30 minutes) from a
//! long-lived refresh token. The token endpoint expects HTTP Basic auth with
//! the app's client id and secret.
//!
//! # Security
//!
//! - Client secret and refresh token are held as [`SecretString`]
//! - Tokens are NEVER logged

use crate::error::{Result, SchwabError};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};
use wheel_core::SchwabConfig;

/// Access tokens are treated as expired this long before Schwab says so.
pub const TOKEN_EXPIRY_BUFFER_SECS: u64 = 60;

/// Lifetime assumed when the token response omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: u64 = 1800;

/// Credentials for the refresh-token grant.
#[derive(Clone)]
pub struct SchwabAuthConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub refresh_token: SecretString,
}

impl std::fmt::Debug for SchwabAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchwabAuthConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

impl SchwabAuthConfig {
    /// Builds auth settings from application config.
    ///
    /// # Errors
    /// Returns a configuration error naming any missing credential.
    pub fn from_config(config: &SchwabConfig) -> Result<Self> {
        let missing: Vec<&str> = [
            ("SCHWAB_CLIENT_ID", &config.client_id),
            ("SCHWAB_CLIENT_SECRET", &config.client_secret),
            ("SCHWAB_REFRESH_TOKEN", &config.refresh_token),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect();

        if !missing.is_empty() {
            return Err(SchwabError::Configuration(format!(
                "missing Schwab credentials: {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            token_url: format!("{}/v1/oauth/token", config.base_url.trim_end_matches('/')),
            client_id: config.client_id.trim().to_string(),
            client_secret: SecretString::from(config.client_secret.trim().to_string()),
            refresh_token: SecretString::from(config.refresh_token.trim().to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

struct CachedToken {
    value: SecretString,
    refresh_after: Instant,
}

/// Refresh-token authenticator with an in-memory token cache.
///
/// Concurrent callers share one refresh: the cache sits behind an async
/// mutex that is held across the token request.
pub struct SchwabAuth {
    config: SchwabAuthConfig,
    http: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for SchwabAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchwabAuth")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SchwabAuth {
    #[must_use]
    pub fn new(config: SchwabAuthConfig, http: Client) -> Self {
        Self {
            config,
            http,
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid access token, refreshing when the cached one is
    /// missing or inside the expiry buffer.
    ///
    /// # Errors
    /// Returns an authentication error if the refresh fails.
    pub async fn access_token(&self) -> Result<String> {
        let mut guard = self.cached.lock().await;
        if let Some(token) = guard.as_ref() {
            if Instant::now() < token.refresh_after {
                return Ok(token.value.expose_secret().to_string());
            }
        }
        let token = self.refresh().await?;
        let value = token.value.expose_secret().to_string();
        *guard = Some(token);
        Ok(value)
    }

    /// Drops the cached token and fetches a new one (used after a 401).
    ///
    /// # Errors
    /// Returns an authentication error if the refresh fails.
    pub async fn force_refresh(&self) -> Result<String> {
        let mut guard = self.cached.lock().await;
        *guard = None;
        let token = self.refresh().await?;
        let value = token.value.expose_secret().to_string();
        *guard = Some(token);
        Ok(value)
    }

    async fn refresh(&self) -> Result<CachedToken> {
        debug!(url = %self.config.token_url, "Refreshing Schwab access token");

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.config.refresh_token.expose_secret()),
        ];
        let response = self
            .http
            .post(&self.config.token_url)
            .basic_auth(
                &self.config.client_id,
                Some(self.config.client_secret.expose_secret()),
            )
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(300).collect();
            return Err(SchwabError::Authentication(format!(
                "token refresh failed: {} {}",
                status.as_u16(),
                body
            )));
        }

        let payload: TokenResponse = response.json().await?;
        let access_token = payload
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                SchwabError::Authentication("token response missing access_token".to_string())
            })?;
        let expires_in = payload.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let lifetime = expires_in.saturating_sub(TOKEN_EXPIRY_BUFFER_SECS);

        info!(expires_in, "Schwab access token refreshed");
        Ok(CachedToken {
            value: SecretString::from(access_token),
            refresh_after: Instant::now() + Duration::from_secs(lifetime),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base: &str) -> SchwabConfig {
        SchwabConfig {
            base_url: base.to_string(),
            client_id: "app-id".to_string(),
            client_secret: "app-secret".to_string(),
            refresh_token: "refresh-me".to_string(),
            ..SchwabConfig::default()
        }
    }

    #[test]
    fn test_missing_credentials_are_named() {
        let cfg = SchwabConfig {
            client_id: "id".to_string(),
            ..SchwabConfig::default()
        };
        let err = SchwabAuthConfig::from_config(&cfg).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("SCHWAB_CLIENT_SECRET"));
        assert!(msg.contains("SCHWAB_REFRESH_TOKEN"));
        assert!(!msg.contains("SCHWAB_CLIENT_ID"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let auth = SchwabAuthConfig::from_config(&config("https://api.schwabapi.com")).unwrap();
        let debug = format!("{auth:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("app-secret"));
        assert!(!debug.contains("refresh-me"));
        assert_eq!(auth.token_url, "https://api.schwabapi.com/v1/oauth/token");
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/oauth/token"))
            .and(header_exists("authorization"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "expires_in": 1800
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = SchwabAuth::new(
            SchwabAuthConfig::from_config(&config(&server.uri())).unwrap(),
            Client::new(),
        );
        assert_eq!(auth.access_token().await.unwrap(), "tok-1");
        assert_eq!(auth.access_token().await.unwrap(), "tok-1");
    }

    #[tokio::test]
    async fn test_short_lived_token_is_refreshed() {
        let server = MockServer::start().await;
        // Lifetime inside the buffer expires immediately
        Mock::given(method("POST"))
            .and(path("/v1/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok",
                "expires_in": 30
            })))
            .expect(2)
            .mount(&server)
            .await;

        let auth = SchwabAuth::new(
            SchwabAuthConfig::from_config(&config(&server.uri())).unwrap(),
            Client::new(),
        );
        auth.access_token().await.unwrap();
        auth.access_token().await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_failure_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let auth = SchwabAuth::new(
            SchwabAuthConfig::from_config(&config(&server.uri())).unwrap(),
            Client::new(),
        );
        let err = auth.access_token().await.unwrap_err();
        assert!(matches!(err, SchwabError::Authentication(_)));
        assert!(err.to_string().contains("invalid_grant"));
    }
}
