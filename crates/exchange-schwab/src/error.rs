//! Error types for the Schwab integration.

use thiserror::Error;

/// Errors that can occur when talking to Schwab.
#[derive(Debug, Error)]
pub enum SchwabError {
    /// OAuth token refresh failed or credentials are missing.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// API request failed.
    #[error("API error: {status_code} - {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error body (truncated).
        message: String,
    },

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimit {
        /// Seconds to wait before retry.
        retry_after_secs: u64,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timeout: {0}")]
    Timeout(String),

    /// No linked account, or the account payload was unusable.
    #[error("account error: {0}")]
    Account(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Longest error body kept in an [`SchwabError::Api`] message.
const MAX_BODY_CHARS: usize = 300;

impl SchwabError {
    /// Creates an API error, truncating long response bodies.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Api {
            status_code,
            message: message.chars().take(MAX_BODY_CHARS).collect(),
        }
    }

    pub fn rate_limit(retry_after_secs: u64) -> Self {
        Self::RateLimit { retry_after_secs }
    }

    /// Returns true if the error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::RateLimit { .. }
        )
    }

    /// Returns true if the request should be retried later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimit { .. } => true,
            Self::Api { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    /// True when the access token was rejected.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status_code: 401, .. })
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimit { retry_after_secs } => Some(*retry_after_secs),
            Self::Network(_) | Self::Timeout(_) => Some(1),
            Self::Api { status_code, .. } if *status_code >= 500 => Some(2),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SchwabError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else if err.is_decode() {
            Self::Serialization(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SchwabError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for Schwab operations.
pub type Result<T> = std::result::Result<T, SchwabError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_truncates_body() {
        let err = SchwabError::api(400, "x".repeat(1000));
        match err {
            SchwabError::Api {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 400);
                assert_eq!(message.len(), MAX_BODY_CHARS);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(SchwabError::rate_limit(5).is_retryable());
        assert!(SchwabError::Network("reset".into()).is_transient());
        assert!(SchwabError::api(503, "unavailable").is_transient());
        assert!(!SchwabError::api(503, "unavailable").is_retryable());
        assert!(!SchwabError::api(404, "missing").is_transient());
        assert!(!SchwabError::Authentication("bad".into()).is_transient());
    }

    #[test]
    fn test_unauthorized() {
        assert!(SchwabError::api(401, "expired").is_unauthorized());
        assert!(!SchwabError::api(403, "forbidden").is_unauthorized());
    }

    #[test]
    fn test_retry_delays() {
        assert_eq!(SchwabError::rate_limit(30).retry_delay_secs(), Some(30));
        assert_eq!(SchwabError::Timeout("slow".into()).retry_delay_secs(), Some(1));
        assert_eq!(SchwabError::api(502, "bad gateway").retry_delay_secs(), Some(2));
        assert_eq!(SchwabError::api(400, "bad").retry_delay_secs(), None);
    }
}
