//! Error types for the market-data clients.

use thiserror::Error;

/// Errors from the FMP and Alpha Vantage clients.
#[derive(Debug, Error)]
pub enum FmpError {
    /// API request failed.
    #[error("API error: {status_code} - {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error body (truncated, API key redacted).
        message: String,
    },

    /// Rate limit exceeded. Alpha Vantage reports this in a 200 body.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimit {
        /// Seconds to wait before retry.
        retry_after_secs: u64,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timeout: {0}")]
    Timeout(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

const MAX_BODY_CHARS: usize = 300;

impl FmpError {
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        let message = crate::redact_apikey(&message.into());
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

impl From<reqwest::Error> for FmpError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest errors carry the URL, which includes the API key
        let msg = crate::redact_apikey(&err.to_string());
        if err.is_timeout() {
            Self::Timeout(msg)
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {msg}"))
        } else if err.is_decode() {
            Self::Serialization(msg)
        } else {
            Self::Network(msg)
        }
    }
}

impl From<serde_json::Error> for FmpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for market-data operations.
pub type Result<T> = std::result::Result<T, FmpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_redacts_key() {
        let err = FmpError::api(401, "bad key for https://x/quote?symbol=A&apikey=SECRET123");
        let msg = err.to_string();
        assert!(!msg.contains("SECRET123"));
        assert!(msg.contains("apikey=REDACTED"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(FmpError::api(500, "oops").is_transient());
        assert!(!FmpError::api(403, "forbidden").is_transient());
        assert!(FmpError::rate_limit(60).is_retryable());
        assert_eq!(FmpError::rate_limit(60).retry_delay_secs(), Some(60));
        assert_eq!(FmpError::Configuration("x".into()).retry_delay_secs(), None);
    }
}
