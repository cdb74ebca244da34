//! Market-data clients used by the weekly screen and the RSI snapshot.
//!
//! - [`fmp`]: Financial Modeling Prep stable API (universe, fundamentals,
//!   news, earnings, RSI)
//! - [`alpha_vantage`]: Alpha Vantage RSI with its tight free-tier quota

pub mod alpha_vantage;
pub mod error;
pub mod fmp;
pub mod types;

pub use alpha_vantage::{
    av_interval, parse_rsi_payload, AlphaVantageClient, AlphaVantageClientConfig,
};
pub use error::{FmpError, Result};
pub use fmp::{fmp_timeframe, FmpClient, FmpClientConfig, FMP_STABLE_URL};
pub use types::{
    CompanyProfile, KeyMetricsTtm, NewsItem, Quote, RatiosTtm, ScreenerCompany, ScreenerFilters,
};

/// Replaces the value of any `apikey=` query parameter with `REDACTED`.
#[must_use]
pub fn redact_apikey(text: &str) -> String {
    const NEEDLE: &str = "apikey=";
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(NEEDLE) {
        let value_start = pos + NEEDLE.len();
        out.push_str(&rest[..value_start]);
        out.push_str("REDACTED");
        let tail = &rest[value_start..];
        let value_end = tail
            .find(|c: char| c == '&' || c.is_whitespace() || c == ')')
            .unwrap_or(tail.len());
        rest = &tail[value_end..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_apikey() {
        assert_eq!(
            redact_apikey("https://x/stable/quote?symbol=AAPL&apikey=abc123"),
            "https://x/stable/quote?symbol=AAPL&apikey=REDACTED"
        );
        assert_eq!(
            redact_apikey("a?apikey=k1&limit=5 and b?apikey=k2"),
            "a?apikey=REDACTED&limit=5 and b?apikey=REDACTED"
        );
        assert_eq!(redact_apikey("no key here"), "no key here");
    }
}
