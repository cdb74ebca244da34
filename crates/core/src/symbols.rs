//! Ticker symbol normalisation for API integrations.

/// Upper-cases and trims a ticker.
#[must_use]
pub fn normalize_ticker(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// FMP expects class shares with a hyphen: `BRK.B` becomes `BRK-B`.
#[must_use]
pub fn normalize_for_fmp(symbol: &str) -> String {
    normalize_ticker(symbol).replace('.', "-")
}

/// Valid ticker: 1-10 chars of letters, digits, `.` or `-`.
#[must_use]
pub fn is_valid_ticker(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol.len() <= 10
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}
