//! Async seams over the market-data clients so jobs can run against fakes.

use anyhow::Result;
use async_trait::async_trait;
use wheel_fundamentals::{
    AlphaVantageClient, CompanyProfile, FmpClient, FmpError, KeyMetricsTtm, NewsItem, Quote,
    RatiosTtm, ScreenerCompany, ScreenerFilters,
};

/// Company data used by the weekly screen (FMP in production).
#[async_trait]
pub trait FundamentalsSource: Send + Sync {
    async fn company_screener(
        &self,
        exchange: &str,
        limit: u32,
        filters: &ScreenerFilters,
    ) -> Result<Vec<ScreenerCompany>>;
    async fn profile(&self, symbol: &str) -> Result<Option<CompanyProfile>>;
    async fn quote(&self, symbol: &str) -> Result<Option<Quote>>;
    async fn ratios_ttm(&self, symbol: &str) -> Result<Option<RatiosTtm>>;
    async fn key_metrics_ttm(&self, symbol: &str) -> Result<Option<KeyMetricsTtm>>;
    async fn stock_news(&self, symbol: &str, limit: u32) -> Result<Vec<NewsItem>>;
}

/// Latest RSI reading for a symbol.
#[async_trait]
pub trait RsiSource: Send + Sync {
    /// Short provider name stored with each snapshot.
    fn name(&self) -> &'static str;

    async fn rsi(&self, symbol: &str, interval: &str, period: u32) -> Result<Option<f64>>;
}

/// True when the provider told us to stop calling for now.
#[must_use]
pub fn is_rate_limited(err: &anyhow::Error) -> bool {
    err.downcast_ref::<FmpError>()
        .is_some_and(|e| matches!(e, FmpError::RateLimit { .. }))
}

#[async_trait]
impl FundamentalsSource for FmpClient {
    async fn company_screener(
        &self,
        exchange: &str,
        limit: u32,
        filters: &ScreenerFilters,
    ) -> Result<Vec<ScreenerCompany>> {
        Ok(FmpClient::company_screener(self, exchange, limit, filters).await?)
    }

    async fn profile(&self, symbol: &str) -> Result<Option<CompanyProfile>> {
        Ok(FmpClient::profile(self, symbol).await?)
    }

    async fn quote(&self, symbol: &str) -> Result<Option<Quote>> {
        Ok(FmpClient::quote(self, symbol).await?)
    }

    async fn ratios_ttm(&self, symbol: &str) -> Result<Option<RatiosTtm>> {
        Ok(FmpClient::ratios_ttm(self, symbol).await?)
    }

    async fn key_metrics_ttm(&self, symbol: &str) -> Result<Option<KeyMetricsTtm>> {
        Ok(FmpClient::key_metrics_ttm(self, symbol).await?)
    }

    async fn stock_news(&self, symbol: &str, limit: u32) -> Result<Vec<NewsItem>> {
        Ok(FmpClient::stock_news(self, symbol, limit).await?)
    }
}

#[async_trait]
impl RsiSource for AlphaVantageClient {
    fn name(&self) -> &'static str {
        "alpha_vantage"
    }

    async fn rsi(&self, symbol: &str, interval: &str, period: u32) -> Result<Option<f64>> {
        Ok(AlphaVantageClient::rsi(self, symbol, interval, period).await?)
    }
}

#[async_trait]
impl RsiSource for FmpClient {
    fn name(&self) -> &'static str {
        "fmp"
    }

    async fn rsi(&self, symbol: &str, interval: &str, period: u32) -> Result<Option<f64>> {
        Ok(FmpClient::rsi(self, symbol, period, interval).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_detection() {
        let throttled: anyhow::Error = FmpError::rate_limit(60).into();
        assert!(is_rate_limited(&throttled));

        let other: anyhow::Error = FmpError::api(500, "boom").into();
        assert!(!is_rate_limited(&other));
        assert!(!is_rate_limited(&anyhow::anyhow!("plain")));
    }
}
