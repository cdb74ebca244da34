//! Screener output: ticker reference rows, ranked candidates and the
//! approved universe.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A row of `tickers`, refreshed by every weekly screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TickerRecord {
    pub ticker: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub currency: String,
    pub is_active: bool,
    /// Latest screening metrics (`earnings_in_days`, scores).
    pub metrics: JsonValue,
}

impl TickerRecord {
    #[must_use]
    pub fn new(ticker: &str) -> Self {
        Self {
            ticker: ticker.trim().to_uppercase(),
            name: None,
            exchange: None,
            sector: None,
            industry: None,
            market_cap: None,
            currency: "USD".to_string(),
            is_active: true,
            metrics: JsonValue::Object(serde_json::Map::new()),
        }
    }

    /// Earnings date implied by `metrics.earnings_in_days`.
    #[must_use]
    pub fn earnings_date_from(&self, today: NaiveDate) -> Option<NaiveDate> {
        earnings_from_days(positive_days(self.metrics.get("earnings_in_days")), today)
    }
}

/// A ranked row of `screening_candidates`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CandidateRecord {
    pub run_id: i64,
    pub ticker: String,
    /// 1-based position in the run.
    pub rank: i32,
    /// Wheel score, 0-100.
    pub score: i32,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub beta: Option<f64>,
    pub rsi: Option<f64>,
    pub iv: Option<f64>,
    pub iv_rank: Option<f64>,
    pub earn_in_days: Option<i32>,
    pub earnings_date: Option<NaiveDate>,
    pub sentiment_score: Option<i32>,
    /// Component scores, reasons and the raw features behind them.
    pub metrics: JsonValue,
}

impl CandidateRecord {
    #[must_use]
    pub fn new(run_id: i64, ticker: &str, rank: i32, score: i32) -> Self {
        Self {
            run_id,
            ticker: ticker.trim().to_uppercase(),
            rank,
            score,
            price: None,
            market_cap: None,
            sector: None,
            industry: None,
            beta: None,
            rsi: None,
            iv: None,
            iv_rank: None,
            earn_in_days: None,
            earnings_date: None,
            sentiment_score: None,
            metrics: JsonValue::Object(serde_json::Map::new()),
        }
    }

    /// Numeric value stored under `metrics[key]`.
    #[must_use]
    pub fn metric_f64(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).and_then(JsonValue::as_f64)
    }

    /// Next earnings date: the stored date, else `earn_in_days` or
    /// `metrics.earnings_in_days` counted from `today`.
    #[must_use]
    pub fn earnings_date_from(&self, today: NaiveDate) -> Option<NaiveDate> {
        if self.earnings_date.is_some() {
            return self.earnings_date;
        }
        let days = self
            .earn_in_days
            .map(i64::from)
            .filter(|d| *d > 0)
            .or_else(|| positive_days(self.metrics.get("earnings_in_days")));
        earnings_from_days(days, today)
    }
}

/// A ticker kept in `approved_universe` after a screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApprovedTicker {
    pub ticker: String,
    pub last_rank: i32,
    pub last_score: i32,
}

fn positive_days(value: Option<&JsonValue>) -> Option<i64> {
    value
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64)))
        .filter(|d| *d > 0)
}

fn earnings_from_days(days: Option<i64>, today: NaiveDate) -> Option<NaiveDate> {
    days.map(|d| today + Duration::days(d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    #[test]
    fn test_candidate_earnings_prefers_stored_date() {
        let mut c = CandidateRecord::new(7, " aapl ", 1, 80);
        assert_eq!(c.ticker, "AAPL");
        assert_eq!(c.earnings_date_from(today()), None);

        c.metrics = json!({"earnings_in_days": 9});
        assert_eq!(
            c.earnings_date_from(today()),
            NaiveDate::from_ymd_opt(2025, 3, 12)
        );

        c.earn_in_days = Some(4);
        assert_eq!(
            c.earnings_date_from(today()),
            NaiveDate::from_ymd_opt(2025, 3, 7)
        );

        c.earnings_date = NaiveDate::from_ymd_opt(2025, 4, 1);
        assert_eq!(c.earnings_date_from(today()), c.earnings_date);
    }

    #[test]
    fn test_non_positive_days_are_ignored() {
        let mut c = CandidateRecord::new(7, "MSFT", 2, 70);
        c.earn_in_days = Some(0);
        c.metrics = json!({"earnings_in_days": -3});
        assert_eq!(c.earnings_date_from(today()), None);
    }

    #[test]
    fn test_ticker_metrics_earnings() {
        let mut t = TickerRecord::new("ko");
        assert_eq!(t.earnings_date_from(today()), None);
        t.metrics = json!({"earnings_in_days": 2.0});
        assert_eq!(
            t.earnings_date_from(today()),
            NaiveDate::from_ymd_opt(2025, 3, 5)
        );
    }

    #[test]
    fn test_metric_lookup() {
        let mut c = CandidateRecord::new(1, "KO", 1, 60);
        c.metrics = json!({"fundamentals_score": 72, "note": "x"});
        assert_eq!(c.metric_f64("fundamentals_score"), Some(72.0));
        assert_eq!(c.metric_f64("note"), None);
    }
}
