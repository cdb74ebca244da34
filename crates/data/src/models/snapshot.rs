//! Daily RSI and implied-volatility snapshots.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A row of `rsi_snapshots`. `rsi` is null when the fetch failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RsiSnapshot {
    pub ticker: String,
    pub as_of_date: NaiveDate,
    pub interval: String,
    pub period: i32,
    pub rsi: Option<f64>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl RsiSnapshot {
    #[must_use]
    pub fn new(
        ticker: &str,
        as_of_date: NaiveDate,
        interval: &str,
        period: i32,
        rsi: Option<f64>,
    ) -> Self {
        Self {
            ticker: ticker.trim().to_uppercase(),
            as_of_date,
            interval: interval.to_string(),
            period,
            rsi,
            source: "alpha_vantage".to_string(),
            created_at: Utc::now(),
        }
    }
}

/// A row of `iv_snapshots`: ATM put IV (fraction) for one symbol and day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IvSnapshot {
    pub symbol: String,
    pub asof_date: NaiveDate,
    pub exp_date: NaiveDate,
    pub dte: i32,
    pub strike: Decimal,
    pub underlying_price: Decimal,
    pub iv: f64,
    pub source: String,
}
