//! RSI and IV snapshot repository.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};

use crate::models::{IvSnapshot, RsiSnapshot};

/// Age after which a cached RSI is no longer used by the screener.
pub const RSI_MAX_AGE_HOURS: i64 = 24;

/// Repository for `rsi_snapshots` and `iv_snapshots`.
#[derive(Debug, Clone)]
pub struct SnapshotRepository {
    pool: PgPool,
}

impl SnapshotRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces the RSI for (ticker, day, interval, period).
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn upsert_rsi(&self, snapshot: &RsiSnapshot) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO rsi_snapshots (ticker, as_of_date, interval, period, rsi, source, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (ticker, as_of_date, interval, period) DO UPDATE
            SET rsi = EXCLUDED.rsi,
                source = EXCLUDED.source,
                created_at = EXCLUDED.created_at
            ",
        )
        .bind(&snapshot.ticker)
        .bind(snapshot.as_of_date)
        .bind(&snapshot.interval)
        .bind(snapshot.period)
        .bind(snapshot.rsi)
        .bind(&snapshot.source)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Tickers that already have a row for `as_of`, including failed fetches.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn rsi_cached_today(
        &self,
        as_of: NaiveDate,
        interval: &str,
        period: i32,
    ) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r"
            SELECT ticker FROM rsi_snapshots
            WHERE as_of_date = $1 AND interval = $2 AND period = $3
            ",
        )
        .bind(as_of)
        .bind(interval)
        .bind(period)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(t,)| t).collect())
    }

    /// RSI stored for `as_of`, if any.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn rsi_for_day(
        &self,
        ticker: &str,
        as_of: NaiveDate,
        interval: &str,
        period: i32,
    ) -> Result<Option<f64>> {
        let row: Option<(Option<f64>,)> = sqlx::query_as(
            r"
            SELECT rsi FROM rsi_snapshots
            WHERE ticker = $1 AND as_of_date = $2 AND interval = $3 AND period = $4
            ",
        )
        .bind(ticker)
        .bind(as_of)
        .bind(interval)
        .bind(period)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(rsi,)| rsi))
    }

    /// Newest non-null RSI written within the last 24 hours of `now`.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn latest_rsi(
        &self,
        ticker: &str,
        interval: &str,
        period: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<f64>> {
        let cutoff = now - Duration::hours(RSI_MAX_AGE_HOURS);
        let row: Option<(f64,)> = sqlx::query_as(
            r"
            SELECT rsi FROM rsi_snapshots
            WHERE ticker = $1 AND interval = $2 AND period = $3
              AND rsi IS NOT NULL AND created_at >= $4
            ORDER BY as_of_date DESC, created_at DESC
            LIMIT 1
            ",
        )
        .bind(ticker)
        .bind(interval)
        .bind(period)
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(rsi,)| rsi))
    }

    /// Newest non-null RSI per ticker written within 24 hours of `now`.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn latest_rsi_many(
        &self,
        interval: &str,
        period: i32,
        now: DateTime<Utc>,
    ) -> Result<HashMap<String, f64>> {
        let cutoff = now - Duration::hours(RSI_MAX_AGE_HOURS);
        let rows: Vec<(String, f64)> = sqlx::query_as(
            r"
            SELECT DISTINCT ON (ticker) ticker, rsi
            FROM rsi_snapshots
            WHERE interval = $1 AND period = $2 AND rsi IS NOT NULL AND created_at >= $3
            ORDER BY ticker, as_of_date DESC, created_at DESC
            ",
        )
        .bind(interval)
        .bind(period)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Inserts or replaces the IV snapshot for (symbol, day).
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn upsert_iv(&self, snapshot: &IvSnapshot) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO iv_snapshots
                (symbol, asof_date, exp_date, dte, strike, underlying_price, iv, source, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
            ON CONFLICT (symbol, asof_date) DO UPDATE
            SET exp_date = EXCLUDED.exp_date,
                dte = EXCLUDED.dte,
                strike = EXCLUDED.strike,
                underlying_price = EXCLUDED.underlying_price,
                iv = EXCLUDED.iv,
                source = EXCLUDED.source,
                created_at = now()
            ",
        )
        .bind(&snapshot.symbol)
        .bind(snapshot.asof_date)
        .bind(snapshot.exp_date)
        .bind(snapshot.dte)
        .bind(snapshot.strike)
        .bind(snapshot.underlying_price)
        .bind(snapshot.iv)
        .bind(&snapshot.source)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// IV values for `symbol` over the trailing `lookback_days`, oldest first.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn iv_history(
        &self,
        symbol: &str,
        lookback_days: i64,
        today: NaiveDate,
    ) -> Result<Vec<f64>> {
        let since = today - Duration::days(lookback_days.max(0));
        let rows: Vec<(f64,)> = sqlx::query_as(
            r"
            SELECT iv FROM iv_snapshots
            WHERE symbol = $1 AND asof_date >= $2 AND asof_date <= $3
            ORDER BY asof_date ASC
            ",
        )
        .bind(symbol)
        .bind(since)
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(iv,)| iv).collect())
    }
}
