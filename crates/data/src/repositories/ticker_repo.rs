//! Ticker reference repository.

use anyhow::Result;
use sqlx::PgPool;

use crate::models::TickerRecord;

/// Repository for `tickers`.
#[derive(Debug, Clone)]
pub struct TickerRepository {
    pool: PgPool,
}

impl TickerRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts or refreshes tickers in one transaction. Returns rows written.
    ///
    /// # Errors
    /// Returns an error if the database transaction fails.
    pub async fn upsert_many(&self, records: &[TickerRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for record in records {
            let result = sqlx::query(
                r"
                INSERT INTO tickers
                    (ticker, name, exchange, sector, industry, market_cap, currency, is_active,
                     metrics, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
                ON CONFLICT (ticker) DO UPDATE
                SET name = COALESCE(EXCLUDED.name, tickers.name),
                    exchange = COALESCE(EXCLUDED.exchange, tickers.exchange),
                    sector = COALESCE(EXCLUDED.sector, tickers.sector),
                    industry = COALESCE(EXCLUDED.industry, tickers.industry),
                    market_cap = COALESCE(EXCLUDED.market_cap, tickers.market_cap),
                    currency = EXCLUDED.currency,
                    is_active = EXCLUDED.is_active,
                    metrics = EXCLUDED.metrics,
                    updated_at = now()
                ",
            )
            .bind(&record.ticker)
            .bind(&record.name)
            .bind(&record.exchange)
            .bind(&record.sector)
            .bind(&record.industry)
            .bind(record.market_cap)
            .bind(&record.currency)
            .bind(record.is_active)
            .bind(&record.metrics)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }

    /// Gets a ticker row.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get(&self, ticker: &str) -> Result<Option<TickerRecord>> {
        let record = sqlx::query_as::<_, TickerRecord>(
            r"
            SELECT ticker, name, exchange, sector, industry, market_cap, currency, is_active, metrics
            FROM tickers
            WHERE ticker = $1
            ",
        )
        .bind(ticker.trim().to_uppercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}
