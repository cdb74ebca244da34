//! Screening candidate repository.

use anyhow::Result;
use sqlx::PgPool;

use crate::models::{ApprovedTicker, CandidateRecord, DAILY_TRACKER_NOTE};

const CANDIDATE_COLUMNS: &str = "c.run_id, c.ticker, c.rank, c.score, c.price, c.market_cap, \
                                 c.sector, c.industry, c.beta, c.rsi, c.iv, c.iv_rank, \
                                 c.earn_in_days, c.earnings_date, c.sentiment_score, c.metrics";

/// Repository for `screening_candidates`.
#[derive(Debug, Clone)]
pub struct CandidateRepository {
    pool: PgPool,
}

impl CandidateRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts candidates for a run in one transaction; re-running a screen
    /// for the same run overwrites its rows.
    ///
    /// # Errors
    /// Returns an error if the database transaction fails.
    pub async fn insert_many(&self, records: &[CandidateRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for record in records {
            let result = sqlx::query(
                r"
                INSERT INTO screening_candidates
                    (run_id, ticker, rank, score, price, market_cap, sector, industry, beta, rsi,
                     iv, iv_rank, earn_in_days, earnings_date, sentiment_score, metrics)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                ON CONFLICT (run_id, ticker) DO UPDATE
                SET rank = EXCLUDED.rank,
                    score = EXCLUDED.score,
                    price = EXCLUDED.price,
                    market_cap = EXCLUDED.market_cap,
                    sector = EXCLUDED.sector,
                    industry = EXCLUDED.industry,
                    beta = EXCLUDED.beta,
                    rsi = EXCLUDED.rsi,
                    iv = EXCLUDED.iv,
                    iv_rank = EXCLUDED.iv_rank,
                    earn_in_days = EXCLUDED.earn_in_days,
                    earnings_date = EXCLUDED.earnings_date,
                    sentiment_score = EXCLUDED.sentiment_score,
                    metrics = EXCLUDED.metrics
                ",
            )
            .bind(record.run_id)
            .bind(&record.ticker)
            .bind(record.rank)
            .bind(record.score)
            .bind(record.price)
            .bind(record.market_cap)
            .bind(&record.sector)
            .bind(&record.industry)
            .bind(record.beta)
            .bind(record.rsi)
            .bind(record.iv)
            .bind(record.iv_rank)
            .bind(record.earn_in_days)
            .bind(record.earnings_date)
            .bind(record.sentiment_score)
            .bind(&record.metrics)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }

    /// Best `limit` candidates of a run by rank.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn top_candidates(&self, run_id: i64, limit: i64) -> Result<Vec<CandidateRecord>> {
        let sql = format!(
            "SELECT {CANDIDATE_COLUMNS} FROM screening_candidates c
             WHERE c.run_id = $1
             ORDER BY c.rank ASC
             LIMIT $2"
        );
        let records = sqlx::query_as::<_, CandidateRecord>(&sql)
            .bind(run_id)
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    /// Best `limit` candidates of the latest successful screening run.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn latest_top(&self, limit: i64) -> Result<Vec<CandidateRecord>> {
        let sql = format!(
            "SELECT {CANDIDATE_COLUMNS} FROM screening_candidates c
             WHERE c.run_id = (
                 SELECT run_id FROM screening_runs
                 WHERE status = 'success' AND COALESCE(notes, '') NOT LIKE $1
                 ORDER BY run_ts DESC
                 LIMIT 1
             )
             ORDER BY c.rank ASC
             LIMIT $2"
        );
        let records = sqlx::query_as::<_, CandidateRecord>(&sql)
            .bind(format!("{DAILY_TRACKER_NOTE}%"))
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    /// Candidates of a run restricted to `tickers`.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn for_tickers(&self, run_id: i64, tickers: &[String]) -> Result<Vec<CandidateRecord>> {
        if tickers.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {CANDIDATE_COLUMNS} FROM screening_candidates c
             WHERE c.run_id = $1 AND c.ticker = ANY($2)
             ORDER BY c.rank ASC"
        );
        let records = sqlx::query_as::<_, CandidateRecord>(&sql)
            .bind(run_id)
            .bind(tickers)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }
}

/// Repository for `approved_universe`.
#[derive(Debug, Clone)]
pub struct ApprovedUniverseRepository {
    pool: PgPool,
}

impl ApprovedUniverseRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Replaces the approved universe with `rows` from `run_id`.
    ///
    /// # Errors
    /// Returns an error if the database transaction fails.
    pub async fn replace(&self, run_id: i64, rows: &[ApprovedTicker]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM approved_universe")
            .execute(&mut *tx)
            .await?;

        let mut written = 0;
        for row in rows {
            let result = sqlx::query(
                r"
                INSERT INTO approved_universe
                    (ticker, approved, last_run_id, last_rank, last_score, updated_at)
                VALUES ($1, TRUE, $2, $3, $4, now())
                ON CONFLICT (ticker) DO UPDATE
                SET last_run_id = EXCLUDED.last_run_id,
                    last_rank = EXCLUDED.last_rank,
                    last_score = EXCLUDED.last_score,
                    updated_at = now()
                ",
            )
            .bind(&row.ticker)
            .bind(run_id)
            .bind(row.last_rank)
            .bind(row.last_score)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }

    /// Approved tickers by rank.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<ApprovedTicker>> {
        let records = sqlx::query_as::<_, ApprovedTicker>(
            r"
            SELECT ticker, last_rank, last_score
            FROM approved_universe
            WHERE approved
            ORDER BY last_rank ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
