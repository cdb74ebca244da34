//! Screening run repository.
//!
//! Opens runs, closes them as success or failed, and finds the latest
//! successful screen for the pick builders.

use anyhow::Result;
use sqlx::PgPool;

use crate::models::{truncate_error, RunHistoryRow, ScreeningRunRecord, DAILY_TRACKER_NOTE};

const RUN_COLUMNS: &str = "run_id, run_ts, status, universe_size, candidates_count, picks_count, \
                           notes, error, finished_at";

/// Repository for `screening_runs`.
#[derive(Debug, Clone)]
pub struct RunRepository {
    pool: PgPool,
}

impl RunRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a run in `running` state and returns its ID.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn create_run(&self, notes: &str, universe_size: i32) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r"
            INSERT INTO screening_runs (run_ts, status, universe_size, notes)
            VALUES (now(), 'running', $1, $2)
            RETURNING run_id
            ",
        )
        .bind(universe_size)
        .bind(notes)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Closes a run as `success`. `None` counts and notes keep the stored values.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn mark_success(
        &self,
        run_id: i64,
        candidates_count: Option<i32>,
        picks_count: Option<i32>,
        notes: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE screening_runs
            SET status = 'success',
                finished_at = now(),
                candidates_count = COALESCE($2, candidates_count),
                picks_count = COALESCE($3, picks_count),
                notes = COALESCE($4, notes)
            WHERE run_id = $1
            ",
        )
        .bind(run_id)
        .bind(candidates_count)
        .bind(picks_count)
        .bind(notes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Closes a run as `failed` with the error truncated to 800 characters.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn mark_failed(&self, run_id: i64, error: &str) -> Result<()> {
        sqlx::query(
            r"
            UPDATE screening_runs
            SET status = 'failed', finished_at = now(), error = $2
            WHERE run_id = $1
            ",
        )
        .bind(run_id)
        .bind(truncate_error(error))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates the universe size once it is known.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn set_universe_size(&self, run_id: i64, universe_size: i32) -> Result<()> {
        sqlx::query("UPDATE screening_runs SET universe_size = $2 WHERE run_id = $1")
            .bind(run_id)
            .bind(universe_size)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Gets a run by ID.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get_run(&self, run_id: i64) -> Result<Option<ScreeningRunRecord>> {
        let sql = format!("SELECT {RUN_COLUMNS} FROM screening_runs WHERE run_id = $1");
        let record = sqlx::query_as::<_, ScreeningRunRecord>(&sql)
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// Latest successful screening run, ignoring daily tracker runs.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn latest_successful_run(&self) -> Result<Option<ScreeningRunRecord>> {
        let sql = format!(
            "SELECT {RUN_COLUMNS} FROM screening_runs
             WHERE status = 'success' AND COALESCE(notes, '') NOT LIKE $1
             ORDER BY run_ts DESC
             LIMIT 1"
        );
        let record = sqlx::query_as::<_, ScreeningRunRecord>(&sql)
            .bind(format!("{DAILY_TRACKER_NOTE}%"))
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// Most recent runs from `v_run_history`, newest first.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list_runs(&self, limit: i64) -> Result<Vec<RunHistoryRow>> {
        let records = sqlx::query_as::<_, RunHistoryRow>(
            r"
            SELECT run_id, run_ts, status, universe_size, candidates_count, picks_count,
                   notes, error, finished_at, csp_picks, cc_picks
            FROM v_run_history
            ORDER BY run_ts DESC
            LIMIT $1
            ",
        )
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
