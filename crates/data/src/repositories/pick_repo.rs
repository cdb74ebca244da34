//! Screening pick repository.

use anyhow::{bail, Result};
use sqlx::PgPool;
use tracing::debug;
use wheel_core::WheelAction;

use crate::models::PickRecord;

const PICK_COLUMNS: &str = "run_id, ticker, action, option_symbol, expiration, dte, strike, \
                            premium, delta, target_delta, annualized_yield, score, rank, \
                            collateral, price, iv, iv_rank, beta, rsi, earn_in_days, \
                            sentiment_score, pick_metrics";

/// Repository for `screening_picks`.
#[derive(Debug, Clone)]
pub struct PickRepository {
    pool: PgPool,
}

impl PickRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Replaces the picks of one action for a run: existing rows are deleted
    /// and `picks` inserted in the same transaction, so re-running a builder
    /// leaves exactly one set.
    ///
    /// # Errors
    /// Returns an error if a pick belongs to another run or action, or if the
    /// database transaction fails.
    pub async fn replace_for_run(
        &self,
        run_id: i64,
        action: WheelAction,
        picks: &[PickRecord],
    ) -> Result<u64> {
        if let Some(bad) = picks
            .iter()
            .find(|p| p.run_id != run_id || p.wheel_action() != Some(action))
        {
            bail!(
                "pick {} ({} run {}) does not match {} run {}",
                bad.ticker,
                bad.action,
                bad.run_id,
                action,
                run_id
            );
        }

        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM screening_picks WHERE run_id = $1 AND action = $2")
            .bind(run_id)
            .bind(action.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let mut inserted = 0;
        for pick in picks {
            let result = sqlx::query(
                r"
                INSERT INTO screening_picks
                    (run_id, ticker, action, option_symbol, expiration, dte, strike, premium,
                     delta, target_delta, annualized_yield, score, rank, collateral, price, iv,
                     iv_rank, beta, rsi, earn_in_days, sentiment_score, pick_metrics)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                        $17, $18, $19, $20, $21, $22)
                ON CONFLICT (run_id, ticker, action) DO NOTHING
                ",
            )
            .bind(pick.run_id)
            .bind(&pick.ticker)
            .bind(&pick.action)
            .bind(&pick.option_symbol)
            .bind(pick.expiration)
            .bind(pick.dte)
            .bind(pick.strike)
            .bind(pick.premium)
            .bind(pick.delta)
            .bind(pick.target_delta)
            .bind(pick.annualized_yield)
            .bind(pick.score)
            .bind(pick.rank)
            .bind(pick.collateral)
            .bind(pick.price)
            .bind(pick.iv)
            .bind(pick.iv_rank)
            .bind(pick.beta)
            .bind(pick.rsi)
            .bind(pick.earn_in_days)
            .bind(pick.sentiment_score)
            .bind(&pick.pick_metrics)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        debug!(run_id, action = %action, deleted, inserted, "Replaced picks");
        Ok(inserted)
    }

    /// Picks of one action from the latest successful run.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn latest_picks(&self, action: WheelAction, limit: i64) -> Result<Vec<PickRecord>> {
        let view = match action {
            WheelAction::Csp => "v_latest_run_csp_picks",
            WheelAction::Cc => "v_latest_run_cc_picks",
        };
        let sql = format!("SELECT {PICK_COLUMNS} FROM {view} ORDER BY rank ASC LIMIT $1");
        let records = sqlx::query_as::<_, PickRecord>(&sql)
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    /// Picks of one action for a run.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn picks_for_run(&self, run_id: i64, action: WheelAction) -> Result<Vec<PickRecord>> {
        let sql = format!(
            "SELECT {PICK_COLUMNS} FROM screening_picks
             WHERE run_id = $1 AND action = $2
             ORDER BY rank ASC"
        );
        let records = sqlx::query_as::<_, PickRecord>(&sql)
            .bind(run_id)
            .bind(action.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }
}
