//! Broker account history repository.

use anyhow::Result;
use sqlx::PgPool;
use std::collections::HashMap;

use crate::models::{AccountSnapshotRecord, PositionSnapshotRecord};

/// Repository for `account_snapshots` and `position_snapshots`.
#[derive(Debug, Clone)]
pub struct BrokerRepository {
    pool: PgPool,
}

impl BrokerRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts an account snapshot and returns the generated ID.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn insert_account_snapshot(&self, record: &AccountSnapshotRecord) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r"
            INSERT INTO account_snapshots
                (run_id, account_hash, net_liquidation, cash, buying_power,
                 maintenance_requirement, raw)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            ",
        )
        .bind(record.run_id)
        .bind(&record.account_hash)
        .bind(record.net_liquidation)
        .bind(record.cash)
        .bind(record.buying_power)
        .bind(record.maintenance_requirement)
        .bind(&record.raw)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Upserts position rows, keeping the last row per (run, symbol).
    ///
    /// # Errors
    /// Returns an error if the database transaction fails.
    pub async fn upsert_position_snapshots(&self, records: &[PositionSnapshotRecord]) -> Result<u64> {
        let records = dedupe_positions(records);
        if records.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for record in &records {
            let result = sqlx::query(
                r"
                INSERT INTO position_snapshots
                    (run_id, symbol, asset_type, quantity, average_price, market_value, day_pnl,
                     day_pnl_pct, raw)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (run_id, symbol) DO UPDATE
                SET asset_type = EXCLUDED.asset_type,
                    quantity = EXCLUDED.quantity,
                    average_price = EXCLUDED.average_price,
                    market_value = EXCLUDED.market_value,
                    day_pnl = EXCLUDED.day_pnl,
                    day_pnl_pct = EXCLUDED.day_pnl_pct,
                    raw = EXCLUDED.raw
                ",
            )
            .bind(record.run_id)
            .bind(&record.symbol)
            .bind(&record.asset_type)
            .bind(record.quantity)
            .bind(record.average_price)
            .bind(record.market_value)
            .bind(record.day_pnl)
            .bind(record.day_pnl_pct)
            .bind(&record.raw)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }
}

/// One row per (run, symbol); later rows win, first-seen order is kept.
#[must_use]
pub fn dedupe_positions(records: &[PositionSnapshotRecord]) -> Vec<PositionSnapshotRecord> {
    let mut index: HashMap<(i64, String), usize> = HashMap::new();
    let mut out: Vec<PositionSnapshotRecord> = Vec::with_capacity(records.len());
    for record in records {
        let key = (record.run_id, record.symbol.clone());
        if let Some(&i) = index.get(&key) {
            out[i] = record.clone();
        } else {
            index.insert(key, out.len());
            out.push(record.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn position(run_id: i64, symbol: &str, quantity: rust_decimal::Decimal) -> PositionSnapshotRecord {
        PositionSnapshotRecord {
            run_id,
            symbol: symbol.to_string(),
            asset_type: Some("EQUITY".to_string()),
            quantity: Some(quantity),
            average_price: None,
            market_value: None,
            day_pnl: None,
            day_pnl_pct: None,
            raw: json!({}),
        }
    }

    #[test]
    fn test_dedupe_keeps_last_row_in_first_position() {
        let rows = vec![
            position(1, "AAPL", dec!(100)),
            position(1, "MSFT", dec!(200)),
            position(1, "AAPL", dec!(300)),
            position(2, "AAPL", dec!(50)),
        ];
        let deduped = dedupe_positions(&rows);
        assert_eq!(deduped.len(), 3);
        assert_eq!(deduped[0].symbol, "AAPL");
        assert_eq!(deduped[0].quantity, Some(dec!(300)));
        assert_eq!(deduped[1].symbol, "MSFT");
        assert_eq!(deduped[2].run_id, 2);
    }

    #[test]
    fn test_dedupe_empty() {
        assert!(dedupe_positions(&[]).is_empty());
    }
}
