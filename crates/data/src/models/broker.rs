//! Account and position history written by the daily tracker.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A row of `account_snapshots`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccountSnapshotRecord {
    pub run_id: Option<i64>,
    pub account_hash: String,
    pub net_liquidation: Option<Decimal>,
    pub cash: Option<Decimal>,
    pub buying_power: Option<Decimal>,
    pub maintenance_requirement: Option<Decimal>,
    pub raw: JsonValue,
}

/// A row of `position_snapshots`, unique per (run, symbol).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PositionSnapshotRecord {
    pub run_id: i64,
    pub symbol: String,
    pub asset_type: Option<String>,
    /// Signed quantity; short positions are negative.
    pub quantity: Option<Decimal>,
    pub average_price: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub day_pnl: Option<Decimal>,
    pub day_pnl_pct: Option<Decimal>,
    pub raw: JsonValue,
}
