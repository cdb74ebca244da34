//! Daily account and position tracker.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};
use wheel_data::{AccountSnapshotRecord, PositionSnapshotRecord, DAILY_TRACKER_NOTE};
use wheel_schwab::AccountSnapshot;

use crate::context::JobContext;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerSummary {
    pub run_id: i64,
    pub account_snapshot_id: i64,
    pub positions: u64,
}

/// Account row for a broker snapshot.
#[must_use]
pub fn account_record(
    run_id: i64,
    account_hash: &str,
    snapshot: &AccountSnapshot,
) -> AccountSnapshotRecord {
    let b = &snapshot.balances;
    AccountSnapshotRecord {
        run_id: Some(run_id),
        account_hash: account_hash.to_string(),
        net_liquidation: b.net_liquidation,
        cash: b.cash,
        buying_power: b.buying_power,
        maintenance_requirement: b.maintenance_requirement,
        raw: snapshot.raw.clone(),
    }
}

/// Position rows for a broker snapshot. Positions without a symbol are
/// dropped.
#[must_use]
pub fn position_records(run_id: i64, snapshot: &AccountSnapshot) -> Vec<PositionSnapshotRecord> {
    snapshot
        .positions
        .iter()
        .filter(|p| !p.symbol.trim().is_empty())
        .map(|p| PositionSnapshotRecord {
            run_id,
            symbol: p.symbol.trim().to_uppercase(),
            asset_type: p.asset_type.clone(),
            quantity: p.quantity,
            average_price: p.average_price,
            market_value: p.market_value,
            day_pnl: p.day_pnl,
            day_pnl_pct: p.day_pnl_pct,
            raw: p.raw.clone(),
        })
        .collect()
}

/// Records today's balances and positions under a `DAILY_TRACKER` run.
///
/// # Errors
/// Returns an error if Schwab or the database fails; the run is marked
/// failed when it was already created.
pub async fn daily_tracker(ctx: &JobContext) -> Result<TrackerSummary> {
    let schwab = ctx.schwab()?;
    let run_id = ctx.repos.runs.create_run(DAILY_TRACKER_NOTE, 0).await?;
    info!(run_id, "Daily tracker run started");

    let result = async {
        let (hash, snapshot) = schwab
            .account_snapshot()
            .await
            .context("failed to fetch Schwab account")?;
        let account_snapshot_id = ctx
            .repos
            .broker
            .insert_account_snapshot(&account_record(run_id, &hash, &snapshot))
            .await?;
        let positions = ctx
            .repos
            .broker
            .upsert_position_snapshots(&position_records(run_id, &snapshot))
            .await?;
        Ok::<_, anyhow::Error>(TrackerSummary {
            run_id,
            account_snapshot_id,
            positions,
        })
    }
    .await;

    match result {
        Ok(summary) => {
            ctx.repos.runs.mark_success(run_id, None, None, None).await?;
            info!(
                run_id,
                account_snapshot_id = summary.account_snapshot_id,
                positions = summary.positions,
                "Daily tracker complete"
            );
            Ok(summary)
        }
        Err(e) => {
            if let Err(mark_err) = ctx.repos.runs.mark_failed(run_id, &format!("{e:#}")).await {
                warn!(run_id, error = %mark_err, "Failed to mark tracker run as failed");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wheel_schwab::{AccountBalances, BrokerPosition};

    fn position(symbol: &str, quantity: rust_decimal::Decimal) -> BrokerPosition {
        BrokerPosition {
            symbol: symbol.to_string(),
            asset_type: Some("EQUITY".to_string()),
            quantity: Some(quantity),
            average_price: Some(dec!(50)),
            market_value: Some(quantity * dec!(55)),
            day_pnl: Some(dec!(12.5)),
            day_pnl_pct: None,
            raw: json!({"symbol": symbol}),
        }
    }

    fn snapshot() -> AccountSnapshot {
        AccountSnapshot {
            balances: AccountBalances {
                net_liquidation: Some(dec!(102345.67)),
                cash: Some(dec!(40000)),
                buying_power: None,
                maintenance_requirement: None,
            },
            positions: vec![
                position(" ko ", dec!(300)),
                position("", dec!(1)),
                position("AAPL  250321C00250000", dec!(-2)),
            ],
            raw: json!({"securitiesAccount": {}}),
        }
    }

    #[test]
    fn test_account_record() {
        let record = account_record(5, "HASH", &snapshot());
        assert_eq!(record.run_id, Some(5));
        assert_eq!(record.net_liquidation, Some(dec!(102345.67)));
        assert_eq!(record.buying_power, None);
    }

    #[test]
    fn test_position_records_keep_sign_and_skip_blank() {
        let rows = position_records(5, &snapshot());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "KO");
        assert_eq!(rows[1].quantity, Some(dec!(-2)));
        assert!(rows.iter().all(|r| r.run_id == 5));
    }
}
