//! Daily ATM implied-volatility snapshot, the history behind IV rank.

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};
use wheel_core::{market_today, OptionChain, OptionChainProvider, OptionRight, WheelRules};
use wheel_data::{load_universe_csv, IvSnapshot};
use wheel_selection::expiration::pick_expiration;
use wheel_selection::volatility::{atm_iv, underlying_price};

use crate::context::JobContext;

/// Counters for one IV snapshot pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IvSnapshotStats {
    pub symbols: usize,
    pub written: usize,
    pub no_chain: usize,
    pub no_expiration: usize,
    pub no_iv: usize,
    pub errors: usize,
}

/// ATM put IV at the expiration the pick jobs would trade.
#[must_use]
pub fn snapshot_iv(
    chain: &OptionChain,
    symbol: &str,
    rules: &WheelRules,
    today: NaiveDate,
) -> Option<IvSnapshot> {
    let choice = pick_expiration(&chain.sorted_expirations(), today, rules)?;
    let price = underlying_price(chain)?;
    let puts = chain.contracts_for(OptionRight::Put, choice.expiration);
    let (iv, strike) = atm_iv(&puts, price)?;

    Some(IvSnapshot {
        symbol: symbol.trim().to_uppercase(),
        asof_date: today,
        exp_date: choice.expiration,
        dte: i32::try_from(choice.dte).unwrap_or(i32::MAX),
        strike,
        underlying_price: price,
        iv,
        source: "schwab".to_string(),
    })
}

/// Fetches a put chain per symbol and builds snapshots for the ones that
/// have a usable ATM IV.
pub async fn collect_iv(
    symbols: &[String],
    chains: &dyn OptionChainProvider,
    rules: &WheelRules,
    strike_count: u32,
    today: NaiveDate,
) -> (Vec<IvSnapshot>, IvSnapshotStats) {
    let mut stats = IvSnapshotStats {
        symbols: symbols.len(),
        ..IvSnapshotStats::default()
    };
    let mut snapshots = Vec::new();

    for symbol in symbols {
        let chain = match chains.option_chain(symbol, OptionRight::Put, strike_count).await {
            Ok(Some(chain)) if !chain.is_empty() => chain,
            Ok(_) => {
                stats.no_chain += 1;
                debug!(symbol = %symbol, "No put chain");
                continue;
            }
            Err(e) => {
                stats.errors += 1;
                warn!(symbol = %symbol, error = %e, "Chain fetch failed");
                continue;
            }
        };

        if pick_expiration(&chain.sorted_expirations(), today, rules).is_none() {
            stats.no_expiration += 1;
            debug!(symbol = %symbol, "No expiration in DTE windows");
            continue;
        }
        match snapshot_iv(&chain, symbol, rules, today) {
            Some(snapshot) => {
                stats.written += 1;
                snapshots.push(snapshot);
            }
            None => {
                stats.no_iv += 1;
                debug!(symbol = %symbol, "No usable ATM IV");
            }
        }
    }
    (snapshots, stats)
}

/// Symbols to snapshot: the configured CSV universe, else the latest top
/// candidates.
///
/// # Errors
/// Returns an error if the CSV cannot be read or the database fails.
pub async fn iv_universe(ctx: &JobContext) -> Result<Vec<String>> {
    if let Some(path) = ctx
        .config
        .screener
        .universe_csv
        .as_deref()
        .filter(|p| !p.trim().is_empty())
    {
        return load_universe_csv(path);
    }
    let candidates = ctx
        .repos
        .candidates
        .latest_top(ctx.config.picks.snapshot_top_n as i64)
        .await?;
    Ok(candidates.into_iter().map(|c| c.ticker).collect())
}

/// Snapshots ATM IV for today and upserts one row per symbol.
///
/// # Errors
/// Returns an error if Schwab is not configured or the database fails.
pub async fn iv_snapshot(ctx: &JobContext) -> Result<IvSnapshotStats> {
    let schwab = ctx.schwab()?;
    let symbols = iv_universe(ctx).await?;
    if symbols.is_empty() {
        warn!("IV snapshot universe is empty");
        return Ok(IvSnapshotStats::default());
    }

    let today = market_today();
    let (snapshots, stats) = collect_iv(
        &symbols,
        &schwab,
        &ctx.config.rules,
        ctx.config.picks.strike_count,
        today,
    )
    .await;

    for snapshot in &snapshots {
        ctx.repos.snapshots.upsert_iv(snapshot).await?;
    }
    info!(
        symbols = stats.symbols,
        written = stats.written,
        no_chain = stats.no_chain,
        no_expiration = stats.no_expiration,
        no_iv = stats.no_iv,
        errors = stats.errors,
        "IV snapshot complete"
    );
    Ok(stats)
}
