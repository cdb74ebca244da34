//! Daily RSI snapshot for the latest top candidates.
//!
//! Alpha Vantage allows a small number of calls per day, so tickers already
//! cached for today (including failed fetches) are skipped and the job stops
//! at the daily cap or the first rate-limit response.

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};
use wheel_core::market_today;
use wheel_data::RsiSnapshot;

use crate::context::JobContext;
use crate::sources::{is_rate_limited, RsiSource};

/// Rows produced by one pass plus counters for logging.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RsiCollection {
    pub snapshots: Vec<RsiSnapshot>,
    pub skipped_cached: usize,
    pub failed: usize,
    pub rate_limited: bool,
}

/// Parameters for one collection pass.
#[derive(Debug, Clone)]
pub struct RsiRequest<'a> {
    pub interval: &'a str,
    pub period: u32,
    pub today: NaiveDate,
    /// Maximum provider calls this pass.
    pub request_cap: usize,
}

/// Fetches RSI for uncached tickers in order. Failed fetches become rows
/// with a null RSI so they count as cached for the rest of the day.
pub async fn collect_rsi(
    tickers: &[String],
    cached: &HashSet<String>,
    source: &dyn RsiSource,
    request: &RsiRequest<'_>,
) -> RsiCollection {
    let mut out = RsiCollection::default();
    let mut calls = 0;

    for ticker in tickers {
        if cached.contains(ticker) {
            out.skipped_cached += 1;
            continue;
        }
        if calls >= request.request_cap {
            info!(cap = request.request_cap, "RSI daily request cap reached");
            break;
        }
        calls += 1;

        let rsi = match source.rsi(ticker, request.interval, request.period).await {
            Ok(rsi) => rsi,
            Err(e) if is_rate_limited(&e) => {
                warn!(ticker = %ticker, error = %e, "RSI provider rate limited, stopping");
                out.rate_limited = true;
                break;
            }
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "RSI fetch failed");
                None
            }
        };
        if rsi.is_none() {
            out.failed += 1;
        }

        let mut snapshot = RsiSnapshot::new(
            ticker,
            request.today,
            request.interval,
            request.period as i32,
            rsi,
        );
        snapshot.source = source.name().to_string();
        out.snapshots.push(snapshot);
    }
    out
}

/// Snapshots RSI for the top candidates of the latest successful run.
///
/// # Errors
/// Returns an error if no RSI provider is configured or the database fails.
pub async fn rsi_snapshot(ctx: &JobContext) -> Result<RsiCollection> {
    let rules = &ctx.config.rules;
    let picks = &ctx.config.picks;

    let source: Box<dyn RsiSource> = match ctx.alpha_vantage() {
        Ok(client) => Box::new(client),
        Err(e) => {
            warn!(error = %e, "Alpha Vantage unavailable, using FMP for RSI");
            Box::new(ctx.fmp()?)
        }
    };

    let candidates = ctx.repos.candidates.latest_top(picks.snapshot_top_n as i64).await?;
    if candidates.is_empty() {
        warn!("No candidates in the latest successful run; nothing to snapshot");
        return Ok(RsiCollection::default());
    }
    let tickers: Vec<String> = candidates.into_iter().map(|c| c.ticker).collect();

    let today = market_today();
    let cached = ctx
        .repos
        .snapshots
        .rsi_cached_today(today, &rules.rsi_interval, rules.rsi_period as i32)
        .await?;

    let request = RsiRequest {
        interval: &rules.rsi_interval,
        period: rules.rsi_period,
        today,
        request_cap: ctx.config.alpha_vantage.daily_request_cap,
    };
    let collection = collect_rsi(&tickers, &cached, source.as_ref(), &request).await;

    for snapshot in &collection.snapshots {
        ctx.repos.snapshots.upsert_rsi(snapshot).await?;
    }

    info!(
        source = source.name(),
        tickers = tickers.len(),
        written = collection.snapshots.len(),
        cached = collection.skipped_cached,
        failed = collection.failed,
        rate_limited = collection.rate_limited,
        "RSI snapshot complete"
    );
    Ok(collection)
}
