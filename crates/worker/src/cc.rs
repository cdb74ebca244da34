//! Covered call picks for stock already held.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use wheel_core::{
    earnings_ok, market_today, EarningsProvider, EquityLot, OptionChainProvider, OptionRight, PositionProvider,
    ScoringWeights, WheelAction, WheelRules,
};
use wheel_data::{CandidateRecord, PickRepository, TickerRecord};
use wheel_selection::{select_best_contract, SelectionOutcome, SelectionRequest, SkipReason};

use crate::alerts::format_pick_summary;
use crate::context::JobContext;
use crate::picks::{pick_record, underlying_context, PickBuild};

/// Where the share lots came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotSource {
    Broker,
    /// Configured test tickers, assumed to hold 100 shares each.
    Test,
}

impl LotSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Broker => "schwab",
            Self::Test => "test",
        }
    }
}

/// Everything the CC builder needs besides the providers.
#[derive(Debug, Clone)]
pub struct CcInput<'a> {
    pub run_id: i64,
    pub lots: &'a [EquityLot],
    pub source: LotSource,
    pub candidates: &'a HashMap<String, CandidateRecord>,
    pub tickers: &'a HashMap<String, TickerRecord>,
    pub today: NaiveDate,
    pub rules: &'a WheelRules,
    pub weights: &'a ScoringWeights,
    pub strike_count: u32,
    pub allow_itm: bool,
    /// Maximum picks kept after ranking.
    pub top_n: usize,
}

/// Lots for the configured test tickers, 100 shares each.
#[must_use]
pub fn test_lots(tickers: &[String]) -> Vec<EquityLot> {
    tickers
        .iter()
        .map(|t| EquityLot::new(t, Decimal::from(wheel_core::CONTRACT_MULTIPLIER)))
        .collect()
}

/// Earnings from the screening candidate, then the ticker reference row,
/// then the provider.
async fn earnings_for(
    symbol: &str,
    candidate: Option<&CandidateRecord>,
    ticker: Option<&TickerRecord>,
    earnings: Option<&dyn EarningsProvider>,
    today: NaiveDate,
) -> Option<NaiveDate> {
    if let Some(date) = candidate.and_then(|c| c.earnings_date_from(today)) {
        return Some(date);
    }
    if let Some(date) = ticker.and_then(|t| t.earnings_date_from(today)) {
        return Some(date);
    }
    let provider = earnings?;
    provider
        .next_earnings_date(symbol, today)
        .await
        .unwrap_or_else(|e| {
            debug!(symbol, error = %e, "Earnings lookup failed");
            None
        })
}

/// Selects one call per coverable lot, then ranks by score.
pub async fn build_cc_picks(
    input: &CcInput<'_>,
    chains: &dyn OptionChainProvider,
    earnings: Option<&dyn EarningsProvider>,
) -> PickBuild {
    let mut build = PickBuild::default();

    for lot in input.lots {
        build.processed += 1;
        let symbol = lot.symbol.as_str();
        if lot.coverable_contracts() < 1 {
            debug!(symbol, quantity = %lot.quantity, "Fewer than 100 shares");
            continue;
        }
        let candidate = input.candidates.get(symbol);
        let ticker = input.tickers.get(symbol);
        let earnings_date = earnings_for(symbol, candidate, ticker, earnings, input.today).await;
        if !earnings_ok(earnings_date, input.today, input.rules.earnings_avoid_days) {
            build.skips.record(SkipReason::EarningsBlocked);
            info!(symbol, earnings_date = ?earnings_date, "CC skipped: earnings inside avoid window");
            continue;
        }

        let chain = match chains
            .option_chain(symbol, OptionRight::Call, input.strike_count)
            .await
        {
            Ok(Some(chain)) if !chain.is_empty() => chain,
            Ok(_) => {
                build.skips.record(SkipReason::NoChain);
                warn!(symbol, "No call chain");
                continue;
            }
            Err(e) => {
                build.skips.record(SkipReason::Error);
                warn!(symbol, error = %e, "Call chain fetch failed");
                continue;
            }
        };

        let current_price = chain
            .underlying_price
            .filter(|p| *p > Decimal::ZERO)
            .or_else(|| lot.reference_price());
        let underlying = underlying_context(candidate, None, None);
        let request = SelectionRequest::new(
            symbol,
            WheelAction::Cc,
            input.today,
            input.rules,
            input.weights,
        )
        .with_earnings_date(earnings_date)
        .with_current_price(current_price)
        .with_allow_itm(input.allow_itm)
        .with_underlying(underlying.clone());

        match select_best_contract(&chain, &request) {
            SelectionOutcome::Selected(selected) => {
                info!(
                    symbol,
                    strike = %selected.contract.strike,
                    expiration = %selected.expiration,
                    dte = selected.dte,
                    window = %selected.window,
                    premium = %selected.premium,
                    delta = selected.abs_delta,
                    shares = %lot.quantity,
                    mode = input.source.as_str(),
                    "CC pick created"
                );
                let extra = json!({
                    "earnings_date": earnings_date,
                    "quantity": lot.quantity,
                    "contracts": lot.coverable_contracts(),
                    "current_price": current_price,
                    "mode": input.source.as_str(),
                    "allow_itm_calls": input.allow_itm,
                });
                let record = pick_record(
                    input.run_id,
                    0,
                    &selected,
                    candidate,
                    &underlying,
                    input.rules,
                    extra,
                );
                build.picks.push(record);
                build.selected.push(*selected);
            }
            SelectionOutcome::Skipped { reason, detail, .. } => {
                build.skips.record(reason);
                info!(symbol, reason = %reason, detail = %detail, "CC skipped");
            }
        }
    }

    rank_cc_picks(&mut build, input.top_n);
    build
}

/// Orders picks by score (ties by yield), keeps `top_n` and assigns ranks.
pub fn rank_cc_picks(build: &mut PickBuild, top_n: usize) {
    let mut paired: Vec<_> = build
        .picks
        .drain(..)
        .zip(build.selected.drain(..))
        .collect();
    paired.sort_by(|(a, _), (b, _)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.annualized_yield
                    .partial_cmp(&a.annualized_yield)
                    .unwrap_or(Ordering::Equal)
            })
    });
    paired.truncate(top_n);
    for (i, (mut pick, selected)) in paired.into_iter().enumerate() {
        pick.rank = i as i32 + 1;
        build.picks.push(pick);
        build.selected.push(selected);
    }
}

/// Replaces the run's CC picks with `build`, including when it is empty.
///
/// # Errors
/// Returns an error if the database write fails.
pub async fn save_cc_picks(picks: &PickRepository, run_id: i64, build: &PickBuild) -> Result<u64> {
    let written = picks
        .replace_for_run(run_id, WheelAction::Cc, &build.picks)
        .await?;
    info!(run_id, written, "CC picks saved");
    Ok(written)
}

/// Builds covered calls for current holdings (or test tickers) and replaces
/// the CC picks of the latest successful run.
///
/// # Errors
/// Returns an error if there is no successful run, Schwab is unavailable or
/// the database fails.
pub async fn cc_picks(ctx: &JobContext) -> Result<PickBuild> {
    let config = &ctx.config;
    let run_id = ctx
        .repos
        .runs
        .latest_successful_run()
        .await?
        .context("no successful screening run found")?
        .run_id;

    let schwab = ctx.schwab()?;
    let test_tickers = config.picks.test_tickers();
    let (lots, source) = if test_tickers.is_empty() {
        let lots = schwab
            .equity_lots(config.picks.min_shares)
            .await
            .context("failed to load equity positions")?;
        (lots, LotSource::Broker)
    } else {
        info!(tickers = ?test_tickers, "Using CC test tickers");
        (test_lots(&test_tickers), LotSource::Test)
    };
    if lots.is_empty() {
        // Still falls through to the replace below so closed positions drop
        // off the dashboard
        info!(min_shares = config.picks.min_shares, "No equity lots eligible for covered calls");
    }

    let symbols: Vec<String> = lots.iter().map(|l| l.symbol.clone()).collect();
    let candidates: HashMap<String, CandidateRecord> = ctx
        .repos
        .candidates
        .for_tickers(run_id, &symbols)
        .await?
        .into_iter()
        .map(|c| (c.ticker.clone(), c))
        .collect();
    let mut tickers = HashMap::new();
    for symbol in &symbols {
        if let Some(record) = ctx.repos.tickers.get(symbol).await? {
            tickers.insert(symbol.clone(), record);
        }
    }

    let fmp = ctx.optional_fmp();
    let input = CcInput {
        run_id,
        lots: &lots,
        source,
        candidates: &candidates,
        tickers: &tickers,
        today: market_today(),
        rules: &config.rules,
        weights: &config.scoring,
        strike_count: config.picks.strike_count,
        allow_itm: config.picks.allow_itm_calls,
        top_n: config.picks.cc_top_n,
    };
    let build = build_cc_picks(
        &input,
        &schwab,
        fmp.as_ref().map(|f| f as &dyn EarningsProvider),
    )
    .await;

    info!(run_id, mode = source.as_str(), summary = %build.summary(), "CC pick generation summary");
    for pick in build.picks.iter().take(10) {
        info!(
            rank = pick.rank,
            ticker = %pick.ticker,
            strike = %pick.strike,
            expiration = %pick.expiration,
            premium = %pick.premium,
            yield_pct = pick.annualized_yield * 100.0,
            score = pick.score,
            "Top CC pick"
        );
    }

    save_cc_picks(&ctx.repos.picks, run_id, &build).await?;

    if !build.picks.is_empty() {
        let body = format_pick_summary(
            &format!("Covered call picks for run {run_id}"),
            &build.picks,
            &build.skips.summary(),
        );
        ctx.notify(&format!("Wheel CC picks: {} created", build.picks.len()), &body)
            .await;
    }
    Ok(build)
}
