//! Cash-secured put picks for the top candidates of a screening run.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use wheel_core::{
    earnings_ok, market_today, EarningsProvider, OptionChainProvider, OptionRight, ScoringWeights, WheelAction,
    WheelRules,
};
use wheel_data::CandidateRecord;
use wheel_selection::volatility::iv_rank;
use wheel_selection::{select_best_contract, SelectionOutcome, SelectionRequest, SkipReason};

use crate::alerts::format_pick_summary;
use crate::context::JobContext;
use crate::iv_snapshot::snapshot_iv;
use crate::picks::{base_extra, pick_record, underlying_context, PickBuild};

/// Everything the CSP builder needs besides the providers.
#[derive(Debug, Clone)]
pub struct CspInput<'a> {
    pub run_id: i64,
    pub candidates: &'a [CandidateRecord],
    pub today: NaiveDate,
    pub rules: &'a WheelRules,
    pub weights: &'a ScoringWeights,
    pub strike_count: u32,
    /// Stored ATM IV readings per ticker for IV rank.
    pub iv_history: &'a HashMap<String, Vec<f64>>,
}

async fn earnings_for(
    candidate: &CandidateRecord,
    earnings: Option<&dyn EarningsProvider>,
    today: NaiveDate,
) -> Option<NaiveDate> {
    if let Some(date) = candidate.earnings_date_from(today) {
        return Some(date);
    }
    let provider = earnings?;
    provider
        .next_earnings_date(&candidate.ticker, today)
        .await
        .unwrap_or_else(|e| {
            debug!(ticker = %candidate.ticker, error = %e, "Earnings lookup failed");
            None
        })
}

/// Selects one put per candidate, in candidate rank order.
pub async fn build_csp_picks(
    input: &CspInput<'_>,
    chains: &dyn OptionChainProvider,
    earnings: Option<&dyn EarningsProvider>,
) -> PickBuild {
    let mut build = PickBuild::default();

    for candidate in input.candidates {
        build.processed += 1;
        let ticker = candidate.ticker.as_str();
        let earnings_date = earnings_for(candidate, earnings, input.today).await;
        if !earnings_ok(earnings_date, input.today, input.rules.earnings_avoid_days) {
            build.skips.record(SkipReason::EarningsBlocked);
            info!(ticker, earnings_date = ?earnings_date, "CSP skipped: earnings inside avoid window");
            continue;
        }

        let chain = match chains
            .option_chain(ticker, OptionRight::Put, input.strike_count)
            .await
        {
            Ok(Some(chain)) if !chain.is_empty() => chain,
            Ok(_) => {
                build.skips.record(SkipReason::NoChain);
                warn!(ticker, "No put chain");
                continue;
            }
            Err(e) => {
                build.skips.record(SkipReason::Error);
                warn!(ticker, error = %e, "Put chain fetch failed");
                continue;
            }
        };

        let atm = snapshot_iv(&chain, ticker, input.rules, input.today);
        let iv = atm.as_ref().map(|s| s.iv);
        let rank = iv.and_then(|current| {
            input
                .iv_history
                .get(ticker)
                .and_then(|history| iv_rank(current, history))
        });
        let underlying = underlying_context(Some(candidate), iv, rank);

        let request = SelectionRequest::new(
            ticker,
            WheelAction::Csp,
            input.today,
            input.rules,
            input.weights,
        )
        .with_earnings_date(earnings_date)
        .with_underlying(underlying.clone());

        match select_best_contract(&chain, &request) {
            SelectionOutcome::Selected(selected) => {
                info!(
                    ticker,
                    strike = %selected.contract.strike,
                    expiration = %selected.expiration,
                    dte = selected.dte,
                    window = %selected.window,
                    premium = %selected.premium,
                    delta = selected.abs_delta,
                    yield_pct = selected.score.annualized_yield * 100.0,
                    "CSP pick created"
                );
                let record = pick_record(
                    input.run_id,
                    candidate.rank,
                    &selected,
                    Some(candidate),
                    &underlying,
                    input.rules,
                    base_extra(earnings_date),
                );
                build.picks.push(record);
                build.selected.push(*selected);
            }
            SelectionOutcome::Skipped { reason, detail, .. } => {
                build.skips.record(reason);
                info!(ticker, reason = %reason, detail = %detail, "CSP skipped");
            }
        }
    }
    build
}

/// Runs CSP selection for `run_id` (or the latest successful run) and
/// replaces that run's CSP picks.
///
/// # Errors
/// Returns an error if no run is available, Schwab is not configured, the
/// database fails or no picks were produced.
pub async fn csp_picks(ctx: &JobContext, run_id: Option<i64>) -> Result<PickBuild> {
    let config = &ctx.config;
    let run_id = match run_id {
        Some(id) => ctx
            .repos
            .runs
            .get_run(id)
            .await?
            .with_context(|| format!("screening run {id} not found"))?
            .run_id,
        None => ctx
            .repos
            .runs
            .latest_successful_run()
            .await?
            .context("no successful screening run found")?
            .run_id,
    };

    let candidates = ctx
        .repos
        .candidates
        .top_candidates(run_id, config.picks.csp_top_n as i64)
        .await?;
    if candidates.is_empty() {
        anyhow::bail!("run {run_id} has no candidates");
    }
    info!(run_id, candidates = candidates.len(), "Building CSP picks");

    let schwab = ctx.schwab()?;
    let fmp = ctx.optional_fmp();
    let today = market_today();

    let mut iv_history = HashMap::new();
    for c in &candidates {
        let history = ctx
            .repos
            .snapshots
            .iv_history(&c.ticker, config.picks.iv_lookback_days, today)
            .await?;
        iv_history.insert(c.ticker.clone(), history);
    }

    let input = CspInput {
        run_id,
        candidates: &candidates,
        today,
        rules: &config.rules,
        weights: &config.scoring,
        strike_count: config.picks.strike_count,
        iv_history: &iv_history,
    };
    let build = build_csp_picks(
        &input,
        &schwab,
        fmp.as_ref().map(|f| f as &dyn EarningsProvider),
    )
    .await;

    info!(run_id, summary = %build.summary(), "CSP pick generation summary");
    if build.picks.is_empty() {
        anyhow::bail!("no CSP picks created for run {run_id} ({})", build.summary());
    }

    let written = ctx
        .repos
        .picks
        .replace_for_run(run_id, WheelAction::Csp, &build.picks)
        .await?;
    info!(run_id, written, "CSP picks saved");

    let body = format_pick_summary(
        &format!("CSP picks for run {run_id}"),
        &build.picks,
        &build.skips.summary(),
    );
    ctx.notify(&format!("Wheel CSP picks: {} created", build.picks.len()), &body)
        .await;
    Ok(build)
}
