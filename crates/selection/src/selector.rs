//! Best contract per ticker.
//!
//! Earnings exclusion, expiration choice, delta band, strike side,
//! liquidity, then the highest composite score wins.

use rust_decimal::Decimal;
use std::cmp::Ordering;
use tracing::debug;
use wheel_core::{earnings_ok, OptionChain, OptionContract, WheelAction, WheelRules, CONTRACT_MULTIPLIER};

use crate::diagnostics::{FilterFunnel, SkipReason};
use crate::expiration::{describe_available, pick_expiration};
use crate::liquidity::check_liquidity;
use crate::scoring::{score_contract, ContractScore};
use crate::types::{SelectedContract, SelectionOutcome, SelectionRequest};

/// Delta filter for an action.
///
/// Puts report negative deltas, so CSP compares `|delta|`. Covered calls
/// additionally require a positive delta to weed out mislabeled rows.
#[must_use]
pub fn delta_eligible(contract: &OptionContract, action: WheelAction, rules: &WheelRules) -> bool {
    let Some(delta) = contract.delta else {
        return false;
    };
    match action {
        WheelAction::Csp => rules.delta_in_band(action, delta.abs()),
        WheelAction::Cc => delta > 0.0 && rules.delta_in_band(action, delta),
    }
}

/// Covered calls below the current price would sell shares at a loss to
/// market; they are only allowed when `allow_itm` is set.
#[must_use]
pub fn strike_allowed(
    contract: &OptionContract,
    action: WheelAction,
    current_price: Option<Decimal>,
    allow_itm: bool,
) -> bool {
    match (action, current_price) {
        (WheelAction::Cc, Some(price)) if !allow_itm => contract.strike >= price,
        _ => true,
    }
}

struct Scored<'a> {
    contract: &'a OptionContract,
    premium: Decimal,
    abs_delta: f64,
    score: ContractScore,
}

/// Chooses the single best contract for `request` from `chain`.
#[must_use]
pub fn select_best_contract(chain: &OptionChain, request: &SelectionRequest<'_>) -> SelectionOutcome {
    let rules = request.rules;
    let action = request.action;

    if !earnings_ok(request.earnings_date, request.today, rules.earnings_avoid_days) {
        return SelectionOutcome::skipped(
            SkipReason::EarningsBlocked,
            format!(
                "earnings {} within {} days",
                request
                    .earnings_date
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
                rules.earnings_avoid_days
            ),
        );
    }

    let expirations = chain.sorted_expirations();
    if expirations.is_empty() {
        return SelectionOutcome::skipped(SkipReason::NoContractInDte, "no expirations in chain");
    }

    let Some(choice) = pick_expiration(&expirations, request.today, rules) else {
        return SelectionOutcome::skipped(
            SkipReason::NoContractInDte,
            format!(
                "no expiration in DTE windows primary=[{},{}] fallback=[{},{}] allow_fallback={}; available: {}",
                rules.dte_min_primary,
                rules.dte_max_primary,
                rules.dte_min_fallback,
                rules.dte_max_fallback,
                rules.allow_fallback_dte,
                describe_available(&expirations, request.today)
            ),
        );
    };

    let contracts = chain.contracts_for(action.right(), choice.expiration);
    if contracts.is_empty() {
        return SelectionOutcome::skipped(
            SkipReason::NoContracts,
            format!("no {} contracts for {}", action.right(), choice.expiration),
        );
    }

    let current_price = request
        .current_price
        .or(chain.underlying_price)
        .filter(|p| *p > Decimal::ZERO);
    let strike_ok = |c: &OptionContract| strike_allowed(c, action, current_price, request.allow_itm);
    let funnel = FilterFunnel::compute(&contracts, action, rules, strike_ok);

    let mut missing_premium = 0usize;
    let mut scored: Vec<Scored<'_>> = Vec::new();
    for contract in contracts {
        if !delta_eligible(contract, action, rules)
            || !strike_ok(contract)
            || check_liquidity(contract, rules).is_err()
        {
            continue;
        }
        let Some(premium) = contract.premium() else {
            missing_premium += 1;
            continue;
        };
        if contract.strike <= Decimal::ZERO {
            continue;
        }
        let Some(score) = score_contract(
            contract,
            premium,
            choice.dte,
            rules,
            request.weights,
            &request.underlying,
        ) else {
            missing_premium += 1;
            continue;
        };
        scored.push(Scored {
            contract,
            premium,
            abs_delta: contract.abs_delta().unwrap_or_default(),
            score,
        });
    }

    scored.sort_by(|a, b| rank_order(action, a, b));

    let Some(best) = scored.into_iter().next() else {
        let reason = if missing_premium > 0 {
            SkipReason::NoPremium
        } else {
            funnel.skip_reason()
        };
        return SelectionOutcome::Skipped {
            reason,
            funnel: Some(funnel),
            detail: format!("no pick | {funnel} | reason={reason}"),
        };
    };

    debug!(
        ticker = request.ticker,
        action = %action,
        contract = %best.contract.display_name(),
        window = %choice.window,
        score = best.score.score,
        "Contract selected"
    );

    SelectionOutcome::Selected(Box::new(SelectedContract {
        ticker: request.ticker.to_uppercase(),
        action,
        contract: best.contract.clone(),
        expiration: choice.expiration,
        dte: choice.dte,
        window: choice.window,
        premium: best.premium,
        score: best.score,
        abs_delta: best.abs_delta,
        collateral: best.contract.strike * Decimal::from(CONTRACT_MULTIPLIER),
        underlying_price: current_price,
        funnel,
    }))
}

/// Descending score, then yield; remaining ties favour the strike further
/// from the money (lower puts, higher calls).
fn rank_order(action: WheelAction, a: &Scored<'_>, b: &Scored<'_>) -> Ordering {
    b.score
        .score
        .partial_cmp(&a.score.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.score
                .annualized_yield
                .partial_cmp(&a.score.annualized_yield)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| match action {
            WheelAction::Csp => a.contract.strike.cmp(&b.contract.strike),
            WheelAction::Cc => b.contract.strike.cmp(&a.contract.strike),
        })
}
