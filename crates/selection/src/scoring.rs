//! Composite contract score.
//!
//! `score = yield_weight * annualized_yield - liquidity_penalty + bonus`
//! where the bonus rewards strong underlyings (screening score) and a
//! neutral RSI. All terms are in annualized-yield units, so the default
//! weights let a 2-3 point yield edge outweigh the penalties and bonuses.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use wheel_core::{OptionContract, WheelRules};

pub use wheel_core::ScoringWeights;

use crate::screening::score_technical;
use crate::types::UnderlyingContext;

/// Score breakdown for one contract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContractScore {
    pub annualized_yield: f64,
    pub liquidity_penalty: f64,
    pub bonus: f64,
    pub score: f64,
}

/// `(premium / strike) * (365 / dte)`. `None` for non-positive inputs.
#[must_use]
pub fn annualized_yield(premium: Decimal, strike: Decimal, dte: i64) -> Option<f64> {
    if premium <= Decimal::ZERO || strike <= Decimal::ZERO || dte <= 0 {
        return None;
    }
    let premium_yield = (premium / strike).to_f64()?;
    Some(premium_yield * (365.0 / dte as f64))
}

/// Penalty for wide spreads and thin open interest.
///
/// Spread term: `weight * spread_pct / max_spread_pct` (clamped to 1).
/// Open-interest term: `weight / 2 * shortfall` below `open_interest_floor`.
#[must_use]
pub fn liquidity_penalty(contract: &OptionContract, rules: &WheelRules, weights: &ScoringWeights) -> f64 {
    let weight = weights.liquidity_penalty_weight;
    if weight <= 0.0 {
        return 0.0;
    }

    let max_pct = rules.max_spread_pct.to_f64().unwrap_or(0.0);
    let spread_term = match contract.spread_pct().and_then(|p| p.to_f64()) {
        Some(pct) if max_pct > 0.0 => (pct / max_pct).clamp(0.0, 1.0),
        Some(_) => 0.0,
        None => 1.0,
    };

    let floor = weights.open_interest_floor;
    let oi_term = if floor > 0 && contract.open_interest < floor {
        let oi = contract.open_interest.max(0) as f64;
        1.0 - oi / floor as f64
    } else {
        0.0
    };

    weight * spread_term + weight / 2.0 * oi_term
}

/// Bonus from the underlying's screening score and RSI.
#[must_use]
pub fn underlying_bonus(ctx: &UnderlyingContext, weights: &ScoringWeights) -> f64 {
    let fundamentals = ctx
        .wheel_score
        .map(|s| weights.fundamentals_bonus_weight * ((s - 50.0) / 50.0).clamp(-1.0, 1.0))
        .unwrap_or(0.0);

    let technical = ctx
        .rsi
        .map(|rsi| weights.technical_bonus_weight * score_technical(Some(rsi)) / 100.0)
        .unwrap_or(0.0);

    fundamentals + technical
}

/// Scores a contract, or `None` when its yield cannot be computed.
#[must_use]
pub fn score_contract(
    contract: &OptionContract,
    premium: Decimal,
    dte: i64,
    rules: &WheelRules,
    weights: &ScoringWeights,
    ctx: &UnderlyingContext,
) -> Option<ContractScore> {
    let annualized_yield = annualized_yield(premium, contract.strike, dte)?;
    let liquidity_penalty = liquidity_penalty(contract, rules, weights);
    let bonus = underlying_bonus(ctx, weights);
    Some(ContractScore {
        annualized_yield,
        liquidity_penalty,
        bonus,
        score: weights.yield_weight * annualized_yield - liquidity_penalty + bonus,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use wheel_core::OptionRight;

    fn contract(bid: Decimal, ask: Decimal, oi: i64) -> OptionContract {
        let exp = NaiveDate::from_ymd_opt(2025, 1, 17).unwrap();
        let mut c = OptionContract::new("AAPL", OptionRight::Put, exp, dec!(100));
        c.bid = bid;
        c.ask = ask;
        c.open_interest = oi;
        c
    }

    #[test]
    fn annualized_yield_formula() {
        // 1.00 on a 100 strike for 7 days: 1% * 365/7
        let y = annualized_yield(dec!(1.00), dec!(100), 7).unwrap();
        assert!((y - 0.521_428).abs() < 1e-5);
    }

    #[test]
    fn annualized_yield_rejects_degenerate_inputs() {
        assert!(annualized_yield(dec!(1), dec!(0), 7).is_none());
        assert!(annualized_yield(dec!(0), dec!(100), 7).is_none());
        assert!(annualized_yield(dec!(1), dec!(100), 0).is_none());
    }

    #[test]
    fn tight_deep_market_has_no_oi_penalty() {
        let rules = WheelRules::default();
        let weights = ScoringWeights::default();
        let tight = liquidity_penalty(&contract(dec!(2.00), dec!(2.02), 500), &rules, &weights);
        let wide = liquidity_penalty(&contract(dec!(2.00), dec!(2.14), 500), &rules, &weights);
        assert!(tight < wide);
        assert!(wide <= weights.liquidity_penalty_weight);
    }

    #[test]
    fn thin_open_interest_adds_penalty() {
        let rules = WheelRules::default();
        let weights = ScoringWeights::default();
        let deep = liquidity_penalty(&contract(dec!(2.00), dec!(2.02), 100), &rules, &weights);
        let thin = liquidity_penalty(&contract(dec!(2.00), dec!(2.02), 10), &rules, &weights);
        assert!((thin - deep - 0.025 * 0.9).abs() < 1e-9);
    }

    #[test]
    fn yield_only_weights_ignore_penalties() {
        let rules = WheelRules::default();
        let weights = ScoringWeights::yield_only();
        let ctx = UnderlyingContext {
            wheel_score: Some(90.0),
            rsi: Some(50.0),
            ..UnderlyingContext::default()
        };
        let c = contract(dec!(1.00), dec!(1.05), 1);
        let s = score_contract(&c, dec!(1.00), 7, &rules, &weights, &ctx).unwrap();
        assert!((s.score - s.annualized_yield).abs() < 1e-12);
    }

    #[test]
    fn bonus_tracks_underlying_quality() {
        let weights = ScoringWeights::default();
        let strong = UnderlyingContext {
            wheel_score: Some(100.0),
            rsi: Some(50.0),
            ..UnderlyingContext::default()
        };
        let weak = UnderlyingContext {
            wheel_score: Some(20.0),
            rsi: Some(85.0),
            ..UnderlyingContext::default()
        };
        assert!((underlying_bonus(&strong, &weights) - 0.07).abs() < 1e-9);
        assert!(underlying_bonus(&weak, &weights) < 0.0);
        assert_eq!(underlying_bonus(&UnderlyingContext::default(), &weights), 0.0);
    }
}
