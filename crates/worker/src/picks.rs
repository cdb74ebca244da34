//! Pieces shared by the CSP and CC pick builders.

use rust_decimal::Decimal;
use serde_json::{json, Value};
use wheel_core::WheelRules;
use wheel_data::{CandidateRecord, PickRecord};
use wheel_selection::{SelectedContract, SkipCounters, UnderlyingContext};

/// Output of a pick builder before persistence.
#[derive(Debug, Clone, Default)]
pub struct PickBuild {
    pub picks: Vec<PickRecord>,
    pub selected: Vec<SelectedContract>,
    pub skips: SkipCounters,
    pub processed: usize,
}

impl PickBuild {
    /// One line for logs and alert emails.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "processed={} created={} {}",
            self.processed,
            self.picks.len(),
            self.skips.summary()
        )
    }
}

/// Underlying context from a screening candidate, with a live IV reading
/// taking precedence over the stored one.
#[must_use]
pub fn underlying_context(
    candidate: Option<&CandidateRecord>,
    iv: Option<f64>,
    iv_rank: Option<f64>,
) -> UnderlyingContext {
    UnderlyingContext {
        wheel_score: candidate.map(|c| f64::from(c.score)),
        rsi: candidate.and_then(|c| c.rsi),
        iv: iv.or_else(|| candidate.and_then(|c| c.iv)),
        iv_rank: iv_rank.or_else(|| candidate.and_then(|c| c.iv_rank)),
    }
}

/// Persistable row for a selected contract.
#[must_use]
pub fn pick_record(
    run_id: i64,
    rank: i32,
    selected: &SelectedContract,
    candidate: Option<&CandidateRecord>,
    underlying: &UnderlyingContext,
    rules: &WheelRules,
    extra_metrics: Value,
) -> PickRecord {
    let mut metrics = selected.pick_metrics(rules, underlying);
    if let (Some(obj), Value::Object(extra)) = (metrics.as_object_mut(), extra_metrics) {
        obj.extend(extra);
    }

    PickRecord {
        run_id,
        ticker: selected.ticker.clone(),
        action: selected.action.as_str().to_string(),
        option_symbol: Some(selected.contract.symbol.clone()),
        expiration: selected.expiration,
        dte: i32::try_from(selected.dte).unwrap_or(i32::MAX),
        strike: selected.contract.strike,
        premium: selected.premium,
        delta: selected.contract.delta,
        target_delta: selected.abs_delta,
        annualized_yield: selected.score.annualized_yield,
        score: selected.score.score,
        rank,
        collateral: selected.collateral,
        price: selected
            .underlying_price
            .or_else(|| candidate.and_then(|c| c.price).and_then(Decimal::from_f64_retain)),
        iv: underlying.iv,
        iv_rank: underlying.iv_rank,
        beta: candidate.and_then(|c| c.beta),
        rsi: underlying.rsi,
        earn_in_days: candidate.and_then(|c| c.earn_in_days),
        sentiment_score: candidate.and_then(|c| c.sentiment_score),
        pick_metrics: metrics,
    }
}

/// Extra metrics merged into every pick.
#[must_use]
pub fn base_extra(earnings_date: Option<chrono::NaiveDate>) -> Value {
    json!({ "earnings_date": earnings_date })
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use rust_decimal_macros::dec;
    use wheel_core::{ScoringWeights, WheelAction};
    use wheel_selection::{select_best_contract, SelectionRequest};

    #[test]
    fn test_pick_record_from_selection() {
        let rules = WheelRules::default();
        let weights = ScoringWeights::default();
        let chain = put_chain("KO");
        let request = SelectionRequest::new("KO", WheelAction::Csp, today(), &rules, &weights);
        let selected = select_best_contract(&chain, &request).into_selected().unwrap();

        let mut candidate = CandidateRecord::new(4, "KO", 2, 71);
        candidate.beta = Some(0.6);
        candidate.rsi = Some(44.0);
        candidate.sentiment_score = Some(60);
        let underlying = underlying_context(Some(&candidate), Some(0.3), None);
        assert_eq!(underlying.wheel_score, Some(71.0));

        let pick = pick_record(
            4,
            2,
            &selected,
            Some(&candidate),
            &underlying,
            &rules,
            base_extra(None),
        );
        assert_eq!(pick.action, "CSP");
        assert_eq!(pick.strike, dec!(95));
        assert_eq!(pick.target_delta, 0.22);
        assert_eq!(pick.delta, Some(-0.22));
        assert_eq!(pick.collateral, dec!(9500));
        assert_eq!(pick.price, Some(dec!(100)));
        assert_eq!(pick.rsi, Some(44.0));
        assert_eq!(pick.beta, Some(0.6));
        assert!(pick.pick_metrics.get("rule_context").is_some());
        assert!(pick.pick_metrics.get("earnings_date").is_some());
    }
}
