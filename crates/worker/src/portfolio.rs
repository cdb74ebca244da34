//! Budget-constrained selection over the latest picks.

use anyhow::Result;
use tracing::{info, warn};
use wheel_core::WheelAction;
use wheel_data::PickRecord;
use wheel_selection::allocation::{select_portfolio, PortfolioCandidate, PortfolioSelection};

use crate::context::JobContext;

/// Picks converted for the allocator. Rows with an unknown action are
/// dropped.
#[must_use]
pub fn portfolio_candidates(picks: &[PickRecord]) -> Vec<PortfolioCandidate> {
    picks
        .iter()
        .filter_map(|p| {
            let action = p.wheel_action()?;
            Some(PortfolioCandidate {
                ticker: p.ticker.clone(),
                action,
                strike: p.strike,
                expiration: p.expiration,
                collateral: p.collateral,
                expected_premium: p.premium_per_contract(),
                score: p.score,
                annualized_yield: p.annualized_yield,
            })
        })
        .collect()
}

/// Loads the latest CSP and CC picks.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn latest_picks(ctx: &JobContext, limit: i64) -> Result<Vec<PickRecord>> {
    let mut picks = ctx.repos.picks.latest_picks(WheelAction::Csp, limit).await?;
    picks.extend(ctx.repos.picks.latest_picks(WheelAction::Cc, limit).await?);
    Ok(picks)
}

/// Runs the greedy budget fill over the latest picks and logs the result.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn portfolio(ctx: &JobContext) -> Result<PortfolioSelection> {
    let constraints = &ctx.config.portfolio;
    let picks = latest_picks(ctx, 500).await?;
    if picks.is_empty() {
        warn!("No picks available for portfolio selection");
        return Ok(PortfolioSelection::default());
    }

    let selection = select_portfolio(&portfolio_candidates(&picks), constraints);
    info!(
        budget = %constraints.budget,
        deployable = %constraints.deployable(),
        per_ticker_cap = %constraints.per_ticker_cap(),
        "Portfolio constraints"
    );
    for (i, c) in selection.selected.iter().enumerate() {
        info!(
            n = i + 1,
            ticker = %c.ticker,
            action = %c.action,
            strike = %c.strike,
            expiration = %c.expiration,
            collateral = %c.collateral,
            premium = %c.expected_premium,
            score = c.score,
            "Portfolio position"
        );
    }
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wheel_core::PortfolioConstraints;

    fn pick(ticker: &str, action: &str, strike: rust_decimal::Decimal, score: f64) -> PickRecord {
        PickRecord {
            run_id: 1,
            ticker: ticker.to_string(),
            action: action.to_string(),
            option_symbol: None,
            expiration: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            dte: 9,
            strike,
            premium: dec!(0.75),
            delta: None,
            target_delta: 0.25,
            annualized_yield: score,
            score,
            rank: 1,
            collateral: strike * dec!(100),
            price: None,
            iv: None,
            iv_rank: None,
            beta: None,
            rsi: None,
            earn_in_days: None,
            sentiment_score: None,
            pick_metrics: json!({}),
        }
    }

    #[test]
    fn test_candidates_from_picks() {
        let picks = vec![
            pick("KO", "CSP", dec!(60), 0.4),
            pick("AAPL", "CC", dec!(240), 0.3),
            pick("BAD", "STRANGLE", dec!(10), 0.9),
        ];
        let candidates = portfolio_candidates(&picks);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].expected_premium, dec!(75.00));
        assert_eq!(candidates[1].action, WheelAction::Cc);
    }

    #[test]
    fn test_budget_fill_over_picks() {
        let constraints = PortfolioConstraints {
            budget: dec!(20000),
            max_positions: 5,
            max_per_ticker_pct: dec!(60),
            reserve_pct: dec!(10),
        };
        let picks = vec![
            pick("KO", "CSP", dec!(60), 0.4),
            pick("PEP", "CSP", dec!(110), 0.5),
            pick("MSFT", "CSP", dec!(400), 0.9),
            pick("AAPL", "CC", dec!(240), 0.3),
        ];
        let selection = select_portfolio(&portfolio_candidates(&picks), &constraints);
        let tickers: Vec<&str> = selection.selected.iter().map(|c| c.ticker.as_str()).collect();
        // MSFT needs 40k, over the 12k per-ticker cap
        assert_eq!(tickers, vec!["PEP", "KO", "AAPL"]);
        assert_eq!(selection.total_collateral, dec!(17000));
    }
}
