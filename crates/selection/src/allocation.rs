//! Capital allocation across picks.
//!
//! Cash-secured puts tie up `strike * 100` each; the portfolio step keeps the
//! sum inside the deployable budget (budget minus reserve), caps any single
//! ticker, and limits the number of positions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, info};
use wheel_core::{PortfolioConstraints, WheelAction};

use crate::types::SelectedContract;

/// Result of an allocation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationCheck {
    Approved {
        remaining_capacity: Decimal,
        utilization_pct: Decimal,
    },
    Rejected {
        current_pct: Decimal,
        would_be_pct: Decimal,
        max_pct: Decimal,
    },
}

/// Check whether `new_collateral` fits on top of `committed` collateral.
#[must_use]
pub fn check_allocation(
    new_collateral: Decimal,
    committed: Decimal,
    constraints: &PortfolioConstraints,
) -> AllocationCheck {
    let max_allowed = constraints.deployable();
    let after = committed + new_collateral;
    let pct_of_budget = |v: Decimal| {
        if constraints.budget > Decimal::ZERO {
            (v / constraints.budget * Decimal::ONE_HUNDRED).round_dp(2)
        } else {
            Decimal::ZERO
        }
    };

    if after > max_allowed {
        AllocationCheck::Rejected {
            current_pct: pct_of_budget(committed),
            would_be_pct: pct_of_budget(after),
            max_pct: Decimal::ONE_HUNDRED - constraints.reserve_pct,
        }
    } else {
        let utilization_pct = if max_allowed > Decimal::ZERO {
            (after / max_allowed * Decimal::ONE_HUNDRED).round_dp(2)
        } else {
            Decimal::ZERO
        };
        AllocationCheck::Approved {
            remaining_capacity: max_allowed - after,
            utilization_pct,
        }
    }
}

/// A pick competing for budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioCandidate {
    pub ticker: String,
    pub action: WheelAction,
    pub strike: Decimal,
    pub expiration: chrono::NaiveDate,
    pub collateral: Decimal,
    /// Premium for one contract (premium x 100).
    pub expected_premium: Decimal,
    pub score: f64,
    pub annualized_yield: f64,
}

impl From<&SelectedContract> for PortfolioCandidate {
    fn from(pick: &SelectedContract) -> Self {
        Self {
            ticker: pick.ticker.clone(),
            action: pick.action,
            strike: pick.contract.strike,
            expiration: pick.expiration,
            collateral: pick.collateral,
            expected_premium: pick.premium_per_contract(),
            score: pick.score.score,
            annualized_yield: pick.score.annualized_yield,
        }
    }
}

/// Why a candidate did not make the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PortfolioRejection {
    DuplicateTicker,
    MaxPositions { max: usize },
    ExceedsTickerCap { collateral: Decimal, cap: Decimal },
    ExceedsBudget { would_be_pct: Decimal, max_pct: Decimal },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSelection {
    pub selected: Vec<PortfolioCandidate>,
    pub rejected: Vec<(PortfolioCandidate, PortfolioRejection)>,
    /// Cash collateral committed by selected CSPs.
    pub total_collateral: Decimal,
    pub expected_premium: Decimal,
    /// Committed collateral as % of the deployable budget.
    pub utilization_pct: Decimal,
}

/// Greedy budget fill: best score first (ties by yield), one position per
/// ticker whatever the action. Covered calls are backed by shares, so they count
/// toward `max_positions` but not the cash budget.
#[must_use]
pub fn select_portfolio(
    candidates: &[PortfolioCandidate],
    constraints: &PortfolioConstraints,
) -> PortfolioSelection {
    let mut ordered: Vec<&PortfolioCandidate> = candidates.iter().collect();
    ordered.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.annualized_yield
                    .partial_cmp(&a.annualized_yield)
                    .unwrap_or(Ordering::Equal)
            })
    });

    let per_ticker_cap = constraints.per_ticker_cap();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = PortfolioSelection::default();

    for candidate in ordered {
        if seen.contains(candidate.ticker.as_str()) {
            out.rejected
                .push((candidate.clone(), PortfolioRejection::DuplicateTicker));
            continue;
        }
        if out.selected.len() >= constraints.max_positions {
            out.rejected.push((
                candidate.clone(),
                PortfolioRejection::MaxPositions {
                    max: constraints.max_positions,
                },
            ));
            continue;
        }

        if candidate.action == WheelAction::Csp {
            if candidate.collateral > per_ticker_cap {
                out.rejected.push((
                    candidate.clone(),
                    PortfolioRejection::ExceedsTickerCap {
                        collateral: candidate.collateral,
                        cap: per_ticker_cap,
                    },
                ));
                continue;
            }
            match check_allocation(candidate.collateral, out.total_collateral, constraints) {
                AllocationCheck::Approved { .. } => {
                    out.total_collateral += candidate.collateral;
                }
                AllocationCheck::Rejected {
                    would_be_pct,
                    max_pct,
                    ..
                } => {
                    debug!(
                        ticker = %candidate.ticker,
                        would_be_pct = %would_be_pct,
                        "Pick does not fit remaining budget"
                    );
                    out.rejected.push((
                        candidate.clone(),
                        PortfolioRejection::ExceedsBudget {
                            would_be_pct,
                            max_pct,
                        },
                    ));
                    continue;
                }
            }
        }

        seen.insert(candidate.ticker.as_str());
        out.expected_premium += candidate.expected_premium;
        out.selected.push(candidate.clone());
    }

    let deployable = constraints.deployable();
    out.utilization_pct = if deployable > Decimal::ZERO {
        (out.total_collateral / deployable * Decimal::ONE_HUNDRED).round_dp(2)
    } else {
        Decimal::ZERO
    };

    info!(
        selected = out.selected.len(),
        rejected = out.rejected.len(),
        total_collateral = %out.total_collateral,
        expected_premium = %out.expected_premium,
        utilization_pct = %out.utilization_pct,
        "Portfolio selection complete"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn candidate(ticker: &str, strike: Decimal, score: f64) -> PortfolioCandidate {
        PortfolioCandidate {
            ticker: ticker.to_string(),
            action: WheelAction::Csp,
            strike,
            expiration: NaiveDate::from_ymd_opt(2025, 1, 17).unwrap(),
            collateral: strike * dec!(100),
            expected_premium: dec!(50),
            score,
            annualized_yield: score,
        }
    }

    #[test]
    fn approves_within_limit() {
        let constraints = PortfolioConstraints::default(); // 45k deployable
        let result = check_allocation(dec!(10000), dec!(20000), &constraints);
        assert_eq!(
            result,
            AllocationCheck::Approved {
                remaining_capacity: dec!(15000),
                utilization_pct: dec!(66.67),
            }
        );
    }

    #[test]
    fn rejects_over_limit() {
        let constraints = PortfolioConstraints::default();
        let result = check_allocation(dec!(10000), dec!(40000), &constraints);
        assert_eq!(
            result,
            AllocationCheck::Rejected {
                current_pct: dec!(80),
                would_be_pct: dec!(100),
                max_pct: dec!(90),
            }
        );
    }

    #[test]
    fn greedy_fill_by_score() {
        let constraints = PortfolioConstraints {
            budget: dec!(30000),
            max_positions: 10,
            max_per_ticker_pct: dec!(50),
            reserve_pct: dec!(0),
        };
        let picks = vec![
            candidate("LOW", dec!(50), 0.20),
            candidate("TOP", dec!(120), 0.60),
            candidate("MID", dec!(100), 0.40),
            candidate("FIT", dec!(60), 0.30),
        ];

        let result = select_portfolio(&picks, &constraints);
        let tickers: Vec<&str> = result.selected.iter().map(|c| c.ticker.as_str()).collect();
        // TOP 12k + MID 10k = 22k; FIT 6k = 28k; LOW 5k would be 33k
        assert_eq!(tickers, vec!["TOP", "MID", "FIT"]);
        assert_eq!(result.total_collateral, dec!(28000));
        assert_eq!(result.expected_premium, dec!(150));
        assert_eq!(result.rejected.len(), 1);
        assert!(matches!(
            result.rejected[0].1,
            PortfolioRejection::ExceedsBudget { .. }
        ));
    }

    #[test]
    fn per_ticker_cap_and_duplicates() {
        let constraints = PortfolioConstraints::default(); // 12.5k per ticker
        let picks = vec![
            candidate("BIG", dec!(500), 0.9),
            candidate("AAPL", dec!(100), 0.5),
            candidate("AAPL", dec!(95), 0.4),
        ];
        let result = select_portfolio(&picks, &constraints);
        assert_eq!(result.selected.len(), 1);
        assert_eq!(result.selected[0].strike, dec!(100));
        assert!(result
            .rejected
            .iter()
            .any(|(c, r)| c.ticker == "BIG" && matches!(r, PortfolioRejection::ExceedsTickerCap { .. })));
        assert!(result
            .rejected
            .iter()
            .any(|(_, r)| *r == PortfolioRejection::DuplicateTicker));
    }

    #[test]
    fn csp_and_cc_on_same_ticker_keep_only_the_best() {
        let constraints = PortfolioConstraints::default();
        let mut cc = candidate("AAPL", dec!(110), 0.4);
        cc.action = WheelAction::Cc;
        let picks = vec![candidate("AAPL", dec!(100), 0.5), cc];

        let result = select_portfolio(&picks, &constraints);
        assert_eq!(result.selected.len(), 1);
        assert_eq!(result.selected[0].action, WheelAction::Csp);
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].0.action, WheelAction::Cc);
        assert_eq!(result.rejected[0].1, PortfolioRejection::DuplicateTicker);
    }

    #[test]
    fn max_positions_and_covered_calls() {
        let constraints = PortfolioConstraints {
            max_positions: 2,
            ..PortfolioConstraints::default()
        };
        let mut cc = candidate("MSFT", dec!(450), 0.8);
        cc.action = WheelAction::Cc;
        let picks = vec![cc, candidate("AAPL", dec!(100), 0.5), candidate("KO", dec!(60), 0.3)];

        let result = select_portfolio(&picks, &constraints);
        assert_eq!(result.selected.len(), 2);
        // The covered call uses no cash
        assert_eq!(result.total_collateral, dec!(10000));
        assert_eq!(
            result.rejected[0].1,
            PortfolioRejection::MaxPositions { max: 2 }
        );
    }
}
