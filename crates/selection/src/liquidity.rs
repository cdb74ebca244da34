//! Per-contract liquidity gate: quote presence, minimum bid, percentage and
//! tiered absolute spread caps, open interest.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use wheel_core::{OptionContract, WheelRules};

/// Why a contract failed the liquidity gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LiquidityRejection {
    #[error("missing bid/ask")]
    MissingQuote,

    #[error("bid {bid} below minimum {min_bid}")]
    BidTooLow { bid: Decimal, min_bid: Decimal },

    #[error("spread {spread_pct:.1}% above {max_pct}%")]
    SpreadTooWide { spread_pct: Decimal, max_pct: Decimal },

    #[error("absolute spread {spread} above cap {cap}")]
    AbsoluteSpreadTooWide { spread: Decimal, cap: Decimal },

    #[error("open interest {open_interest} below {min}")]
    LowOpenInterest { open_interest: i64, min: i64 },
}

/// True when the bid clears both zero and `min_bid`.
#[must_use]
pub fn bid_ok(contract: &OptionContract, rules: &WheelRules) -> bool {
    contract.bid > Decimal::ZERO && contract.bid >= rules.min_bid
}

#[must_use]
pub fn open_interest_ok(contract: &OptionContract, rules: &WheelRules) -> bool {
    contract.open_interest >= rules.min_open_interest
}

/// Runs every liquidity check in order, returning the first failure.
///
/// # Errors
///
/// Returns the first [`LiquidityRejection`] the contract hits.
pub fn check_liquidity(contract: &OptionContract, rules: &WheelRules) -> Result<(), LiquidityRejection> {
    let (bid, ask) = (contract.bid, contract.ask);
    if bid <= Decimal::ZERO || ask <= Decimal::ZERO {
        return Err(LiquidityRejection::MissingQuote);
    }
    if !bid_ok(contract, rules) {
        return Err(LiquidityRejection::BidTooLow {
            bid,
            min_bid: rules.min_bid,
        });
    }

    let mid = (bid + ask) / Decimal::TWO;
    let spread = ask - bid;
    let spread_pct = spread / mid * Decimal::ONE_HUNDRED;
    if spread_pct > rules.max_spread_pct {
        return Err(LiquidityRejection::SpreadTooWide {
            spread_pct: spread_pct.round_dp(2),
            max_pct: rules.max_spread_pct,
        });
    }
    let cap = rules.abs_spread_cap(mid);
    if spread > cap {
        return Err(LiquidityRejection::AbsoluteSpreadTooWide { spread, cap });
    }

    if !open_interest_ok(contract, rules) {
        return Err(LiquidityRejection::LowOpenInterest {
            open_interest: contract.open_interest,
            min: rules.min_open_interest,
        });
    }
    Ok(())
}
