//! Selected option contracts persisted per run and action.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use wheel_core::WheelAction;

/// A row of `screening_picks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PickRecord {
    pub run_id: i64,
    pub ticker: String,
    /// `CSP` or `CC`.
    pub action: String,
    pub option_symbol: Option<String>,
    pub expiration: NaiveDate,
    pub dte: i32,
    pub strike: Decimal,
    /// Per-share premium.
    pub premium: Decimal,
    /// Delta as reported (negative for puts).
    pub delta: Option<f64>,
    /// Absolute delta.
    pub target_delta: f64,
    pub annualized_yield: f64,
    pub score: f64,
    pub rank: i32,
    pub collateral: Decimal,
    /// Underlying price at selection time.
    pub price: Option<Decimal>,
    pub iv: Option<f64>,
    pub iv_rank: Option<f64>,
    pub beta: Option<f64>,
    pub rsi: Option<f64>,
    pub earn_in_days: Option<i32>,
    pub sentiment_score: Option<i32>,
    pub pick_metrics: JsonValue,
}

impl PickRecord {
    #[must_use]
    pub fn wheel_action(&self) -> Option<WheelAction> {
        WheelAction::parse(&self.action)
    }

    /// Premium for one contract.
    #[must_use]
    pub fn premium_per_contract(&self) -> Decimal {
        self.premium * Decimal::from(wheel_core::CONTRACT_MULTIPLIER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_pick_action_and_premium() {
        let pick = PickRecord {
            run_id: 3,
            ticker: "AAPL".to_string(),
            action: "CSP".to_string(),
            option_symbol: Some("AAPL  250117P00150000".to_string()),
            expiration: NaiveDate::from_ymd_opt(2025, 1, 17).unwrap(),
            dte: 7,
            strike: dec!(150),
            premium: dec!(1.25),
            delta: Some(-0.22),
            target_delta: 0.22,
            annualized_yield: 0.43,
            score: 0.41,
            rank: 1,
            collateral: dec!(15000),
            price: Some(dec!(158.2)),
            iv: Some(0.31),
            iv_rank: None,
            beta: None,
            rsi: Some(48.0),
            earn_in_days: None,
            sentiment_score: Some(55),
            pick_metrics: json!({}),
        };
        assert_eq!(pick.wheel_action(), Some(WheelAction::Csp));
        assert_eq!(pick.premium_per_contract(), dec!(125.00));
    }
}
