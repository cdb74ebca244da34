//! Wheel strategy rules: delta bands, DTE windows, earnings exclusion and
//! liquidity thresholds shared by the CSP and CC pick builders.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

use crate::options::WheelAction;

/// Rule validation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RulesError {
    #[error("invalid {name} delta band: min={min}, max={max} (need 0 <= min <= max <= 1)")]
    DeltaBand { name: &'static str, min: f64, max: f64 },

    #[error("invalid {name} DTE window: min={min}, max={max} (need 1 <= min <= max)")]
    DteWindow { name: &'static str, min: i64, max: i64 },

    #[error("{name} must be non-negative, got {value}")]
    Negative { name: &'static str, value: String },
}

/// Configurable rules applied when choosing wheel contracts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelRules {
    pub csp_delta_min: f64,
    pub csp_delta_max: f64,
    pub cc_delta_min: f64,
    pub cc_delta_max: f64,

    pub dte_min_primary: i64,
    pub dte_max_primary: i64,
    pub dte_min_fallback: i64,
    pub dte_max_fallback: i64,
    pub allow_fallback_dte: bool,

    /// Skip tickers reporting earnings within this many days.
    pub earnings_avoid_days: i64,

    pub rsi_period: u32,
    pub rsi_interval: String,

    /// Maximum bid/ask spread as a percentage of mid.
    pub max_spread_pct: Decimal,
    pub min_open_interest: i64,
    pub min_bid: Decimal,
    /// Absolute spread cap when mid < 1.00.
    pub max_abs_spread_low_premium: Decimal,
    /// Absolute spread cap when mid >= 1.00.
    pub max_abs_spread_high_premium: Decimal,
}

impl Default for WheelRules {
    fn default() -> Self {
        Self {
            csp_delta_min: 0.20,
            csp_delta_max: 0.30,
            cc_delta_min: 0.20,
            cc_delta_max: 0.30,
            dte_min_primary: 5,
            dte_max_primary: 9,
            dte_min_fallback: 10,
            dte_max_fallback: 16,
            allow_fallback_dte: true,
            earnings_avoid_days: 10,
            rsi_period: 14,
            rsi_interval: "1day".to_string(),
            max_spread_pct: Decimal::new(75, 1),
            min_open_interest: 10,
            min_bid: Decimal::new(5, 2),
            max_abs_spread_low_premium: Decimal::new(10, 2),
            max_abs_spread_high_premium: Decimal::new(25, 2),
        }
    }
}

impl WheelRules {
    /// Validates ranges and thresholds.
    ///
    /// # Errors
    ///
    /// Returns the first rule that is out of range.
    pub fn validate(&self) -> Result<(), RulesError> {
        check_delta("CSP", self.csp_delta_min, self.csp_delta_max)?;
        check_delta("CC", self.cc_delta_min, self.cc_delta_max)?;
        check_dte("primary", self.dte_min_primary, self.dte_max_primary)?;
        check_dte("fallback", self.dte_min_fallback, self.dte_max_fallback)?;

        if self.earnings_avoid_days < 0 {
            return Err(RulesError::Negative {
                name: "earnings_avoid_days",
                value: self.earnings_avoid_days.to_string(),
            });
        }
        if self.min_open_interest < 0 {
            return Err(RulesError::Negative {
                name: "min_open_interest",
                value: self.min_open_interest.to_string(),
            });
        }
        for (name, value) in [
            ("max_spread_pct", self.max_spread_pct),
            ("min_bid", self.min_bid),
            ("max_abs_spread_low_premium", self.max_abs_spread_low_premium),
            ("max_abs_spread_high_premium", self.max_abs_spread_high_premium),
        ] {
            if value.is_sign_negative() {
                return Err(RulesError::Negative {
                    name,
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Delta band `(min, max)` applied to the absolute delta for an action.
    #[must_use]
    pub const fn delta_band(&self, action: WheelAction) -> (f64, f64) {
        match action {
            WheelAction::Csp => (self.csp_delta_min, self.csp_delta_max),
            WheelAction::Cc => (self.cc_delta_min, self.cc_delta_max),
        }
    }

    /// True when `abs_delta` lies inside the action's band (inclusive).
    #[must_use]
    pub fn delta_in_band(&self, action: WheelAction, abs_delta: f64) -> bool {
        let (min, max) = self.delta_band(action);
        (min..=max).contains(&abs_delta)
    }

    /// Checks percentage spread and the tiered absolute spread cap.
    ///
    /// Requires a two-sided quote. The absolute cap is
    /// `max_abs_spread_low_premium` below a 1.00 mid and
    /// `max_abs_spread_high_premium` otherwise.
    #[must_use]
    pub fn spread_ok(&self, bid: Decimal, ask: Decimal) -> bool {
        if bid <= Decimal::ZERO || ask <= Decimal::ZERO {
            return false;
        }
        let mid = (bid + ask) / Decimal::TWO;
        if mid <= Decimal::ZERO {
            return false;
        }
        let spread = ask - bid;
        let spread_pct = spread / mid * Decimal::ONE_HUNDRED;
        if spread_pct > self.max_spread_pct {
            return false;
        }
        spread <= self.abs_spread_cap(mid)
    }

    /// Absolute spread cap for a given mid price.
    #[must_use]
    pub fn abs_spread_cap(&self, mid: Decimal) -> Decimal {
        if mid < Decimal::ONE {
            self.max_abs_spread_low_premium
        } else {
            self.max_abs_spread_high_premium
        }
    }

    /// Applies the flat environment variables used by the original worker
    /// deployment (`CSP_DELTA_MIN`, `DTE_MIN_PRIMARY`, ...).
    ///
    /// Unparseable values are ignored with a warning.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Same as [`with_env_overrides`](Self::with_env_overrides) with an
    /// injectable lookup.
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        override_parsed(&lookup, "CSP_DELTA_MIN", &mut self.csp_delta_min);
        override_parsed(&lookup, "CSP_DELTA_MAX", &mut self.csp_delta_max);
        override_parsed(&lookup, "CC_DELTA_MIN", &mut self.cc_delta_min);
        override_parsed(&lookup, "CC_DELTA_MAX", &mut self.cc_delta_max);
        override_parsed(&lookup, "DTE_MIN_PRIMARY", &mut self.dte_min_primary);
        override_parsed(&lookup, "DTE_MAX_PRIMARY", &mut self.dte_max_primary);
        override_parsed(&lookup, "DTE_MIN_FALLBACK", &mut self.dte_min_fallback);
        override_parsed(&lookup, "DTE_MAX_FALLBACK", &mut self.dte_max_fallback);
        override_parsed(&lookup, "EARNINGS_AVOID_DAYS", &mut self.earnings_avoid_days);
        override_parsed(&lookup, "RSI_PERIOD", &mut self.rsi_period);
        override_parsed(&lookup, "WHEEL_MAX_SPREAD_PCT", &mut self.max_spread_pct);
        override_parsed(&lookup, "WHEEL_MIN_OPEN_INTEREST", &mut self.min_open_interest);
        override_parsed(&lookup, "WHEEL_MIN_BID", &mut self.min_bid);
        override_parsed(
            &lookup,
            "MAX_ABS_SPREAD_LOW_PREMIUM",
            &mut self.max_abs_spread_low_premium,
        );
        override_parsed(
            &lookup,
            "MAX_ABS_SPREAD_HIGH_PREMIUM",
            &mut self.max_abs_spread_high_premium,
        );

        if let Some(interval) = lookup("RSI_INTERVAL") {
            let interval = interval.trim();
            if !interval.is_empty() {
                self.rsi_interval = interval.to_string();
            }
        }
        if let Some(raw) = lookup("ALLOW_FALLBACK_DTE") {
            match parse_bool(&raw) {
                Some(flag) => self.allow_fallback_dte = flag,
                None => warn!(value = %raw, "Ignoring invalid ALLOW_FALLBACK_DTE"),
            }
        }
        self
    }
}

fn check_delta(name: &'static str, min: f64, max: f64) -> Result<(), RulesError> {
    if !(0.0..=1.0).contains(&min) || !(0.0..=1.0).contains(&max) || min > max {
        return Err(RulesError::DeltaBand { name, min, max });
    }
    Ok(())
}

fn check_dte(name: &'static str, min: i64, max: i64) -> Result<(), RulesError> {
    if min < 1 || min > max {
        return Err(RulesError::DteWindow { name, min, max });
    }
    Ok(())
}

fn override_parsed<T, F>(lookup: &F, key: &str, target: &mut T)
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => warn!(key, value = %raw, "Ignoring invalid rule override"),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Days from `today` until `date` (negative when in the past).
#[must_use]
pub fn days_between(today: NaiveDate, date: NaiveDate) -> i64 {
    (date - today).num_days()
}

/// True when `expiration` is after `today` and its DTE is within
/// `[min_dte, max_dte]` inclusive.
#[must_use]
pub fn is_within_dte_window(
    expiration: NaiveDate,
    today: NaiveDate,
    min_dte: i64,
    max_dte: i64,
) -> bool {
    if expiration <= today {
        return false;
    }
    let dte = days_between(today, expiration);
    (min_dte..=max_dte).contains(&dte)
}

/// Earnings exclusion. Unknown or past earnings never block; upcoming
/// earnings block unless they are more than `avoid_days` away.
#[must_use]
pub fn earnings_ok(earnings_date: Option<NaiveDate>, today: NaiveDate, avoid_days: i64) -> bool {
    let Some(date) = earnings_date else {
        return true;
    };
    if date < today {
        return true;
    }
    days_between(today, date) > avoid_days
}

/// First expiration (ascending) inside the DTE window.
#[must_use]
pub fn find_expiration_in_window(
    expirations: &[NaiveDate],
    today: NaiveDate,
    min_dte: i64,
    max_dte: i64,
) -> Option<NaiveDate> {
    let mut sorted = expirations.to_vec();
    sorted.sort_unstable();
    sorted
        .into_iter()
        .find(|exp| is_within_dte_window(*exp, today, min_dte, max_dte))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let rules = WheelRules::default();
        assert!(rules.validate().is_ok());
        assert_eq!(rules.delta_band(WheelAction::Csp), (0.20, 0.30));
        assert_eq!(rules.max_spread_pct, dec!(7.5));
        assert!(rules.allow_fallback_dte);
    }

    #[test]
    fn test_validate_rejects_inverted_delta() {
        let rules = WheelRules {
            csp_delta_min: 0.4,
            csp_delta_max: 0.3,
            ..WheelRules::default()
        };
        assert!(matches!(
            rules.validate(),
            Err(RulesError::DeltaBand { name: "CSP", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_delta_above_one() {
        let rules = WheelRules {
            cc_delta_max: 1.2,
            ..WheelRules::default()
        };
        assert!(rules.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_dte() {
        let rules = WheelRules {
            dte_min_fallback: 0,
            ..WheelRules::default()
        };
        assert!(matches!(
            rules.validate(),
            Err(RulesError::DteWindow { name: "fallback", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_negative_thresholds() {
        let rules = WheelRules {
            min_bid: dec!(-0.01),
            ..WheelRules::default()
        };
        assert!(matches!(
            rules.validate(),
            Err(RulesError::Negative { name: "min_bid", .. })
        ));
    }

    #[test]
    fn test_dte_window_is_inclusive_and_future_only() {
        let today = day(2025, 1, 6);
        assert!(is_within_dte_window(day(2025, 1, 11), today, 5, 9));
        assert!(is_within_dte_window(day(2025, 1, 15), today, 5, 9));
        assert!(!is_within_dte_window(day(2025, 1, 16), today, 5, 9));
        assert!(!is_within_dte_window(day(2025, 1, 10), today, 5, 9));
        assert!(!is_within_dte_window(today, today, 0, 9));
    }

    #[test]
    fn test_earnings_ok() {
        let today = day(2025, 1, 6);
        assert!(earnings_ok(None, today, 10));
        assert!(earnings_ok(Some(day(2025, 1, 1)), today, 10));
        assert!(!earnings_ok(Some(day(2025, 1, 16)), today, 10));
        assert!(earnings_ok(Some(day(2025, 1, 17)), today, 10));
        assert!(!earnings_ok(Some(today), today, 10));
    }

    #[test]
    fn test_find_expiration_sorts_first() {
        let today = day(2025, 1, 6);
        let exps = vec![day(2025, 1, 17), day(2025, 1, 13), day(2025, 1, 3)];
        assert_eq!(
            find_expiration_in_window(&exps, today, 5, 16),
            Some(day(2025, 1, 13))
        );
        assert_eq!(find_expiration_in_window(&exps, today, 20, 30), None);
    }

    #[test]
    fn test_spread_ok_tiers() {
        let rules = WheelRules::default();
        // 0.07 / 1.035 = 6.76%, mid >= 1 so 0.25 cap
        assert!(rules.spread_ok(dec!(1.00), dec!(1.07)));
        // 0.07 / 0.535 = 13%
        assert!(!rules.spread_ok(dec!(0.50), dec!(0.57)));
        // 0.10 / 0.50 = 20%
        assert!(!rules.spread_ok(dec!(0.45), dec!(0.55)));
        // 0.08 / 1.04 = 7.69%
        assert!(!rules.spread_ok(dec!(1.00), dec!(1.08)));
        // 0.15 / 2.075 = 7.23%
        assert!(rules.spread_ok(dec!(2.00), dec!(2.15)));
        // 0.26 / 2.13 = 12.2%
        assert!(!rules.spread_ok(dec!(2.00), dec!(2.26)));
    }

    #[test]
    fn test_spread_ok_absolute_cap_binds_on_expensive_contracts() {
        let rules = WheelRules::default();
        // 0.30 / 10.15 = 2.96% but over the 0.25 absolute cap
        assert!(!rules.spread_ok(dec!(10.00), dec!(10.30)));
        assert!(rules.spread_ok(dec!(10.00), dec!(10.25)));
    }

    #[test]
    fn test_spread_ok_requires_two_sided_quote() {
        let rules = WheelRules::default();
        assert!(!rules.spread_ok(Decimal::ZERO, dec!(0.10)));
        assert!(!rules.spread_ok(dec!(0.10), Decimal::ZERO));
    }

    #[test]
    fn test_overrides_apply_and_ignore_garbage() {
        let vars: HashMap<&str, &str> = [
            ("CSP_DELTA_MIN", "0.15"),
            ("DTE_MAX_PRIMARY", "12"),
            ("WHEEL_MIN_BID", "0.10"),
            ("ALLOW_FALLBACK_DTE", "false"),
            ("EARNINGS_AVOID_DAYS", "soon"),
            ("RSI_INTERVAL", "weekly"),
        ]
        .into_iter()
        .collect();

        let rules = WheelRules::default()
            .with_overrides(|key| vars.get(key).map(|v| (*v).to_string()));

        assert_eq!(rules.csp_delta_min, 0.15);
        assert_eq!(rules.dte_max_primary, 12);
        assert_eq!(rules.min_bid, dec!(0.10));
        assert!(!rules.allow_fallback_dte);
        assert_eq!(rules.earnings_avoid_days, 10);
        assert_eq!(rules.rsi_interval, "weekly");
    }
}
