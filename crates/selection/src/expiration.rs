//! Tiered expiration choice: primary DTE window, then fallback.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use wheel_core::rules::{days_between, find_expiration_in_window};
use wheel_core::WheelRules;

/// Which DTE window produced the expiration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DteWindow {
    Primary,
    Fallback,
}

impl fmt::Display for DteWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationChoice {
    pub expiration: NaiveDate,
    pub dte: i64,
    pub window: DteWindow,
}

/// Picks the nearest expiration in the primary window, else (when
/// `allow_fallback_dte`) the nearest one in the fallback window.
#[must_use]
pub fn pick_expiration(
    expirations: &[NaiveDate],
    today: NaiveDate,
    rules: &WheelRules,
) -> Option<ExpirationChoice> {
    let choose = |expiration: NaiveDate, window| ExpirationChoice {
        expiration,
        dte: days_between(today, expiration),
        window,
    };

    if let Some(exp) = find_expiration_in_window(
        expirations,
        today,
        rules.dte_min_primary,
        rules.dte_max_primary,
    ) {
        return Some(choose(exp, DteWindow::Primary));
    }

    if !rules.allow_fallback_dte {
        return None;
    }

    find_expiration_in_window(
        expirations,
        today,
        rules.dte_min_fallback,
        rules.dte_max_fallback,
    )
    .map(|exp| choose(exp, DteWindow::Fallback))
}

/// Future expirations with their DTE, for "nothing in window" logs.
#[must_use]
pub fn describe_available(expirations: &[NaiveDate], today: NaiveDate) -> String {
    let mut future: Vec<NaiveDate> = expirations.iter().copied().filter(|e| *e > today).collect();
    future.sort_unstable();
    future
        .iter()
        .map(|e| format!("{e}(dte={})", days_between(today, *e)))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
    }

    fn in_days(n: i64) -> NaiveDate {
        today() + chrono::Duration::days(n)
    }

    #[test]
    fn primary_window_wins() {
        let rules = WheelRules::default();
        let choice = pick_expiration(&[in_days(14), in_days(7), in_days(3)], today(), &rules)
            .expect("primary");
        assert_eq!(choice.expiration, in_days(7));
        assert_eq!(choice.dte, 7);
        assert_eq!(choice.window, DteWindow::Primary);
    }

    #[test]
    fn falls_back_when_primary_empty() {
        let rules = WheelRules::default();
        let choice =
            pick_expiration(&[in_days(3), in_days(14), in_days(11)], today(), &rules).expect("fallback");
        assert_eq!(choice.expiration, in_days(11));
        assert_eq!(choice.window, DteWindow::Fallback);
    }

    #[test]
    fn no_fallback_when_disabled() {
        let rules = WheelRules {
            allow_fallback_dte: false,
            ..WheelRules::default()
        };
        assert!(pick_expiration(&[in_days(14)], today(), &rules).is_none());
    }

    #[test]
    fn nothing_in_either_window() {
        let rules = WheelRules::default();
        assert!(pick_expiration(&[in_days(2), in_days(30)], today(), &rules).is_none());
        assert!(pick_expiration(&[], today(), &rules).is_none());
    }

    #[test]
    fn describe_lists_future_only() {
        let out = describe_available(&[in_days(30), in_days(-1), in_days(2)], today());
        assert_eq!(out, "2025-01-08(dte=2), 2025-02-05(dte=30)");
    }
}
