//! Option-chain domain types shared by the Schwab client and the
//! selection engine.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shares controlled by one standard US equity option.
pub const CONTRACT_MULTIPLIER: i64 = 100;

/// Options contract right (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

impl OptionRight {
    /// Contract type string expected by the Schwab chains endpoint.
    #[must_use]
    pub const fn contract_type(self) -> &'static str {
        match self {
            Self::Call => "CALL",
            Self::Put => "PUT",
        }
    }
}

impl fmt::Display for OptionRight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call => write!(f, "C"),
            Self::Put => write!(f, "P"),
        }
    }
}

/// Which leg of the wheel a pick belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WheelAction {
    /// Cash-secured put: sell a put backed by cash.
    #[serde(rename = "CSP")]
    Csp,
    /// Covered call: sell a call against 100 owned shares.
    #[serde(rename = "CC")]
    Cc,
}

impl WheelAction {
    /// Option right sold for this action.
    #[must_use]
    pub const fn right(self) -> OptionRight {
        match self {
            Self::Csp => OptionRight::Put,
            Self::Cc => OptionRight::Call,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Csp => "CSP",
            Self::Cc => "CC",
        }
    }

    /// Parses the stored action string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CSP" => Some(Self::Csp),
            "CC" => Some(Self::Cc),
            _ => None,
        }
    }
}

impl fmt::Display for WheelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single contract from a fetched chain.
///
/// `bid`/`ask` are zero when the market is one-sided or absent. Greeks are
/// optional because the broker omits them for illiquid strikes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    /// OCC-style option symbol as reported by the broker.
    pub symbol: String,
    pub underlying: String,
    pub right: OptionRight,
    pub expiration: NaiveDate,
    pub strike: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub mark: Option<Decimal>,
    pub last: Option<Decimal>,
    pub delta: Option<f64>,
    pub open_interest: i64,
    pub volume: i64,
    /// Implied volatility as reported (percent or fraction, see
    /// the volatility module for normalisation).
    pub implied_volatility: Option<f64>,
    pub in_the_money: Option<bool>,
}

impl OptionContract {
    /// Minimal contract used by tests and fixtures.
    #[must_use]
    pub fn new(
        underlying: &str,
        right: OptionRight,
        expiration: NaiveDate,
        strike: Decimal,
    ) -> Self {
        Self {
            symbol: format!("{} {}{}", underlying.to_uppercase(), strike, right),
            underlying: underlying.to_uppercase(),
            right,
            expiration,
            strike,
            bid: Decimal::ZERO,
            ask: Decimal::ZERO,
            mark: None,
            last: None,
            delta: None,
            open_interest: 0,
            volume: 0,
            implied_volatility: None,
            in_the_money: None,
        }
    }

    /// Human-readable description (e.g., "NVDA 140P 2026-03-20").
    #[must_use]
    pub fn display_name(&self) -> String {
        format!(
            "{} {}{} {}",
            self.underlying, self.strike, self.right, self.expiration
        )
    }

    /// Midpoint of a two-sided quote.
    #[must_use]
    pub fn mid(&self) -> Option<Decimal> {
        if self.bid > Decimal::ZERO && self.ask > Decimal::ZERO {
            Some((self.bid + self.ask) / Decimal::TWO)
        } else {
            None
        }
    }

    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        self.mid().map(|_| self.ask - self.bid)
    }

    /// Spread as a percentage of mid.
    #[must_use]
    pub fn spread_pct(&self) -> Option<Decimal> {
        let mid = self.mid()?;
        if mid <= Decimal::ZERO {
            return None;
        }
        Some((self.ask - self.bid) / mid * Decimal::ONE_HUNDRED)
    }

    /// Premium estimate: mark, then mid, then last. Only positive values count.
    #[must_use]
    pub fn premium(&self) -> Option<Decimal> {
        let positive = |v: Decimal| (v > Decimal::ZERO).then_some(v);
        self.mark
            .and_then(positive)
            .or_else(|| self.mid())
            .or_else(|| self.last.and_then(positive))
    }

    #[must_use]
    pub fn abs_delta(&self) -> Option<f64> {
        self.delta.map(f64::abs)
    }

    /// Strike as f64 for distance computations.
    #[must_use]
    pub fn strike_f64(&self) -> f64 {
        self.strike.to_f64().unwrap_or(0.0)
    }
}

/// Option chain for a single underlying, possibly spanning several
/// expirations and both rights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionChain {
    pub underlying: String,
    pub underlying_price: Option<Decimal>,
    /// Expirations listed by the broker, sorted and de-duplicated.
    pub expirations: Vec<NaiveDate>,
    pub contracts: Vec<OptionContract>,
}

impl OptionChain {
    #[must_use]
    pub fn new(underlying: &str) -> Self {
        Self {
            underlying: underlying.to_uppercase(),
            ..Self::default()
        }
    }

    /// Contracts of one right for one expiration.
    #[must_use]
    pub fn contracts_for(&self, right: OptionRight, expiration: NaiveDate) -> Vec<&OptionContract> {
        self.contracts
            .iter()
            .filter(|c| c.right == right && c.expiration == expiration)
            .collect()
    }

    /// Listed expirations plus any only seen on contracts, sorted and unique.
    #[must_use]
    pub fn sorted_expirations(&self) -> Vec<NaiveDate> {
        let mut all: Vec<NaiveDate> = self
            .expirations
            .iter()
            .copied()
            .chain(self.contracts.iter().map(|c| c.expiration))
            .collect();
        all.sort_unstable();
        all.dedup();
        all
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn exp() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 21).unwrap()
    }

    #[test]
    fn test_action_round_trip_strings() {
        assert_eq!(WheelAction::parse("csp"), Some(WheelAction::Csp));
        assert_eq!(WheelAction::parse(" CC "), Some(WheelAction::Cc));
        assert_eq!(WheelAction::parse("straddle"), None);
        assert_eq!(WheelAction::Csp.right(), OptionRight::Put);
        assert_eq!(WheelAction::Cc.to_string(), "CC");
        assert_eq!(
            serde_json::to_string(&WheelAction::Csp).unwrap(),
            "\"CSP\""
        );
    }

    #[test]
    fn test_premium_prefers_mark_then_mid_then_last() {
        let mut c = OptionContract::new("aapl", OptionRight::Put, exp(), dec!(150));
        c.last = Some(dec!(0.90));
        assert_eq!(c.premium(), Some(dec!(0.90)));

        c.bid = dec!(1.00);
        c.ask = dec!(1.10);
        assert_eq!(c.premium(), Some(dec!(1.05)));

        c.mark = Some(dec!(1.07));
        assert_eq!(c.premium(), Some(dec!(1.07)));

        c.mark = Some(Decimal::ZERO);
        assert_eq!(c.premium(), Some(dec!(1.05)));
    }

    #[test]
    fn test_spread_pct_needs_two_sided_quote() {
        let mut c = OptionContract::new("AAPL", OptionRight::Put, exp(), dec!(150));
        c.bid = dec!(1.00);
        assert_eq!(c.spread_pct(), None);
        c.ask = dec!(1.10);
        let pct = c.spread_pct().unwrap();
        assert!(pct > dec!(9.5) && pct < dec!(9.6));
    }

    #[test]
    fn test_display_name() {
        let c = OptionContract::new("nvda", OptionRight::Put, exp(), dec!(140));
        assert_eq!(c.display_name(), "NVDA 140P 2025-03-21");
    }

    #[test]
    fn test_chain_filters_and_expirations() {
        let other = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let mut chain = OptionChain::new("aapl");
        chain.expirations = vec![exp()];
        chain.contracts = vec![
            OptionContract::new("AAPL", OptionRight::Put, exp(), dec!(150)),
            OptionContract::new("AAPL", OptionRight::Call, exp(), dec!(160)),
            OptionContract::new("AAPL", OptionRight::Put, other, dec!(145)),
        ];

        assert_eq!(chain.contracts_for(OptionRight::Put, exp()).len(), 1);
        assert_eq!(chain.sorted_expirations(), vec![other, exp()]);
        assert_eq!(chain.underlying, "AAPL");
    }
}
