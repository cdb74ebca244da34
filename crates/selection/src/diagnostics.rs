//! Filter funnel counts and skip-reason bookkeeping for pick builders.
//!
//! When no contract survives, the funnel tells which stage emptied out so a
//! batch summary can say *why* tickers were skipped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use wheel_core::{OptionContract, WheelAction, WheelRules};

use crate::liquidity::{bid_ok, open_interest_ok};
use crate::selector::delta_eligible;

/// Why a ticker produced no pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    EarningsBlocked,
    NoChain,
    NoContractInDte,
    NoContracts,
    DeltaMissing,
    DeltaOutOfBand,
    ItmBlocked,
    BidZero,
    Spread,
    OpenInterest,
    NoPremium,
    /// Every stage kept some contract but none passed them all.
    Other,
    Error,
}

impl SkipReason {
    pub const ALL: [Self; 13] = [
        Self::EarningsBlocked,
        Self::NoChain,
        Self::NoContractInDte,
        Self::NoContracts,
        Self::DeltaMissing,
        Self::DeltaOutOfBand,
        Self::ItmBlocked,
        Self::BidZero,
        Self::Spread,
        Self::OpenInterest,
        Self::NoPremium,
        Self::Other,
        Self::Error,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EarningsBlocked => "earnings_blocked",
            Self::NoChain => "no_chain",
            Self::NoContractInDte => "no_contract_in_dte",
            Self::NoContracts => "no_contracts",
            Self::DeltaMissing => "delta_missing",
            Self::DeltaOutOfBand => "delta_out_of_band",
            Self::ItmBlocked => "itm_blocked",
            Self::BidZero => "bid_zero",
            Self::Spread => "spread",
            Self::OpenInterest => "open_interest",
            Self::NoPremium => "no_premium",
            Self::Other => "other",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract counts at each filter stage for one expiration.
///
/// `delta_present`, `in_delta` and `bid_ok` are counted independently over
/// all contracts; `strike_ok` narrows `in_delta`; `spread_ok` narrows
/// `bid_ok`; `oi_ok` narrows `spread_ok`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterFunnel {
    pub total: usize,
    pub delta_present: usize,
    pub in_delta: usize,
    pub strike_ok: usize,
    pub bid_ok: usize,
    pub spread_ok: usize,
    pub oi_ok: usize,
}

impl FilterFunnel {
    /// Counts stages over `contracts`. `strike_allowed` rejects strikes the
    /// action may not sell (e.g. in-the-money calls).
    pub fn compute<F>(
        contracts: &[&OptionContract],
        action: WheelAction,
        rules: &WheelRules,
        strike_allowed: F,
    ) -> Self
    where
        F: Fn(&OptionContract) -> bool,
    {
        let mut funnel = Self {
            total: contracts.len(),
            ..Self::default()
        };

        for c in contracts {
            if c.delta.is_some() {
                funnel.delta_present += 1;
                if delta_eligible(c, action, rules) {
                    funnel.in_delta += 1;
                    if strike_allowed(c) {
                        funnel.strike_ok += 1;
                    }
                }
            }

            if bid_ok(c, rules) {
                funnel.bid_ok += 1;
                if rules.spread_ok(c.bid, c.ask) {
                    funnel.spread_ok += 1;
                    if open_interest_ok(c, rules) {
                        funnel.oi_ok += 1;
                    }
                }
            }
        }
        funnel
    }

    /// The first stage that emptied out, or `Other` when every stage has
    /// survivors but no single contract passed all of them.
    #[must_use]
    pub const fn skip_reason(&self) -> SkipReason {
        if self.total == 0 {
            SkipReason::NoContracts
        } else if self.delta_present == 0 {
            SkipReason::DeltaMissing
        } else if self.in_delta == 0 {
            SkipReason::DeltaOutOfBand
        } else if self.strike_ok == 0 {
            SkipReason::ItmBlocked
        } else if self.bid_ok == 0 {
            SkipReason::BidZero
        } else if self.spread_ok == 0 {
            SkipReason::Spread
        } else if self.oi_ok == 0 {
            SkipReason::OpenInterest
        } else {
            SkipReason::Other
        }
    }
}

impl fmt::Display for FilterFunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} delta_present={} in_delta={} strike_ok={} bid_ok={} spread_ok={} oi_ok={}",
            self.total,
            self.delta_present,
            self.in_delta,
            self.strike_ok,
            self.bid_ok,
            self.spread_ok,
            self.oi_ok
        )
    }
}

/// Skip tallies for a batch of tickers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounters {
    counts: BTreeMap<SkipReason, usize>,
}

impl SkipCounters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, reason: SkipReason) {
        *self.counts.entry(reason).or_insert(0) += 1;
    }

    #[must_use]
    pub fn get(&self, reason: SkipReason) -> usize {
        self.counts.get(&reason).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// `skipped_<reason>=<n>` for every reason, zeros included.
    #[must_use]
    pub fn summary(&self) -> String {
        SkipReason::ALL
            .iter()
            .map(|r| format!("skipped_{r}={}", self.get(*r)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use wheel_core::OptionRight;

    fn put(strike: Decimal, delta: Option<f64>, bid: Decimal, ask: Decimal, oi: i64) -> OptionContract {
        let exp = NaiveDate::from_ymd_opt(2025, 1, 17).unwrap();
        let mut c = OptionContract::new("AAPL", OptionRight::Put, exp, strike);
        c.delta = delta;
        c.bid = bid;
        c.ask = ask;
        c.open_interest = oi;
        c
    }

    fn funnel(contracts: &[OptionContract]) -> FilterFunnel {
        let refs: Vec<&OptionContract> = contracts.iter().collect();
        FilterFunnel::compute(&refs, WheelAction::Csp, &WheelRules::default(), |_| true)
    }

    #[test]
    fn counts_each_stage() {
        let contracts = vec![
            put(dec!(140), Some(-0.25), dec!(1.00), dec!(1.05), 200),
            put(dec!(145), Some(-0.40), dec!(2.00), dec!(2.60), 200),
            put(dec!(130), None, dec!(0.50), dec!(0.52), 5),
            put(dec!(120), Some(-0.05), Decimal::ZERO, dec!(0.05), 0),
        ];
        let f = funnel(&contracts);
        assert_eq!(f.total, 4);
        assert_eq!(f.delta_present, 3);
        assert_eq!(f.in_delta, 1);
        assert_eq!(f.strike_ok, 1);
        assert_eq!(f.bid_ok, 3);
        assert_eq!(f.spread_ok, 2);
        assert_eq!(f.oi_ok, 1);
    }

    #[test]
    fn skip_reason_follows_first_empty_stage() {
        let no_delta = funnel(&[put(dec!(140), None, dec!(1), dec!(1.05), 100)]);
        assert_eq!(no_delta.skip_reason(), SkipReason::DeltaMissing);

        let out_of_band = funnel(&[put(dec!(140), Some(-0.5), dec!(1), dec!(1.05), 100)]);
        assert_eq!(out_of_band.skip_reason(), SkipReason::DeltaOutOfBand);

        let no_bid = funnel(&[put(dec!(140), Some(-0.25), Decimal::ZERO, dec!(0.05), 100)]);
        assert_eq!(no_bid.skip_reason(), SkipReason::BidZero);

        let wide = funnel(&[put(dec!(140), Some(-0.25), dec!(0.50), dec!(0.70), 100)]);
        assert_eq!(wide.skip_reason(), SkipReason::Spread);

        let thin = funnel(&[put(dec!(140), Some(-0.25), dec!(1), dec!(1.05), 2)]);
        assert_eq!(thin.skip_reason(), SkipReason::OpenInterest);

        assert_eq!(funnel(&[]).skip_reason(), SkipReason::NoContracts);
    }

    #[test]
    fn split_survivors_are_other_not_delta() {
        // In band but wide; tight and liquid but out of band
        let f = funnel(&[
            put(dec!(140), Some(-0.25), dec!(0.50), dec!(0.70), 100),
            put(dec!(150), Some(-0.45), dec!(3.00), dec!(3.05), 100),
        ]);
        assert_eq!((f.in_delta, f.spread_ok, f.oi_ok), (1, 1, 1));
        assert_eq!(f.skip_reason(), SkipReason::Other);

        let mut counters = SkipCounters::new();
        counters.record(f.skip_reason());
        assert_eq!(counters.get(SkipReason::Other), 1);
        assert_eq!(counters.get(SkipReason::DeltaOutOfBand), 0);
        assert!(counters.summary().contains("skipped_other=1"));
    }

    #[test]
    fn itm_block_reported_for_calls() {
        let exp = NaiveDate::from_ymd_opt(2025, 1, 17).unwrap();
        let mut call = OptionContract::new("AAPL", OptionRight::Call, exp, dec!(95));
        call.delta = Some(0.25);
        call.bid = dec!(1.00);
        call.ask = dec!(1.05);
        call.open_interest = 100;
        let f = FilterFunnel::compute(&[&call], WheelAction::Cc, &WheelRules::default(), |c| {
            c.strike >= dec!(100)
        });
        assert_eq!(f.skip_reason(), SkipReason::ItmBlocked);
    }

    #[test]
    fn counters_summarise_all_reasons() {
        let mut counters = SkipCounters::new();
        counters.record(SkipReason::Spread);
        counters.record(SkipReason::Spread);
        counters.record(SkipReason::NoChain);
        assert_eq!(counters.get(SkipReason::Spread), 2);
        assert_eq!(counters.total(), 3);
        let summary = counters.summary();
        assert!(summary.contains("skipped_spread=2"));
        assert!(summary.contains("skipped_earnings_blocked=0"));
    }
}
