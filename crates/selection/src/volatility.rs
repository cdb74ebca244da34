//! ATM implied volatility extraction and IV rank/percentile.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use wheel_core::{OptionChain, OptionContract, OptionRight};

/// Normalises a broker IV reading to a fraction.
///
/// Values above 3 are taken as percentages (25 -> 0.25). Non-positive and
/// non-finite readings are discarded.
#[must_use]
pub fn normalize_iv(raw: f64) -> Option<f64> {
    if !raw.is_finite() {
        return None;
    }
    let iv = if raw > 3.0 { raw / 100.0 } else { raw };
    (iv > 0.0).then_some(iv)
}

/// Underlying price from the chain, else the median put strike.
#[must_use]
pub fn underlying_price(chain: &OptionChain) -> Option<Decimal> {
    if let Some(price) = chain.underlying_price.filter(|p| *p > Decimal::ZERO) {
        return Some(price);
    }
    let mut strikes: Vec<Decimal> = chain
        .contracts
        .iter()
        .filter(|c| c.right == OptionRight::Put && c.strike > Decimal::ZERO)
        .map(|c| c.strike)
        .collect();
    if strikes.is_empty() {
        return None;
    }
    strikes.sort_unstable();
    let n = strikes.len();
    if n % 2 == 1 {
        Some(strikes[n / 2])
    } else {
        Some((strikes[n / 2 - 1] + strikes[n / 2]) / Decimal::TWO)
    }
}

/// Contract whose strike is nearest the underlying (first wins ties).
#[must_use]
pub fn atm_contract<'a>(
    contracts: &[&'a OptionContract],
    underlying_price: Decimal,
) -> Option<&'a OptionContract> {
    if underlying_price <= Decimal::ZERO {
        return None;
    }
    let mut best: Option<(&'a OptionContract, Decimal)> = None;
    for c in contracts {
        let diff = (c.strike - underlying_price).abs();
        match best {
            Some((_, d)) if d <= diff => {}
            _ => best = Some((*c, diff)),
        }
    }
    best.map(|(c, _)| c)
}

/// Normalised IV of the ATM contract.
#[must_use]
pub fn atm_iv(contracts: &[&OptionContract], underlying_price: Decimal) -> Option<(f64, Decimal)> {
    let atm = atm_contract(contracts, underlying_price)?;
    let iv = atm.implied_volatility.and_then(normalize_iv)?;
    Some((iv, atm.strike))
}

/// Where `current` sits between the historical min and max, 0-100.
#[must_use]
pub fn iv_rank(current: f64, history: &[f64]) -> Option<f64> {
    let (min, max) = history
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;
    let range = max - min;
    if range <= f64::EPSILON {
        return None;
    }
    Some(((current - min) / range * 100.0).clamp(0.0, 100.0))
}

/// Share of historical readings at or below `current`, 0-100.
#[must_use]
pub fn iv_percentile(current: f64, history: &[f64]) -> Option<f64> {
    if history.is_empty() {
        return None;
    }
    let below = history.iter().filter(|v| **v <= current).count();
    Some(below as f64 / history.len() as f64 * 100.0)
}

/// Decimal helper for persisting IV readings.
#[must_use]
pub fn iv_to_decimal(iv: f64) -> Option<Decimal> {
    Decimal::from_f64_retain(iv).map(|d| d.round_dp(6))
}

/// f64 view of a decimal price for logging.
#[must_use]
pub fn as_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn put(strike: Decimal, iv: Option<f64>) -> OptionContract {
        let exp = NaiveDate::from_ymd_opt(2025, 1, 17).unwrap();
        let mut c = OptionContract::new("AAPL", OptionRight::Put, exp, strike);
        c.implied_volatility = iv;
        c
    }

    #[test]
    fn normalizes_percent_iv() {
        assert_eq!(normalize_iv(25.0), Some(0.25));
        assert_eq!(normalize_iv(0.32), Some(0.32));
        assert_eq!(normalize_iv(2.5), Some(2.5));
        assert_eq!(normalize_iv(0.0), None);
        assert_eq!(normalize_iv(-999.0), None);
        assert_eq!(normalize_iv(f64::NAN), None);
    }

    #[test]
    fn underlying_falls_back_to_median_strike() {
        let mut chain = OptionChain::new("AAPL");
        chain.contracts = vec![put(dec!(90), None), put(dec!(100), None), put(dec!(120), None)];
        assert_eq!(underlying_price(&chain), Some(dec!(100)));

        chain.contracts.push(put(dec!(130), None));
        assert_eq!(underlying_price(&chain), Some(dec!(110)));

        chain.underlying_price = Some(dec!(104.5));
        assert_eq!(underlying_price(&chain), Some(dec!(104.5)));
    }

    #[test]
    fn atm_is_nearest_strike() {
        let contracts = vec![put(dec!(95), Some(30.0)), put(dec!(100), Some(28.0)), put(dec!(105), Some(27.0))];
        let refs: Vec<&OptionContract> = contracts.iter().collect();
        assert_eq!(atm_contract(&refs, dec!(101.2)).unwrap().strike, dec!(100));
        assert_eq!(atm_iv(&refs, dec!(104)), Some((0.27, dec!(105))));
        assert!(atm_contract(&refs, Decimal::ZERO).is_none());
    }

    #[test]
    fn rank_and_percentile() {
        let history = vec![0.20, 0.25, 0.30, 0.40];
        let rank = iv_rank(0.30, &history).unwrap();
        assert!((rank - 50.0).abs() < 1e-9);
        assert_eq!(iv_rank(0.50, &history), Some(100.0));
        assert_eq!(iv_percentile(0.30, &history), Some(75.0));
        assert_eq!(iv_rank(0.3, &[0.3, 0.3]), None);
        assert_eq!(iv_rank(0.3, &[]), None);
        assert_eq!(iv_percentile(0.3, &[]), None);
    }
}
