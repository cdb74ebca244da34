//! Conversion of `/marketdata/v1/chains` payloads into [`OptionChain`].
//!
//! Schwab nests contracts as `{put,call}ExpDateMap -> "YYYY-MM-DD:dte" ->
//! "strike" -> [contract]`. Numeric fields occasionally arrive as strings
//! or as the `-999` / `NaN` sentinels, so every number is read leniently.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::debug;
use wheel_core::{OptionChain, OptionContract, OptionRight};

/// Reads a number that may be encoded as a JSON number or numeric string.
/// Non-finite values and unparsable strings become `None`.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_f64))
}

pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

pub(crate) fn to_decimal(v: f64) -> Option<Decimal> {
    Decimal::try_from(v).ok().map(|d| d.normalize())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChainResponse {
    symbol: Option<String>,
    status: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    underlying_price: Option<f64>,
    underlying: Option<RawUnderlying>,
    put_exp_date_map: Option<Map<String, Value>>,
    call_exp_date_map: Option<Map<String, Value>>,
    expirations: Option<Vec<Value>>,
    expiration_dates: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct RawUnderlying {
    #[serde(default, deserialize_with = "lenient_f64")]
    mark: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    last: Option<f64>,
    quote: Option<RawUnderlyingQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUnderlyingQuote {
    #[serde(default, deserialize_with = "lenient_f64")]
    last_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    mark: Option<f64>,
}

impl RawUnderlying {
    /// last, mark, quote.lastPrice, quote.mark: first positive wins.
    fn price(&self) -> Option<f64> {
        let quote = self.quote.as_ref();
        [
            self.last,
            self.mark,
            quote.and_then(|q| q.last_price),
            quote.and_then(|q| q.mark),
        ]
        .into_iter()
        .flatten()
        .find(|p| *p > 0.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOptionContract {
    symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    strike_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    strike: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    bid: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    ask: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    mark: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    last: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    delta: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    open_interest: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    total_volume: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    volatility: Option<f64>,
    in_the_money: Option<bool>,
}

impl RawOptionContract {
    fn into_contract(
        self,
        underlying: &str,
        right: OptionRight,
        expiration: NaiveDate,
        strike_key: &str,
    ) -> Option<OptionContract> {
        let strike = self
            .strike_price
            .or(self.strike)
            .or_else(|| strike_key.trim().parse::<f64>().ok())
            .filter(|s| *s > 0.0)
            .and_then(to_decimal)?;

        let positive = |v: Option<f64>| v.filter(|x| *x > 0.0).and_then(to_decimal);

        let mut contract = OptionContract::new(underlying, right, expiration, strike);
        if let Some(symbol) = self.symbol.filter(|s| !s.trim().is_empty()) {
            contract.symbol = symbol.trim().to_string();
        }
        contract.bid = positive(self.bid).unwrap_or(Decimal::ZERO);
        contract.ask = positive(self.ask).unwrap_or(Decimal::ZERO);
        contract.mark = positive(self.mark);
        contract.last = positive(self.last);
        // Schwab reports -999 when the greek is unavailable
        contract.delta = self.delta.filter(|d| d.abs() <= 1.0);
        contract.open_interest = self.open_interest.map_or(0, |v| v.max(0.0) as i64);
        contract.volume = self.total_volume.map_or(0, |v| v.max(0.0) as i64);
        contract.implied_volatility = self.volatility.filter(|v| *v > 0.0);
        contract.in_the_money = self.in_the_money;
        Some(contract)
    }
}

/// Parses the date part of an expiration map key (`"2025-01-17:5"`).
#[must_use]
pub fn parse_expiration_key(key: &str) -> Option<NaiveDate> {
    let date = key.split(':').next()?;
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()
}

fn parse_listed_expiration(value: &Value) -> Option<NaiveDate> {
    let raw = match value {
        Value::String(s) => s.as_str(),
        Value::Object(obj) => obj
            .get("expirationDate")
            .or_else(|| obj.get("expiration"))
            .and_then(Value::as_str)?,
        _ => return None,
    };
    raw.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

fn collect_side(
    map: Option<&Map<String, Value>>,
    underlying: &str,
    right: OptionRight,
    chain: &mut OptionChain,
) {
    let Some(map) = map else { return };
    for (exp_key, strikes) in map {
        let Some(expiration) = parse_expiration_key(exp_key) else {
            debug!(key = %exp_key, "Skipping unparsable expiration key");
            continue;
        };
        chain.expirations.push(expiration);

        let Some(strikes) = strikes.as_object() else { continue };
        for (strike_key, entries) in strikes {
            let Some(entries) = entries.as_array() else { continue };
            for entry in entries {
                let parsed = serde_json::from_value::<RawOptionContract>(entry.clone())
                    .ok()
                    .and_then(|raw| raw.into_contract(underlying, right, expiration, strike_key));
                if let Some(contract) = parsed {
                    chain.contracts.push(contract);
                }
            }
        }
    }
}

/// Builds a chain from a raw payload.
///
/// Returns `None` when Schwab reports a failed lookup or the payload holds
/// neither contracts nor expirations.
#[must_use]
pub fn parse_option_chain(symbol: &str, payload: Value) -> Option<OptionChain> {
    let raw: RawChainResponse = serde_json::from_value(payload).ok()?;
    if raw
        .status
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case("FAILED"))
    {
        return None;
    }

    let underlying = raw
        .symbol
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(symbol)
        .trim()
        .to_uppercase();
    let mut chain = OptionChain::new(&underlying);

    chain.underlying_price = raw
        .underlying_price
        .filter(|p| *p > 0.0)
        .or_else(|| raw.underlying.as_ref().and_then(RawUnderlying::price))
        .and_then(to_decimal);

    collect_side(raw.put_exp_date_map.as_ref(), &underlying, OptionRight::Put, &mut chain);
    collect_side(raw.call_exp_date_map.as_ref(), &underlying, OptionRight::Call, &mut chain);

    let listed = raw.expirations.or(raw.expiration_dates).unwrap_or_default();
    chain
        .expirations
        .extend(listed.iter().filter_map(parse_listed_expiration));
    chain.expirations.sort_unstable();
    chain.expirations.dedup();

    if chain.contracts.is_empty() && chain.expirations.is_empty() {
        return None;
    }
    Some(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_put_chain() -> Value {
        json!({
            "symbol": "AAPL",
            "status": "SUCCESS",
            "underlyingPrice": 190.25,
            "putExpDateMap": {
                "2025-01-17:7": {
                    "180.0": [{
                        "putCall": "PUT",
                        "symbol": "AAPL  250117P00180000",
                        "bid": 1.10, "ask": 1.15, "mark": 1.13, "last": 1.12,
                        "delta": -0.24, "openInterest": 1520, "totalVolume": 310,
                        "volatility": 27.5, "strikePrice": 180.0, "inTheMoney": false
                    }],
                    "185.0": [{
                        "symbol": "AAPL  250117P00185000",
                        "bid": "2.00", "ask": "2.06",
                        "delta": -999.0, "openInterest": 800,
                        "volatility": "NaN"
                    }]
                },
                "2025-01-24:14": {
                    "175.0": [{ "bid": 0.9, "ask": 0.95, "delta": -0.18, "openInterest": 40 }]
                },
                "garbage": {}
            }
        })
    }

    #[test]
    fn test_parse_put_chain() {
        let chain = parse_option_chain("aapl", sample_put_chain()).unwrap();
        assert_eq!(chain.underlying, "AAPL");
        assert_eq!(chain.underlying_price, Some(dec!(190.25)));
        assert_eq!(chain.expirations, vec![day(2025, 1, 17), day(2025, 1, 24)]);
        assert_eq!(chain.contracts.len(), 3);

        let near = chain.contracts_for(OptionRight::Put, day(2025, 1, 17));
        let k180 = near.iter().find(|c| c.strike == dec!(180)).unwrap();
        assert_eq!(k180.symbol, "AAPL  250117P00180000");
        assert_eq!(k180.bid, dec!(1.1));
        assert_eq!(k180.mark, Some(dec!(1.13)));
        assert_eq!(k180.delta, Some(-0.24));
        assert_eq!(k180.open_interest, 1520);
        assert_eq!(k180.implied_volatility, Some(27.5));
    }

    #[test]
    fn test_sentinels_and_string_numbers() {
        let chain = parse_option_chain("AAPL", sample_put_chain()).unwrap();
        let k185 = chain
            .contracts
            .iter()
            .find(|c| c.strike == dec!(185))
            .unwrap();
        // strike taken from the map key, string quotes parsed
        assert_eq!(k185.bid, dec!(2));
        assert_eq!(k185.ask, dec!(2.06));
        assert_eq!(k185.delta, None);
        assert_eq!(k185.implied_volatility, None);
    }

    #[test]
    fn test_failed_status_and_empty_payloads() {
        assert!(parse_option_chain("XYZ", json!({"symbol": "XYZ", "status": "FAILED"})).is_none());
        assert!(parse_option_chain("XYZ", json!({"symbol": "XYZ", "putExpDateMap": {}})).is_none());
        assert!(parse_option_chain("XYZ", json!([1, 2, 3])).is_none());
    }

    #[test]
    fn test_listed_expirations_are_merged() {
        let payload = json!({
            "symbol": "KO",
            "underlying": { "last": 0, "quote": { "lastPrice": 61.2 } },
            "expirations": ["2025-02-21", {"expirationDate": "2025-02-14T00:00:00Z"}, "bad"],
            "callExpDateMap": {
                "2025-02-21:10": { "62.5": [{ "bid": 0.5, "ask": 0.55, "delta": 0.3 }] }
            }
        });
        let chain = parse_option_chain("KO", payload).unwrap();
        assert_eq!(chain.expirations, vec![day(2025, 2, 14), day(2025, 2, 21)]);
        assert_eq!(chain.underlying_price, Some(dec!(61.2)));
        assert_eq!(chain.contracts[0].right, OptionRight::Call);
    }

    #[test]
    fn test_expiration_key() {
        assert_eq!(parse_expiration_key("2026-01-02:4"), Some(day(2026, 1, 2)));
        assert_eq!(parse_expiration_key("2026-01-02"), Some(day(2026, 1, 2)));
        assert_eq!(parse_expiration_key("soon:4"), None);
    }
}
