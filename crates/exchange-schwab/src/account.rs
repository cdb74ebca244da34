//! Account payload extraction.
//!
//! `/trader/v1/accounts/{hash}?fields=positions` nests everything under
//! `securitiesAccount`; older payloads used `account`. Balances and
//! positions are pulled out on a best-effort basis and the raw JSON is kept
//! for persistence.

use crate::chain::{to_decimal, value_as_f64};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wheel_core::EquityLot;

/// Mapping between a plain account number and the hash the trader API
/// expects in URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountNumber {
    pub account_number: String,
    pub hash_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountBalances {
    pub net_liquidation: Option<Decimal>,
    pub cash: Option<Decimal>,
    pub buying_power: Option<Decimal>,
    pub maintenance_requirement: Option<Decimal>,
}

/// One broker position. `quantity` is signed: short positions are negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub symbol: String,
    pub asset_type: Option<String>,
    pub quantity: Option<Decimal>,
    pub average_price: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub day_pnl: Option<Decimal>,
    pub day_pnl_pct: Option<Decimal>,
    pub raw: Value,
}

impl BrokerPosition {
    #[must_use]
    pub fn is_equity(&self) -> bool {
        self.asset_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("EQUITY"))
    }
}

/// Parsed `get_account` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balances: AccountBalances,
    pub positions: Vec<BrokerPosition>,
    pub raw: Value,
}

fn decimal_field(obj: &Value, keys: &[&str]) -> Option<Decimal> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .filter_map(value_as_f64)
        .find(|v| *v != 0.0)
        .or_else(|| keys.iter().filter_map(|k| obj.get(*k)).find_map(value_as_f64))
        .and_then(to_decimal)
}

fn securities_account(payload: &Value) -> &Value {
    ["securitiesAccount", "account"]
        .iter()
        .filter_map(|k| payload.get(*k))
        .find(|v| v.is_object())
        .unwrap_or(payload)
}

fn parse_balances(account: &Value) -> AccountBalances {
    let Some(balances) = ["currentBalances", "balances"]
        .iter()
        .filter_map(|k| account.get(*k))
        .find(|v| v.as_object().is_some_and(|o| !o.is_empty()))
    else {
        return AccountBalances::default();
    };

    AccountBalances {
        net_liquidation: decimal_field(balances, &["liquidationValue", "netLiquidation"]),
        cash: decimal_field(balances, &["cashBalance", "cashAvailableForTrading"]),
        buying_power: decimal_field(balances, &["buyingPower"]),
        maintenance_requirement: decimal_field(balances, &["maintenanceRequirement"]),
    }
}

fn parse_position(raw: &Value) -> Option<BrokerPosition> {
    raw.as_object()?;
    let instrument = raw.get("instrument").cloned().unwrap_or(Value::Null);
    let symbol = ["symbol", "underlyingSymbol", "description"]
        .iter()
        .filter_map(|k| instrument.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or("UNKNOWN")
        .to_uppercase();

    let long = raw.get("longQuantity").and_then(value_as_f64).unwrap_or(0.0);
    let short = raw.get("shortQuantity").and_then(value_as_f64).unwrap_or(0.0);
    let quantity = if long > 0.0 {
        Some(long)
    } else if short > 0.0 {
        Some(-short)
    } else {
        raw.get("quantity").and_then(value_as_f64)
    };

    Some(BrokerPosition {
        symbol,
        asset_type: instrument
            .get("assetType")
            .and_then(Value::as_str)
            .map(str::to_string),
        quantity: quantity.and_then(to_decimal),
        average_price: decimal_field(raw, &["averagePrice", "averageLongPrice", "averageShortPrice"]),
        market_value: decimal_field(raw, &["marketValue"]),
        day_pnl: decimal_field(raw, &["currentDayProfitLoss"]),
        day_pnl_pct: decimal_field(raw, &["currentDayProfitLossPercentage"]),
        raw: raw.clone(),
    })
}

impl AccountSnapshot {
    #[must_use]
    pub fn from_payload(payload: Value) -> Self {
        let account = securities_account(&payload);
        let balances = parse_balances(account);
        let positions = account
            .get("positions")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(parse_position).collect())
            .unwrap_or_default();
        Self {
            balances,
            positions,
            raw: payload,
        }
    }

    /// Long stock lots with at least `min_shares` shares.
    #[must_use]
    pub fn equity_lots(&self, min_shares: i64) -> Vec<EquityLot> {
        let min = Decimal::from(min_shares);
        self.positions
            .iter()
            .filter(|p| p.is_equity())
            .filter_map(|p| {
                let quantity = p.quantity.filter(|q| *q >= min)?;
                let mut lot = EquityLot::new(&p.symbol, quantity);
                lot.average_price = p.average_price;
                lot.market_value = p.market_value;
                Some(lot)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "securitiesAccount": {
                "type": "MARGIN",
                "currentBalances": {
                    "liquidationValue": 152340.55,
                    "cashBalance": 0,
                    "cashAvailableForTrading": 40210.1,
                    "buyingPower": 80420.2,
                    "maintenanceRequirement": 30100
                },
                "positions": [
                    {
                        "longQuantity": 300, "shortQuantity": 0,
                        "averagePrice": 172.5, "marketValue": 57075.0,
                        "currentDayProfitLoss": 120.5,
                        "instrument": { "assetType": "EQUITY", "symbol": "AAPL" }
                    },
                    {
                        "longQuantity": 50, "averagePrice": 410.0, "marketValue": 21000,
                        "instrument": { "assetType": "EQUITY", "symbol": "msft" }
                    },
                    {
                        "longQuantity": 0, "shortQuantity": 1, "averagePrice": 1.25,
                        "instrument": { "assetType": "OPTION", "symbol": "AAPL  250117C00200000", "underlyingSymbol": "AAPL" }
                    },
                    "not-a-position"
                ]
            }
        })
    }

    #[test]
    fn test_balances_fall_back_to_non_zero_field() {
        let snapshot = AccountSnapshot::from_payload(payload());
        assert_eq!(snapshot.balances.net_liquidation, Some(dec!(152340.55)));
        assert_eq!(snapshot.balances.cash, Some(dec!(40210.1)));
        assert_eq!(snapshot.balances.buying_power, Some(dec!(80420.2)));
        assert_eq!(snapshot.balances.maintenance_requirement, Some(dec!(30100)));
    }

    #[test]
    fn test_positions_parsed() {
        let snapshot = AccountSnapshot::from_payload(payload());
        assert_eq!(snapshot.positions.len(), 3);
        assert_eq!(snapshot.positions[1].symbol, "MSFT");
        let option = &snapshot.positions[2];
        assert!(!option.is_equity());
        assert_eq!(option.quantity, Some(dec!(-1)));
    }

    #[test]
    fn test_equity_lots_respect_min_shares() {
        let snapshot = AccountSnapshot::from_payload(payload());
        let lots = snapshot.equity_lots(100);
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].symbol, "AAPL");
        assert_eq!(lots[0].coverable_contracts(), 3);
        assert_eq!(lots[0].average_price, Some(dec!(172.5)));
    }

    #[test]
    fn test_missing_account_is_empty() {
        let snapshot = AccountSnapshot::from_payload(json!({}));
        assert_eq!(snapshot.balances, AccountBalances::default());
        assert!(snapshot.positions.is_empty());
    }
}
