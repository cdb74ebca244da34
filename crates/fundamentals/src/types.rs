//! Typed views over FMP payloads.
//!
//! FMP field names drift between endpoint versions (`mktCap` vs
//! `marketCap`, `peRatioTTM` vs `priceToEarningsRatioTTM`), so each field
//! is read from a list of aliases. The raw JSON is kept for persistence.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number from a JSON number or numeric string; non-finite values are `None`.
#[must_use]
pub fn value_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// First alias present with a numeric value.
#[must_use]
pub fn first_f64(obj: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(value_f64)
}

/// First alias present with a non-empty string value.
#[must_use]
pub fn first_str(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parses `YYYY-MM-DD` or an RFC 3339 timestamp down to a date.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    raw.trim()
        .get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

/// Unwraps FMP's "list with one object" responses.
pub(crate) fn single_object(data: Value) -> Option<Value> {
    match data {
        Value::Array(items) => items.into_iter().find(Value::is_object),
        obj @ Value::Object(_) => Some(obj),
        _ => None,
    }
}

/// Normalises list responses: arrays pass through, a lone object becomes a
/// one-element list.
pub(crate) fn object_list(data: Value) -> Vec<Value> {
    match data {
        Value::Array(items) => items.into_iter().filter(Value::is_object).collect(),
        obj @ Value::Object(_) => vec![obj],
        _ => Vec::new(),
    }
}

/// Optional server-side filters for the company screener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenerFilters {
    pub min_price: Option<f64>,
    pub min_market_cap: Option<f64>,
    pub min_avg_volume: Option<f64>,
}

/// One row from the company screener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenerCompany {
    pub symbol: String,
    pub name: String,
    pub exchange: Option<String>,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub avg_volume: Option<f64>,
}

impl ScreenerCompany {
    pub(crate) fn from_value(v: &Value) -> Option<Self> {
        let symbol = first_str(v, &["symbol", "Symbol"])?.to_uppercase();
        Some(Self {
            name: first_str(v, &["companyName", "name"]).unwrap_or_else(|| symbol.clone()),
            exchange: first_str(v, &["exchangeShortName", "exchange"]),
            price: first_f64(v, &["price", "Price"]),
            market_cap: first_f64(v, &["marketCap", "MarketCap", "mktCap"]),
            avg_volume: first_f64(v, &["avgVolume", "AvgVolume", "averageVolume", "volume"]),
            symbol,
        })
    }

    /// Client-side filter; fields the screener omitted do not reject.
    #[must_use]
    pub fn passes(&self, filters: &ScreenerFilters) -> bool {
        let below = |value: Option<f64>, min: Option<f64>| match (value, min) {
            (Some(v), Some(m)) => v > 0.0 && v < m,
            _ => false,
        };
        !(below(self.price, filters.min_price)
            || below(self.market_cap, filters.min_market_cap)
            || below(self.avg_volume, filters.min_avg_volume))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub symbol: String,
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub exchange: Option<String>,
    pub market_cap: Option<f64>,
    pub beta: Option<f64>,
    pub raw: Value,
}

impl CompanyProfile {
    pub(crate) fn from_value(symbol: &str, v: Value) -> Self {
        Self {
            symbol: first_str(&v, &["symbol"]).unwrap_or_else(|| symbol.to_string()),
            company_name: first_str(&v, &["companyName", "name"]),
            sector: first_str(&v, &["sector"]),
            industry: first_str(&v, &["industry", "subSector"]),
            exchange: first_str(&v, &["exchangeShortName", "exchange"]),
            market_cap: first_f64(&v, &["mktCap", "marketCap"]),
            beta: first_f64(&v, &["beta"]),
            raw: v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub year_low: Option<f64>,
    pub year_high: Option<f64>,
    pub avg_volume: Option<f64>,
    pub beta: Option<f64>,
    pub raw: Value,
}

impl Quote {
    pub(crate) fn from_value(symbol: &str, v: Value) -> Self {
        Self {
            symbol: first_str(&v, &["symbol"]).unwrap_or_else(|| symbol.to_string()),
            price: first_f64(&v, &["price"]).filter(|p| *p > 0.0),
            market_cap: first_f64(&v, &["marketCap"]),
            year_low: first_f64(&v, &["yearLow", "yearLow52Week"]),
            year_high: first_f64(&v, &["yearHigh", "yearHigh52Week"]),
            avg_volume: first_f64(&v, &["avgVolume", "averageVolume"]),
            beta: first_f64(&v, &["beta"]),
            raw: v,
        }
    }
}

/// Trailing-twelve-month ratios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatiosTtm {
    pub net_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub raw: Value,
}

impl RatiosTtm {
    pub(crate) fn from_value(v: Value) -> Self {
        Self {
            net_margin: first_f64(&v, &["netProfitMarginTTM", "netProfitMargin"]),
            operating_margin: first_f64(&v, &["operatingProfitMarginTTM", "operatingProfitMargin"]),
            return_on_equity: first_f64(&v, &["returnOnEquityTTM", "returnOnEquity"]),
            pe_ratio: first_f64(
                &v,
                &["peRatioTTM", "priceToEarningsRatioTTM", "peRatio"],
            ),
            debt_to_equity: first_f64(
                &v,
                &["debtEquityRatioTTM", "debtToEquityRatioTTM", "debtEquityRatio"],
            ),
            raw: v,
        }
    }
}

/// Trailing-twelve-month key metrics. Only the fields the screen reads are
/// typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMetricsTtm {
    pub pe_ratio: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub raw: Value,
}

impl KeyMetricsTtm {
    pub(crate) fn from_value(v: Value) -> Self {
        Self {
            pe_ratio: first_f64(&v, &["peRatioTTM", "priceToEarningsRatioTTM"]),
            return_on_equity: first_f64(&v, &["roeTTM", "returnOnEquityTTM"]),
            raw: v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub published: Option<String>,
    pub url: Option<String>,
}

impl NewsItem {
    pub(crate) fn from_value(v: &Value) -> Option<Self> {
        Some(Self {
            title: first_str(v, &["title", "summary", "text"])?,
            published: first_str(v, &["publishedDate", "date"]),
            url: first_str(v, &["url", "link"]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_aliases_and_string_numbers() {
        let v = json!({"mktCap": "2500000000", "beta": 1.1, "marketCap": null});
        assert_eq!(first_f64(&v, &["marketCap", "mktCap"]), Some(2.5e9));
        assert_eq!(first_f64(&v, &["missing"]), None);
        assert_eq!(value_f64(&json!("NaN")), None);
    }

    #[test]
    fn test_single_object_and_lists() {
        assert_eq!(single_object(json!([{"a": 1}])), Some(json!({"a": 1})));
        assert_eq!(single_object(json!([])), None);
        assert_eq!(single_object(json!("x")), None);
        assert_eq!(object_list(json!({"a": 1})).len(), 1);
        assert_eq!(object_list(json!([{"a": 1}, 2, {"b": 2}])).len(), 2);
    }

    #[test]
    fn test_screener_company_filters() {
        let company = ScreenerCompany::from_value(&json!({
            "symbol": "abc", "price": 4.0, "marketCap": 3e9
        }))
        .unwrap();
        assert_eq!(company.name, "ABC");
        let filters = ScreenerFilters {
            min_price: Some(5.0),
            min_market_cap: Some(2e9),
            min_avg_volume: Some(1e6),
        };
        assert!(!company.passes(&filters));

        let ok = ScreenerCompany { price: Some(10.0), ..company };
        // missing volume does not reject
        assert!(ok.passes(&filters));
    }

    #[test]
    fn test_ratios_aliases() {
        let r = RatiosTtm::from_value(json!({
            "netProfitMarginTTM": 0.21,
            "priceToEarningsRatioTTM": 28.4,
            "debtToEquityRatioTTM": 1.5
        }));
        assert_eq!(r.net_margin, Some(0.21));
        assert_eq!(r.pe_ratio, Some(28.4));
        assert_eq!(r.debt_to_equity, Some(1.5));
        assert_eq!(r.operating_margin, None);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2025-04-30"), NaiveDate::from_ymd_opt(2025, 4, 30));
        assert_eq!(parse_date("2025-04-30T20:00:00Z"), NaiveDate::from_ymd_opt(2025, 4, 30));
        assert_eq!(parse_date("soon"), None);
    }
}
