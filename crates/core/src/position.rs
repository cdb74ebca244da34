use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::options::CONTRACT_MULTIPLIER;

/// A long stock holding that can back covered calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityLot {
    pub symbol: String,
    pub quantity: Decimal,
    /// Cost basis per share when the broker reports it.
    pub average_price: Option<Decimal>,
    pub market_value: Option<Decimal>,
}

impl EquityLot {
    #[must_use]
    pub fn new(symbol: &str, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            quantity,
            average_price: None,
            market_value: None,
        }
    }

    /// Number of covered calls this lot can write.
    #[must_use]
    pub fn coverable_contracts(&self) -> i64 {
        let per = Decimal::from(CONTRACT_MULTIPLIER);
        (self.quantity / per).floor().to_i64().unwrap_or(0)
    }

    /// Per-share price estimate: average price, else market value / quantity.
    #[must_use]
    pub fn reference_price(&self) -> Option<Decimal> {
        if let Some(avg) = self.average_price.filter(|p| *p > Decimal::ZERO) {
            return Some(avg);
        }
        let value = self.market_value?;
        if self.quantity > Decimal::ZERO && value > Decimal::ZERO {
            Some(value / self.quantity)
        } else {
            None
        }
    }
}
