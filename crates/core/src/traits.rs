use crate::options::{OptionChain, OptionRight};
use crate::position::EquityLot;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Source of option chains (Schwab market data in production).
#[async_trait]
pub trait OptionChainProvider: Send + Sync {
    /// Returns `None` when the broker has no chain for the symbol.
    async fn option_chain(
        &self,
        symbol: &str,
        right: OptionRight,
        strike_count: u32,
    ) -> Result<Option<OptionChain>>;
}

/// Source of long stock holdings for covered calls.
#[async_trait]
pub trait PositionProvider: Send + Sync {
    async fn equity_lots(&self, min_shares: i64) -> Result<Vec<EquityLot>>;
}

/// Source of upcoming earnings dates.
#[async_trait]
pub trait EarningsProvider: Send + Sync {
    async fn next_earnings_date(&self, symbol: &str, today: NaiveDate) -> Result<Option<NaiveDate>>;
}
