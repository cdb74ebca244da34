//! Request/response types for contract selection.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use wheel_core::{OptionContract, ScoringWeights, WheelAction, WheelRules, CONTRACT_MULTIPLIER};

use crate::diagnostics::{FilterFunnel, SkipReason};
use crate::expiration::DteWindow;
use crate::scoring::ContractScore;

/// What we know about the underlying from screening and snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnderlyingContext {
    /// Screening wheel score, 0-100.
    pub wheel_score: Option<f64>,
    pub rsi: Option<f64>,
    /// ATM implied volatility as a fraction.
    pub iv: Option<f64>,
    pub iv_rank: Option<f64>,
}

/// Inputs for choosing one contract on one ticker.
#[derive(Debug, Clone)]
pub struct SelectionRequest<'a> {
    pub ticker: &'a str,
    pub action: WheelAction,
    pub today: NaiveDate,
    pub earnings_date: Option<NaiveDate>,
    /// Current stock price; used to keep covered calls out of the money.
    pub current_price: Option<Decimal>,
    pub allow_itm: bool,
    pub rules: &'a WheelRules,
    pub weights: &'a ScoringWeights,
    pub underlying: UnderlyingContext,
}

impl<'a> SelectionRequest<'a> {
    #[must_use]
    pub fn new(
        ticker: &'a str,
        action: WheelAction,
        today: NaiveDate,
        rules: &'a WheelRules,
        weights: &'a ScoringWeights,
    ) -> Self {
        Self {
            ticker,
            action,
            today,
            earnings_date: None,
            current_price: None,
            allow_itm: false,
            rules,
            weights,
            underlying: UnderlyingContext::default(),
        }
    }

    #[must_use]
    pub fn with_earnings_date(mut self, earnings_date: Option<NaiveDate>) -> Self {
        self.earnings_date = earnings_date;
        self
    }

    #[must_use]
    pub fn with_current_price(mut self, price: Option<Decimal>) -> Self {
        self.current_price = price;
        self
    }

    #[must_use]
    pub fn with_allow_itm(mut self, allow_itm: bool) -> Self {
        self.allow_itm = allow_itm;
        self
    }

    #[must_use]
    pub fn with_underlying(mut self, underlying: UnderlyingContext) -> Self {
        self.underlying = underlying;
        self
    }
}

/// The winning contract for a ticker with everything needed to persist it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedContract {
    pub ticker: String,
    pub action: WheelAction,
    pub contract: OptionContract,
    pub expiration: NaiveDate,
    pub dte: i64,
    pub window: DteWindow,
    pub premium: Decimal,
    pub score: ContractScore,
    pub abs_delta: f64,
    /// Cash tied up by one contract (strike x 100).
    pub collateral: Decimal,
    pub underlying_price: Option<Decimal>,
    pub funnel: FilterFunnel,
}

impl SelectedContract {
    /// Premium received for one contract.
    #[must_use]
    pub fn premium_per_contract(&self) -> Decimal {
        self.premium * Decimal::from(CONTRACT_MULTIPLIER)
    }

    /// JSON stored alongside the pick for later review.
    #[must_use]
    pub fn pick_metrics(&self, rules: &WheelRules, underlying: &UnderlyingContext) -> serde_json::Value {
        let (delta_min, delta_max) = rules.delta_band(self.action);
        let c = &self.contract;
        json!({
            "rule_context": {
                "used_dte_window": self.window,
                "earnings_avoid_days": rules.earnings_avoid_days,
                "delta_band": [delta_min, delta_max],
                "rsi_period": rules.rsi_period,
                "rsi_interval": rules.rsi_interval,
                "max_spread_pct": rules.max_spread_pct,
                "min_open_interest": rules.min_open_interest,
            },
            "expiration": self.expiration,
            "underlying_price": self.underlying_price,
            "underlying": underlying,
            "score": self.score,
            "funnel": self.funnel,
            "option_selected": {
                "symbol": c.symbol,
                "strike": c.strike,
                "mark": self.premium,
                "delta": c.delta,
                "abs_delta": self.abs_delta,
                "bid": c.bid,
                "ask": c.ask,
                "open_interest": c.open_interest,
                "volume": c.volume,
                "implied_volatility": c.implied_volatility,
                "in_the_money": c.in_the_money,
                "dte": self.dte,
            },
        })
    }
}

/// Result of selecting on one ticker.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    Selected(Box<SelectedContract>),
    Skipped {
        reason: SkipReason,
        funnel: Option<FilterFunnel>,
        detail: String,
    },
}

impl SelectionOutcome {
    #[must_use]
    pub fn skipped(reason: SkipReason, detail: impl Into<String>) -> Self {
        Self::Skipped {
            reason,
            funnel: None,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn selected(&self) -> Option<&SelectedContract> {
        match self {
            Self::Selected(s) => Some(s),
            Self::Skipped { .. } => None,
        }
    }

    #[must_use]
    pub fn into_selected(self) -> Option<SelectedContract> {
        match self {
            Self::Selected(s) => Some(*s),
            Self::Skipped { .. } => None,
        }
    }
}
