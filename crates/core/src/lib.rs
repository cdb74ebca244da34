//! Shared building blocks for the wheel strategy pipeline.
//!
//! - `calendar`: US/Eastern trading date
//! - `config` / `config_loader`: layered figment configuration
//! - `rules`: delta bands, DTE windows, earnings and spread rules
//! - `options`: option-chain domain types
//! - `position`: stock holdings backing covered calls
//! - `traits`: async seams for chain, position and earnings sources

pub mod calendar;
pub mod config;
pub mod config_loader;
pub mod options;
pub mod position;
pub mod rules;
pub mod symbols;
pub mod traits;

pub use calendar::{market_date, market_today};
pub use config::{
    AlphaVantageConfig, AppConfig, DatabaseConfig, FmpConfig, PicksConfig, PortfolioConstraints,
    SchwabConfig, ScoringWeights, ScreenerConfig, ServerConfig, SmtpConfig,
};
pub use config_loader::ConfigLoader;
pub use options::{OptionChain, OptionContract, OptionRight, WheelAction, CONTRACT_MULTIPLIER};
pub use position::EquityLot;
pub use rules::{
    earnings_ok, find_expiration_in_window, is_within_dte_window, RulesError, WheelRules,
};
pub use traits::{EarningsProvider, OptionChainProvider, PositionProvider};
