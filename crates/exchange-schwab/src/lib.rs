//! Schwab integration for the wheel pipeline.
//!
//! - [`auth`]: OAuth refresh-token grant with a cached access token
//! - [`client`]: rate-limited REST client for option chains and accounts
//! - [`chain`]: option-chain payload parsing
//! - [`account`]: balances, positions and equity lots

pub mod account;
pub mod auth;
pub mod chain;
pub mod client;
pub mod error;

pub use account::{AccountBalances, AccountNumber, AccountSnapshot, BrokerPosition};
pub use auth::{SchwabAuth, SchwabAuthConfig};
pub use chain::parse_option_chain;
pub use client::{SchwabClient, SchwabClientConfig, SCHWAB_API_URL};
pub use error::{Result, SchwabError};
