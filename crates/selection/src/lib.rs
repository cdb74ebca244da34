//! Deterministic contract selection for the wheel strategy.
//!
//! Given an option chain and the wheel rules this crate:
//! - Chooses an expiration in the primary DTE window, falling back to the
//!   wider window when allowed
//! - Filters contracts by delta band, liquidity and earnings proximity
//! - Scores survivors by annualized yield, liquidity penalty and
//!   underlying bonuses, keeping one best contract per ticker
//! - Fits the resulting picks into a cash budget
//!
//! Underlying screening scores and IV rank live here too. Nothing in this
//! crate performs IO.

pub mod allocation;
pub mod diagnostics;
pub mod expiration;
pub mod liquidity;
pub mod scoring;
pub mod screening;
pub mod selector;
pub mod sentiment;
pub mod types;
pub mod volatility;

pub use allocation::{check_allocation, select_portfolio, AllocationCheck, PortfolioSelection};
pub use diagnostics::{FilterFunnel, SkipCounters, SkipReason};
pub use expiration::{pick_expiration, DteWindow, ExpirationChoice};
pub use selector::select_best_contract;
pub use types::{SelectedContract, SelectionOutcome, SelectionRequest, UnderlyingContext};
