//! Batch jobs for the wheel strategy.
//!
//! Each job takes a [`JobContext`] (config plus database) and builds the
//! provider clients it needs:
//! - `weekly_screen`: universe, fundamentals, scores, ranked candidates
//! - `rsi_snapshot` / `iv_snapshot`: daily caches feeding the screen and IV rank
//! - `csp_picks` / `cc_picks`: one contract per ticker, persisted per run
//! - `portfolio`: greedy budget fill over the latest picks
//! - `daily_tracker`: account and position history
//!
//! The pure builders (`evaluate_ticker`, `build_csp_picks`, ...) take trait
//! objects so they can be exercised without network or database.

pub mod alerts;
pub mod cc;
pub mod context;
pub mod csp;
pub mod iv_snapshot;
pub mod picks;
pub mod portfolio;
pub mod rsi_snapshot;
pub mod screen;
pub mod sources;
pub mod tracker;

pub use alerts::{format_pick_summary, Mailer};
pub use cc::{build_cc_picks, cc_picks, CcInput, LotSource};
pub use context::JobContext;
pub use csp::{build_csp_picks, csp_picks, CspInput};
pub use iv_snapshot::{iv_snapshot, snapshot_iv, IvSnapshotStats};
pub use picks::PickBuild;
pub use portfolio::{latest_picks, portfolio, portfolio_candidates};
pub use rsi_snapshot::{collect_rsi, rsi_snapshot, RsiCollection, RsiRequest};
pub use screen::{evaluate_ticker, weekly_screen, ScreenStats, ScreenSummary, ScreenedTicker};
pub use sources::{FundamentalsSource, RsiSource};
pub use tracker::{daily_tracker, TrackerSummary};
