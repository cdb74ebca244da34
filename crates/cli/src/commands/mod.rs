//! Subcommands of the `wheel` binary.

pub mod data_status;
pub mod jobs;
pub mod rules;
pub mod serve;

pub use data_status::{run_data_status, DataStatusArgs};
pub use jobs::{
    run_cc_picks, run_csp_picks, run_iv_snapshot, run_portfolio, run_rsi_snapshot, run_screen,
    run_track, CspPicksArgs,
};
pub use rules::{run_rules, RulesArgs};
pub use serve::{run_migrate, run_serve, ServeArgs};
