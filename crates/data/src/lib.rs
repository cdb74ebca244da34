//! Persistence for the wheel strategy pipeline.
//!
//! This crate provides:
//! - A `PostgreSQL` pool with embedded migrations (tables and dashboard views)
//! - Row types for runs, candidates, picks, snapshots and broker history
//! - Repositories for typed database access
//! - CSV universe loading

pub mod database;
pub mod models;
pub mod repositories;
pub mod universe;

pub use database::{Database, DEFAULT_MAX_CONNECTIONS};

pub use models::{
    truncate_error, AccountSnapshotRecord, ApprovedTicker, CandidateRecord, IvSnapshot,
    PickRecord, PositionSnapshotRecord, RsiSnapshot, RunHistoryRow, RunStatus,
    ScreeningRunRecord, TickerRecord, DAILY_TRACKER_NOTE, MAX_RUN_ERROR_CHARS,
};

pub use repositories::{
    ApprovedUniverseRepository, BrokerRepository, CandidateRepository, PickRepository,
    Repositories, RunRepository, SnapshotRepository, TickerRepository,
};

pub use universe::{load_universe_csv, parse_universe};
