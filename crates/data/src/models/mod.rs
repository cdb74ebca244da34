//! Row types for the wheel pipeline tables and views.

pub mod broker;
pub mod candidate;
pub mod pick;
pub mod run;
pub mod snapshot;

pub use broker::{AccountSnapshotRecord, PositionSnapshotRecord};
pub use candidate::{ApprovedTicker, CandidateRecord, TickerRecord};
pub use pick::PickRecord;
pub use run::{
    truncate_error, RunHistoryRow, RunStatus, ScreeningRunRecord, DAILY_TRACKER_NOTE,
    MAX_RUN_ERROR_CHARS,
};
pub use snapshot::{IvSnapshot, RsiSnapshot};
