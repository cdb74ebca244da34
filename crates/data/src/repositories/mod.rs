//! Database repositories for the wheel pipeline.
//!
//! Each repository wraps one table (or a closely related pair) behind typed
//! runtime queries. Multi-row writes run in a single transaction.

pub mod broker_repo;
pub mod candidate_repo;
pub mod pick_repo;
pub mod run_repo;
pub mod snapshot_repo;
pub mod ticker_repo;

pub use broker_repo::{dedupe_positions, BrokerRepository};
pub use candidate_repo::{ApprovedUniverseRepository, CandidateRepository};
pub use pick_repo::PickRepository;
pub use run_repo::RunRepository;
pub use snapshot_repo::{SnapshotRepository, RSI_MAX_AGE_HOURS};
pub use ticker_repo::TickerRepository;

use sqlx::PgPool;

/// Creates all repositories from a single database pool.
#[derive(Debug, Clone)]
pub struct Repositories {
    pub runs: RunRepository,
    pub tickers: TickerRepository,
    pub candidates: CandidateRepository,
    pub approved: ApprovedUniverseRepository,
    pub picks: PickRepository,
    pub snapshots: SnapshotRepository,
    pub broker: BrokerRepository,
}

impl Repositories {
    /// Creates a new set of repositories from a database pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            runs: RunRepository::new(pool.clone()),
            tickers: TickerRepository::new(pool.clone()),
            candidates: CandidateRepository::new(pool.clone()),
            approved: ApprovedUniverseRepository::new(pool.clone()),
            picks: PickRepository::new(pool.clone()),
            snapshots: SnapshotRepository::new(pool.clone()),
            broker: BrokerRepository::new(pool),
        }
    }
}
