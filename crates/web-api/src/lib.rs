//! Read-only JSON dashboard over the screening runs, candidates and picks.

pub mod data_health;
pub mod handlers;
pub mod server;

pub use data_health::{DataHealthResponse, SourceHealth};
pub use server::{ApiServer, AppState};
