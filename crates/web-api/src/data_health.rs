//! Freshness of the batch job outputs.
//!
//! `/api/data/health` reports, per table, when the last row was written
//! and how many rows arrived in the last day, graded against each job's
//! schedule.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;

use crate::server::AppState;

/// Health status for a single table.
#[derive(Debug, Clone, Serialize)]
pub struct SourceHealth {
    pub source: String,
    pub last_record: Option<DateTime<Utc>>,
    pub records_last_day: i64,
    /// Seconds since the last record.
    pub staleness_seconds: Option<i64>,
    /// "healthy", "degraded" or "unhealthy".
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataHealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub sources: Vec<SourceHealth>,
    pub summary: HealthSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSummary {
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
}

/// Staleness limits in seconds.
struct HealthThresholds {
    healthy: i64,
    degraded: i64,
}

const HOUR: i64 = 3600;
const DAY: i64 = 24 * HOUR;

/// (table, timestamp column)
const SOURCES: [(&str, &str); 5] = [
    ("screening_runs", "run_ts"),
    ("screening_picks", "created_at"),
    ("rsi_snapshots", "created_at"),
    ("iv_snapshots", "created_at"),
    ("account_snapshots", "created_at"),
];

impl HealthThresholds {
    fn for_source(source: &str) -> Self {
        match source {
            // Weekly screen
            "screening_runs" => Self {
                healthy: 8 * DAY,
                degraded: 14 * DAY,
            },
            // Daily jobs; allow a weekend gap before calling it unhealthy
            _ => Self {
                healthy: 30 * HOUR,
                degraded: 4 * DAY,
            },
        }
    }
}

fn determine_status(staleness_seconds: Option<i64>, thresholds: &HealthThresholds) -> String {
    match staleness_seconds {
        None => "unhealthy".to_string(),
        Some(s) if s <= thresholds.healthy => "healthy".to_string(),
        Some(s) if s <= thresholds.degraded => "degraded".to_string(),
        Some(_) => "unhealthy".to_string(),
    }
}

async fn query_source_health(
    pool: &PgPool,
    table: &str,
    column: &str,
) -> Result<SourceHealth, sqlx::Error> {
    // Table names cannot be bound; both come from SOURCES
    let query = format!(
        r"
        SELECT
            MAX({column}) AS last_record,
            COUNT(*) FILTER (WHERE {column} > NOW() - INTERVAL '1 day') AS records_last_day
        FROM {table}
        "
    );
    let (last_record, records_last_day): (Option<DateTime<Utc>>, i64) =
        sqlx::query_as(&query).fetch_one(pool).await?;

    let staleness_seconds = last_record.map(|lr| (Utc::now() - lr).num_seconds());
    let status = determine_status(staleness_seconds, &HealthThresholds::for_source(table));

    Ok(SourceHealth {
        source: table.to_string(),
        last_record,
        records_last_day,
        staleness_seconds,
        status,
    })
}

fn overall_status(sources: &[SourceHealth]) -> &'static str {
    if sources
        .iter()
        .any(|s| s.status == "unhealthy" && s.source == "screening_runs")
    {
        "unhealthy"
    } else if sources.iter().any(|s| s.status != "healthy") {
        "degraded"
    } else {
        "healthy"
    }
}

/// GET /api/data/health
pub async fn data_health(State(state): State<Arc<AppState>>) -> Json<DataHealthResponse> {
    let mut sources = Vec::with_capacity(SOURCES.len());
    for (table, column) in SOURCES {
        match query_source_health(&state.pool, table, column).await {
            Ok(health) => sources.push(health),
            Err(e) => {
                tracing::error!(table, error = %e, "Failed to query data health");
                sources.push(SourceHealth {
                    source: table.to_string(),
                    last_record: None,
                    records_last_day: 0,
                    staleness_seconds: None,
                    status: "unhealthy".to_string(),
                });
            }
        }
    }

    let count = |status: &str| sources.iter().filter(|s| s.status == status).count();
    let summary = HealthSummary {
        healthy: count("healthy"),
        degraded: count("degraded"),
        unhealthy: count("unhealthy"),
    };

    Json(DataHealthResponse {
        status: overall_status(&sources).to_string(),
        timestamp: Utc::now(),
        sources,
        summary,
    })
}
