//! Data status CLI command.
//!
//! Row counts and time bounds for every pipeline table, plus the most
//! recent runs. Useful before `csp-picks` to confirm the screen and the
//! daily snapshots actually landed.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use wheel_core::AppConfig;
use wheel_data::{Repositories, RunHistoryRow};

/// Arguments for the data-status command.
#[derive(Args, Debug, Clone)]
pub struct DataStatusArgs {
    /// Only count rows for this ticker (tables without a ticker column are unfiltered)
    #[arg(long)]
    pub ticker: Option<String>,

    /// Number of recent runs to list
    #[arg(long, default_value_t = 5)]
    pub runs: i64,
}

/// (table, timestamp column, ticker column)
const TABLES: [(&str, &str, Option<&str>); 9] = [
    ("screening_runs", "run_ts", None),
    ("tickers", "updated_at", Some("ticker")),
    ("screening_candidates", "created_at", Some("ticker")),
    ("approved_universe", "updated_at", Some("ticker")),
    ("screening_picks", "created_at", Some("ticker")),
    ("rsi_snapshots", "created_at", Some("ticker")),
    ("iv_snapshots", "created_at", Some("symbol")),
    ("account_snapshots", "created_at", None),
    ("position_snapshots", "created_at", Some("symbol")),
];

/// Data bounds for a single table.
#[derive(Debug)]
struct TableStatus {
    table_name: String,
    record_count: i64,
    earliest: Option<DateTime<Utc>>,
    latest: Option<DateTime<Utc>>,
    failed: bool,
}

impl TableStatus {
    fn format_date(dt: Option<DateTime<Utc>>) -> String {
        dt.map_or_else(
            || "N/A".to_string(),
            |d| d.format("%Y-%m-%d %H:%M:%S").to_string(),
        )
    }

    fn age_days(&self, now: DateTime<Utc>) -> Option<f64> {
        self.latest.map(|l| (now - l).num_hours() as f64 / 24.0)
    }
}

/// Runs the data-status command.
///
/// # Errors
/// Returns an error if the database connection fails. Per-table query
/// failures are reported in the table instead.
pub async fn run_data_status(config: &AppConfig, args: DataStatusArgs) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database.url)
        .await
        .context("failed to connect to Postgres")?;

    tracing::info!("Connected to database");

    let ticker = args.ticker.map(|t| t.trim().to_uppercase());
    let mut statuses = Vec::with_capacity(TABLES.len());
    for (table, column, ticker_column) in TABLES {
        let filter = ticker_column.zip(ticker.as_deref());
        match query_table_status(&pool, table, column, filter).await {
            Ok(status) => statuses.push(status),
            Err(e) => {
                tracing::warn!("Failed to query {}: {:#}", table, e);
                statuses.push(TableStatus {
                    table_name: table.to_string(),
                    record_count: 0,
                    earliest: None,
                    latest: None,
                    failed: true,
                });
            }
        }
    }

    print!("{}", format_status_report(&statuses, ticker.as_deref(), Utc::now()));

    let runs = Repositories::new(pool).runs.list_runs(args.runs.max(1)).await;
    match runs {
        Ok(runs) => print!("{}", format_runs(&runs)),
        Err(e) => tracing::warn!("Failed to list runs: {:#}", e),
    }

    Ok(())
}

async fn query_table_status(
    pool: &PgPool,
    table: &str,
    column: &str,
    filter: Option<(&str, &str)>,
) -> Result<TableStatus> {
    // Identifiers come from TABLES; the ticker is bound
    let where_clause = filter
        .map(|(ticker_column, _)| format!("WHERE {ticker_column} = $1"))
        .unwrap_or_default();
    let query = format!("SELECT COUNT(*), MIN({column}), MAX({column}) FROM {table} {where_clause}");
    let mut q = sqlx::query_as::<_, (i64, Option<DateTime<Utc>>, Option<DateTime<Utc>>)>(&query);
    if let Some((_, ticker)) = filter {
        q = q.bind(ticker);
    }
    let (record_count, earliest, latest) = q.fetch_one(pool).await?;

    Ok(TableStatus {
        table_name: table.to_string(),
        record_count,
        earliest,
        latest,
        failed: false,
    })
}

fn format_status_report(statuses: &[TableStatus], ticker: Option<&str>, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str(&format!("{}\n", "=".repeat(96)));
    out.push_str("DATA STATUS REPORT\n");
    if let Some(ticker) = ticker {
        out.push_str(&format!("Filter: ticker = {ticker}\n"));
    }
    out.push_str(&format!("{}\n\n", "=".repeat(96)));
    out.push_str(&format!(
        "{:<22} {:>10} {:>22} {:>22} {:>10}\n",
        "Table", "Records", "Earliest", "Latest", "Age (d)"
    ));
    out.push_str(&format!("{}\n", "-".repeat(96)));

    for status in statuses {
        let records = if status.failed {
            "ERROR".to_string()
        } else {
            status.record_count.to_string()
        };
        let age = status
            .age_days(now)
            .map_or_else(|| "-".to_string(), |d| format!("{d:.1}"));
        out.push_str(&format!(
            "{:<22} {:>10} {:>22} {:>22} {:>10}\n",
            status.table_name,
            records,
            TableStatus::format_date(status.earliest),
            TableStatus::format_date(status.latest),
            age
        ));
    }
    out
}

fn format_runs(runs: &[RunHistoryRow]) -> String {
    let mut out = format!("\nRecent runs ({})\n", runs.len());
    for run in runs {
        out.push_str(&format!(
            "  #{:<6} {} {:<8} universe={} candidates={} csp={} cc={}{}\n",
            run.run_id,
            run.run_ts.format("%Y-%m-%d %H:%M"),
            run.status,
            run.universe_size,
            run.candidates_count.unwrap_or(0),
            run.csp_picks.unwrap_or(0),
            run.cc_picks.unwrap_or(0),
            run.error
                .as_deref()
                .map(|e| format!(" error: {e}"))
                .unwrap_or_default()
        ));
    }
    out
}
