//! Batch job commands.
//!
//! Each command connects (running migrations), runs one worker job and
//! prints a short report. Job failures propagate so cron sees a non-zero
//! exit status.

use anyhow::Result;
use clap::Args;
use wheel_core::AppConfig;
use wheel_data::PickRecord;
use wheel_selection::PortfolioSelection;
use wheel_worker::{JobContext, PickBuild, ScreenSummary};

/// Arguments for the csp-picks command.
#[derive(Args, Debug, Clone)]
pub struct CspPicksArgs {
    /// Screening run to pick from (defaults to the latest run with candidates)
    #[arg(long)]
    pub run_id: Option<i64>,
}

async fn connect(config: AppConfig) -> Result<JobContext> {
    let ctx = JobContext::connect(config).await?;
    tracing::info!("Connected to database");
    Ok(ctx)
}

pub async fn run_screen(config: AppConfig) -> Result<()> {
    let ctx = connect(config).await?;
    let summary = wheel_worker::weekly_screen(&ctx).await?;
    print!("{}", format_screen_report(&summary));
    Ok(())
}

pub async fn run_rsi_snapshot(config: AppConfig) -> Result<()> {
    let ctx = connect(config).await?;
    let collection = wheel_worker::rsi_snapshot(&ctx).await?;
    println!(
        "RSI snapshot: written={} cached={} failed={}{}",
        collection.snapshots.len(),
        collection.skipped_cached,
        collection.failed,
        if collection.rate_limited {
            " (stopped on rate limit)"
        } else {
            ""
        }
    );
    Ok(())
}

pub async fn run_iv_snapshot(config: AppConfig) -> Result<()> {
    let ctx = connect(config).await?;
    let stats = wheel_worker::iv_snapshot(&ctx).await?;
    println!(
        "IV snapshot: symbols={} written={} no_chain={} no_expiration={} no_iv={} errors={}",
        stats.symbols,
        stats.written,
        stats.no_chain,
        stats.no_expiration,
        stats.no_iv,
        stats.errors
    );
    Ok(())
}

pub async fn run_csp_picks(config: AppConfig, args: CspPicksArgs) -> Result<()> {
    let ctx = connect(config).await?;
    let build = wheel_worker::csp_picks(&ctx, args.run_id).await?;
    print!("{}", format_pick_report("CSP picks", &build));
    Ok(())
}

pub async fn run_cc_picks(config: AppConfig) -> Result<()> {
    let ctx = connect(config).await?;
    let build = wheel_worker::cc_picks(&ctx).await?;
    print!("{}", format_pick_report("CC picks", &build));
    Ok(())
}

pub async fn run_portfolio(config: AppConfig) -> Result<()> {
    let ctx = connect(config).await?;
    let selection = wheel_worker::portfolio(&ctx).await?;
    print!("{}", format_portfolio_report(&selection));
    Ok(())
}

pub async fn run_track(config: AppConfig) -> Result<()> {
    let ctx = connect(config).await?;
    let summary = wheel_worker::daily_tracker(&ctx).await?;
    println!(
        "Daily tracker: run_id={} account_snapshot_id={} positions={}",
        summary.run_id, summary.account_snapshot_id, summary.positions
    );
    Ok(())
}

fn format_screen_report(summary: &ScreenSummary) -> String {
    let stats = &summary.stats;
    let mut out = format!(
        "Screen run {} (universe from {})\n  universe={} passed={} candidates={} approved={}\n",
        summary.run_id,
        summary.universe_source,
        stats.universe,
        stats.passed,
        summary.candidates,
        summary.approved
    );
    out.push_str(&format!(
        "  missing: profile={} quote={} rsi={} errors={}\n",
        stats.profile_missing, stats.quote_missing, stats.rsi_missing, stats.errors
    ));
    for (reason, count) in &stats.rejected {
        out.push_str(&format!("  rejected {reason:?}: {count}\n"));
    }
    if !summary.top.is_empty() {
        let top: Vec<String> = summary
            .top
            .iter()
            .map(|(ticker, score)| format!("{ticker}({score})"))
            .collect();
        out.push_str(&format!("  top: {}\n", top.join(", ")));
    }
    out
}

fn format_pick_line(pick: &PickRecord) -> String {
    format!(
        "{:>3} {:<6} {:<3} {} {:>8} premium={:>6} delta={:.2} yield={:>6.1}% score={:.3}",
        pick.rank,
        pick.ticker,
        pick.action,
        pick.expiration,
        pick.strike,
        pick.premium,
        pick.target_delta,
        pick.annualized_yield * 100.0,
        pick.score
    )
}

fn format_pick_report(title: &str, build: &PickBuild) -> String {
    let mut out = format!("{title}: {}\n", build.summary());
    for pick in &build.picks {
        out.push_str(&format_pick_line(pick));
        out.push('\n');
    }
    out
}

fn format_portfolio_report(selection: &PortfolioSelection) -> String {
    let mut out = format!(
        "Portfolio: {} selected, collateral={} premium={} utilization={}%\n",
        selection.selected.len(),
        selection.total_collateral,
        selection.expected_premium,
        selection.utilization_pct.round_dp(1)
    );
    for position in &selection.selected {
        out.push_str(&format!(
            "  {:<6} {:?} {} {} collateral={} premium={} score={:.3}\n",
            position.ticker,
            position.action,
            position.expiration,
            position.strike,
            position.collateral,
            position.expected_premium,
            position.score
        ));
    }
    for (position, reason) in &selection.rejected {
        out.push_str(&format!("  skipped {:<6} {reason:?}\n", position.ticker));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use wheel_core::WheelAction;
    use wheel_selection::allocation::{PortfolioCandidate, PortfolioRejection};
    use wheel_worker::ScreenStats;

    fn candidate(ticker: &str) -> PortfolioCandidate {
        PortfolioCandidate {
            ticker: ticker.to_string(),
            action: WheelAction::Csp,
            strike: Decimal::new(95, 0),
            expiration: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            collateral: Decimal::new(9500, 0),
            expected_premium: Decimal::new(82, 0),
            score: 0.61,
            annualized_yield: 0.45,
        }
    }

    #[test]
    fn test_screen_report_lists_top_and_rejections() {
        let mut stats = ScreenStats {
            universe: 40,
            passed: 12,
            ..ScreenStats::default()
        };
        stats
            .rejected
            .insert(wheel_selection::screening::ScreenRejection::PriceTooLow, 3);
        let summary = ScreenSummary {
            run_id: 7,
            universe_source: "csv",
            candidates: 12,
            approved: 10,
            top: vec![("AAPL".to_string(), 81), ("MSFT".to_string(), 77)],
            stats,
        };
        let report = format_screen_report(&summary);
        assert!(report.starts_with("Screen run 7 (universe from csv)"));
        assert!(report.contains("universe=40 passed=12 candidates=12 approved=10"));
        assert!(report.contains("rejected PriceTooLow: 3"));
        assert!(report.contains("top: AAPL(81), MSFT(77)"));
    }

    #[test]
    fn test_portfolio_report() {
        let selection = PortfolioSelection {
            selected: vec![candidate("AAPL")],
            rejected: vec![(candidate("AAPL"), PortfolioRejection::DuplicateTicker)],
            total_collateral: Decimal::new(9500, 0),
            expected_premium: Decimal::new(82, 0),
            utilization_pct: Decimal::new(2375, 2),
        };
        let report = format_portfolio_report(&selection);
        assert!(report.starts_with("Portfolio: 1 selected, collateral=9500 premium=82 utilization=23.8%"));
        assert!(report.contains("skipped AAPL   DuplicateTicker"));
    }
}
