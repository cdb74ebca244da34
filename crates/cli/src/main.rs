use anyhow::Result;
use clap::{Parser, Subcommand};
use wheel_core::{AppConfig, ConfigLoader};

mod commands;

use commands::{CspPicksArgs, DataStatusArgs, RulesArgs, ServeArgs};

#[derive(Parser)]
#[command(name = "wheel")]
#[command(about = "Wheel strategy screener, contract picker and dashboard", long_about = None)]
struct Cli {
    /// Config profile layered over config/Config.toml (config/Config.<profile>.toml)
    #[arg(long, global = true, env = "WHEEL_PROFILE")]
    profile: Option<String>,

    /// Database connection URL (overrides the config file)
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Debug logging for the wheel crates
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Weekly screen: universe, fundamentals, wheel scores, ranked candidates
    Screen,
    /// Cache daily RSI for the latest run's top candidates
    RsiSnapshot,
    /// Record ATM implied volatility for the IV universe
    IvSnapshot,
    /// Select one cash-secured put per candidate of a screening run
    CspPicks(CspPicksArgs),
    /// Select covered calls against held (or test) share lots
    CcPicks,
    /// Fill the portfolio budget from the latest picks
    Portfolio,
    /// Snapshot account balances and positions
    Track,
    /// Start the read-only dashboard API
    Serve(ServeArgs),
    /// Apply pending database migrations
    Migrate,
    /// Print the effective wheel rules
    Rules(RulesArgs),
    /// Row counts and freshness of the pipeline tables
    DataStatus(DataStatusArgs),
}

fn log_filter(verbose: bool) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            tracing_subscriber::EnvFilter::new(
                "info,wheel_worker=debug,wheel_selection=debug,wheel_schwab=debug,wheel_fundamentals=debug",
            )
        } else {
            tracing_subscriber::EnvFilter::new("info")
        }
    })
}

fn load_config(profile: Option<&str>, database_url: Option<String>) -> Result<AppConfig> {
    let mut config = match profile {
        Some(profile) => ConfigLoader::load_with_profile(profile)?,
        None => ConfigLoader::load()?,
    };
    if let Some(url) = database_url.filter(|url| !url.trim().is_empty()) {
        config.database.url = url;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .init();

    let config = load_config(cli.profile.as_deref(), cli.database_url)?;

    match cli.command {
        Commands::Screen => commands::run_screen(config).await?,
        Commands::RsiSnapshot => commands::run_rsi_snapshot(config).await?,
        Commands::IvSnapshot => commands::run_iv_snapshot(config).await?,
        Commands::CspPicks(args) => commands::run_csp_picks(config, args).await?,
        Commands::CcPicks => commands::run_cc_picks(config).await?,
        Commands::Portfolio => commands::run_portfolio(config).await?,
        Commands::Track => commands::run_track(config).await?,
        Commands::Serve(args) => commands::run_serve(config, args).await?,
        Commands::Migrate => commands::run_migrate(&config).await?,
        Commands::Rules(args) => commands::run_rules(&config, &args)?,
        Commands::DataStatus(args) => commands::run_data_status(&config, args).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_csp_picks_with_run_id() {
        let cli = Cli::try_parse_from(["wheel", "csp-picks", "--run-id", "42"]).unwrap();
        match cli.command {
            Commands::CspPicks(args) => assert_eq!(args.run_id, Some(42)),
            _ => panic!("expected csp-picks"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["wheel", "screen", "--profile", "paper", "--verbose"]).unwrap();
        assert_eq!(cli.profile.as_deref(), Some("paper"));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Screen));
    }

    #[test]
    fn test_serve_addr_is_optional() {
        let cli = Cli::try_parse_from(["wheel", "serve"]).unwrap();
        match cli.command {
            Commands::Serve(args) => assert!(args.addr.is_none()),
            _ => panic!("expected serve"),
        }
        let cli = Cli::try_parse_from(["wheel", "serve", "--addr", "127.0.0.1:9000"]).unwrap();
        match cli.command {
            Commands::Serve(args) => assert_eq!(args.addr.as_deref(), Some("127.0.0.1:9000")),
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["wheel", "backtest"]).is_err());
    }
}
