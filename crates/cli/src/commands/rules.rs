use anyhow::Result;
use clap::Args;
use serde_json::{json, Value};
use wheel_core::AppConfig;

/// Arguments for the rules command.
#[derive(Args, Debug, Clone)]
pub struct RulesArgs {
    /// Also print scoring weights, portfolio constraints and job settings
    #[arg(long)]
    pub all: bool,
}

/// Effective settings after files and env overrides. Credential-bearing
/// sections are never included.
fn effective_settings(config: &AppConfig, all: bool) -> Result<Value> {
    let rules = serde_json::to_value(&config.rules)?;
    if !all {
        return Ok(rules);
    }
    Ok(json!({
        "rules": rules,
        "scoring": serde_json::to_value(&config.scoring)?,
        "portfolio": serde_json::to_value(&config.portfolio)?,
        "screener": serde_json::to_value(&config.screener)?,
        "picks": serde_json::to_value(&config.picks)?,
    }))
}

/// # Errors
/// Returns an error if the settings cannot be serialized.
pub fn run_rules(config: &AppConfig, args: &RulesArgs) -> Result<()> {
    let settings = effective_settings(config, args.all)?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
