use crate::config::AppConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};

/// Flat environment variable names used by the worker deployment, mapped
/// onto nested config keys.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("DATABASE_URL", "database.url"),
    ("SCHWAB_BASE_URL", "schwab.base_url"),
    ("SCHWAB_CLIENT_ID", "schwab.client_id"),
    ("SCHWAB_CLIENT_SECRET", "schwab.client_secret"),
    ("SCHWAB_REFRESH_TOKEN", "schwab.refresh_token"),
    ("SCHWAB_ACCOUNT_HASH", "schwab.account_hash"),
    ("FMP_API_KEY", "fmp.api_key"),
    ("ALPHA_VANTAGE_API_KEY", "alpha_vantage.api_key"),
    ("SMTP_HOST", "smtp.host"),
    ("SMTP_PORT", "smtp.port"),
    ("SMTP_USER", "smtp.user"),
    ("SMTP_PASS", "smtp.password"),
    ("ALERT_EMAIL_TO", "smtp.to"),
    ("ALERT_EMAIL_FROM", "smtp.from"),
    ("PICKS_N", "picks.csp_top_n"),
    ("CC_PICKS_N", "picks.cc_top_n"),
    ("ALLOW_ITM_CALLS", "picks.allow_itm_calls"),
    ("CC_TEST_TICKERS", "picks.cc_test_tickers"),
    ("UNIVERSE_CSV", "screener.universe_csv"),
];

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads application configuration by merging defaults, TOML, legacy
    /// environment names, `WHEEL_`-prefixed environment variables and JSON.
    ///
    /// Wheel rules are then overridden from their flat env names and validated.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed or the
    /// resulting rules are invalid.
    pub fn load() -> Result<AppConfig> {
        Self::finish(Self::figment(None).extract()?)
    }

    /// Loads application configuration with a specific profile
    /// (`config/Config.<profile>.toml` layered over the base file).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed or the
    /// resulting rules are invalid.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig> {
        Self::finish(Self::figment(Some(profile)).extract()?)
    }

    /// The provider stack, exposed for tests and diagnostics.
    #[must_use]
    pub fn figment(profile: Option<&str>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file("config/Config.toml"));

        if let Some(profile) = profile {
            figment = figment.merge(Toml::file(format!("config/Config.{profile}.toml")));
        }

        figment
            .merge(legacy_env())
            .merge(Env::prefixed("WHEEL_").split("__"))
            .join(Json::file("config/Config.json"))
    }

    fn finish(mut config: AppConfig) -> Result<AppConfig> {
        config.rules = config.rules.with_env_overrides();
        config
            .rules
            .validate()
            .context("invalid wheel rules configuration")?;
        Ok(config)
    }
}

fn legacy_env() -> Env {
    Env::raw().filter_map(|key| {
        LEGACY_ENV_KEYS
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, path)| (*path).into())
    })
}
