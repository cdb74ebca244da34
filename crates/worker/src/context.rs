//! Shared state for one job invocation.

use anyhow::{Context, Result};
use tracing::warn;
use wheel_core::AppConfig;
use wheel_data::{Database, Repositories};
use wheel_fundamentals::{AlphaVantageClient, FmpClient};
use wheel_schwab::SchwabClient;

use crate::alerts::Mailer;

/// Configuration plus a connected database. API clients are built on demand
/// so jobs that never touch a provider do not need its credentials.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub config: AppConfig,
    pub db: Database,
    pub repos: Repositories,
}

impl JobContext {
    /// Connects to the database (running migrations) and wraps the config.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable or migrations fail.
    pub async fn connect(config: AppConfig) -> Result<Self> {
        let db = Database::connect_with(&config.database.url, config.database.max_connections)
            .await?;
        Ok(Self::new(config, db))
    }

    #[must_use]
    pub fn new(config: AppConfig, db: Database) -> Self {
        let repos = db.repositories();
        Self { config, db, repos }
    }

    /// # Errors
    /// Returns an error if Schwab credentials are missing.
    pub fn schwab(&self) -> Result<SchwabClient> {
        SchwabClient::from_app_config(&self.config.schwab).context("Schwab client unavailable")
    }

    /// # Errors
    /// Returns an error if `FMP_API_KEY` is missing.
    pub fn fmp(&self) -> Result<FmpClient> {
        FmpClient::from_app_config(&self.config.fmp).context("FMP client unavailable")
    }

    /// # Errors
    /// Returns an error if `ALPHA_VANTAGE_API_KEY` is missing.
    pub fn alpha_vantage(&self) -> Result<AlphaVantageClient> {
        AlphaVantageClient::from_app_config(&self.config.alpha_vantage)
            .context("Alpha Vantage client unavailable")
    }

    /// FMP client when configured; jobs treat it as an optional fallback.
    #[must_use]
    pub fn optional_fmp(&self) -> Option<FmpClient> {
        match self.fmp() {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "FMP fallback disabled");
                None
            }
        }
    }

    /// Emails `subject`/`body` when alerts are enabled. Failures are logged,
    /// never propagated.
    pub async fn notify(&self, subject: &str, body: &str) {
        if !self.config.picks.email_alerts {
            return;
        }
        match Mailer::from_config(&self.config.smtp) {
            Ok(mailer) => {
                if let Err(e) = mailer.send(subject, body).await {
                    warn!(error = %e, subject, "Failed to send alert email");
                }
            }
            Err(e) => warn!(error = %e, "Email alerts enabled but SMTP is not configured"),
        }
    }
}
