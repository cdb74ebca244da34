//! Plain-text email alerts over SMTP with STARTTLS.

use anyhow::{bail, Context, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use std::fmt::Write as _;
use tracing::info;
use wheel_core::SmtpConfig;
use wheel_data::PickRecord;

/// SMTP sender for job summaries.
pub struct Mailer {
    host: String,
    port: u16,
    user: String,
    password: SecretString,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("to", &self.to.len())
            .finish()
    }
}

impl Mailer {
    /// Builds a mailer from SMTP settings. `to` may list several
    /// comma-separated addresses.
    ///
    /// # Errors
    /// Returns an error naming missing settings or unparseable addresses.
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        let missing = config.missing_fields();
        if !missing.is_empty() {
            bail!("missing SMTP settings: {}", missing.join(", "));
        }
        let from: Mailbox = config
            .sender()
            .parse()
            .with_context(|| format!("invalid sender address {}", config.sender()))?;
        let to = parse_recipients(&config.to)?;
        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            user: config.user.clone(),
            password: SecretString::from(config.password.clone()),
            from,
            to,
        })
    }

    /// Sends a plain-text message to every recipient.
    ///
    /// # Errors
    /// Returns an error if the message cannot be built or SMTP delivery fails.
    pub async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        let message = builder
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("failed to build email")?;

        let credentials = Credentials::new(
            self.user.clone(),
            self.password.expose_secret().to_string(),
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            .context("failed to configure SMTP relay")?
            .port(self.port)
            .credentials(credentials)
            .build();

        transport.send(message).await.context("SMTP send failed")?;
        info!(subject, recipients = self.to.len(), "Alert email sent");
        Ok(())
    }
}

fn parse_recipients(raw: &str) -> Result<Vec<Mailbox>> {
    let to = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Mailbox>()
                .with_context(|| format!("invalid recipient address {s}"))
        })
        .collect::<Result<Vec<_>>>()?;
    if to.is_empty() {
        bail!("no alert recipients configured");
    }
    Ok(to)
}

/// Text body listing picks, best first.
#[must_use]
pub fn format_pick_summary(title: &str, picks: &[PickRecord], skipped: &str) -> String {
    let mut body = format!("{title}\n\n");
    if picks.is_empty() {
        body.push_str("No picks.\n");
    }
    for pick in picks {
        let _ = writeln!(
            body,
            "#{rank} {ticker} {action} {strike} exp {exp} (dte {dte}) premium {premium} \
             delta {delta:.3} yield {yield_pct:.1}% score {score:.3}",
            rank = pick.rank,
            ticker = pick.ticker,
            action = pick.action,
            strike = pick.strike,
            exp = pick.expiration,
            dte = pick.dte,
            premium = pick.premium,
            delta = pick.target_delta,
            yield_pct = pick.annualized_yield * 100.0,
            score = pick.score,
        );
    }
    if !skipped.is_empty() {
        let _ = write!(body, "\n{skipped}\n");
    }
    body
}
