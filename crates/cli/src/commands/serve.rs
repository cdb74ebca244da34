use anyhow::Result;
use clap::Args;
use wheel_core::{AppConfig, ServerConfig};
use wheel_data::Database;
use wheel_web_api::{ApiServer, AppState};

/// Arguments for the serve command.
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Listen address (defaults to server.host:server.port from config)
    #[arg(short, long)]
    pub addr: Option<String>,
}

fn listen_addr(args: &ServeArgs, server: &ServerConfig) -> String {
    args.addr
        .clone()
        .unwrap_or_else(|| format!("{}:{}", server.host, server.port))
}

/// Runs the dashboard API. The schema is not touched; run `wheel migrate`
/// first on a fresh database.
///
/// # Errors
/// Returns an error if the database is unreachable or the address cannot be bound.
pub async fn run_serve(config: AppConfig, args: ServeArgs) -> Result<()> {
    let addr = listen_addr(&args, &config.server);
    let db = Database::connect_without_migrations(
        &config.database.url,
        config.database.max_connections,
    )
    .await?;
    tracing::info!("Connected to database");

    ApiServer::new(AppState::new(&db, config.portfolio))
        .serve(&addr)
        .await
}

/// # Errors
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run_migrate(config: &AppConfig) -> Result<()> {
    let db = Database::connect_without_migrations(&config.database.url, 1).await?;
    db.migrate().await?;
    println!("Migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_addr_defaults_to_config() {
        let server = ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
        };
        assert_eq!(listen_addr(&ServeArgs { addr: None }, &server), "0.0.0.0:8080");
        let args = ServeArgs {
            addr: Some("127.0.0.1:9000".to_string()),
        };
        assert_eq!(listen_addr(&args, &server), "127.0.0.1:9000");
    }
}
