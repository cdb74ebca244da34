use crate::{data_health, handlers};
use axum::{routing::get, Router};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use wheel_core::PortfolioConstraints;
use wheel_data::{Database, Repositories};

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub repos: Repositories,
    pub portfolio: PortfolioConstraints,
}

impl AppState {
    #[must_use]
    pub fn new(db: &Database, portfolio: PortfolioConstraints) -> Self {
        Self::from_pool(db.pool().clone(), portfolio)
    }

    #[must_use]
    pub fn from_pool(pool: PgPool, portfolio: PortfolioConstraints) -> Self {
        let repos = Repositories::new(pool.clone());
        Self {
            pool,
            repos,
            portfolio,
        }
    }
}

/// Read-only dashboard API.
pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/health", get(handlers::health))
            .route("/api/summary", get(handlers::summary))
            .route("/api/runs", get(handlers::runs))
            .route("/api/candidates", get(handlers::candidates))
            .route("/api/picks", get(handlers::picks))
            .route("/api/portfolio", get(handlers::portfolio))
            .route("/api/data/health", get(data_health::data_health))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Starts the web server listening on the specified address.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the address or serve requests.
    pub async fn serve(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Web API listening on {}", addr);

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}
