mod config;
mod mailer;
mod routes;
mod singleton;
mod state;
mod store;
mod sync;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rel8_core::formula::FormulaConfig;

use crate::config::ServerConfig;
use crate::mailer::{Mailer, ResendMailer};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rel8_sync=info")),
        )
        .init();

    let config = ServerConfig::load()?;

    // Ensure only one instance is using this database
    let _lock = singleton::acquire_lock(&config.database_url)?;

    let pool = store::connect(&config)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;
    store::migrate(&pool).await.context("Migration failed")?;

    let overrides = store::load_formula_overrides(&pool).await?;
    let formula = FormulaConfig::with_overrides(overrides);

    let api_key = config
        .resend_api_key
        .clone()
        .context("No Resend API key configured (set RESEND_API_KEY or resend_api_key)")?;
    let mailer: Arc<dyn Mailer> =
        Arc::new(ResendMailer::new(api_key, config.from_address.clone()));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let port = config.port;
    let state = AppState::new(pool, mailer, config, formula);

    let app = Router::new()
        .merge(routes::calendar::router())
        .with_state(state)
        .layer(cors);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("rel8-sync listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
