use std::sync::Arc;

use sqlx::SqlitePool;

use rel8_core::formula::FormulaConfig;

use crate::config::ServerConfig;
use crate::mailer::Mailer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub mailer: Arc<dyn Mailer>,
    pub config: ServerConfig,
    pub formula: Arc<FormulaConfig>,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        mailer: Arc<dyn Mailer>,
        config: ServerConfig,
        formula: FormulaConfig,
    ) -> Self {
        AppState {
            pool,
            mailer,
            config,
            formula: Arc::new(formula),
        }
    }
}
