use sqlx::SqlitePool;

use crate::db::local::{self, EngineConfig};

/// Shared state handed to every playlist command.
pub struct AppState {
    pub local_db: SqlitePool,
    pub config: EngineConfig,
}

impl AppState {
    pub fn new(local_db: SqlitePool, config: EngineConfig) -> Self {
        Self {
            local_db,
            config: config.normalized(),
        }
    }

    /// Open (and migrate) the database at `db_path` and load the stored config.
    pub async fn open(db_path: &str) -> Result<Self, sqlx::Error> {
        let pool = local::init_db(db_path).await?;
        let config = local::get_engine_config(&pool).await?;
        Ok(Self::new(pool, config))
    }

    pub fn with_export_dir(mut self, dir: impl Into<String>) -> Self {
        let dir = dir.into();
        if !dir.trim().is_empty() {
            self.config.export_dir = dir;
        }
        self
    }
}
