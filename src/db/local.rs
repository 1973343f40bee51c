use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::str::FromStr;

/// Initialise (or migrate) the local SQLite database at `db_path`.
/// Creates all tables if they don't exist.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(options).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        -- Media library (owned by the library scanner, read-only here)
        CREATE TABLE IF NOT EXISTS tracks (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            file_path       TEXT    NOT NULL,
            title           TEXT    NOT NULL DEFAULT '',
            artist          TEXT    NOT NULL DEFAULT '',
            album           TEXT    NOT NULL DEFAULT '',
            genre           TEXT    NOT NULL DEFAULT '',
            year            INTEGER,
            duration_ms     INTEGER NOT NULL DEFAULT 0,
            bpm             REAL,
            energy          REAL,
            mood            TEXT    NOT NULL DEFAULT '',
            rating          INTEGER NOT NULL DEFAULT 3,
            play_count      INTEGER NOT NULL DEFAULT 0,
            last_played_at  INTEGER,
            is_jingle       INTEGER NOT NULL DEFAULT 0,
            is_sweeper      INTEGER NOT NULL DEFAULT 0,
            is_spot         INTEGER NOT NULL DEFAULT 0,
            is_missing      INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS track_categories (
            track_id    INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            PRIMARY KEY (track_id, category_id)
        );

        -- Clock wheel: one template per hour (optionally per weekday, 0=Mon..6=Sun)
        CREATE TABLE IF NOT EXISTS clock_templates (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            hour          INTEGER NOT NULL,
            day_of_week   INTEGER,
            segments_json TEXT    NOT NULL DEFAULT '[]'
        );

        -- Generated playlists
        CREATE TABLE IF NOT EXISTS generated_playlists (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT    NOT NULL UNIQUE,
            playlist_type   TEXT    NOT NULL,
            description     TEXT,
            generation_json TEXT    NOT NULL DEFAULT '{}',
            track_count     INTEGER NOT NULL DEFAULT 0,
            duration_ms     INTEGER NOT NULL DEFAULT 0,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s','now')),
            updated_at      INTEGER NOT NULL DEFAULT (strftime('%s','now'))
        );

        CREATE TABLE IF NOT EXISTS generated_playlist_tracks (
            playlist_id INTEGER NOT NULL REFERENCES generated_playlists(id) ON DELETE CASCADE,
            position    INTEGER NOT NULL,
            track_id    INTEGER NOT NULL,
            weight      REAL    NOT NULL DEFAULT 1.0,
            PRIMARY KEY (playlist_id, position)
        );

        CREATE TABLE IF NOT EXISTS engine_config (
            id          INTEGER PRIMARY KEY DEFAULT 1,
            config_json TEXT    NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tracks_flags ON tracks(is_missing, is_jingle, is_sweeper, is_spot);
        CREATE INDEX IF NOT EXISTS idx_clock_templates_hour ON clock_templates(hour);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

// ── Engine config ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory that receives `.m3u` exports
    pub export_dir: String,
    /// Upper bound on the jingle pool fetched per generation
    pub jingle_pool_limit: u32,
    /// Largest track count a single request may ask for
    pub max_track_count: u32,
    /// Write an export file even when the request does not ask for one
    pub export_by_default: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            export_dir: "./exports".to_string(),
            jingle_pool_limit: 500,
            max_track_count: 1000,
            export_by_default: false,
        }
    }
}

impl EngineConfig {
    pub fn normalized(mut self) -> Self {
        if self.export_dir.trim().is_empty() {
            self.export_dir = EngineConfig::default().export_dir;
        }
        self.jingle_pool_limit = self.jingle_pool_limit.clamp(1, 500);
        self.max_track_count = self.max_track_count.max(1);
        self
    }
}

pub async fn get_engine_config(pool: &SqlitePool) -> Result<EngineConfig, sqlx::Error> {
    let row: Option<String> =
        sqlx::query_scalar("SELECT config_json FROM engine_config WHERE id = 1")
            .fetch_optional(pool)
            .await?;

    let cfg = row
        .and_then(|j| serde_json::from_str::<EngineConfig>(&j).ok())
        .unwrap_or_default()
        .normalized();

    Ok(cfg)
}

pub async fn save_engine_config(pool: &SqlitePool, config: &EngineConfig) -> Result<(), sqlx::Error> {
    let normalized = config.clone().normalized();
    let json = serde_json::to_string(&normalized).unwrap_or_else(|_| "{}".to_string());

    sqlx::query(
        r#"
        INSERT INTO engine_config (id, config_json)
        VALUES (1, ?)
        ON CONFLICT(id) DO UPDATE SET config_json = excluded.config_json
        "#,
    )
    .bind(json)
    .execute(pool)
    .await?;

    Ok(())
}
