/// Generated playlist persistence: upsert-by-name with full track replacement.
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::db::library::Track;

// SQLite caps bound parameters per statement; four binds per row.
const INSERT_CHUNK_ROWS: usize = 200;

#[derive(Debug, Clone)]
pub struct NewPlaylist<'a> {
    pub name: &'a str,
    pub playlist_type: &'a str,
    pub description: Option<&'a str>,
    /// JSON snapshot of the options that produced the playlist
    pub generation_json: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistEntry {
    /// 1-based, contiguous
    pub position: i64,
    pub track_id: i64,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedPlaylist {
    pub id: i64,
    pub name: String,
    pub playlist_type: String,
    pub description: Option<String>,
    pub generation_json: String,
    pub track_count: i64,
    pub duration_ms: i64,
    pub updated_at: i64,
    pub entries: Vec<PlaylistEntry>,
}

/// Create the playlist named `playlist.name`, or replace the contents of the
/// existing one, then write `tracks` at positions 1..=n.
///
/// Runs in one transaction. The upsert is the first statement so the write
/// lock is taken up front and concurrent regenerations of the same name are
/// serialised instead of interleaving rows; the last one to commit wins.
pub async fn replace_playlist(
    pool: &SqlitePool,
    playlist: &NewPlaylist<'_>,
    tracks: &[Track],
) -> Result<i64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO generated_playlists (name, playlist_type, description, generation_json)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(name) DO UPDATE SET
          playlist_type   = excluded.playlist_type,
          description     = excluded.description,
          generation_json = excluded.generation_json,
          updated_at      = strftime('%s','now')
        "#,
    )
    .bind(playlist.name)
    .bind(playlist.playlist_type)
    .bind(playlist.description)
    .bind(playlist.generation_json)
    .execute(&mut *tx)
    .await?;

    let playlist_id: i64 = sqlx::query_scalar("SELECT id FROM generated_playlists WHERE name = ?")
        .bind(playlist.name)
        .fetch_one(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM generated_playlist_tracks WHERE playlist_id = ?")
        .bind(playlist_id)
        .execute(&mut *tx)
        .await?;

    for (chunk_idx, chunk) in tracks.chunks(INSERT_CHUNK_ROWS).enumerate() {
        let offset = chunk_idx * INSERT_CHUNK_ROWS;
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO generated_playlist_tracks (playlist_id, position, track_id, weight) ",
        );
        qb.push_values(chunk.iter().enumerate(), |mut b, (i, track)| {
            b.push_bind(playlist_id)
                .push_bind((offset + i + 1) as i64)
                .push_bind(track.id)
                .push_bind(1.0_f64);
        });
        qb.build().execute(&mut *tx).await?;
    }

    let duration_ms: i64 = tracks.iter().map(|t| t.duration_ms).sum();
    sqlx::query("UPDATE generated_playlists SET track_count = ?, duration_ms = ? WHERE id = ?")
        .bind(tracks.len() as i64)
        .bind(duration_ms)
        .bind(playlist_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(playlist_id)
}

pub async fn load_playlist(
    pool: &SqlitePool,
    name: &str,
) -> Result<Option<GeneratedPlaylist>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, name, playlist_type, description, generation_json, track_count, duration_ms, updated_at \
         FROM generated_playlists WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    let Some(r) = row else {
        return Ok(None);
    };
    let id: i64 = r.try_get("id")?;

    let entries = sqlx::query(
        "SELECT position, track_id, weight FROM generated_playlist_tracks \
         WHERE playlist_id = ? ORDER BY position ASC",
    )
    .bind(id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|e| PlaylistEntry {
        position: e.try_get("position").unwrap_or_default(),
        track_id: e.try_get("track_id").unwrap_or_default(),
        weight: e.try_get::<f64, _>("weight").unwrap_or(1.0),
    })
    .collect();

    Ok(Some(GeneratedPlaylist {
        id,
        name: r.try_get("name").unwrap_or_default(),
        playlist_type: r.try_get("playlist_type").unwrap_or_default(),
        description: r.try_get::<Option<String>, _>("description").ok().flatten(),
        generation_json: r.try_get("generation_json").unwrap_or_default(),
        track_count: r.try_get("track_count").unwrap_or(0),
        duration_ms: r.try_get("duration_ms").unwrap_or(0),
        updated_at: r.try_get("updated_at").unwrap_or(0),
        entries,
    }))
}
