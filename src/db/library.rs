/// Media library reads: the candidate pool builder and the jingle pool.
///
/// The library tables are owned by the scanner; this module only reads them.
/// Query failures never propagate out of the pool builders: they are logged
/// and reported as an empty pool, which callers already handle.
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::error::GenerationError;

const TRACK_COLUMNS: &str = "id, file_path, title, artist, album, genre, year, duration_ms, bpm, \
     energy, mood, rating, play_count, last_played_at, is_jingle, is_sweeper, is_spot";

// ── Track ────────────────────────────────────────────────────────────────────

/// A row from the `tracks` table plus the run-scoped selection `weight`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: i64,
    pub file_path: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub year: Option<i32>,
    pub duration_ms: i64,
    pub bpm: Option<f64>,
    /// 0.0..=1.0, computed upstream by the analyser
    pub energy: Option<f64>,
    pub mood: String,
    pub rating: i32,
    pub play_count: i64,
    pub last_played_at: Option<DateTime<Utc>>,
    pub is_jingle: bool,
    pub is_sweeper: bool,
    pub is_spot: bool,
    /// Only meaningful inside a pool; never persisted with the track
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl Track {
    /// Energy with the neutral default applied.
    pub fn energy_level(&self) -> f64 {
        self.energy.unwrap_or(0.5)
    }

    /// Hours since the track last aired, `None` if it never has.
    pub fn hours_since_played(&self, now: DateTime<Utc>) -> Option<f64> {
        self.last_played_at
            .map(|played| (now - played).num_seconds().max(0) as f64 / 3600.0)
    }

    /// Neither jingle, sweeper nor spot.
    pub fn is_music(&self) -> bool {
        !(self.is_jingle || self.is_sweeper || self.is_spot)
    }
}

fn row_to_track(r: &SqliteRow) -> Track {
    let last_played_at = r
        .try_get::<Option<i64>, _>("last_played_at")
        .ok()
        .flatten()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

    Track {
        id: r.try_get("id").unwrap_or_default(),
        file_path: r.try_get("file_path").unwrap_or_default(),
        title: r.try_get("title").unwrap_or_default(),
        artist: r.try_get("artist").unwrap_or_default(),
        album: r.try_get("album").unwrap_or_default(),
        genre: r.try_get("genre").unwrap_or_default(),
        year: r.try_get::<Option<i32>, _>("year").ok().flatten(),
        duration_ms: r.try_get::<i64, _>("duration_ms").unwrap_or(0).max(0),
        bpm: r.try_get::<Option<f64>, _>("bpm").ok().flatten(),
        energy: r
            .try_get::<Option<f64>, _>("energy")
            .ok()
            .flatten()
            .map(|e| e.clamp(0.0, 1.0)),
        mood: r.try_get("mood").unwrap_or_default(),
        rating: r.try_get::<i32, _>("rating").unwrap_or(3).clamp(1, 5),
        play_count: r.try_get::<i64, _>("play_count").unwrap_or(0).max(0),
        last_played_at,
        is_jingle: r.try_get::<i64, _>("is_jingle").unwrap_or(0) != 0,
        is_sweeper: r.try_get::<i64, _>("is_sweeper").unwrap_or(0) != 0,
        is_spot: r.try_get::<i64, _>("is_spot").unwrap_or(0) != 0,
        weight: 1.0,
    }
}

// ── Filters ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    /// Track must belong to at least one of these (empty = any)
    pub category_ids: Vec<i64>,
    /// Case-insensitive partial match
    pub genre: Option<String>,
    pub include_jingles: bool,
    pub include_sweepers: bool,
    pub include_spots: bool,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub bpm_min: Option<f64>,
    pub bpm_max: Option<f64>,
    pub min_rating: Option<i32>,
}

impl Filters {
    pub fn validate(&self) -> Result<(), GenerationError> {
        if let (Some(min), Some(max)) = (self.year_min, self.year_max) {
            if min > max {
                return Err(GenerationError::InvalidInput(format!(
                    "year range is inverted ({min} > {max})"
                )));
            }
        }
        for bpm in [self.bpm_min, self.bpm_max].into_iter().flatten() {
            if !bpm.is_finite() || bpm < 0.0 {
                return Err(GenerationError::InvalidInput(format!(
                    "bpm bound {bpm} is not a non-negative number"
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.bpm_min, self.bpm_max) {
            if min > max {
                return Err(GenerationError::InvalidInput(format!(
                    "bpm range is inverted ({min} > {max})"
                )));
            }
        }
        if let Some(rating) = self.min_rating {
            if !(1..=5).contains(&rating) {
                return Err(GenerationError::InvalidInput(format!(
                    "min_rating must be between 1 and 5, got {rating}"
                )));
            }
        }
        Ok(())
    }
}

/// Escape `%`, `_` and `\` so user text is matched literally by `LIKE ... ESCAPE '\'`.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_pool_predicates(qb: &mut QueryBuilder<'_, Sqlite>, filters: &Filters) {
    qb.push(" WHERE is_missing = 0");

    if !filters.category_ids.is_empty() {
        qb.push(" AND id IN (SELECT track_id FROM track_categories WHERE category_id IN (");
        let mut separated = qb.separated(", ");
        for id in &filters.category_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated("))");
    }

    if let Some(genre) = filters
        .genre
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
    {
        qb.push(" AND LOWER(genre) LIKE ")
            .push_bind(like_pattern(genre))
            .push(" ESCAPE '\\'");
    }

    if !filters.include_jingles {
        qb.push(" AND is_jingle = 0");
    }
    if !filters.include_sweepers {
        qb.push(" AND is_sweeper = 0");
    }
    if !filters.include_spots {
        qb.push(" AND is_spot = 0");
    }

    if let Some(min) = filters.year_min {
        qb.push(" AND year >= ").push_bind(min);
    }
    if let Some(max) = filters.year_max {
        qb.push(" AND year <= ").push_bind(max);
    }

    // A track without a bpm value is never disqualified by a bpm range
    if let Some(min) = filters.bpm_min {
        qb.push(" AND (bpm IS NULL OR bpm >= ").push_bind(min).push(")");
    }
    if let Some(max) = filters.bpm_max {
        qb.push(" AND (bpm IS NULL OR bpm <= ").push_bind(max).push(")");
    }

    if let Some(rating) = filters.min_rating {
        qb.push(" AND rating >= ").push_bind(rating);
    }
}

// ── Pool builders ────────────────────────────────────────────────────────────

async fn query_pool(pool: &SqlitePool, filters: &Filters) -> Result<Vec<Track>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ");
    qb.push(TRACK_COLUMNS).push(" FROM tracks");
    push_pool_predicates(&mut qb, filters);
    qb.push(" ORDER BY id ASC");

    let rows = qb.build().fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_track).collect())
}

/// Every non-missing track satisfying `filters`, in id order, each with weight 1.0.
pub async fn build_pool(pool: &SqlitePool, filters: &Filters) -> Vec<Track> {
    match query_pool(pool, filters).await {
        Ok(tracks) => {
            log::debug!("[pool] {} candidate tracks", tracks.len());
            tracks
        }
        Err(e) => {
            log::warn!("[pool] pool query failed, treating as empty: {e}");
            Vec::new()
        }
    }
}

/// Cardinality of `build_pool(filters)` without materialising the rows.
pub async fn count_pool(pool: &SqlitePool, filters: &Filters) -> i64 {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM tracks");
    push_pool_predicates(&mut qb, filters);

    match qb.build_query_scalar::<i64>().fetch_one(pool).await {
        Ok(n) => n,
        Err(e) => {
            log::warn!("[pool] pool count failed, treating as empty: {e}");
            0
        }
    }
}

/// Up to `limit` jingles in random order. Re-queried on every call.
pub async fn fetch_jingle_pool(pool: &SqlitePool, limit: u32) -> Vec<Track> {
    let sql = format!(
        "SELECT {TRACK_COLUMNS} FROM tracks \
         WHERE is_jingle = 1 AND is_missing = 0 \
         ORDER BY RANDOM() LIMIT ?"
    );
    match sqlx::query(&sql).bind(limit as i64).fetch_all(pool).await {
        Ok(rows) => rows.iter().map(row_to_track).collect(),
        Err(e) => {
            log::warn!("[pool] jingle query failed, interleaving disabled: {e}");
            Vec::new()
        }
    }
}
