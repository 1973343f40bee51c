#![allow(dead_code)]

use desizone_playlist_lib::state::AppState;
use tempfile::TempDir;

pub struct TestDb {
    pub state: AppState,
    // Dropping the directory removes the database and exports
    pub dir: TempDir,
}

pub async fn open() -> TestDb {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("engine.db");
    let state = AppState::open(db_path.to_str().expect("utf-8 path"))
        .await
        .expect("open db")
        .with_export_dir(dir.path().join("exports").to_string_lossy().into_owned());
    TestDb { state, dir }
}

#[derive(Debug, Clone)]
pub struct SeedTrack {
    pub title: String,
    pub artist: String,
    pub genre: String,
    pub year: Option<i32>,
    pub duration_ms: i64,
    pub bpm: Option<f64>,
    pub energy: Option<f64>,
    pub rating: i32,
    pub is_jingle: bool,
    pub is_sweeper: bool,
    pub is_spot: bool,
    pub is_missing: bool,
}

impl SeedTrack {
    pub fn song(title: &str, artist: &str) -> Self {
        Self {
            title: title.to_string(),
            artist: artist.to_string(),
            genre: "Pop".to_string(),
            year: Some(2010),
            duration_ms: 180_000,
            bpm: Some(120.0),
            energy: Some(0.5),
            rating: 3,
            is_jingle: false,
            is_sweeper: false,
            is_spot: false,
            is_missing: false,
        }
    }

    pub fn jingle(title: &str) -> Self {
        Self {
            is_jingle: true,
            duration_ms: 8_000,
            genre: String::new(),
            ..Self::song(title, "Station")
        }
    }

    pub fn genre(mut self, genre: &str) -> Self {
        self.genre = genre.to_string();
        self
    }

    pub fn year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    pub fn bpm(mut self, bpm: Option<f64>) -> Self {
        self.bpm = bpm;
        self
    }

    pub fn rating(mut self, rating: i32) -> Self {
        self.rating = rating;
        self
    }

    pub fn missing(mut self) -> Self {
        self.is_missing = true;
        self
    }

    pub fn spot(mut self) -> Self {
        self.is_spot = true;
        self
    }
}

pub async fn insert_track(db: &TestDb, t: &SeedTrack) -> i64 {
    sqlx::query(
        r#"
        INSERT INTO tracks
          (file_path, title, artist, genre, year, duration_ms, bpm, energy, rating,
           is_jingle, is_sweeper, is_spot, is_missing)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(format!("/library/{}.mp3", t.title.replace(' ', "_")))
    .bind(&t.title)
    .bind(&t.artist)
    .bind(&t.genre)
    .bind(t.year)
    .bind(t.duration_ms)
    .bind(t.bpm)
    .bind(t.energy)
    .bind(t.rating)
    .bind(t.is_jingle)
    .bind(t.is_sweeper)
    .bind(t.is_spot)
    .bind(t.is_missing)
    .execute(&db.state.local_db)
    .await
    .expect("insert track")
    .last_insert_rowid()
}

/// `count` plain songs spread across `artists` distinct artists.
pub async fn seed_songs(db: &TestDb, count: usize, artists: usize) -> Vec<i64> {
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let t = SeedTrack::song(&format!("Song {i}"), &format!("Artist {}", i % artists.max(1)));
        ids.push(insert_track(db, &t).await);
    }
    ids
}

pub async fn add_to_category(db: &TestDb, track_id: i64, category_id: i64) {
    sqlx::query("INSERT INTO track_categories (track_id, category_id) VALUES (?, ?)")
        .bind(track_id)
        .bind(category_id)
        .execute(&db.state.local_db)
        .await
        .expect("insert category");
}

pub async fn insert_clock_template(db: &TestDb, hour: u8, day_of_week: Option<u8>, segments_json: &str) {
    sqlx::query("INSERT INTO clock_templates (hour, day_of_week, segments_json) VALUES (?, ?, ?)")
        .bind(hour as i64)
        .bind(day_of_week.map(|d| d as i64))
        .bind(segments_json)
        .execute(&db.state.local_db)
        .await
        .expect("insert clock template");
}

pub async fn playlist_row_count(db: &TestDb) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM generated_playlists")
        .fetch_one(&db.state.local_db)
        .await
        .expect("count playlists")
}
