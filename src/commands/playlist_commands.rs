/// Playlist generation commands: generate, preview and pool estimation.
///
/// These take and return plain serde data so any transport (CLI, HTTP, job
/// queue) can drive them.
use std::path::Path;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::db::library::{self, Filters, Track};
use crate::db::playlists::{self, NewPlaylist};
use crate::error::GenerationError;
use crate::export::m3u;
use crate::scheduler::clockwheel::{self, ClockHourTemplate};
use crate::scheduler::rotation::{self, Algorithm, GenerationOptions, SelectionContext};
use crate::state::AppState;

pub const MAX_NAME_LEN: usize = 200;
pub const DEFAULT_PREVIEW_LIMIT: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Write an `.m3u` file after persisting
    #[serde(default)]
    pub export: bool,
    #[serde(flatten)]
    pub options: GenerationOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateResult {
    pub playlist_id: i64,
    pub name: String,
    pub algorithm: Algorithm,
    /// Includes interleaved jingles
    pub track_count: usize,
    /// Strategy picks only; never exceeds the requested count
    pub music_count: usize,
    pub duration_sec: i64,
    pub export_path: Option<String>,
    /// Set when the playlist was saved but the export file could not be written
    pub export_warning: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewTrack {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub duration_sec: i64,
    pub energy: f64,
}

impl From<&Track> for PreviewTrack {
    fn from(t: &Track) -> Self {
        Self {
            id: t.id,
            title: t.title.clone(),
            artist: t.artist.clone(),
            duration_sec: t.duration_ms / 1000,
            energy: t.energy_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewResult {
    pub algorithm: Algorithm,
    pub pool_size: usize,
    /// Track count a full generation would aim for
    pub target_count: usize,
    pub tracks: Vec<PreviewTrack>,
    /// Pool average duration times `target_count`
    pub estimated_duration_sec: i64,
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Build, persist and optionally export a playlist.
///
/// An existing playlist with the same name has its track list replaced.
pub async fn generate_playlist(
    state: &AppState,
    request: &PlaylistRequest,
) -> Result<GenerateResult, GenerationError> {
    let name = validate_name(&request.name)?;
    let options = &request.options;
    options.validate(state.config.max_track_count)?;

    let pool = library::build_pool(&state.local_db, &options.filters).await;
    if pool.is_empty() {
        log::info!("[generator] '{name}': no tracks match filters");
        return Err(GenerationError::EmptyPool);
    }
    let count = resolve_count(options, &pool, state.config.max_track_count);

    let jingle_pool = if options.rules.jingle_every_n > 0 {
        library::fetch_jingle_pool(&state.local_db, state.config.jingle_pool_limit).await
    } else {
        Vec::new()
    };
    let templates = load_templates(state, options).await;

    let now = Utc::now();
    let run = {
        let mut rng = seeded_rng(options.seed);
        let mut ctx = SelectionContext {
            rng: &mut rng,
            now,
            clock_templates: &templates,
        };
        rotation::generate(pool, options, count, &jingle_pool, &mut ctx)
    };
    let tracks = run.tracks;
    if tracks.is_empty() {
        log::warn!("[generator] '{name}': {} produced no tracks", options.algorithm.as_str());
        return Err(GenerationError::EmptyResult);
    }

    let generation_json = serde_json::to_string(options).unwrap_or_else(|_| "{}".to_string());
    let description = request
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());
    let playlist_id = playlists::replace_playlist(
        &state.local_db,
        &NewPlaylist {
            name,
            playlist_type: options.algorithm.as_str(),
            description,
            generation_json: &generation_json,
        },
        &tracks,
    )
    .await?;

    let (export_path, export_warning) = if request.export || state.config.export_by_default {
        match m3u::write_m3u(Path::new(&state.config.export_dir), name, &tracks, now) {
            Ok(path) => (Some(path.to_string_lossy().into_owned()), None),
            Err(e) => {
                log::warn!("[export] '{name}' saved but export failed: {e}");
                (None, Some(format!("export failed: {e}")))
            }
        }
    } else {
        (None, None)
    };

    let duration_ms: i64 = tracks.iter().map(|t| t.duration_ms).sum();
    log::info!(
        "[generator] '{}' (#{}) {} → {} tracks, {}s",
        name,
        playlist_id,
        options.algorithm.as_str(),
        tracks.len(),
        duration_ms / 1000
    );

    Ok(GenerateResult {
        playlist_id,
        name: name.to_string(),
        algorithm: options.algorithm,
        track_count: tracks.len(),
        music_count: run.music_count,
        duration_sec: duration_ms / 1000,
        export_path,
        export_warning,
    })
}

/// Run the selection at a reduced length without jingles or persistence.
pub async fn preview_playlist(
    state: &AppState,
    options: &GenerationOptions,
    limit: usize,
) -> Result<PreviewResult, GenerationError> {
    options.validate(state.config.max_track_count)?;

    let pool = library::build_pool(&state.local_db, &options.filters).await;
    if pool.is_empty() {
        return Err(GenerationError::EmptyPool);
    }
    let pool_size = pool.len();
    let avg_ms = rotation::average_duration_ms(&pool).unwrap_or(rotation::FALLBACK_AVG_DURATION_MS);
    let target_count = resolve_count(options, &pool, state.config.max_track_count);
    let sample_count = target_count.min(limit.max(1));
    let templates = load_templates(state, options).await;

    let tracks = {
        let mut rng = seeded_rng(options.seed);
        let mut ctx = SelectionContext {
            rng: &mut rng,
            now: Utc::now(),
            clock_templates: &templates,
        };
        rotation::select_tracks(pool, options, sample_count, &mut ctx)
    };
    if tracks.is_empty() {
        return Err(GenerationError::EmptyResult);
    }

    Ok(PreviewResult {
        algorithm: options.algorithm,
        pool_size,
        target_count,
        tracks: tracks.iter().map(PreviewTrack::from).collect(),
        estimated_duration_sec: (avg_ms * target_count as f64 / 1000.0).round() as i64,
    })
}

/// Number of tracks `filters` would put in the pool.
pub async fn estimate_pool_size(state: &AppState, filters: &Filters) -> Result<i64, GenerationError> {
    filters.validate()?;
    Ok(library::count_pool(&state.local_db, filters).await)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn validate_name(raw: &str) -> Result<&str, GenerationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(GenerationError::InvalidInput("name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(GenerationError::InvalidInput(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

fn resolve_count(options: &GenerationOptions, pool: &[Track], max_track_count: u32) -> usize {
    options
        .target_track_count(rotation::average_duration_ms(pool))
        .min(max_track_count as usize)
}

async fn load_templates(state: &AppState, options: &GenerationOptions) -> Vec<ClockHourTemplate> {
    if options.algorithm != Algorithm::ClockWheel {
        return Vec::new();
    }
    // Fetch every hour; the dispatcher resolves the current hour and weekday
    let hours: Vec<u8> = if options.clock_hours.is_empty() {
        (0..24).collect()
    } else {
        options.clock_hours.clone()
    };
    clockwheel::get_clock_templates(&state.local_db, &hours).await
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
