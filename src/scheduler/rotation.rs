/// Playlist Rotation Engine
///
/// Turns a candidate pool into an ordered run of tracks using one of eight
/// selection strategies. Everything here is synchronous and works on values
/// passed in; storage access happens in the caller.
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use chrono::{DateTime, Datelike, Local, Timelike, Utc};
use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::db::library::{Filters, Track};
use crate::error::GenerationError;
use crate::scheduler::clockwheel::{self, ClockHourTemplate};
use crate::scheduler::jingles;
use crate::scheduler::selection::{replay_allowed, weighted_sample, ArtistWindow};

/// Pools above this size are shuffled and truncated before selection.
pub const MAX_POOL_SIZE: usize = 5000;
/// Average track length assumed before a pool has been fetched.
pub const FALLBACK_AVG_DURATION_MS: f64 = 210_000.0;
/// Floor on the measured average so a pool of short clips can't explode the count.
pub const MIN_AVG_DURATION_MS: f64 = 60_000.0;

/// Largest artist separation a request may ask for.
pub const MAX_ARTIST_SEPARATION: u32 = 500;

const GENRE_BLOCK_MAX_ROUNDS: usize = 200;
const DAYPART_MIN_BAND_TRACKS: usize = 10;

// ── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    WeightedRandom,
    SmartRotation,
    HotRotation,
    ClockWheel,
    GenreBlock,
    EnergyFlow,
    AiAdaptive,
    Daypart,
}

impl Algorithm {
    pub const ALL: [Algorithm; 8] = [
        Self::WeightedRandom,
        Self::SmartRotation,
        Self::HotRotation,
        Self::ClockWheel,
        Self::GenreBlock,
        Self::EnergyFlow,
        Self::AiAdaptive,
        Self::Daypart,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WeightedRandom => "weighted_random",
            Self::SmartRotation => "smart_rotation",
            Self::HotRotation => "hot_rotation",
            Self::ClockWheel => "clock_wheel",
            Self::GenreBlock => "genre_block",
            Self::EnergyFlow => "energy_flow",
            Self::AiAdaptive => "ai_adaptive",
            Self::Daypart => "daypart",
        }
    }
}

impl FromStr for Algorithm {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| GenerationError::InvalidInput(format!("unknown algorithm '{wanted}'")))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyDirection {
    #[default]
    Ascending,
    Descending,
    Wave,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    /// Picks that must separate two tracks by the same artist
    pub artist_separation: u32,
    /// Minimum hours since a track last aired
    pub song_separation_hrs: f64,
    /// Splice a jingle after every N music tracks (0 = off)
    pub jingle_every_n: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub algorithm: Algorithm,
    /// Wins over `duration_minutes` when both are set
    #[serde(default)]
    pub track_count: Option<u32>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub rules: Rules,
    #[serde(default)]
    pub energy_direction: EnergyDirection,
    /// Hour used by `daypart` (defaults to the current hour)
    #[serde(default)]
    pub daypart_hour: Option<u8>,
    /// Hours walked by `clock_wheel` (defaults to the current hour)
    #[serde(default)]
    pub clock_hours: Vec<u8>,
    /// Fixed seed for reproducible selection
    #[serde(default)]
    pub seed: Option<u64>,
}

impl GenerationOptions {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            track_count: None,
            duration_minutes: None,
            filters: Filters::default(),
            rules: Rules::default(),
            energy_direction: EnergyDirection::default(),
            daypart_hour: None,
            clock_hours: Vec::new(),
            seed: None,
        }
    }

    pub fn validate(&self, max_track_count: u32) -> Result<(), GenerationError> {
        match (self.track_count, self.duration_minutes) {
            (None, None) => {
                return Err(GenerationError::InvalidInput(
                    "either track_count or duration_minutes is required".to_string(),
                ))
            }
            (Some(0), _) => {
                return Err(GenerationError::InvalidInput(
                    "track_count must be at least 1".to_string(),
                ))
            }
            (Some(n), _) if n > max_track_count => {
                return Err(GenerationError::InvalidInput(format!(
                    "track_count {n} exceeds the limit of {max_track_count}"
                )))
            }
            (None, Some(0)) => {
                return Err(GenerationError::InvalidInput(
                    "duration_minutes must be at least 1".to_string(),
                ))
            }
            _ => {}
        }

        if let Some(hour) = self.daypart_hour {
            if hour > 23 {
                return Err(GenerationError::InvalidInput(format!(
                    "daypart_hour must be 0-23, got {hour}"
                )));
            }
        }
        if let Some(hour) = self.clock_hours.iter().find(|h| **h > 23) {
            return Err(GenerationError::InvalidInput(format!(
                "clock hour must be 0-23, got {hour}"
            )));
        }

        if self.rules.artist_separation > MAX_ARTIST_SEPARATION {
            return Err(GenerationError::InvalidInput(format!(
                "artist_separation must be at most {MAX_ARTIST_SEPARATION}, got {}",
                self.rules.artist_separation
            )));
        }

        let hrs = self.rules.song_separation_hrs;
        if !hrs.is_finite() || hrs < 0.0 {
            return Err(GenerationError::InvalidInput(format!(
                "song_separation_hrs must be a non-negative number, got {hrs}"
            )));
        }

        self.filters.validate()
    }

    /// Number of music picks to request. An explicit count wins; otherwise
    /// the duration target is divided by the average track length.
    pub fn target_track_count(&self, avg_duration_ms: Option<f64>) -> usize {
        if let Some(n) = self.track_count {
            return n as usize;
        }
        let minutes = self.duration_minutes.unwrap_or(0) as f64;
        let avg = avg_duration_ms
            .map(|avg| avg.max(MIN_AVG_DURATION_MS))
            .unwrap_or(FALLBACK_AVG_DURATION_MS);
        ((minutes * 60_000.0) / avg).round().max(1.0) as usize
    }
}

pub fn average_duration_ms(pool: &[Track]) -> Option<f64> {
    if pool.is_empty() {
        return None;
    }
    let total: i64 = pool.iter().map(|t| t.duration_ms).sum();
    Some(total as f64 / pool.len() as f64)
}

// ── Dispatcher ───────────────────────────────────────────────────────────────

/// Per-run inputs that are not part of the pool itself.
pub struct SelectionContext<'a> {
    pub rng: &'a mut dyn RngCore,
    pub now: DateTime<Utc>,
    /// Templates fetched for `clock_wheel`; empty for other strategies
    pub clock_templates: &'a [ClockHourTemplate],
}

impl SelectionContext<'_> {
    fn local_hour(&self) -> u8 {
        self.now.with_timezone(&Local).hour() as u8
    }

    fn local_weekday(&self) -> u8 {
        self.now.with_timezone(&Local).weekday().num_days_from_monday() as u8
    }
}

/// Final running order plus how many entries came from the strategy itself.
#[derive(Debug, Clone)]
pub struct GeneratedRun {
    pub tracks: Vec<Track>,
    /// Picks made by the strategy; `tracks.len() - music_count` jingles were spliced in
    pub music_count: usize,
}

/// Run the chosen strategy and splice jingles into the result.
pub fn generate(
    pool: Vec<Track>,
    options: &GenerationOptions,
    count: usize,
    jingle_pool: &[Track],
    ctx: &mut SelectionContext<'_>,
) -> GeneratedRun {
    let picked = select_tracks(pool, options, count, ctx);
    let music_count = picked.len();
    GeneratedRun {
        tracks: jingles::interleave(picked, jingle_pool, options.rules.jingle_every_n),
        music_count,
    }
}

/// Run the chosen strategy only. Returns at most `count` tracks.
pub fn select_tracks(
    pool: Vec<Track>,
    options: &GenerationOptions,
    count: usize,
    ctx: &mut SelectionContext<'_>,
) -> Vec<Track> {
    if count == 0 || pool.is_empty() {
        return Vec::new();
    }

    let pool = cap_pool(pool, ctx.rng);
    let rules = &options.rules;

    let mut picked = match options.algorithm {
        Algorithm::WeightedRandom => weighted_sample(&pool, count, ctx.rng),
        Algorithm::SmartRotation => smart_rotation(&pool, count, rules, ctx.now, ctx.rng).tracks,
        Algorithm::HotRotation => hot_rotation(&pool, count, ctx.rng),
        Algorithm::ClockWheel => run_clock_wheel(&pool, options, count, ctx),
        Algorithm::GenreBlock => genre_block(&pool, count, ctx.rng),
        Algorithm::EnergyFlow => energy_flow(&pool, count, options.energy_direction, ctx.rng),
        Algorithm::AiAdaptive => ai_adaptive(&pool, count, rules, ctx.now, ctx.rng),
        Algorithm::Daypart => {
            let hour = options.daypart_hour.unwrap_or_else(|| ctx.local_hour());
            daypart(&pool, count, hour, ctx.rng)
        }
    };

    picked.truncate(count);
    log::debug!(
        "[rotation] {} picked {}/{} from pool of {}",
        options.algorithm.as_str(),
        picked.len(),
        count,
        pool.len()
    );
    picked
}

fn cap_pool(mut pool: Vec<Track>, rng: &mut dyn RngCore) -> Vec<Track> {
    if pool.len() > MAX_POOL_SIZE {
        log::debug!(
            "[rotation] pool of {} capped to {}",
            pool.len(),
            MAX_POOL_SIZE
        );
        pool.shuffle(rng);
        pool.truncate(MAX_POOL_SIZE);
    }
    pool
}

fn run_clock_wheel(
    pool: &[Track],
    options: &GenerationOptions,
    count: usize,
    ctx: &mut SelectionContext<'_>,
) -> Vec<Track> {
    let hours = if options.clock_hours.is_empty() {
        vec![ctx.local_hour()]
    } else {
        options.clock_hours.clone()
    };
    let templates = clockwheel::templates_for_hours(ctx.clock_templates, &hours, ctx.local_weekday());

    if templates.is_empty() {
        log::info!("[rotation] no clock templates for hours {hours:?}, using smart rotation");
        return smart_rotation(pool, count, &options.rules, ctx.now, ctx.rng).tracks;
    }

    let picked = clockwheel::clock_wheel(pool, &templates, count, ctx.rng);
    if picked.is_empty() {
        log::info!("[rotation] clock templates matched nothing in the pool, using weighted random");
        return weighted_sample(pool, count, ctx.rng);
    }
    picked
}

// ── Strategies ───────────────────────────────────────────────────────────────

/// Output of `smart_rotation` together with how often separation had to be relaxed.
#[derive(Debug, Clone)]
pub struct RotationPass {
    pub tracks: Vec<Track>,
    pub relaxations: u32,
}

/// Lower is better: frequently played, low-rated, low-weight and recently aired
/// tracks sink.
fn smart_score(track: &Track, now: DateTime<Utc>) -> f64 {
    let rest_bonus = track
        .hours_since_played(now)
        .map_or(20.0, |hours| (hours / 24.0 * 5.0).min(20.0));
    2.0 * track.play_count as f64
        - 5.0 * (track.rating - 1) as f64
        - 3.0 * (track.weight - 1.0)
        - rest_bonus
}

pub fn smart_rotation(
    pool: &[Track],
    count: usize,
    rules: &Rules,
    now: DateTime<Utc>,
    rng: &mut dyn RngCore,
) -> RotationPass {
    let mut scored: Vec<(f64, &Track)> = pool.iter().map(|t| (smart_score(t, now), t)).collect();
    // Shuffle first so equal scores come out in random order after the stable sort
    scored.shuffle(rng);
    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    let mut remaining: Vec<&Track> = scored.into_iter().map(|(_, t)| t).collect();

    // A window longer than the pool can never hold more picks than the pool has
    let separation = (rules.artist_separation as usize).min(pool.len());
    let mut window = ArtistWindow::new(separation);
    let mut picked = Vec::with_capacity(count.min(pool.len()));
    let mut relaxation = 0usize;
    let mut relaxations = 0u32;

    while picked.len() < count && !remaining.is_empty() {
        let effective = separation.saturating_sub(relaxation);
        let eligible = remaining.iter().position(|t| {
            window.allows(&t.artist, effective)
                && replay_allowed(t, rules.song_separation_hrs, now)
        });

        match eligible {
            Some(idx) => {
                let track = remaining.remove(idx);
                window.record(&track.artist);
                picked.push(track.clone());
                relaxation = 0;
            }
            None => {
                // Jump to the widest window that admits a replay-eligible candidate
                let recency = window.recency();
                let widest = remaining
                    .iter()
                    .filter(|t| replay_allowed(t, rules.song_separation_hrs, now))
                    .map(|t| {
                        recency
                            .get(&t.artist.trim().to_ascii_lowercase())
                            .map_or(usize::MAX, |d| d - 1)
                    })
                    .max();

                let Some(widest) = widest else {
                    // Song separation is never relaxed
                    log::debug!(
                        "[rotation] smart rotation stopped at {}/{}: no eligible candidates",
                        picked.len(),
                        count
                    );
                    break;
                };
                let step = effective.saturating_sub(widest).max(1);
                relaxation += step;
                relaxations = relaxations.saturating_add(u32::try_from(step).unwrap_or(u32::MAX));
                log::debug!(
                    "[rotation] relaxing artist separation to {}",
                    separation.saturating_sub(relaxation)
                );
            }
        }
    }

    RotationPass {
        tracks: picked,
        relaxations,
    }
}

pub fn hot_rotation(pool: &[Track], count: usize, rng: &mut dyn RngCore) -> Vec<Track> {
    let reweighted: Vec<Track> = pool
        .iter()
        .map(|t| {
            let mut hot = t.clone();
            hot.weight = t.rating.max(1) as f64 * (1.0 + (1.0 + t.play_count as f64).ln());
            hot
        })
        .collect();
    weighted_sample(&reweighted, count, rng)
}

pub fn genre_block(pool: &[Track], count: usize, rng: &mut dyn RngCore) -> Vec<Track> {
    // Groups keep first-seen order
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<Track>> = Vec::new();
    for track in pool {
        let genre = match track.genre.trim() {
            "" => "Unknown",
            g => g,
        };
        let slot = *index.entry(genre.to_string()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(track.clone());
    }
    for group in &mut groups {
        group.shuffle(rng);
    }

    let block = ((count as f64 / groups.len() as f64).round() as usize).max(3);
    let mut cursors = vec![0usize; groups.len()];
    let mut picked = Vec::with_capacity(count);

    for _ in 0..GENRE_BLOCK_MAX_ROUNDS {
        let mut progressed = false;
        for (group, cursor) in groups.iter().zip(cursors.iter_mut()) {
            if picked.len() >= count {
                break;
            }
            let end = (*cursor + block).min(group.len());
            if *cursor < end {
                picked.extend_from_slice(&group[*cursor..end]);
                *cursor = end;
                progressed = true;
            }
        }
        if !progressed || picked.len() >= count {
            break;
        }
    }

    picked.truncate(count);
    picked
}

pub fn energy_flow(
    pool: &[Track],
    count: usize,
    direction: EnergyDirection,
    rng: &mut dyn RngCore,
) -> Vec<Track> {
    let mut tracks = pool.to_vec();
    tracks.shuffle(rng);
    let by_energy = |a: &Track, b: &Track| {
        a.energy_level()
            .partial_cmp(&b.energy_level())
            .unwrap_or(Ordering::Equal)
    };

    match direction {
        EnergyDirection::Ascending => tracks.sort_by(by_energy),
        EnergyDirection::Descending => tracks.sort_by(|a, b| by_energy(b, a)),
        EnergyDirection::Wave => {
            tracks.sort_by(by_energy);
            let split = tracks.len().div_ceil(2);
            let mut falling = tracks.split_off(split);
            falling.reverse();
            tracks.extend(falling);
        }
    }

    tracks.truncate(count);
    tracks
}

fn adaptive_score(track: &Track, max_play_count: i64, now: DateTime<Utc>) -> f64 {
    let freshness = track
        .hours_since_played(now)
        .map_or(1.0, |hours| (hours / 168.0).min(1.0));
    let rating_norm = (track.rating - 1) as f64 / 4.0;
    let weight_norm = (track.weight / 10.0).min(1.0);
    let play_norm = if max_play_count > 0 {
        1.0 - track.play_count as f64 / max_play_count as f64
    } else {
        1.0
    };
    0.35 * freshness
        + 0.30 * rating_norm
        + 0.20 * weight_norm
        + 0.10 * play_norm
        + 0.05 * track.energy_level()
}

pub fn ai_adaptive(
    pool: &[Track],
    count: usize,
    rules: &Rules,
    now: DateTime<Utc>,
    rng: &mut dyn RngCore,
) -> Vec<Track> {
    let max_play_count = pool.iter().map(|t| t.play_count).max().unwrap_or(0);
    let mut scored: Vec<(f64, &Track)> = pool
        .iter()
        .map(|t| (adaptive_score(t, max_play_count, now), t))
        .collect();
    scored.shuffle(rng);
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    let separation = (rules.artist_separation as usize).clamp(1, pool.len().max(1));
    let mut window = ArtistWindow::new(separation);
    let mut used: HashSet<i64> = HashSet::with_capacity(count);
    let mut picked = Vec::with_capacity(count.min(pool.len()));

    for (_, track) in &scored {
        if picked.len() >= count {
            break;
        }
        if window.allows(&track.artist, separation) {
            window.record(&track.artist);
            used.insert(track.id);
            picked.push((*track).clone());
        }
    }

    // Fill whatever separation left open
    for (_, track) in &scored {
        if picked.len() >= count {
            break;
        }
        if used.insert(track.id) {
            picked.push((*track).clone());
        }
    }

    picked
}

/// Energy band for an hour of the day; each band is half-open on the hour axis.
pub fn daypart_band(hour: u8) -> (f64, f64) {
    match hour {
        6..=11 => (0.6, 1.0),
        12..=17 => (0.4, 0.8),
        18..=21 => (0.3, 0.7),
        _ => (0.0, 0.5),
    }
}

pub fn daypart(pool: &[Track], count: usize, hour: u8, rng: &mut dyn RngCore) -> Vec<Track> {
    let (low, high) = daypart_band(hour);
    let banded: Vec<Track> = pool
        .iter()
        .filter(|t| (low..=high).contains(&t.energy_level()))
        .cloned()
        .collect();

    if banded.len() < DAYPART_MIN_BAND_TRACKS {
        log::debug!(
            "[rotation] only {} tracks in the {low:.1}-{high:.1} band, using the full pool",
            banded.len()
        );
        return weighted_sample(pool, count, rng);
    }
    weighted_sample(&banded, count, rng)
}
