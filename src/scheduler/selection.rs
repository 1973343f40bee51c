/// Shared selection primitives: cumulative-weight sampling and the
/// artist/replay separation checks used by the constrained strategies.
use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use rand::{Rng, RngCore};

use crate::db::library::Track;

/// Floor applied to every weight so zero/negative weights stay drawable.
pub const MIN_WEIGHT: f64 = 0.0001;

/// Draw one track not in `used`, with probability proportional to its weight.
/// Returns `None` when every track has been used.
pub fn weighted_pick<'a>(
    pool: &'a [Track],
    used: &HashSet<i64>,
    rng: &mut dyn RngCore,
) -> Option<&'a Track> {
    let total: f64 = pool
        .iter()
        .filter(|t| !used.contains(&t.id))
        .map(|t| t.weight.max(MIN_WEIGHT))
        .sum();
    if total <= 0.0 {
        return None;
    }

    let target = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    let mut last = None;
    for track in pool.iter().filter(|t| !used.contains(&t.id)) {
        cumulative += track.weight.max(MIN_WEIGHT);
        if cumulative > target {
            return Some(track);
        }
        last = Some(track);
    }
    // Float rounding can leave `target` a hair above the final cumulative sum
    last
}

/// Repeated weighted draws without replacement until `count` tracks are
/// chosen, the pool runs dry, or the attempt budget is spent.
pub fn weighted_sample(pool: &[Track], count: usize, rng: &mut dyn RngCore) -> Vec<Track> {
    let budget = count * 15 + 100;
    let mut used = HashSet::with_capacity(count);
    let mut picked = Vec::with_capacity(count.min(pool.len()));

    for _ in 0..budget {
        if picked.len() >= count {
            break;
        }
        let Some(track) = weighted_pick(pool, &used, rng) else {
            break;
        };
        used.insert(track.id);
        picked.push(track.clone());
    }
    picked
}

// ── Separation ───────────────────────────────────────────────────────────────

/// Sliding window over the most recently selected artists.
#[derive(Debug, Clone)]
pub struct ArtistWindow {
    recent: VecDeque<String>,
    capacity: usize,
}

impl ArtistWindow {
    /// The deque grows on demand; `capacity` only bounds how much history is kept.
    pub fn new(capacity: usize) -> Self {
        Self {
            recent: VecDeque::new(),
            capacity,
        }
    }

    /// True when `artist` does not appear among the last `window` picks.
    /// Blank artists never collide.
    pub fn allows(&self, artist: &str, window: usize) -> bool {
        let artist = artist.trim();
        if artist.is_empty() || window == 0 {
            return true;
        }
        !self
            .recent
            .iter()
            .rev()
            .take(window)
            .any(|a| !a.is_empty() && a.eq_ignore_ascii_case(artist))
    }

    /// Distance back to each artist's latest pick (1 = the previous pick),
    /// keyed by lowercased name. Blank artists are left out.
    pub fn recency(&self) -> HashMap<String, usize> {
        let mut latest = HashMap::new();
        for (distance, artist) in self.recent.iter().rev().enumerate() {
            if !artist.is_empty() {
                latest
                    .entry(artist.to_ascii_lowercase())
                    .or_insert(distance + 1);
            }
        }
        latest
    }

    pub fn record(&mut self, artist: &str) {
        if self.capacity == 0 {
            return;
        }
        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(artist.trim().to_string());
    }
}

/// True when the track last aired at least `min_hours` ago (or never).
pub fn replay_allowed(track: &Track, min_hours: f64, now: DateTime<Utc>) -> bool {
    if min_hours <= 0.0 {
        return true;
    }
    track
        .hours_since_played(now)
        .map_or(true, |hours| hours >= min_hours)
}
