/// Clock wheel templates
///
/// A template lays out one hour of air time as ordered segments
/// ("3 songs, 1 jingle, 2 songs, 1 spot"). Templates are maintained by the
/// scheduling screens; this module only reads them and fills the segments.
use std::collections::{HashMap, HashSet};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::db::library::Track;
use crate::scheduler::selection::weighted_pick;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Song,
    Jingle,
    Sweeper,
    Spot,
}

impl SegmentKind {
    pub fn matches(self, track: &Track) -> bool {
        match self {
            Self::Song => track.is_music(),
            Self::Jingle => track.is_jingle,
            Self::Sweeper => track.is_sweeper,
            Self::Spot => track.is_spot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockSegment {
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockHourTemplate {
    pub id: Option<i64>,
    /// 0-23
    pub hour: u8,
    /// 0=Mon..6=Sun; `None` applies to every day
    pub day_of_week: Option<u8>,
    pub segments: Vec<ClockSegment>,
}

// ── DB helpers ────────────────────────────────────────────────────────────────

/// Templates for any of `hours`. A failed query yields no templates.
pub async fn get_clock_templates(pool: &SqlitePool, hours: &[u8]) -> Vec<ClockHourTemplate> {
    if hours.is_empty() {
        return Vec::new();
    }

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT id, hour, day_of_week, segments_json FROM clock_templates WHERE hour IN (");
    let mut separated = qb.separated(", ");
    for hour in hours {
        separated.push_bind(*hour as i64);
    }
    separated.push_unseparated(") ORDER BY hour ASC, id ASC");

    let rows = match qb.build().fetch_all(pool).await {
        Ok(rows) => rows,
        Err(e) => {
            log::warn!("[clockwheel] template query failed: {e}");
            return Vec::new();
        }
    };

    rows.into_iter()
        .map(|r| {
            let segments: Vec<ClockSegment> =
                serde_json::from_str(&r.try_get::<String, _>("segments_json").unwrap_or_default())
                    .unwrap_or_default();
            ClockHourTemplate {
                id: r.try_get("id").ok(),
                hour: r.try_get::<i64, _>("hour").unwrap_or(0).clamp(0, 23) as u8,
                day_of_week: r
                    .try_get::<Option<i64>, _>("day_of_week")
                    .ok()
                    .flatten()
                    .filter(|d| (0..=6).contains(d))
                    .map(|d| d as u8),
                segments: segments.into_iter().filter(|s| s.count > 0).collect(),
            }
        })
        .collect()
}

// ── Selection ─────────────────────────────────────────────────────────────────

/// One template per requested hour, in request order. A template pinned to
/// `weekday` beats a day-agnostic one; hours without a template are skipped.
pub fn templates_for_hours<'a>(
    templates: &'a [ClockHourTemplate],
    hours: &[u8],
    weekday: u8,
) -> Vec<&'a ClockHourTemplate> {
    hours
        .iter()
        .filter_map(|hour| {
            let for_hour = || templates.iter().filter(move |t| t.hour == *hour);
            for_hour()
                .find(|t| t.day_of_week == Some(weekday))
                .or_else(|| for_hour().find(|t| t.day_of_week.is_none()))
        })
        .collect()
}

/// Walk each template's segments in order, drawing `count` tracks of the
/// segment's role from the pool. No track is drawn twice.
pub fn clock_wheel(
    pool: &[Track],
    templates: &[&ClockHourTemplate],
    count: usize,
    rng: &mut dyn RngCore,
) -> Vec<Track> {
    let mut sub_pools: HashMap<SegmentKind, Vec<Track>> = HashMap::new();
    let mut used: HashSet<i64> = HashSet::new();
    let mut picked = Vec::with_capacity(count);

    'templates: for template in templates {
        for segment in &template.segments {
            let sub_pool: &[Track] = sub_pools.entry(segment.kind).or_insert_with(|| {
                pool.iter()
                    .filter(|t| segment.kind.matches(t))
                    .cloned()
                    .collect()
            });

            for _ in 0..segment.count {
                if picked.len() >= count {
                    break 'templates;
                }
                let Some(track) = weighted_pick(sub_pool, &used, rng) else {
                    break;
                };
                used.insert(track.id);
                picked.push(track.clone());
            }
        }
    }

    picked
}
