/// Extended-M3U export for generated playlists.
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::db::library::Track;

const MAX_SLUG_LEN: usize = 80;

/// Render the playlist as extended M3U text.
pub fn render_m3u(name: &str, tracks: &[Track]) -> String {
    let mut out = String::from("#EXTM3U\n");
    let _ = writeln!(out, "#PLAYLIST:{}", single_line(name));

    let mut total_ms: i64 = 0;
    for track in tracks {
        total_ms += track.duration_ms.max(0);
        let secs = if track.duration_ms > 0 {
            (track.duration_ms + 500) / 1000
        } else {
            -1
        };
        let _ = writeln!(out, "#EXTINF:{secs},{}", display_title(track));
        let _ = writeln!(out, "{}", single_line(&track.file_path));
    }

    let _ = writeln!(
        out,
        "# Total runtime: {} ({} tracks)",
        format_runtime(total_ms),
        tracks.len()
    );
    out
}

/// Write `<slug>_<timestamp>.m3u` under `dir`, creating the directory first.
pub fn write_m3u(
    dir: &Path,
    name: &str,
    tracks: &[Track],
    now: DateTime<Utc>,
) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(export_filename(name, now));
    fs::write(&path, render_m3u(name, tracks))?;
    log::info!("[export] wrote {} tracks to {}", tracks.len(), path.display());
    Ok(path)
}

/// Filesystem-safe file name: ASCII alphanumerics plus `-`/`_`, runs of
/// anything else collapsed to one `_`, suffixed with a UTC timestamp.
pub fn export_filename(name: &str, now: DateTime<Utc>) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            slug.push(c);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let mut slug: String = slug.trim_matches('_').chars().take(MAX_SLUG_LEN).collect();
    if slug.is_empty() {
        slug.push_str("playlist");
    }
    format!("{slug}_{}.m3u", now.format("%Y%m%d_%H%M%S"))
}

fn display_title(track: &Track) -> String {
    let title = single_line(&track.title);
    let artist = single_line(&track.artist);
    match (artist.is_empty(), title.is_empty()) {
        (false, false) => format!("{artist} - {title}"),
        (true, false) => title,
        (false, true) => artist,
        (true, true) => Path::new(&track.file_path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

fn single_line(s: &str) -> String {
    s.trim().replace(['\r', '\n'], " ")
}

fn format_runtime(total_ms: i64) -> String {
    let secs = total_ms / 1000;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
