use crate::db::library::Track;

/// Splice one jingle after every `every_n` music tracks.
///
/// Jingles are taken from `jingle_pool` in order, wrapping around, so station
/// IDs repeat. Nothing is appended after the final music track.
/// No-op when `every_n` is 0 or there are no jingles.
pub fn interleave(tracks: Vec<Track>, jingle_pool: &[Track], every_n: u32) -> Vec<Track> {
    if every_n < 1 || jingle_pool.is_empty() {
        return tracks;
    }

    let every_n = every_n as usize;
    let total = tracks.len();
    let mut out = Vec::with_capacity(total + total / every_n);
    let mut jingles = jingle_pool.iter().cycle();

    for (i, track) in tracks.into_iter().enumerate() {
        out.push(track);
        let music_so_far = i + 1;
        if music_so_far % every_n == 0 && music_so_far < total {
            if let Some(jingle) = jingles.next() {
                out.push(jingle.clone());
            }
        }
    }
    out
}
