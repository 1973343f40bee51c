mod common;

use std::collections::HashSet;

use common::{
    add_to_category, insert_clock_template, insert_track, open, playlist_row_count, seed_songs,
    SeedTrack,
};
use desizone_playlist_lib::commands::playlist_commands::{
    estimate_pool_size, generate_playlist, preview_playlist, PlaylistRequest,
};
use desizone_playlist_lib::db::library::{build_pool, Filters};
use desizone_playlist_lib::db::playlists::load_playlist;
use desizone_playlist_lib::error::{ErrorKind, GenerationError};
use desizone_playlist_lib::scheduler::rotation::{Algorithm, GenerationOptions};

fn request(name: &str, algorithm: Algorithm, count: u32) -> PlaylistRequest {
    let mut options = GenerationOptions::new(algorithm);
    options.track_count = Some(count);
    options.seed = Some(42);
    PlaylistRequest {
        name: name.to_string(),
        description: None,
        export: false,
        options,
    }
}

#[tokio::test]
async fn empty_pool_fails_without_creating_a_playlist() {
    let db = open().await;
    seed_songs(&db, 5, 5).await;

    let mut req = request("Nothing", Algorithm::WeightedRandom, 10);
    req.options.filters.genre = Some("polka".to_string());

    let err = generate_playlist(&db.state, &req).await.unwrap_err();
    assert!(matches!(err, GenerationError::EmptyPool));
    assert_eq!(err.kind(), ErrorKind::EmptyResult);
    assert_eq!(err.to_string(), "no tracks match filters");
    assert_eq!(playlist_row_count(&db).await, 0);
}

#[tokio::test]
async fn regenerating_a_name_replaces_its_tracks() {
    let db = open().await;
    let mut rock = Vec::new();
    for i in 0..5 {
        rock.push(insert_track(&db, &SeedTrack::song(&format!("Rock {i}"), "R").genre("Rock")).await);
    }
    let mut jazz = Vec::new();
    for i in 0..3 {
        jazz.push(insert_track(&db, &SeedTrack::song(&format!("Jazz {i}"), "J").genre("Jazz")).await);
    }

    let mut req = request("Evening", Algorithm::WeightedRandom, 10);
    req.options.filters.genre = Some("rock".to_string());
    let first = generate_playlist(&db.state, &req).await.unwrap();
    assert_eq!(first.track_count, 5);

    req.options.filters.genre = Some("jazz".to_string());
    let second = generate_playlist(&db.state, &req).await.unwrap();
    assert_eq!(second.track_count, 3);
    assert_eq!(second.playlist_id, first.playlist_id);

    let saved = load_playlist(&db.state.local_db, "Evening").await.unwrap().unwrap();
    assert_eq!(saved.track_count, 3);
    assert_eq!(saved.duration_ms, 3 * 180_000);
    assert_eq!(saved.playlist_type, "weighted_random");
    assert_eq!(saved.entries.len(), 3);
    let saved_ids: HashSet<i64> = saved.entries.iter().map(|e| e.track_id).collect();
    assert_eq!(saved_ids, jazz.into_iter().collect());
    assert_eq!(playlist_row_count(&db).await, 1);
}

#[tokio::test]
async fn jingles_are_saved_at_contiguous_positions() {
    let db = open().await;
    seed_songs(&db, 9, 9).await;
    let j1 = insert_track(&db, &SeedTrack::jingle("ID One")).await;
    let j2 = insert_track(&db, &SeedTrack::jingle("ID Two")).await;

    let mut req = request("With IDs", Algorithm::SmartRotation, 9);
    req.options.rules.jingle_every_n = 3;
    let result = generate_playlist(&db.state, &req).await.unwrap();
    assert_eq!(result.track_count, 11);
    assert_eq!(result.music_count, 9);

    let saved = load_playlist(&db.state.local_db, "With IDs").await.unwrap().unwrap();
    let positions: Vec<i64> = saved.entries.iter().map(|e| e.position).collect();
    assert_eq!(positions, (1..=11).collect::<Vec<i64>>());

    let jingle_ids: HashSet<i64> = [j1, j2].into_iter().collect();
    let jingle_positions: Vec<i64> = saved
        .entries
        .iter()
        .filter(|e| jingle_ids.contains(&e.track_id))
        .map(|e| e.position)
        .collect();
    assert_eq!(jingle_positions, vec![4, 8]);
}

#[tokio::test]
async fn duration_target_uses_pool_average() {
    let db = open().await;
    seed_songs(&db, 40, 10).await;

    let mut req = request("Half Hour", Algorithm::WeightedRandom, 1);
    req.options.track_count = None;
    req.options.duration_minutes = Some(30);
    let result = generate_playlist(&db.state, &req).await.unwrap();
    // 30 min / 3 min per track
    assert_eq!(result.track_count, 10);
    assert_eq!(result.duration_sec, 1800);
}

#[tokio::test]
async fn estimate_matches_pool_size() {
    let db = open().await;
    insert_track(&db, &SeedTrack::song("Plain", "A")).await;
    insert_track(&db, &SeedTrack::song("Gone", "A").missing()).await;
    insert_track(&db, &SeedTrack::song("Ad", "Sponsor").spot()).await;
    insert_track(&db, &SeedTrack::song("No Tempo", "B").bpm(None)).await;
    insert_track(&db, &SeedTrack::song("Fast", "C").bpm(Some(174.0)).genre("Drum & Bass")).await;
    insert_track(&db, &SeedTrack::song("Undated", "D").year(None).rating(5)).await;
    insert_track(&db, &SeedTrack::song("Old", "E").year(Some(1975)).genre("Indie Rock")).await;
    insert_track(&db, &SeedTrack::jingle("Top of hour")).await;

    let cases = vec![
        Filters::default(),
        Filters {
            include_spots: true,
            include_jingles: true,
            ..Filters::default()
        },
        Filters {
            bpm_min: Some(100.0),
            bpm_max: Some(130.0),
            ..Filters::default()
        },
        Filters {
            genre: Some("ROCK".to_string()),
            ..Filters::default()
        },
        Filters {
            year_min: Some(2000),
            ..Filters::default()
        },
        Filters {
            min_rating: Some(4),
            ..Filters::default()
        },
    ];

    for filters in cases {
        let estimate = estimate_pool_size(&db.state, &filters).await.unwrap();
        let pool = build_pool(&db.state.local_db, &filters).await;
        assert_eq!(estimate, pool.len() as i64, "{filters:?}");
    }
}

#[tokio::test]
async fn pool_builder_applies_every_filter() {
    let db = open().await;
    let plain = insert_track(&db, &SeedTrack::song("Plain", "A")).await;
    let missing = insert_track(&db, &SeedTrack::song("Gone", "A").missing()).await;
    let spot = insert_track(&db, &SeedTrack::song("Ad", "Sponsor").spot()).await;
    let no_bpm = insert_track(&db, &SeedTrack::song("No Tempo", "B").bpm(None)).await;
    let fast = insert_track(&db, &SeedTrack::song("Fast", "C").bpm(Some(174.0))).await;
    let undated = insert_track(&db, &SeedTrack::song("Undated", "D").year(None).rating(5)).await;
    let indie = insert_track(&db, &SeedTrack::song("Old", "E").year(Some(1975)).genre("Indie Rock")).await;
    let jingle = insert_track(&db, &SeedTrack::jingle("Top of hour")).await;
    add_to_category(&db, plain, 7).await;
    add_to_category(&db, indie, 7).await;
    add_to_category(&db, fast, 8).await;
    add_to_category(&db, missing, 7).await;

    let ids = |tracks: Vec<desizone_playlist_lib::db::library::Track>| -> Vec<i64> {
        tracks.into_iter().map(|t| t.id).collect()
    };

    let all = ids(build_pool(&db.state.local_db, &Filters::default()).await);
    assert_eq!(all, vec![plain, no_bpm, fast, undated, indie]);

    let with_roles = Filters {
        include_spots: true,
        include_jingles: true,
        ..Filters::default()
    };
    let with_roles = ids(build_pool(&db.state.local_db, &with_roles).await);
    assert!(with_roles.contains(&spot) && with_roles.contains(&jingle));
    assert!(!with_roles.contains(&missing));

    let bpm = Filters {
        bpm_min: Some(100.0),
        bpm_max: Some(130.0),
        ..Filters::default()
    };
    assert_eq!(
        ids(build_pool(&db.state.local_db, &bpm).await),
        vec![plain, no_bpm, undated, indie]
    );

    let genre = Filters {
        genre: Some("rock".to_string()),
        ..Filters::default()
    };
    assert_eq!(ids(build_pool(&db.state.local_db, &genre).await), vec![indie]);

    let years = Filters {
        year_min: Some(1970),
        year_max: Some(1980),
        ..Filters::default()
    };
    assert_eq!(ids(build_pool(&db.state.local_db, &years).await), vec![indie]);

    let rating = Filters {
        min_rating: Some(5),
        ..Filters::default()
    };
    assert_eq!(ids(build_pool(&db.state.local_db, &rating).await), vec![undated]);

    let category = Filters {
        category_ids: vec![7, 8],
        ..Filters::default()
    };
    assert_eq!(
        ids(build_pool(&db.state.local_db, &category).await),
        vec![plain, fast, indie]
    );
}

#[tokio::test]
async fn preview_never_writes() {
    let db = open().await;
    seed_songs(&db, 30, 6).await;
    insert_track(&db, &SeedTrack::jingle("ID")).await;

    let mut options = GenerationOptions::new(Algorithm::HotRotation);
    options.track_count = Some(25);
    options.rules.jingle_every_n = 2;

    let preview = preview_playlist(&db.state, &options, 5).await.unwrap();
    assert_eq!(preview.pool_size, 30);
    assert_eq!(preview.target_count, 25);
    assert_eq!(preview.tracks.len(), 5);
    assert_eq!(preview.estimated_duration_sec, 25 * 180);
    assert!(preview.tracks.iter().all(|t| t.artist != "Station"));
    assert_eq!(playlist_row_count(&db).await, 0);
}

#[tokio::test]
async fn export_failure_keeps_the_saved_playlist() {
    let mut db = open().await;
    seed_songs(&db, 6, 3).await;
    let blocker = db.dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").unwrap();
    db.state.config.export_dir = blocker.to_string_lossy().into_owned();

    let mut req = request("Blocked", Algorithm::GenreBlock, 6);
    req.export = true;
    let result = generate_playlist(&db.state, &req).await.unwrap();

    assert!(result.export_path.is_none());
    assert!(result.export_warning.is_some());
    let saved = load_playlist(&db.state.local_db, "Blocked").await.unwrap().unwrap();
    assert_eq!(saved.entries.len(), 6);
}

#[tokio::test]
async fn export_writes_an_m3u_file() {
    let db = open().await;
    seed_songs(&db, 4, 4).await;

    let mut req = request("Drive Time", Algorithm::EnergyFlow, 4);
    req.export = true;
    let result = generate_playlist(&db.state, &req).await.unwrap();

    let path = result.export_path.expect("export path");
    assert!(path.ends_with(".m3u"));
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("#EXTM3U\n#PLAYLIST:Drive Time\n"));
    assert_eq!(text.matches("#EXTINF:180,").count(), 4);
    assert!(text.contains("# Total runtime: 00:12:00 (4 tracks)"));
}

#[tokio::test]
async fn clock_wheel_reads_templates_from_storage() {
    let db = open().await;
    seed_songs(&db, 10, 10).await;
    let ad = insert_track(&db, &SeedTrack::song("Ad", "Sponsor").spot()).await;
    insert_clock_template(
        &db,
        14,
        None,
        r#"[{"type":"song","count":2},{"type":"spot","count":1},{"type":"song","count":1}]"#,
    )
    .await;

    let mut req = request("Clock", Algorithm::ClockWheel, 20);
    req.options.clock_hours = vec![14];
    req.options.filters.include_spots = true;
    generate_playlist(&db.state, &req).await.unwrap();

    let saved = load_playlist(&db.state.local_db, "Clock").await.unwrap().unwrap();
    assert_eq!(saved.entries.len(), 4);
    assert_eq!(saved.entries[2].track_id, ad);
}

#[tokio::test]
async fn invalid_requests_have_no_side_effects() {
    let db = open().await;
    seed_songs(&db, 5, 5).await;

    let blank = request("   ", Algorithm::WeightedRandom, 3);
    let mut no_length = request("x", Algorithm::WeightedRandom, 3);
    no_length.options.track_count = None;
    let too_many = request("x", Algorithm::WeightedRandom, 5000);
    let mut bad_rating = request("x", Algorithm::WeightedRandom, 3);
    bad_rating.options.filters.min_rating = Some(9);
    let mut bad_hour = request("x", Algorithm::Daypart, 3);
    bad_hour.options.daypart_hour = Some(25);

    for req in [blank, no_length, too_many, bad_rating, bad_hour] {
        let err = generate_playlist(&db.state, &req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input, "{err}");
    }
    assert_eq!(playlist_row_count(&db).await, 0);

    let inverted = Filters {
        year_min: Some(2020),
        year_max: Some(2000),
        ..Filters::default()
    };
    assert!(estimate_pool_size(&db.state, &inverted).await.is_err());
}
