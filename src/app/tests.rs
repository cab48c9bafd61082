use std::fs;

use serde_json::json;

use super::chapters::*;
use super::metadata::*;
use super::musicbrainz::*;
use super::pipeline::download::*;
use super::pipeline::split::*;
use super::resolver::*;
use super::review::{ChapterDecision, resolve_editor_from_env, truncate};
use super::workflow::*;
use crate::db::{Database, ItemRecord, ItemStatus};

fn ch(index: u32, start: u32, end: Option<u32>, title: &str) -> Chapter {
    Chapter {
        index,
        start,
        end,
        title: title.to_string(),
    }
}

// ── chapter parsing ───────────────────────────────────────────────────────

#[test]
fn parse_text_sidecar_derives_end_times() {
    let chapters = parse_chapters_text("0:00 Intro\n3:45 Track Two\n8:10 Track Three\n");
    assert_eq!(
        chapters,
        vec![
            ch(1, 0, Some(225), "Intro"),
            ch(2, 225, Some(490), "Track Two"),
            ch(3, 490, None, "Track Three"),
        ]
    );
}

#[test]
fn parse_text_sidecar_skips_malformed_lines() {
    let raw = "0:00 Intro\nnot a chapter\n12:3 bad seconds field\n\n4:00 Real Track\n";
    let chapters = parse_chapters_text(raw);
    assert_eq!(chapters.len(), 2);
    assert_eq!(chapters[0].title, "Intro");
    assert_eq!(chapters[1].title, "Real Track");
    assert_eq!(chapters[0].end, Some(240));
}

#[test]
fn parse_text_sidecar_requires_a_title() {
    assert!(parse_chapters_text("3:45\n").is_empty());
    assert!(parse_chapters_text("3:45    \n").is_empty());
}

#[test]
fn ts_to_secs_accepts_all_documented_forms() {
    assert_eq!(ts_to_secs("0:00"), Some(0));
    assert_eq!(ts_to_secs("3:45"), Some(225));
    assert_eq!(ts_to_secs("1:02:03"), Some(3723));
    assert_eq!(ts_to_secs("01:02:03"), Some(3723));
    assert_eq!(ts_to_secs("123:45"), Some(7425));
}

#[test]
fn ts_to_secs_rejects_malformed_timestamps() {
    assert_eq!(ts_to_secs("1:2:3"), None);
    assert_eq!(ts_to_secs("1:2"), None);
    assert_eq!(ts_to_secs("85"), None);
    assert_eq!(ts_to_secs("a:bc"), None);
    assert_eq!(ts_to_secs("1:02:03:04"), None);
}

#[test]
fn serialize_then_parse_round_trips() {
    let original = parse_chapters_text("0:00 Intro\n3:45 Track Two\n1:08:10 Finale\n");
    let serialized = serialize_chapters(&original);
    assert_eq!(
        serialized,
        "00:00:00 Intro\n00:03:45 Track Two\n01:08:10 Finale\n"
    );
    assert_eq!(parse_chapters_text(&serialized), original);
}

#[test]
fn parse_json_backfills_missing_ends_and_titles() {
    let raw = json!({
        "chapters": [
            {"start_time": 0.0, "end_time": 60.9, "title": "Intro"},
            {"start_time": 60.9, "title": ""},
            {"start_time": 180.2}
        ]
    })
    .to_string();

    let chapters = parse_chapters_json(&raw);
    assert_eq!(
        chapters,
        vec![
            ch(1, 0, Some(60), "Intro"),
            ch(2, 60, Some(180), "Track 2"),
            ch(3, 180, None, "Track 3"),
        ]
    );
}

#[test]
fn parse_json_without_chapters_is_empty() {
    assert!(parse_chapters_json(r#"{"title":"Some Video"}"#).is_empty());
    assert!(parse_chapters_json(r#"{"chapters":[]}"#).is_empty());
    assert!(parse_chapters_json("not json at all").is_empty());
}

#[test]
fn both_parsers_uphold_the_adjacency_invariant() {
    let from_text = parse_chapters_text("0:00 A\n1:00 B\n2:30 C\n9:59 D\n");
    let from_json = parse_chapters_json(
        &json!({"chapters": [
            {"start_time": 0, "title": "A"},
            {"start_time": 60, "title": "B"},
            {"start_time": 150, "title": "C"},
            {"start_time": 599, "title": "D"}
        ]})
        .to_string(),
    );

    for chapters in [from_text, from_json] {
        assert_eq!(chapters.len(), 4);
        for (idx, chapter) in chapters.iter().enumerate() {
            assert_eq!(chapter.index, (idx + 1) as u32);
        }
        for pair in chapters.windows(2) {
            assert_eq!(pair[0].end, Some(pair[1].start));
        }
        assert_eq!(chapters.last().and_then(|c| c.end), None);
    }
}

#[test]
fn chapter_duration_formats_for_display() {
    assert_eq!(ch(1, 30, Some(255), "x").duration_str(), "00:03:45");
    assert_eq!(ch(1, 30, None, "x").duration_str(), "?");
    assert_eq!(ch(2, 225, Some(490), "x").start_ts(), "00:03:45");
}

// ── discovery ─────────────────────────────────────────────────────────────

#[test]
fn discovery_prefers_nonempty_text_sidecar_over_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let audio = dir.path().join("album [abcdefghijk].flac");
    fs::write(&audio, b"audio").unwrap();
    fs::write(
        dir.path().join("album [abcdefghijk].chapters.txt"),
        "0:00 From Text\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("album [abcdefghijk].info.json"),
        json!({"chapters": [{"start_time": 0, "title": "From Json"}]}).to_string(),
    )
    .unwrap();

    let chapters = find_chapters(&audio);
    assert_eq!(chapters.len(), 1);
    assert_eq!(chapters[0].title, "From Text");
}

#[test]
fn discovery_falls_back_to_json_when_text_sidecar_is_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let audio = dir.path().join("album.flac");
    fs::write(&audio, b"audio").unwrap();
    fs::write(dir.path().join("album.chapters.txt"), "").unwrap();
    fs::write(
        dir.path().join("album.info.json"),
        json!({"chapters": [{"start_time": 0, "title": "From Json"}]}).to_string(),
    )
    .unwrap();

    let chapters = find_chapters(&audio);
    assert_eq!(chapters.len(), 1);
    assert_eq!(chapters[0].title, "From Json");
}

#[test]
fn discovery_returns_empty_without_sidecars() {
    let dir = tempfile::tempdir().expect("tempdir");
    let audio = dir.path().join("bare.flac");
    fs::write(&audio, b"audio").unwrap();
    assert!(find_chapters(&audio).is_empty());
}

#[test]
fn sidecar_path_keeps_the_bracketed_id_in_the_stem() {
    let audio = std::path::Path::new("/music/My Album [abcdefghijk].flac");
    assert_eq!(
        sidecar_path(audio, ".chapters.txt"),
        std::path::Path::new("/music/My Album [abcdefghijk].chapters.txt")
    );
}

// ── slug ──────────────────────────────────────────────────────────────────

#[test]
fn safe_slug_lowercases_and_hyphenates() {
    assert_eq!(safe_slug("My Great Album"), "my-great-album");
    assert_eq!(safe_slug("  Spaced   Out  "), "spaced-out");
}

#[test]
fn safe_slug_strips_illegal_and_non_ascii_characters() {
    assert_eq!(safe_slug("AC/DC: Back?"), "acdc-back");
    assert_eq!(safe_slug("Sigur Rós — Ágætis"), "sigur-rs-gtis");
    assert_eq!(safe_slug("a\u{0001}b"), "ab");
}

#[test]
fn safe_slug_collapses_hyphen_runs_and_defaults_to_unknown() {
    assert_eq!(safe_slug("a -- b"), "a-b");
    assert_eq!(safe_slug("---"), "unknown");
    assert_eq!(safe_slug("????"), "unknown");
    assert_eq!(safe_slug(""), "unknown");
}

// ── metadata ──────────────────────────────────────────────────────────────

#[test]
fn title_pattern_extracts_artist_album_and_year() {
    assert_eq!(
        parse_title_pattern("Miles Davis - Kind of Blue (1959)"),
        (
            "Miles Davis".to_string(),
            "Kind of Blue".to_string(),
            "1959".to_string()
        )
    );
    assert_eq!(
        parse_title_pattern("Aphex Twin - Drukqs [2001]"),
        (
            "Aphex Twin".to_string(),
            "Drukqs".to_string(),
            "2001".to_string()
        )
    );
}

#[test]
fn title_pattern_without_separator_is_album_only() {
    assert_eq!(
        parse_title_pattern("Just An Album Title (2004)"),
        (
            String::new(),
            "Just An Album Title".to_string(),
            "2004".to_string()
        )
    );
    assert_eq!(
        parse_title_pattern("No Year Here"),
        (String::new(), "No Year Here".to_string(), String::new())
    );
}

#[test]
fn title_pattern_ignores_years_outside_the_plausible_range() {
    let (artist, album, year) = parse_title_pattern("Band - Songs (1850)");
    assert_eq!(artist, "Band");
    assert_eq!(album, "Songs (1850)");
    assert_eq!(year, "");
}

#[test]
fn info_metadata_prefers_explicit_tags() {
    let data = json!({
        "title": "Some Upload Title",
        "artist": "Tagged Artist",
        "album": "Tagged Album",
        "uploader": "Channel",
        "upload_date": "20190504"
    });
    let meta = metadata_from_info_value(&data, "stem");
    assert_eq!(meta.title, "Some Upload Title");
    assert_eq!(meta.artist, "Tagged Artist");
    assert_eq!(meta.album, "Tagged Album");
    assert_eq!(meta.year, "2019");
}

#[test]
fn info_metadata_parses_the_title_when_artist_is_missing() {
    let data = json!({
        "title": "Miles Davis - Kind of Blue (1959)",
        "uploader": "Jazz Channel"
    });
    let meta = metadata_from_info_value(&data, "stem");
    assert_eq!(meta.artist, "Miles Davis");
    assert_eq!(meta.album, "Kind of Blue");
    assert_eq!(meta.year, "1959");
}

#[test]
fn info_metadata_keeps_explicit_album_over_parsed_album() {
    let data = json!({
        "title": "Miles Davis - Kind of Blue (1959)",
        "album": "Kind of Blue (Legacy Edition)",
        "uploader": "Jazz Channel"
    });
    let meta = metadata_from_info_value(&data, "stem");
    assert_eq!(meta.artist, "Miles Davis");
    assert_eq!(meta.album, "Kind of Blue (Legacy Edition)");
}

#[test]
fn info_metadata_falls_back_to_uploader_and_unknowns() {
    let data = json!({"title": "Plain Title", "uploader": "Channel Name"});
    let meta = metadata_from_info_value(&data, "stem");
    assert_eq!(meta.artist, "Channel Name");
    assert_eq!(meta.album, "Plain Title");
    assert_eq!(meta.year, UNKNOWN_YEAR);

    let bare = metadata_from_info_value(&json!({}), "file-stem");
    assert_eq!(bare.title, "file-stem");
    assert_eq!(bare.artist, UNKNOWN_ARTIST);
}

#[test]
fn extract_metadata_never_fails_on_a_bare_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let audio = dir.path().join("My Mystery File.flac");
    fs::write(&audio, b"not really audio").unwrap();

    let meta = extract_metadata(&audio);
    assert_eq!(meta.title, "My Mystery File");
    assert_eq!(meta.artist, UNKNOWN_ARTIST);
    assert_eq!(meta.album, UNKNOWN_ALBUM);
    assert_eq!(meta.year, UNKNOWN_YEAR);
}

// ── musicbrainz ───────────────────────────────────────────────────────────

#[test]
fn release_query_includes_only_known_fields() {
    assert_eq!(
        build_release_query("Miles Davis", "Kind of Blue", None),
        r#"release:"Kind of Blue" AND artist:"Miles Davis""#
    );
    assert_eq!(
        build_release_query("", "Kind of Blue", None),
        r#"release:"Kind of Blue""#
    );
    assert_eq!(
        build_release_query("", "Kind of Blue", Some("1959")),
        r#"release:"Kind of Blue" AND date:1959"#
    );
    assert_eq!(
        build_release_query("", "Kind of Blue", Some(UNKNOWN_YEAR)),
        r#"release:"Kind of Blue""#
    );
}

#[test]
fn release_query_escapes_embedded_quotes() {
    assert_eq!(
        build_release_query("", "The \"Best\" Of", None),
        "release:\"The \\\"Best\\\" Of\""
    );
}

#[test]
fn artist_variants_strip_ensemble_suffixes_and_end_album_only() {
    let variants = artist_query_variants("Penguin Cafe Orchestra");
    assert_eq!(
        variants,
        vec![
            "Penguin Cafe Orchestra".to_string(),
            "Penguin Cafe".to_string(),
            String::new(),
        ]
    );

    let plain = artist_query_variants("Nirvana");
    assert_eq!(plain, vec!["Nirvana".to_string(), String::new()]);
}

#[test]
fn album_query_text_drops_bracketed_years() {
    assert_eq!(clean_album_for_query("Kind of Blue (1959)"), "Kind of Blue");
    assert_eq!(
        clean_album_for_query("Live [1992] Remaster (2003)"),
        "Live Remaster"
    );
    assert_eq!(clean_album_for_query("No Year"), "No Year");
}

#[test]
fn release_candidates_parse_in_ranked_order() {
    let value = json!({
        "releases": [
            {"id": "rel-1", "title": "First Match", "score": 100},
            {"id": "rel-2", "title": "Second Match", "score": 80},
            {"id": "", "title": "Dropped"},
        ]
    });
    let candidates = parse_release_candidates(&value);
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].id, "rel-1");
    assert_eq!(candidates[0].title, "First Match");
    assert_eq!(candidates[1].id, "rel-2");
}

#[test]
fn tracklist_parse_reads_media_and_recording_fallbacks() {
    let value = json!({
        "media": [
            {"tracks": [
                {"position": 1, "title": "So What", "length": 545_000},
                {"position": 2, "recording": {"title": "Freddie Freeloader", "length": 589_000}},
            ]},
            {"tracks": [
                {"position": 3, "title": "Flamenco Sketches"},
            ]}
        ]
    });
    let tracks = parse_tracklist(&value);
    assert_eq!(tracks.len(), 3);
    assert_eq!(tracks[0].title, "So What");
    assert_eq!(tracks[0].length_ms, Some(545_000));
    assert_eq!(tracks[1].title, "Freddie Freeloader");
    assert_eq!(tracks[1].length_ms, Some(589_000));
    assert_eq!(tracks[2].length_ms, None);
}

#[test]
fn tracks_convert_to_chapters_by_cumulative_length() {
    let tracks = vec![
        TrackInfo {
            title: "One".to_string(),
            length_ms: Some(90_500),
        },
        TrackInfo {
            title: "Two".to_string(),
            length_ms: Some(120_000),
        },
    ];
    let chapters = tracks_to_chapters(&tracks);
    assert_eq!(
        chapters,
        vec![ch(1, 0, Some(90), "One"), ch(2, 90, Some(210), "Two")]
    );
}

#[test]
fn any_missing_track_length_aborts_the_conversion() {
    let tracks = vec![
        TrackInfo {
            title: "One".to_string(),
            length_ms: Some(90_000),
        },
        TrackInfo {
            title: "Two".to_string(),
            length_ms: None,
        },
    ];
    assert!(tracks_to_chapters(&tracks).is_empty());
}

// ── resolver ──────────────────────────────────────────────────────────────

#[test]
fn short_unmarked_recordings_skip_the_lookup() {
    assert_eq!(classify_unmarked(Some(300.0)), Classification::SingleTrack);
    assert_eq!(classify_unmarked(None), Classification::SingleTrack);
    assert_eq!(classify_unmarked(Some(480.0)), Classification::AlbumCandidate);
    assert_eq!(
        classify_unmarked(Some(3600.0)),
        Classification::AlbumCandidate
    );
}

#[test]
fn decision_accept_keeps_the_candidate_unchanged() {
    let candidate = vec![ch(1, 0, Some(60), "A"), ch(2, 60, None, "B")];
    let result = apply_decision(candidate.clone(), ChapterDecision::Accept, |_| {
        panic!("edit capability must not run on accept")
    })
    .expect("accept never fails");
    assert_eq!(result, Some(candidate));
}

#[test]
fn decision_edit_routes_through_the_edit_capability() {
    let candidate = vec![ch(1, 0, None, "Original")];
    let result = apply_decision(candidate, ChapterDecision::Edit, |chs| {
        assert_eq!(chs.len(), 1);
        Ok(vec![ch(1, 0, None, "Edited")])
    })
    .expect("edit closure succeeds");
    assert_eq!(result, Some(vec![ch(1, 0, None, "Edited")]));
}

#[test]
fn decision_reject_discards_the_candidate() {
    let candidate = vec![ch(1, 0, None, "A")];
    let result = apply_decision(candidate, ChapterDecision::Reject, |_| {
        panic!("edit capability must not run on reject")
    })
    .expect("reject never fails");
    assert_eq!(result, None);
}

#[test]
fn resolver_prefers_existing_sidecars_over_lookup() {
    let dir = tempfile::tempdir().expect("tempdir");
    let audio = dir.path().join("album.flac");
    fs::write(&audio, b"audio").unwrap();
    fs::write(dir.path().join("album.chapters.txt"), "0:00 Marked\n").unwrap();

    let chapters = resolve_chapters(&audio, true, |_, _| {
        panic!("prompt must not fire when discovery succeeds")
    })
    .expect("resolve succeeds");
    assert_eq!(chapters.len(), 1);
    assert_eq!(chapters[0].title, "Marked");
}

#[test]
fn resolver_with_lookup_disabled_only_discovers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let audio = dir.path().join("bare.flac");
    fs::write(&audio, b"audio").unwrap();

    let chapters = resolve_chapters(&audio, false, |_, _| {
        panic!("prompt must not fire with lookup disabled")
    })
    .expect("resolve succeeds");
    assert!(chapters.is_empty());
}

// ── workflow planning ─────────────────────────────────────────────────────

fn record(status: ItemStatus, audio_file: Option<&str>, split_dir: Option<&str>) -> ItemRecord {
    ItemRecord {
        video_id: "abcdefghijk".to_string(),
        status,
        audio_file: audio_file.map(str::to_string),
        split_dir: split_dir.map(str::to_string),
        updated_at: "2026-08-01T00:00:00+00:00".to_string(),
    }
}

#[test]
fn untracked_items_are_fetched() {
    assert_eq!(plan_item(None, |_| true, |_| true), ItemPlan::Fetch);
}

#[test]
fn organized_items_are_always_skipped() {
    // Terminal even when every recorded artifact has vanished.
    let rec = record(ItemStatus::Organized, Some("/gone.flac"), Some("/gone"));
    assert_eq!(plan_item(Some(&rec), |_| false, |_| false), ItemPlan::Skip);
}

#[test]
fn split_items_with_an_existing_dir_go_straight_to_the_tagger() {
    let rec = record(ItemStatus::Split, Some("/a.flac"), Some("/splits/a"));
    assert_eq!(
        plan_item(Some(&rec), |_| false, |d| d == "/splits/a"),
        ItemPlan::OrganizeSplitDir("/splits/a".into())
    );
}

#[test]
fn split_items_with_a_missing_dir_rederive_from_audio() {
    let rec = record(ItemStatus::Split, Some("/a.flac"), Some("/splits/a"));
    assert_eq!(
        plan_item(Some(&rec), |f| f == "/a.flac", |_| false),
        ItemPlan::ResumeFromAudio("/a.flac".into())
    );
}

#[test]
fn downloaded_items_with_missing_audio_are_rederived() {
    let rec = record(ItemStatus::Downloaded, Some("/deleted.flac"), None);
    assert_eq!(plan_item(Some(&rec), |_| false, |_| false), ItemPlan::Fetch);
}

#[test]
fn downloaded_items_with_audio_resume_at_classification() {
    let rec = record(ItemStatus::Downloaded, Some("/a.flac"), None);
    assert_eq!(
        plan_item(Some(&rec), |f| f == "/a.flac", |_| false),
        ItemPlan::ResumeFromAudio("/a.flac".into())
    );
}

#[test]
fn backfill_reconstructs_progress_from_leftover_artifacts() {
    assert_eq!(backfill_status(true, false), None);
    assert_eq!(backfill_status(true, true), None);
    assert_eq!(backfill_status(false, true), Some(ItemStatus::Split));
    assert_eq!(backfill_status(false, false), Some(ItemStatus::Organized));
}

#[test]
fn split_dir_is_named_after_the_audio_stem() {
    let dir = expected_split_dir(
        std::path::Path::new("/splits"),
        "/downloads/My Album [abcdefghijk].flac",
    );
    assert_eq!(dir, std::path::Path::new("/splits/My Album [abcdefghijk]"));
}

// ── batch state persistence ───────────────────────────────────────────────

fn test_db() -> Database {
    let db = Database::open_in_memory().expect("open in-memory db");
    db.migrate().expect("migrate");
    db
}

#[test]
fn item_status_never_regresses_across_writes() {
    let db = test_db();
    db.advance_item("pl", "abcdefghijk", ItemStatus::Organized, None, None)
        .unwrap();
    db.advance_item(
        "pl",
        "abcdefghijk",
        ItemStatus::Downloaded,
        Some("/fresh.flac"),
        None,
    )
    .unwrap();

    let rec = db.batch_item("pl", "abcdefghijk").unwrap().expect("record");
    assert_eq!(rec.status, ItemStatus::Organized);
    // The artifact refresh itself is allowed.
    assert_eq!(rec.audio_file.as_deref(), Some("/fresh.flac"));
}

#[test]
fn advancing_preserves_artifacts_from_earlier_phases() {
    let db = test_db();
    db.advance_item(
        "pl",
        "abcdefghijk",
        ItemStatus::Downloaded,
        Some("/a.flac"),
        None,
    )
    .unwrap();
    db.advance_item("pl", "abcdefghijk", ItemStatus::Split, None, Some("/splits/a"))
        .unwrap();
    db.advance_item("pl", "abcdefghijk", ItemStatus::Organized, None, None)
        .unwrap();

    let rec = db.batch_item("pl", "abcdefghijk").unwrap().expect("record");
    assert_eq!(rec.status, ItemStatus::Organized);
    assert_eq!(rec.audio_file.as_deref(), Some("/a.flac"));
    assert_eq!(rec.split_dir.as_deref(), Some("/splits/a"));
}

#[test]
fn absent_items_mean_not_started() {
    let db = test_db();
    assert!(db.batch_item("pl", "neverseen123").unwrap().is_none());
}

#[test]
fn corrupt_status_rows_read_as_absent() {
    let db = test_db();
    db.execute_raw(
        "INSERT INTO batch_items (playlist_id, video_id, status, updated_at)
         VALUES ('pl', 'abcdefghijk', 'half-split', '2026-08-01T00:00:00+00:00')",
    )
    .unwrap();

    assert!(db.batch_item("pl", "abcdefghijk").unwrap().is_none());
    assert!(db.list_batch_items().unwrap().is_empty());

    // A fresh write replaces the garbage row.
    db.advance_item(
        "pl",
        "abcdefghijk",
        ItemStatus::Downloaded,
        Some("/a.flac"),
        None,
    )
    .unwrap();
    let rec = db.batch_item("pl", "abcdefghijk").unwrap().expect("record");
    assert_eq!(rec.status, ItemStatus::Downloaded);
}

#[test]
fn resumption_skips_download_and_split_for_split_items() {
    let dir = tempfile::tempdir().expect("tempdir");
    let split_dir = dir.path().join("splits/a");
    fs::create_dir_all(&split_dir).unwrap();

    let db = test_db();
    db.advance_item(
        "pl",
        "abcdefghijk",
        ItemStatus::Split,
        Some("/gone.flac"),
        Some(split_dir.to_str().unwrap()),
    )
    .unwrap();

    let rec = db.batch_item("pl", "abcdefghijk").unwrap().expect("record");
    let plan = plan_item(
        Some(&rec),
        |p| std::path::Path::new(p).is_file(),
        |p| std::path::Path::new(p).is_dir(),
    );
    assert_eq!(plan, ItemPlan::OrganizeSplitDir(split_dir));
}

#[test]
fn download_cache_round_trips_and_ignores_empty_paths() {
    let db = test_db();
    db.download_set("abcdefghijk", "/music/a.flac").unwrap();
    assert_eq!(
        db.download_get("abcdefghijk").unwrap().as_deref(),
        Some("/music/a.flac")
    );

    db.download_set("abcdefghijk", "/music/b.flac").unwrap();
    assert_eq!(
        db.download_get("abcdefghijk").unwrap().as_deref(),
        Some("/music/b.flac")
    );

    db.download_set("emptyemptye", "").unwrap();
    assert!(db.download_get("emptyemptye").unwrap().is_none());
    assert!(db.download_get("missingmiss").unwrap().is_none());
}

#[test]
fn cache_clean_removes_only_aged_records() {
    let db = test_db();
    db.download_set("abcdefghijk", "/music/a.flac").unwrap();
    db.split_set("split_aa_bb", "/splits/a").unwrap();

    assert_eq!(db.clean_older_than(30).unwrap(), 0);
    // A negative age puts the cutoff in the future, sweeping everything.
    assert_eq!(db.clean_older_than(-1).unwrap(), 2);
    assert!(db.download_get("abcdefghijk").unwrap().is_none());
}

#[test]
fn forget_drops_download_and_batch_records_for_one_id() {
    let db = test_db();
    db.download_set("abcdefghijk", "/music/a.flac").unwrap();
    db.advance_item("pl", "abcdefghijk", ItemStatus::Organized, None, None)
        .unwrap();

    assert_eq!(db.forget_video("abcdefghijk").unwrap(), 2);
    assert!(db.download_get("abcdefghijk").unwrap().is_none());
    assert!(db.batch_item("pl", "abcdefghijk").unwrap().is_none());
}

// ── splitter ──────────────────────────────────────────────────────────────

#[test]
fn default_jobs_stays_in_the_documented_band() {
    let jobs = default_jobs();
    assert!((2..=8).contains(&jobs), "unexpected job count: {jobs}");
}

#[test]
fn fingerprint_tracks_both_audio_and_chapter_bytes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let audio = dir.path().join("a.flac");
    let sidecar = dir.path().join("a.chapters.txt");
    fs::write(&audio, b"audio-bytes").unwrap();
    fs::write(&sidecar, "0:00 Intro\n").unwrap();

    let original = split_fingerprint(&audio, &sidecar).unwrap();
    assert!(original.starts_with("split_"));
    assert_eq!(split_fingerprint(&audio, &sidecar).unwrap(), original);

    fs::write(&sidecar, "0:00 Intro\n3:45 More\n").unwrap();
    let after_chapter_edit = split_fingerprint(&audio, &sidecar).unwrap();
    assert_ne!(after_chapter_edit, original);

    fs::write(&audio, b"different-audio").unwrap();
    assert_ne!(
        split_fingerprint(&audio, &sidecar).unwrap(),
        after_chapter_edit
    );
}

#[test]
fn cached_split_short_circuits_without_invoking_ffmpeg() {
    let dir = tempfile::tempdir().expect("tempdir");
    let audio = dir.path().join("album [abcdefghijk].flac");
    let sidecar = dir.path().join("album [abcdefghijk].chapters.txt");
    fs::write(&audio, b"audio-bytes").unwrap();
    fs::write(&sidecar, "0:00 Intro\n3:45 Two\n").unwrap();
    let out_dir = dir.path().join("out");
    fs::create_dir(&out_dir).unwrap();

    let db = test_db();
    let fingerprint = split_fingerprint(&audio, &sidecar).unwrap();
    db.split_set(&fingerprint, out_dir.to_str().unwrap()).unwrap();

    let chapters = parse_chapters_text("0:00 Intro\n3:45 Two\n");
    let meta = TrackMetadata {
        title: "Album".to_string(),
        artist: "Artist".to_string(),
        album: "Album".to_string(),
        year: "1999".to_string(),
    };
    // Would fail loudly if it tried to spawn the extractor; the cache hit
    // returns before any job is dispatched.
    let failed = split_file(
        &db,
        &SplitRequest {
            audio: &audio,
            chapters: &chapters,
            output_dir: &out_dir,
            metadata: &meta,
            jobs: 2,
            keep_source: false,
        },
    )
    .expect("cache hit");
    assert!(failed.is_empty());
    // A cache hit must leave sources alone.
    assert!(audio.is_file());
    assert!(sidecar.is_file());
}

#[test]
fn chapter_output_names_are_numbered_slugs() {
    let path = chapter_output_path(
        std::path::Path::new("/out"),
        &ch(3, 0, None, "So What (Take 2)"),
    );
    assert_eq!(path, std::path::Path::new("/out/03-so-what-(take-2).flac"));
}

// ── downloader helpers ────────────────────────────────────────────────────

#[test]
fn youtube_id_parses_common_url_shapes() {
    assert_eq!(
        youtube_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
        Some("dQw4w9WgXcQ".to_string())
    );
    assert_eq!(
        youtube_id("https://youtu.be/dQw4w9WgXcQ?t=10"),
        Some("dQw4w9WgXcQ".to_string())
    );
    assert_eq!(
        youtube_id("https://www.youtube.com/embed/dQw4w9WgXcQ"),
        Some("dQw4w9WgXcQ".to_string())
    );
    assert_eq!(youtube_id("https://www.youtube.com/playlist?list=PLabc"), None);
    assert_eq!(youtube_id("https://www.youtube.com/watch?v=tooshort"), None);
}

#[test]
fn playlist_id_reads_the_list_parameter() {
    assert_eq!(
        playlist_id("https://www.youtube.com/playlist?list=PLabc123_-"),
        Some("PLabc123_-".to_string())
    );
    assert_eq!(
        playlist_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLxyz"),
        Some("PLxyz".to_string())
    );
    assert_eq!(
        playlist_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
        None
    );
}

#[test]
fn video_id_recovers_from_templated_stems() {
    assert_eq!(
        video_id_from_stem("My Album [dQw4w9WgXcQ]"),
        Some("dQw4w9WgXcQ".to_string())
    );
    assert_eq!(
        video_id_from_stem("Weird [brackets] Name [dQw4w9WgXcQ]"),
        Some("dQw4w9WgXcQ".to_string())
    );
    assert_eq!(video_id_from_stem("No id here"), None);
    assert_eq!(video_id_from_stem("Short [abc]"), None);
}

#[test]
fn find_by_id_filters_on_extension_and_bracketed_id() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("Album [dQw4w9WgXcQ].flac"), b"x").unwrap();
    fs::write(dir.path().join("Album [dQw4w9WgXcQ].info.json"), b"{}").unwrap();
    fs::write(dir.path().join("Other [otherotherr].flac"), b"x").unwrap();

    let found = find_by_id(dir.path(), "dQw4w9WgXcQ");
    assert_eq!(found.len(), 1);
    assert!(found[0].ends_with("Album [dQw4w9WgXcQ].flac"));
}

#[test]
fn locate_downloaded_prefers_id_match_then_directory_diff() {
    let dir = tempfile::tempdir().expect("tempdir");
    let old = dir.path().join("Old [aaaaaaaaaaa].flac");
    fs::write(&old, b"x").unwrap();
    let before = snapshot_dir(dir.path());

    let fresh = dir.path().join("Fresh [dQw4w9WgXcQ].flac");
    fs::write(&fresh, b"x").unwrap();

    let by_id = locate_downloaded(dir.path(), Some("dQw4w9WgXcQ"), &before);
    assert_eq!(by_id, vec![fresh.clone()]);

    // No usable ID: the diff against the snapshot still finds the new file.
    let by_diff = locate_downloaded(dir.path(), None, &before);
    assert_eq!(by_diff, vec![fresh]);
}

#[test]
fn archive_seeding_appends_only_new_valid_ids() {
    let dir = tempfile::tempdir().expect("tempdir");
    let archive = dir.path().join("archive.txt");
    fs::write(&archive, "youtube dQw4w9WgXcQ\n").unwrap();

    let db = test_db();
    db.download_set("dQw4w9WgXcQ", "/a.flac").unwrap();
    db.download_set("newnewnewne", "/b.flac").unwrap();
    db.download_set("not-valid", "/c.flac").unwrap();

    let appended = prepopulate_archive(&archive, &db).unwrap();
    assert_eq!(appended, 1);
    let contents = fs::read_to_string(&archive).unwrap();
    assert_eq!(contents, "youtube dQw4w9WgXcQ\nyoutube newnewnewne\n");

    // Idempotent on the second run.
    assert_eq!(prepopulate_archive(&archive, &db).unwrap(), 0);
}

// ── review helpers ────────────────────────────────────────────────────────

#[test]
fn editor_resolution_prefers_editor_then_visual_then_vi() {
    assert_eq!(
        resolve_editor_from_env(Some("nano".into()), Some("code".into())),
        "nano"
    );
    assert_eq!(
        resolve_editor_from_env(None, Some("code --wait".into())),
        "code --wait"
    );
    assert_eq!(resolve_editor_from_env(Some("  ".into()), None), "vi");
    assert_eq!(resolve_editor_from_env(None, None), "vi");
}

#[test]
fn truncate_appends_ellipsis_only_when_needed() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a very long title indeed", 10), "a very ...");
}
