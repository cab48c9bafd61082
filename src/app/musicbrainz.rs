//! MusicBrainz lookup adapter.
//!
//! Fallback chapter source for long recordings with no markers: search the
//! release index, pull the best match's track list, and turn cumulative
//! track lengths into a chapter sequence. Every failure mode here (network,
//! no match, missing lengths) downgrades to "no chapters found".

use serde_json::Value;

use super::chapters::Chapter;
use super::metadata::{UNKNOWN_YEAR, find_bracketed_year};
use crate::http::{RequestPolicy, get_text_with_retries};

const API_ROOT: &str = "https://musicbrainz.org/ws/2";
const USER_AGENT: &str = "tracksmith/0.1 (https://github.com/mreg-tools/tracksmith)";
const SEARCH_LIMIT: &str = "5";

/// Channel-name suffixes that rarely appear in release credits.
const ENSEMBLE_SUFFIXES: &[&str] = &[
    " Project",
    " Band",
    " Trio",
    " Quartet",
    " Orchestra",
    " Ensemble",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseCandidate {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub title: String,
    pub length_ms: Option<u64>,
}

// ── query construction ────────────────────────────────────────────────────

pub fn build_release_query(artist: &str, album: &str, year: Option<&str>) -> String {
    let mut parts = vec![format!("release:\"{}\"", escape_quotes(album))];
    if !artist.is_empty() {
        parts.push(format!("artist:\"{}\"", escape_quotes(artist)));
    }
    if let Some(year) = year
        && year != UNKNOWN_YEAR
        && !year.is_empty()
    {
        parts.push(format!("date:{year}"));
    }
    parts.join(" AND ")
}

fn escape_quotes(raw: &str) -> String {
    raw.replace('"', "\\\"")
}

/// Artist texts to try, broadest last: the name as given, the name with a
/// common ensemble suffix stripped, then empty (album-only search).
pub fn artist_query_variants(artist: &str) -> Vec<String> {
    let mut variants = vec![artist.to_string()];
    for suffix in ENSEMBLE_SUFFIXES {
        if let Some(stripped) = strip_suffix_ignore_ascii_case(artist, suffix) {
            variants.push(stripped.trim().to_string());
        }
    }
    variants.push(String::new());
    variants
}

fn strip_suffix_ignore_ascii_case<'a>(text: &'a str, suffix: &str) -> Option<&'a str> {
    let split = text.len().checked_sub(suffix.len())?;
    if !text.is_char_boundary(split) {
        return None;
    }
    let (head, tail) = text.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}

/// Album text for searching, with any bracketed years removed; upload years
/// in titles rarely match release dates.
pub fn clean_album_for_query(album: &str) -> String {
    let mut out = album.to_string();
    while let Some((start, end, _)) = find_bracketed_year(&out) {
        let head = out[..start].trim_end().to_string();
        out = format!("{}{}", head, &out[end..]);
    }
    out.trim().to_string()
}

// ── response parsing ──────────────────────────────────────────────────────

pub fn parse_release_candidates(value: &Value) -> Vec<ReleaseCandidate> {
    let Some(releases) = value.get("releases").and_then(Value::as_array) else {
        return Vec::new();
    };
    releases
        .iter()
        .filter_map(|release| {
            let id = release.get("id")?.as_str()?.trim();
            let title = release.get("title")?.as_str()?.trim();
            if id.is_empty() || title.is_empty() {
                return None;
            }
            Some(ReleaseCandidate {
                id: id.to_string(),
                title: title.to_string(),
            })
        })
        .collect()
}

pub fn parse_tracklist(value: &Value) -> Vec<TrackInfo> {
    let media = value
        .get("media")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let mut tracks = Vec::new();
    for medium in media {
        let Some(entries) = medium.get("tracks").and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            let recording = entry.get("recording");
            let position = entry
                .get("position")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32;
            let title = entry
                .get("title")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .or_else(|| {
                    recording
                        .and_then(|r| r.get("title"))
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| format!("Track {position}"));
            let length_ms = entry
                .get("length")
                .and_then(Value::as_u64)
                .or_else(|| {
                    recording
                        .and_then(|r| r.get("length"))
                        .and_then(Value::as_u64)
                });
            tracks.push(TrackInfo { title, length_ms });
        }
    }
    tracks
}

/// Cumulative track lengths become chapter boundaries. Any track with no
/// length makes the whole conversion unusable (the offsets after it would
/// be wrong), so the caller falls through to its next query variant.
pub fn tracks_to_chapters(tracks: &[TrackInfo]) -> Vec<Chapter> {
    let mut chapters = Vec::with_capacity(tracks.len());
    let mut position = 0_u32;
    for (idx, track) in tracks.iter().enumerate() {
        let Some(length_ms) = track.length_ms else {
            return Vec::new();
        };
        let length_secs = (length_ms / 1000) as u32;
        let end = position + length_secs;
        chapters.push(Chapter {
            index: (idx + 1) as u32,
            start: position,
            end: Some(end),
            title: track.title.clone(),
        });
        position = end;
    }
    chapters
}

// ── service calls ─────────────────────────────────────────────────────────

fn search_releases(artist: &str, album: &str, year: Option<&str>) -> Option<Vec<ReleaseCandidate>> {
    let query = build_release_query(artist, album, year);
    let params = vec![
        ("query".to_string(), query),
        ("fmt".to_string(), "json".to_string()),
        ("limit".to_string(), SEARCH_LIMIT.to_string()),
    ];
    let raw = get_text_with_retries(
        &format!("{API_ROOT}/release"),
        USER_AGENT,
        &params,
        &RequestPolicy::default(),
    )
    .ok()?;
    let value: Value = serde_json::from_str(&raw).ok()?;
    let candidates = parse_release_candidates(&value);
    if candidates.is_empty() {
        None
    } else {
        Some(candidates)
    }
}

fn fetch_tracklist(release_id: &str) -> Option<Vec<TrackInfo>> {
    let params = vec![
        ("inc".to_string(), "recordings".to_string()),
        ("fmt".to_string(), "json".to_string()),
    ];
    let raw = get_text_with_retries(
        &format!("{API_ROOT}/release/{release_id}"),
        USER_AGENT,
        &params,
        &RequestPolicy::default(),
    )
    .ok()?;
    let value: Value = serde_json::from_str(&raw).ok()?;
    let tracks = parse_tracklist(&value);
    if tracks.is_empty() { None } else { Some(tracks) }
}

/// Search → best match → chapters, trying progressively broader artist
/// variants. Returns the chapters and the matched release title, or `None`
/// when every variant fails.
///
/// The extracted year is deliberately not used as a search filter: for
/// recordings ripped from an upload it is usually the upload year, not the
/// release year, and filtering on it suppresses good matches.
pub fn lookup_chapters(artist: &str, album: &str, _year: &str) -> Option<(Vec<Chapter>, String)> {
    let clean_album = clean_album_for_query(album);
    if clean_album.is_empty() {
        return None;
    }

    for variant in artist_query_variants(artist) {
        let Some(candidates) = search_releases(&variant, &clean_album, None) else {
            continue;
        };
        let Some(best) = candidates.first() else {
            continue;
        };
        let Some(tracks) = fetch_tracklist(&best.id) else {
            continue;
        };
        let chapters = tracks_to_chapters(&tracks);
        if !chapters.is_empty() {
            return Some((chapters, best.title.clone()));
        }
    }
    None
}
