//! Best-effort track metadata: sidecar JSON first, embedded tags second,
//! filename-derived fallbacks last. Never fails.

use std::fs;
use std::path::Path;

use serde_json::Value;

use super::chapters::sidecar_path;
use super::pipeline::probe;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";
pub const UNKNOWN_YEAR: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
}

pub fn extract_metadata(path: &Path) -> TrackMetadata {
    let stem = file_stem_string(path);

    if let Some(meta) = metadata_from_info_json(path, &stem) {
        return meta;
    }
    if let Some(meta) = metadata_from_probe_tags(path, &stem) {
        return meta;
    }

    TrackMetadata {
        title: stem.clone(),
        artist: UNKNOWN_ARTIST.to_string(),
        album: UNKNOWN_ALBUM.to_string(),
        year: UNKNOWN_YEAR.to_string(),
    }
}

fn file_stem_string(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

fn metadata_from_info_json(path: &Path, stem: &str) -> Option<TrackMetadata> {
    let raw = fs::read_to_string(sidecar_path(path, ".info.json")).ok()?;
    let data: Value = serde_json::from_str(&raw).ok()?;
    Some(metadata_from_info_value(&data, stem))
}

/// Derive metadata from a yt-dlp info.json document.
///
/// When the uploader never set a distinct artist tag, the upload title is
/// usually `"Artist - Album (Year)"`; that pattern fills the gaps without
/// overriding anything the sidecar states explicitly.
pub fn metadata_from_info_value(data: &Value, stem: &str) -> TrackMetadata {
    let text_field = |key: &str| {
        data.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let title = text_field("title").unwrap_or_else(|| stem.to_string());
    let uploader = text_field("uploader").unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
    let explicit_album = text_field("album");
    let mut album = explicit_album.clone().unwrap_or_else(|| title.clone());
    let year_raw = text_field("upload_date").or_else(|| text_field("date"));
    let mut year = year_raw
        .map(|raw| raw.chars().take(4).collect::<String>())
        .filter(|y| !y.is_empty())
        .unwrap_or_else(|| UNKNOWN_YEAR.to_string());

    let artist_tag = text_field("artist").filter(|a| a != "null");
    let artist = match artist_tag {
        Some(artist) => artist,
        None => {
            let (parsed_artist, parsed_album, parsed_year) = parse_title_pattern(&title);
            if explicit_album.is_none() && !parsed_album.is_empty() {
                album = parsed_album;
            }
            if !parsed_year.is_empty() && year == UNKNOWN_YEAR {
                year = parsed_year;
            }
            if parsed_artist.is_empty() {
                uploader
            } else {
                parsed_artist
            }
        }
    };

    TrackMetadata {
        title,
        artist,
        album,
        year,
    }
}

fn metadata_from_probe_tags(path: &Path, stem: &str) -> Option<TrackMetadata> {
    let data = probe::probe(path).ok()?;
    let tags = probe::format_tags(&data);
    let year = tags
        .get("date")
        .map(|raw| raw.chars().take(4).collect::<String>())
        .filter(|y| !y.is_empty())
        .unwrap_or_else(|| UNKNOWN_YEAR.to_string());
    Some(TrackMetadata {
        title: tags.get("title").cloned().unwrap_or_else(|| stem.to_string()),
        artist: tags
            .get("artist")
            .cloned()
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
        album: tags
            .get("album")
            .cloned()
            .unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
        year,
    })
}

/// Best-effort parse of an `"Artist - Album (Year)"` title. Any returned
/// part may be empty.
pub fn parse_title_pattern(title: &str) -> (String, String, String) {
    let mut year = String::new();
    let mut rest = title.trim().to_string();
    if let Some((start, _end, parsed)) = find_bracketed_year(&rest) {
        year = parsed;
        rest = rest[..start].trim_end().to_string();
    }

    match rest.split_once(" - ") {
        Some((artist, album)) => (
            artist.trim().to_string(),
            album.trim().to_string(),
            year,
        ),
        None => (String::new(), rest.trim().to_string(), year),
    }
}

/// First `(19xx)`/`[20xx]`-style year in `text`: byte range and digits.
pub(crate) fn find_bracketed_year(text: &str) -> Option<(usize, usize, String)> {
    let bytes = text.as_bytes();
    for i in 0..bytes.len() {
        if bytes[i] != b'(' && bytes[i] != b'[' {
            continue;
        }
        if i + 5 >= bytes.len() {
            break;
        }
        let digits = &bytes[i + 1..i + 5];
        let closer = bytes[i + 5];
        if (closer == b')' || closer == b']')
            && digits.iter().all(u8::is_ascii_digit)
            && (digits.starts_with(b"19") || digits.starts_with(b"20"))
        {
            let year = text[i + 1..i + 5].to_string();
            return Some((i, i + 6, year));
        }
    }
    None
}
