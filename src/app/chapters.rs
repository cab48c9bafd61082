//! Chapter model, sidecar parsers, and discovery.
//!
//! Two sidecar formats are understood: `<stem>.chapters.txt` (one
//! `TIMESTAMP Title` line per chapter) and yt-dlp's `<stem>.info.json`
//! (a `chapters` array). End times are always derived from the next
//! chapter's start; the last chapter runs to end-of-file.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// 1-based track number, contiguous within one recording.
    pub index: u32,
    /// Offset from the start of the parent file, in whole seconds.
    pub start: u32,
    /// Derived from the next chapter's start; `None` for the last chapter.
    pub end: Option<u32>,
    pub title: String,
}

impl Chapter {
    pub fn start_ts(&self) -> String {
        secs_to_ts(self.start)
    }

    pub fn end_ts(&self) -> Option<String> {
        self.end.map(secs_to_ts)
    }

    pub fn duration(&self) -> Option<u32> {
        self.end.map(|end| end.saturating_sub(self.start))
    }

    pub fn duration_str(&self) -> String {
        match self.duration() {
            Some(secs) => secs_to_ts(secs),
            None => "?".to_string(),
        }
    }
}

// ── timestamps ────────────────────────────────────────────────────────────

/// Parse `H:MM:SS`, `HH:MM:SS`, or `MM:SS`. The leading field may have any
/// number of digits; the remaining fields must be exactly two.
pub fn ts_to_secs(ts: &str) -> Option<u32> {
    let parts: Vec<&str> = ts.trim().split(':').collect();

    let leading = |raw: &str| -> Option<u32> {
        (!raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()))
            .then(|| raw.parse::<u32>().ok())
            .flatten()
    };
    let two_digit = |raw: &str| -> Option<u32> {
        (raw.len() == 2 && raw.bytes().all(|b| b.is_ascii_digit()))
            .then(|| raw.parse::<u32>().ok())
            .flatten()
    };

    match parts.as_slice() {
        &[h, m, s] => Some(leading(h)? * 3600 + two_digit(m)? * 60 + two_digit(s)?),
        &[m, s] => Some(leading(m)? * 60 + two_digit(s)?),
        _ => None,
    }
}

pub fn secs_to_ts(secs: u32) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

// ── parsers ───────────────────────────────────────────────────────────────

pub fn parse_chapter_line(line: &str) -> Option<(u32, String)> {
    let trimmed = line.trim();
    let (ts, title) = trimmed.split_once(|c: char| c.is_whitespace())?;
    let start = ts_to_secs(ts)?;
    let title = title.trim();
    if title.is_empty() {
        return None;
    }
    Some((start, title.to_string()))
}

/// Lines that do not match `TIMESTAMP Title` are skipped, never fatal.
pub fn parse_chapters_text(raw: &str) -> Vec<Chapter> {
    let starts: Vec<(u32, String)> = raw.lines().filter_map(parse_chapter_line).collect();
    chapters_from_starts(starts)
}

fn chapters_from_starts(starts: Vec<(u32, String)>) -> Vec<Chapter> {
    let next_starts: Vec<Option<u32>> = starts
        .iter()
        .skip(1)
        .map(|(start, _)| Some(*start))
        .chain(std::iter::once(None))
        .collect();

    starts
        .into_iter()
        .zip(next_starts)
        .enumerate()
        .map(|(idx, ((start, title), end))| Chapter {
            index: (idx + 1) as u32,
            start,
            end,
            title,
        })
        .collect()
}

/// Parse the `chapters` array of a yt-dlp info.json document. Returns an
/// empty list when the document has no usable chapters.
pub fn parse_chapters_json(raw: &str) -> Vec<Chapter> {
    let Ok(data) = serde_json::from_str::<Value>(raw) else {
        return Vec::new();
    };
    let Some(entries) = data.get("chapters").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut chapters: Vec<Chapter> = entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let start = entry
                .get("start_time")
                .and_then(Value::as_f64)
                .unwrap_or(0.0) as u32;
            let end = entry.get("end_time").and_then(Value::as_f64).map(|t| t as u32);
            let title = entry
                .get("title")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Track {}", idx + 1));
            Chapter {
                index: (idx + 1) as u32,
                start,
                end,
                title,
            }
        })
        .collect();

    // Backfill missing end times from the next chapter's start.
    for i in 0..chapters.len().saturating_sub(1) {
        if chapters[i].end.is_none() {
            chapters[i].end = Some(chapters[i + 1].start);
        }
    }
    chapters
}

// ── discovery ─────────────────────────────────────────────────────────────

/// One typed place chapters may live, tried in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterSidecar {
    Text(PathBuf),
    InfoJson(PathBuf),
}

impl ChapterSidecar {
    /// `Some(chapters)` when this source claims the file (a non-empty text
    /// sidecar claims it even when no line parses), `None` to fall through.
    pub fn load(&self) -> Option<Vec<Chapter>> {
        match self {
            ChapterSidecar::Text(path) => {
                let has_content = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
                if !has_content {
                    return None;
                }
                let raw = fs::read_to_string(path).ok()?;
                Some(parse_chapters_text(&raw))
            }
            ChapterSidecar::InfoJson(path) => {
                let raw = fs::read_to_string(path).ok()?;
                let chapters = parse_chapters_json(&raw);
                if chapters.is_empty() { None } else { Some(chapters) }
            }
        }
    }
}

/// Sidecar file next to `audio`, named `<stem><suffix>`.
pub fn sidecar_path(audio: &Path, suffix: &str) -> PathBuf {
    let stem = audio
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    audio.with_file_name(format!("{stem}{suffix}"))
}

pub fn sidecar_candidates(audio: &Path) -> Vec<ChapterSidecar> {
    vec![
        ChapterSidecar::Text(sidecar_path(audio, ".chapters.txt")),
        ChapterSidecar::InfoJson(sidecar_path(audio, ".info.json")),
    ]
}

pub fn find_chapters(audio: &Path) -> Vec<Chapter> {
    for source in sidecar_candidates(audio) {
        if let Some(chapters) = source.load() {
            return chapters;
        }
    }
    Vec::new()
}

// ── serialization ─────────────────────────────────────────────────────────

/// Emit the text-sidecar form, one `HH:MM:SS Title` line per chapter.
/// Round-trips through `parse_chapters_text`.
pub fn serialize_chapters(chapters: &[Chapter]) -> String {
    let mut out = String::new();
    for ch in chapters {
        out.push_str(&ch.start_ts());
        out.push(' ');
        out.push_str(&ch.title);
        out.push('\n');
    }
    out
}

// ── filename helper ───────────────────────────────────────────────────────

const ILLEGAL_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// ASCII, lowercase, hyphen-separated slug safe for filenames.
pub fn safe_slug(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|ch| ch.is_ascii() && !ch.is_ascii_control() && !ILLEGAL_FILENAME_CHARS.contains(ch))
        .map(|ch| ch.to_ascii_lowercase())
        .collect();

    let mut slug = String::with_capacity(kept.len());
    for part in kept.split_whitespace() {
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(part);
    }

    let mut collapsed = String::with_capacity(slug.len());
    for ch in slug.chars() {
        if ch == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(ch);
    }

    let trimmed = collapsed.trim_matches('-');
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}
