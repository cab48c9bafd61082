//! yt-dlp adapter: downloads, playlist enumeration, and recovery of the
//! file-to-ID mapping from templated filenames.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as ProcessCommand;

use anyhow::{Context, Result, bail};

use super::is_audio_file;
use super::process::{run_capture, run_interactive, with_sigint_ignored};
use crate::db::Database;

/// Embeds the source ID in every filename so later runs can map files back
/// to IDs from a directory listing alone.
pub const OUTPUT_TEMPLATE: &str = "%(title)s [%(id)s].%(ext)s";

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-')
}

pub fn is_video_id(raw: &str) -> bool {
    raw.len() == 11 && raw.chars().all(is_id_char)
}

/// 11-character video ID from a watch URL, `None` for playlists and other
/// non-video URLs.
pub fn youtube_id(url: &str) -> Option<String> {
    for marker in ["v=", "youtu.be/", "/v/", "/embed/"] {
        let Some(pos) = url.find(marker) else {
            continue;
        };
        let rest = &url[pos + marker.len()..];
        let id: String = rest.chars().take_while(|c| is_id_char(*c)).take(11).collect();
        if id.len() == 11 {
            return Some(id);
        }
    }
    None
}

pub fn playlist_id(url: &str) -> Option<String> {
    for marker in ["?list=", "&list="] {
        let Some(pos) = url.find(marker) else {
            continue;
        };
        let id: String = url[pos + marker.len()..]
            .chars()
            .take_while(|c| is_id_char(*c))
            .collect();
        if !id.is_empty() {
            return Some(id);
        }
    }
    None
}

/// Recover the video ID from a `Title [ID]` file stem.
pub fn video_id_from_stem(stem: &str) -> Option<String> {
    let chars: Vec<char> = stem.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if *c != '[' || i + 12 >= chars.len() {
            continue;
        }
        let candidate: String = chars[i + 1..i + 12].iter().collect();
        if chars[i + 12] == ']' && candidate.chars().all(is_id_char) {
            return Some(candidate);
        }
    }
    None
}

/// Audio files in `dir` whose templated filename carries `[video_id]`.
pub fn find_by_id(dir: &Path, video_id: &str) -> Vec<PathBuf> {
    let needle = format!("[{video_id}]");
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut found: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && is_audio_file(path)
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.contains(&needle))
        })
        .collect();
    found.sort();
    found
}

pub fn snapshot_dir(dir: &Path) -> BTreeSet<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return BTreeSet::new();
    };
    entries.flatten().map(|entry| entry.path()).collect()
}

/// Files produced by a download. The ID-templated filename is the primary
/// contract; diffing the directory against a pre-download snapshot is the
/// fallback for sources whose IDs we cannot template.
pub fn locate_downloaded(
    dir: &Path,
    video_id: Option<&str>,
    before: &BTreeSet<PathBuf>,
) -> Vec<PathBuf> {
    if let Some(id) = video_id {
        let found = find_by_id(dir, id);
        if !found.is_empty() {
            return found;
        }
    }

    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut new_files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_audio_file(path) && !before.contains(path))
        .collect();
    new_files.sort();
    new_files
}

pub fn run_download(
    url: &str,
    output: &Path,
    no_chapters: bool,
    archive: Option<&Path>,
) -> Result<()> {
    fs::create_dir_all(output)
        .with_context(|| format!("failed to create download directory {}", output.display()))?;

    let mut cmd = ProcessCommand::new("yt-dlp");
    cmd.arg("--format")
        .arg("bestaudio")
        .arg("--extract-audio")
        .arg("--audio-format")
        .arg("flac")
        .arg("--audio-quality")
        .arg("0")
        .arg("--embed-metadata")
        .arg("--add-metadata")
        .arg("--output")
        .arg(OUTPUT_TEMPLATE)
        .current_dir(output);
    if !no_chapters {
        cmd.arg("--write-info-json").arg("--embed-chapters");
    }
    if let Some(archive) = archive {
        cmd.arg("--download-archive").arg(archive);
    }
    cmd.arg(url);

    let status = with_sigint_ignored(|| run_interactive(cmd, "yt-dlp"))?;
    if !status.success() {
        bail!("yt-dlp exited with {status}");
    }
    Ok(())
}

/// Ordered video IDs of a playlist. An empty or failed listing is the one
/// batch-fatal condition, so this returns an error rather than an empty vec.
pub fn list_playlist_ids(url: &str) -> Result<Vec<String>> {
    let mut cmd = ProcessCommand::new("yt-dlp");
    cmd.arg("--flat-playlist").arg("--print").arg("%(id)s").arg(url);

    let output = run_capture(cmd, "yt-dlp")?;
    if !output.status.success() {
        bail!("yt-dlp exited with {} while listing {url}", output.status);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let ids: Vec<String> = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        bail!("could not enumerate any playlist items for {url}");
    }
    Ok(ids)
}

/// Seed the downloader's archive file with every cached video ID so items
/// processed in earlier standalone runs are not fetched again.
pub fn prepopulate_archive(archive: &Path, db: &Database) -> Result<usize> {
    let mut existing = BTreeSet::new();
    if let Ok(raw) = fs::read_to_string(archive) {
        for line in raw.lines() {
            let mut parts = line.split_whitespace();
            let (Some(_site), Some(id)) = (parts.next(), parts.next()) else {
                continue;
            };
            existing.insert(id.to_string());
        }
    }

    let mut appended = String::new();
    let mut count = 0;
    for id in db.download_ids()? {
        if is_video_id(&id) && !existing.contains(&id) {
            appended.push_str(&format!("youtube {id}\n"));
            count += 1;
        }
    }
    if count == 0 {
        return Ok(0);
    }

    if let Some(parent) = archive.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create archive directory {}", parent.display()))?;
    }
    let mut contents = fs::read_to_string(archive).unwrap_or_default();
    contents.push_str(&appended);
    fs::write(archive, contents)
        .with_context(|| format!("failed to update archive file {}", archive.display()))?;
    Ok(count)
}
