//! Chapter-source resolution: decide per file whether a recording is an
//! album (chapters) or a single track (none).
//!
//! Sidecar discovery always wins. The MusicBrainz fallback only fires for
//! recordings long enough to plausibly be albums, and nothing it finds is
//! used without the operator's say-so.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use super::chapters::{self, Chapter};
use super::metadata::extract_metadata;
use super::musicbrainz;
use super::pipeline::probe;
use super::review::{self, ChapterDecision};

/// Recordings shorter than this are never worth a release lookup.
pub const MIN_ALBUM_DURATION_SECS: f64 = 8.0 * 60.0;

/// What the duration gate decided for a file with no markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    SingleTrack,
    AlbumCandidate,
}

/// Pure gate: unknown duration or a short file is a single track.
pub fn classify_unmarked(duration_secs: Option<f64>) -> Classification {
    match duration_secs {
        Some(duration) if duration >= MIN_ALBUM_DURATION_SECS => Classification::AlbumCandidate,
        _ => Classification::SingleTrack,
    }
}

/// Apply an operator decision to a lookup candidate. `Edit` maps to the
/// edited list supplied by the edit capability; `Reject` drops it.
pub fn apply_decision(
    candidate: Vec<Chapter>,
    decision: ChapterDecision,
    edit: impl FnOnce(&[Chapter]) -> Result<Vec<Chapter>>,
) -> Result<Option<Vec<Chapter>>> {
    match decision {
        ChapterDecision::Accept => Ok(Some(candidate)),
        ChapterDecision::Edit => Ok(Some(edit(&candidate)?)),
        ChapterDecision::Reject => Ok(None),
    }
}

/// Resolve the chapter list for `audio`.
///
/// `prompt` is the injected operator-decision capability; production passes
/// `review::prompt_chapter_decision` behind a closure, tests pass a stub.
/// Returns an empty vec for "single track".
pub fn resolve_chapters<P>(audio: &Path, allow_lookup: bool, prompt: P) -> Result<Vec<Chapter>>
where
    P: FnOnce(&[Chapter], &str) -> ChapterDecision,
{
    let found = chapters::find_chapters(audio);
    if !found.is_empty() || !allow_lookup {
        return Ok(found);
    }

    let duration = probe::duration_secs(audio);
    if classify_unmarked(duration) == Classification::SingleTrack {
        return Ok(Vec::new());
    }
    let minutes = duration.unwrap_or(0.0) as u64 / 60;

    let meta = extract_metadata(audio);
    let name = audio
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    println!("\n  No chapters: {name} ({minutes}m, looks like an album)");
    println!(
        "  Querying MusicBrainz for {:?} / {:?}...",
        meta.artist, meta.album
    );

    let Some((candidate, release_title)) =
        musicbrainz::lookup_chapters(&meta.artist, &meta.album, &meta.year)
    else {
        println!("  MusicBrainz: no match found.");
        return Ok(Vec::new());
    };

    println!(
        "  MusicBrainz found: {} — {} tracks",
        release_title,
        candidate.len()
    );
    review::display_chapter_table(&candidate, &format!("MusicBrainz — {release_title}"));

    let decision = prompt(&candidate, &release_title);
    let accepted = apply_decision(candidate, decision, |chs| review::edit_in_editor(chs))?;
    let Some(accepted) = accepted else {
        println!("  Skipping MusicBrainz chapters.");
        return Ok(Vec::new());
    };

    // Persist next to the source so later runs hit sidecar discovery and
    // never repeat this lookup.
    let sidecar = chapters::sidecar_path(audio, ".chapters.txt");
    fs::write(&sidecar, chapters::serialize_chapters(&accepted))
        .with_context(|| format!("failed to write {}", sidecar.display()))?;
    println!(
        "  Saved: {}",
        sidecar.file_name().and_then(|n| n.to_str()).unwrap_or("")
    );
    Ok(accepted)
}
