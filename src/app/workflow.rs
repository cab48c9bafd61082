//! The full pipeline: download → classify → split → organize, with durable
//! per-item progress so an interrupted batch resumes where it stopped.
//!
//! Items are processed strictly in input order, one at a time, so operator
//! decisions never interleave. A failure inside one item is logged and the
//! loop moves on; the only batch-fatal condition is failing to enumerate
//! the playlist at all.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use super::chapters::Chapter;
use super::metadata;
use super::pipeline::download;
use super::pipeline::organize::{self, OrganizeOptions};
use super::pipeline::split::{self, SplitRequest};
use super::resolver;
use super::review;
use crate::db::{Database, ItemRecord, ItemStatus};
use crate::paths;

pub struct WorkflowOptions {
    pub output: PathBuf,
    pub splits: PathBuf,
    pub review: bool,
    pub no_split: bool,
    pub no_organize: bool,
    pub import: bool,
    pub tag_only: bool,
    pub dry_run: bool,
    pub jobs: usize,
    pub keep_source: bool,
    pub config: Option<PathBuf>,
}

impl WorkflowOptions {
    fn organize_options(&self) -> OrganizeOptions {
        OrganizeOptions {
            import: self.import,
            tag_only: self.tag_only,
            dry_run: self.dry_run,
            config: self.config.clone(),
        }
    }
}

pub fn run_workflow(db: &Database, url: &str, opts: &WorkflowOptions) -> Result<()> {
    println!("Workflow: {url}");
    match download::playlist_id(url) {
        Some(playlist_id) => run_playlist_workflow(db, url, &playlist_id, opts),
        None => run_single_workflow(db, url, opts),
    }
}

// ── planning ──────────────────────────────────────────────────────────────

/// What to do for one item, given its persisted record and whether the
/// recorded artifacts still exist. Existence checks are injected so the
/// transition table is testable without a filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemPlan {
    /// Terminal: organized items are never touched again.
    Skip,
    /// Split already done; only the tagger step remains.
    OrganizeSplitDir(PathBuf),
    /// Audio on disk; resume at classification.
    ResumeFromAudio(PathBuf),
    /// Nothing usable on disk; derive the audio again.
    Fetch,
}

pub fn plan_item<FA, FD>(record: Option<&ItemRecord>, file_exists: FA, dir_exists: FD) -> ItemPlan
where
    FA: Fn(&str) -> bool,
    FD: Fn(&str) -> bool,
{
    let Some(record) = record else {
        return ItemPlan::Fetch;
    };
    match record.status {
        ItemStatus::Organized => ItemPlan::Skip,
        ItemStatus::Split => {
            if let Some(dir) = &record.split_dir
                && dir_exists(dir)
            {
                return ItemPlan::OrganizeSplitDir(PathBuf::from(dir));
            }
            // The recorded split dir is gone: re-derive from the audio.
            // The recorded status itself is never regressed.
            match &record.audio_file {
                Some(file) if file_exists(file) => ItemPlan::ResumeFromAudio(PathBuf::from(file)),
                _ => ItemPlan::Fetch,
            }
        }
        ItemStatus::Downloaded => match &record.audio_file {
            Some(file) if file_exists(file) => ItemPlan::ResumeFromAudio(PathBuf::from(file)),
            _ => ItemPlan::Fetch,
        },
    }
}

/// Progress to assume for an item that has a download-cache entry but no
/// batch record (processed by an earlier standalone run). `None` means the
/// audio is still on disk and the normal resume path handles it.
pub fn backfill_status(audio_exists: bool, split_dir_exists: bool) -> Option<ItemStatus> {
    if audio_exists {
        return None;
    }
    // Source deleted: splitting removes sources on success, so an existing
    // split dir means "split"; no split dir means the file went straight
    // through the tagger.
    Some(if split_dir_exists {
        ItemStatus::Split
    } else {
        ItemStatus::Organized
    })
}

pub fn expected_split_dir(splits: &Path, audio_file: &str) -> PathBuf {
    let stem = Path::new(audio_file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    splits.join(stem)
}

// ── playlist flow ─────────────────────────────────────────────────────────

fn run_playlist_workflow(
    db: &Database,
    url: &str,
    playlist_id: &str,
    opts: &WorkflowOptions,
) -> Result<()> {
    println!("  Playlist ID: {playlist_id}");

    let archive = paths::archive_file_path(playlist_id)?;
    let seeded = download::prepopulate_archive(&archive, db)?;
    if seeded > 0 {
        println!("  Seeded downloader archive with {seeded} known item(s)");
    }

    if opts.dry_run {
        println!("  Would process playlist {playlist_id} per item");
        return Ok(());
    }

    println!("  Fetching item list...");
    let video_ids = download::list_playlist_ids(url)?;
    println!("  {} item(s) in playlist", video_ids.len());

    for (idx, video_id) in video_ids.iter().enumerate() {
        println!("\n({}/{}) {video_id}", idx + 1, video_ids.len());
        if let Err(err) = process_playlist_item(db, playlist_id, video_id, &archive, opts) {
            eprintln!("Warning: {video_id} failed: {err:#}");
        }
    }

    println!("\nWorkflow complete.");
    Ok(())
}

fn process_playlist_item(
    db: &Database,
    playlist_id: &str,
    video_id: &str,
    archive: &Path,
    opts: &WorkflowOptions,
) -> Result<()> {
    let mut record = db.batch_item(playlist_id, video_id)?;

    if record.is_none()
        && let Some(cached) = db.download_get(video_id)?
    {
        let expected = expected_split_dir(&opts.splits, &cached);
        if let Some(status) = backfill_status(Path::new(&cached).is_file(), expected.is_dir()) {
            let split_dir = (status == ItemStatus::Split)
                .then(|| expected.to_string_lossy().into_owned());
            db.advance_item(
                playlist_id,
                video_id,
                status,
                Some(&cached),
                split_dir.as_deref(),
            )?;
            record = db.batch_item(playlist_id, video_id)?;
        }
    }

    let plan = plan_item(
        record.as_ref(),
        |path| Path::new(path).is_file(),
        |path| Path::new(path).is_dir(),
    );
    match plan {
        ItemPlan::Skip => {
            println!("  Already organized — skipping");
            Ok(())
        }
        ItemPlan::OrganizeSplitDir(split_dir) => {
            println!("  Already split -> {}", split_dir.display());
            organize_and_record(db, playlist_id, video_id, &split_dir, opts)
        }
        ItemPlan::ResumeFromAudio(audio) => {
            println!("  Already downloaded -> {}", audio.display());
            advance_downloaded_item(db, playlist_id, video_id, &audio, opts)
        }
        ItemPlan::Fetch => {
            let audio = fetch_item(video_id, archive, opts)?;
            let audio_text = audio.to_string_lossy();
            db.advance_item(
                playlist_id,
                video_id,
                ItemStatus::Downloaded,
                Some(&audio_text),
                None,
            )?;
            db.download_set(video_id, &audio_text)?;
            advance_downloaded_item(db, playlist_id, video_id, &audio, opts)
        }
    }
}

/// Derive the audio file for an item: ID search in the download directory
/// first (the filename template embeds the ID), download only if that
/// finds nothing.
fn fetch_item(video_id: &str, archive: &Path, opts: &WorkflowOptions) -> Result<PathBuf> {
    let recovered = download::find_by_id(&opts.output, video_id);
    if let Some(first) = recovered.first() {
        println!("  Recovered by ID -> {}", first.display());
        return Ok(first.clone());
    }

    let before = download::snapshot_dir(&opts.output);
    let item_url = format!("https://www.youtube.com/watch?v={video_id}");
    download::run_download(&item_url, &opts.output, false, Some(archive))?;

    let new_files = download::locate_downloaded(&opts.output, Some(video_id), &before);
    new_files
        .into_iter()
        .next()
        .with_context(|| format!("no audio file found for {video_id} after download"))
}

fn advance_downloaded_item(
    db: &Database,
    playlist_id: &str,
    video_id: &str,
    audio: &Path,
    opts: &WorkflowOptions,
) -> Result<()> {
    let chapters = resolve_for(audio, opts)?;
    if chapters.is_empty() {
        // No-chapters shortcut: downloaded -> organized directly.
        return organize_and_record(db, playlist_id, video_id, audio, opts);
    }

    println!("\n  Split — {} chapters", chapters.len());
    let out_dir = expected_split_dir(&opts.splits, &audio.to_string_lossy());
    if !split_album(db, audio, &chapters, &out_dir, opts)? {
        // Review aborted: treat the file as a single track.
        return organize_and_record(db, playlist_id, video_id, audio, opts);
    }
    db.advance_item(
        playlist_id,
        video_id,
        ItemStatus::Split,
        None,
        Some(&out_dir.to_string_lossy()),
    )?;
    organize_and_record(db, playlist_id, video_id, &out_dir, opts)
}

fn organize_and_record(
    db: &Database,
    playlist_id: &str,
    video_id: &str,
    target: &Path,
    opts: &WorkflowOptions,
) -> Result<()> {
    if opts.no_organize {
        return Ok(());
    }
    println!("\n  Organize — {}", target.display());
    organize::run_organize(target, &opts.organize_options())?;
    db.advance_item(playlist_id, video_id, ItemStatus::Organized, None, None)?;
    Ok(())
}

// ── single-URL flow ───────────────────────────────────────────────────────

fn run_single_workflow(db: &Database, url: &str, opts: &WorkflowOptions) -> Result<()> {
    println!("\nStep 1 — Download");

    if opts.dry_run {
        println!("  Would download {url} -> {}", opts.output.display());
        return Ok(());
    }

    let video_id = download::youtube_id(url);
    let mut audio_files: Vec<PathBuf> = Vec::new();
    let mut split_dirs: Vec<PathBuf> = Vec::new();

    if let Some(id) = &video_id
        && let Some(cached) = db.download_get(id)?
    {
        let cached_path = PathBuf::from(&cached);
        if cached_path.is_file() {
            println!("  Cached download — skipping yt-dlp");
            println!("    {}", cached_path.display());
            audio_files.push(cached_path);
        } else {
            // Source deleted after splitting: skip the downloader and look
            // for the split output so the tagger step still runs.
            println!("  Already downloaded (source deleted after split) — skipping yt-dlp");
            let expected = expected_split_dir(&opts.splits, &cached);
            if expected.is_dir() {
                println!("    Found existing split dir: {}", expected.display());
                split_dirs.push(expected);
            }
        }
    }

    if audio_files.is_empty()
        && split_dirs.is_empty()
        && let Some(id) = &video_id
    {
        audio_files = download::find_by_id(&opts.output, id);
        if let Some(first) = audio_files.first() {
            println!("  Already downloaded — skipping yt-dlp");
            db.download_set(id, &first.to_string_lossy())?;
        }
    }

    if audio_files.is_empty() && split_dirs.is_empty() {
        let before = download::snapshot_dir(&opts.output);
        download::run_download(url, &opts.output, false, None)
            .context("download failed, aborting workflow")?;
        audio_files = download::locate_downloaded(&opts.output, video_id.as_deref(), &before);
        if let (Some(id), Some(first)) = (&video_id, audio_files.first()) {
            db.download_set(id, &first.to_string_lossy())?;
        }
    }

    if audio_files.is_empty() && split_dirs.is_empty() {
        println!("No audio files found in {}", opts.output.display());
        return Ok(());
    }

    let mut albums: Vec<(PathBuf, Vec<Chapter>)> = Vec::new();
    let mut singles: Vec<PathBuf> = Vec::new();
    for audio in audio_files {
        let chapters = resolve_for(&audio, opts)?;
        if chapters.is_empty() {
            singles.push(audio);
        } else {
            albums.push((audio, chapters));
        }
    }

    if !albums.is_empty() {
        println!(
            "\n  Album(s) detected: {} file(s) with chapter markers",
            albums.len()
        );
        println!("\nStep 2 — Split");
    }
    for (audio, chapters) in &albums {
        let name = audio.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        println!("  {name} — {} chapters", chapters.len());
        let out_dir = expected_split_dir(&opts.splits, &audio.to_string_lossy());
        match split_album(db, audio, chapters, &out_dir, opts) {
            Ok(true) => split_dirs.push(out_dir),
            Ok(false) => {}
            Err(err) => eprintln!("Warning: split failed for {name}: {err:#}"),
        }
    }
    if !singles.is_empty() {
        println!(
            "\n  Single track(s) detected: {} file(s) without chapters",
            singles.len()
        );
    }

    if opts.no_organize {
        println!("\nWorkflow complete (organize skipped).");
        return Ok(());
    }

    println!("\nStep 3 — Organize");
    for dir in &split_dirs {
        println!("  beet import {}", dir.display());
        if let Err(err) = organize::run_organize(dir, &opts.organize_options()) {
            eprintln!("Warning: beet failed for {}: {err:#}", dir.display());
        }
    }
    for audio in &singles {
        println!("  beet import {}", audio.display());
        if let Err(err) = organize::run_organize(audio, &opts.organize_options()) {
            eprintln!("Warning: beet failed for {}: {err:#}", audio.display());
        }
    }

    println!("\nWorkflow complete.");
    Ok(())
}

// ── shared steps ──────────────────────────────────────────────────────────

fn resolve_for(audio: &Path, opts: &WorkflowOptions) -> Result<Vec<Chapter>> {
    if opts.no_split {
        return Ok(Vec::new());
    }
    resolver::resolve_chapters(audio, true, |_, _| review::prompt_chapter_decision())
}

/// Split one album. `Ok(true)` on success (including a cache hit),
/// `Ok(false)` when the operator aborted the review, `Err` when any
/// chapter failed to extract.
fn split_album(
    db: &Database,
    audio: &Path,
    chapters: &[Chapter],
    out_dir: &Path,
    opts: &WorkflowOptions,
) -> Result<bool> {
    let mut chapters = chapters.to_vec();
    if opts.review {
        match review::review_chapters(chapters)? {
            Some(edited) => chapters = edited,
            None => return Ok(false),
        }
    }

    let meta = metadata::extract_metadata(audio);
    let failed = split::split_file(
        db,
        &SplitRequest {
            audio,
            chapters: &chapters,
            output_dir: out_dir,
            metadata: &meta,
            jobs: opts.jobs,
            keep_source: opts.keep_source,
        },
    )?;
    if !failed.is_empty() {
        eprintln!("  Failed to split {} track(s):", failed.len());
        for title in &failed {
            eprintln!("    - {title}");
        }
        bail!(
            "{} of {} chapters failed to extract",
            failed.len(),
            chapters.len()
        );
    }
    println!("  {} tracks -> {}", chapters.len(), out_dir.display());
    Ok(true)
}
