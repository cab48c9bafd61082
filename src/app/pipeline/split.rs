//! ffmpeg chapter splitter: one stream-copy job per chapter on a bounded
//! worker pool, with a content-addressed cache so the same (audio,
//! chapters) pair is never split twice.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command as ProcessCommand;

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use sha2::{Digest, Sha256};

use super::process::run_capture;
use crate::app::chapters::{Chapter, safe_slug, sidecar_path};
use crate::app::metadata::TrackMetadata;
use crate::db::Database;

pub struct SplitRequest<'a> {
    pub audio: &'a Path,
    pub chapters: &'a [Chapter],
    pub output_dir: &'a Path,
    pub metadata: &'a TrackMetadata,
    /// 0 means auto-detect from the CPU count.
    pub jobs: usize,
    pub keep_source: bool,
}

pub fn default_jobs() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    (cpus / 2).clamp(2, 8)
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)
        .with_context(|| format!("failed to open {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 65536];
    loop {
        let read = file
            .read(&mut buf)
            .with_context(|| format!("failed to read {} for hashing", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    let digest = hasher.finalize();
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

/// Cache key over the exact bytes of the audio and its chapter definition.
/// Either input changing yields a fresh key; stale entries are simply never
/// read again.
pub fn split_fingerprint(audio: &Path, chapters_sidecar: &Path) -> Result<String> {
    Ok(format!(
        "split_{}_{}",
        file_sha256(audio)?,
        file_sha256(chapters_sidecar)?
    ))
}

/// Split `request.audio` into one file per chapter.
///
/// Returns the titles of chapters that failed to extract; empty means full
/// success. Only full success writes a cache entry or removes sources, so a
/// partial failure is retried wholesale on the next run while the extracted
/// files stay on disk.
pub fn split_file(db: &Database, request: &SplitRequest) -> Result<Vec<String>> {
    let chapters_sidecar = sidecar_path(request.audio, ".chapters.txt");
    let fingerprint = if chapters_sidecar.is_file() {
        Some(split_fingerprint(request.audio, &chapters_sidecar)?)
    } else {
        None
    };

    if let Some(fingerprint) = &fingerprint
        && let Some(cached_dir) = db.split_get(fingerprint)?
        && Path::new(&cached_dir).is_dir()
    {
        println!("  Already split (cached): {cached_dir}");
        return Ok(Vec::new());
    }

    fs::create_dir_all(request.output_dir).with_context(|| {
        format!(
            "failed to create split directory {}",
            request.output_dir.display()
        )
    })?;

    let jobs = if request.jobs == 0 {
        default_jobs()
    } else {
        request.jobs
    };
    println!(
        "  Splitting {} tracks with {} parallel job(s)",
        request.chapters.len(),
        jobs
    );
    println!(
        "    Artist: {} | Album: {} | Year: {}",
        request.metadata.artist, request.metadata.album, request.metadata.year
    );
    println!("    Output: {}", request.output_dir.display());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("failed to build extraction worker pool")?;
    let track_count = request.chapters.len();
    let failed: Vec<String> = pool.install(|| {
        request
            .chapters
            .par_iter()
            .filter_map(|chapter| {
                match extract_chapter(
                    request.audio,
                    request.output_dir,
                    chapter,
                    request.metadata,
                    track_count,
                ) {
                    Ok(()) => None,
                    Err(err) => {
                        eprintln!("Warning: {err:#}");
                        Some(chapter.title.clone())
                    }
                }
            })
            .collect()
    });

    if !failed.is_empty() {
        return Ok(failed);
    }

    if let Some(fingerprint) = &fingerprint {
        db.split_set(fingerprint, &request.output_dir.to_string_lossy())?;
    }
    if !request.keep_source {
        remove_source_files(request.audio);
        println!("  Source files removed.");
    }
    Ok(Vec::new())
}

pub fn chapter_output_path(output_dir: &Path, chapter: &Chapter) -> PathBuf {
    output_dir.join(format!(
        "{:02}-{}.flac",
        chapter.index,
        safe_slug(&chapter.title)
    ))
}

fn extract_chapter(
    audio: &Path,
    output_dir: &Path,
    chapter: &Chapter,
    metadata: &TrackMetadata,
    track_count: usize,
) -> Result<()> {
    let out_path = chapter_output_path(output_dir, chapter);

    let mut cmd = ProcessCommand::new("ffmpeg");
    cmd.arg("-i")
        .arg(audio)
        .arg("-nostdin")
        .arg("-y")
        .arg("-ss")
        .arg(chapter.start_ts());
    if let Some(end_ts) = chapter.end_ts() {
        cmd.arg("-to").arg(end_ts);
    }
    cmd.arg("-vn")
        .arg("-c:a")
        .arg("copy")
        .arg("-metadata")
        .arg(format!("title={}", chapter.title))
        .arg("-metadata")
        .arg(format!("artist={}", metadata.artist))
        .arg("-metadata")
        .arg(format!("album={}", metadata.album))
        .arg("-metadata")
        .arg(format!("date={}", metadata.year))
        .arg("-metadata")
        .arg(format!("track={}/{}", chapter.index, track_count))
        .arg(&out_path);

    let output = run_capture(cmd, "ffmpeg")?;
    if !output.status.success() {
        bail!(
            "ffmpeg exited with {} extracting {:?}",
            output.status,
            chapter.title
        );
    }
    Ok(())
}

fn remove_source_files(audio: &Path) {
    let _ = fs::remove_file(audio);
    for suffix in [".chapters.txt", ".info.json", ".metadata.txt"] {
        let _ = fs::remove_file(sidecar_path(audio, suffix));
    }
}
