mod chapters;
mod metadata;
mod musicbrainz;
mod pipeline;
mod resolver;
mod review;
mod workflow;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

use crate::cli::{CacheAction, Cli, Command};
use crate::db::Database;
use crate::paths;

use self::pipeline::download;
use self::pipeline::organize::{self, OrganizeOptions};
use self::pipeline::split::{self, SplitRequest};
use self::review::{format_recorded_display, truncate};
use self::workflow::WorkflowOptions;

pub fn run(cli: Cli) -> Result<()> {
    let db = open_db()?;

    match cli.command {
        Command::Workflow {
            url,
            output,
            splits,
            review,
            no_split,
            no_organize,
            import,
            tag_only,
            dry_run,
            jobs,
            keep_source,
            config,
        } => {
            let opts = WorkflowOptions {
                output: resolve_dir(output, paths::default_download_dir)?,
                splits: resolve_dir(splits, paths::default_splits_dir)?,
                review,
                no_split,
                no_organize,
                import,
                tag_only,
                dry_run,
                jobs,
                keep_source,
                config,
            };
            workflow::run_workflow(&db, &url, &opts)
        }
        Command::Download {
            url,
            output,
            no_chapters,
        } => run_download_command(&db, &url, output, no_chapters),
        Command::Split {
            path,
            review,
            jobs,
            output,
            keep_source,
        } => run_split_command(&db, &path, review, jobs, output, keep_source),
        Command::Organize {
            path,
            import,
            tag_only,
            dry_run,
            config,
        } => organize::run_organize(
            &path,
            &OrganizeOptions {
                import,
                tag_only,
                dry_run,
                config,
            },
        ),
        Command::Cache { action } => run_cache_command(&db, action),
    }
}

fn open_db() -> Result<Database> {
    let db_path = paths::database_file_path()?;
    let db = Database::open(&db_path)?;
    db.migrate()?;
    Ok(db)
}

fn resolve_dir(explicit: Option<PathBuf>, default: fn() -> Result<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(dir) => Ok(dir),
        None => default(),
    }
}

fn run_download_command(
    db: &Database,
    url: &str,
    output: Option<PathBuf>,
    no_chapters: bool,
) -> Result<()> {
    let output = resolve_dir(output, paths::default_download_dir)?;
    println!("Downloading: {url}");
    println!("  Output: {}", output.display());

    let before = download::snapshot_dir(&output);
    download::run_download(url, &output, no_chapters, None)?;
    println!("Download complete -> {}", output.display());

    let new_audio = download::locate_downloaded(
        &output,
        download::youtube_id(url).as_deref(),
        &before,
    );
    if new_audio.is_empty() {
        return Ok(());
    }

    println!("\n{:<58} {:<24} NEXT STEP", "FILE", "SCENARIO");
    for audio in &new_audio {
        let name = audio.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        // Record the file-to-ID mapping so workflow runs skip re-downloading.
        if let Some(stem) = audio.file_stem().and_then(|s| s.to_str())
            && let Some(id) = download::video_id_from_stem(stem)
        {
            db.download_set(&id, &audio.to_string_lossy())?;
        }
        let chapter_count = chapters::find_chapters(audio).len();
        let (scenario, next_step) = if chapter_count > 0 {
            (
                format!("album ({chapter_count} chapters)"),
                format!("tracksmith split \"{name}\""),
            )
        } else {
            (
                "single track".to_string(),
                format!("tracksmith organize \"{}\"", output.display()),
            )
        };
        println!("{:<58} {:<24} {}", truncate(name, 58), scenario, next_step);
    }
    Ok(())
}

fn run_split_command(
    db: &Database,
    path: &Path,
    review_requested: bool,
    jobs: usize,
    output: Option<PathBuf>,
    keep_source: bool,
) -> Result<()> {
    if !path.is_file() {
        bail!("file not found: {}", path.display());
    }

    let mut chapter_list = chapters::find_chapters(path);
    if chapter_list.is_empty() {
        bail!(
            "no chapters found — expected a .chapters.txt sidecar or an .info.json with a chapters array"
        );
    }

    if review_requested {
        match review::review_chapters(chapter_list)? {
            Some(edited) => chapter_list = edited,
            None => return Ok(()),
        }
    } else {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        review::display_chapter_table(&chapter_list, &format!("Chapters — {name}"));
    }

    let meta = metadata::extract_metadata(path);
    let out_dir = match output {
        Some(dir) => dir,
        None => paths::default_splits_dir()?.join(chapters::safe_slug(&meta.album)),
    };

    let failed = split::split_file(
        db,
        &SplitRequest {
            audio: path,
            chapters: &chapter_list,
            output_dir: &out_dir,
            metadata: &meta,
            jobs,
            keep_source,
        },
    )?;
    if !failed.is_empty() {
        eprintln!("Failed to split {} track(s):", failed.len());
        for title in &failed {
            eprintln!("  - {title}");
        }
        bail!("split failed for {}", path.display());
    }

    println!("  {} tracks -> {}", chapter_list.len(), out_dir.display());
    Ok(())
}

fn run_cache_command(db: &Database, action: CacheAction) -> Result<()> {
    match action {
        CacheAction::Show => {
            let downloads = db.list_downloads()?;
            let splits = db.list_splits()?;
            let items = db.list_batch_items()?;
            if downloads.is_empty() && splits.is_empty() && items.is_empty() {
                println!("Cache is empty.");
                return Ok(());
            }

            if !downloads.is_empty() {
                println!("{:<13} {:<52} RECORDED", "VIDEO ID", "AUDIO FILE");
                for entry in &downloads {
                    println!(
                        "{:<13} {:<52} {}",
                        entry.video_id,
                        truncate(&entry.audio_file, 52),
                        format_recorded_display(&entry.recorded_at)
                    );
                }
            }
            if !splits.is_empty() {
                println!("\n{:<24} {:<48} RECORDED", "FINGERPRINT", "SPLIT DIR");
                for entry in &splits {
                    println!(
                        "{:<24} {:<48} {}",
                        truncate(&entry.fingerprint, 24),
                        truncate(&entry.split_dir, 48),
                        format_recorded_display(&entry.recorded_at)
                    );
                }
            }
            if !items.is_empty() {
                println!(
                    "\n{:<24} {:<13} {:<12} UPDATED",
                    "PLAYLIST", "VIDEO ID", "STATUS"
                );
                for (playlist_id, item) in &items {
                    println!(
                        "{:<24} {:<13} {:<12} {}",
                        truncate(playlist_id, 24),
                        item.video_id,
                        item.status.as_str(),
                        format_recorded_display(&item.updated_at)
                    );
                }
            }
            Ok(())
        }
        CacheAction::Clean { days } => {
            let removed = db.clean_older_than(days)?;
            println!("Removed {removed} cache record(s) older than {days} day(s).");
            Ok(())
        }
        CacheAction::Forget { video_id } => {
            let removed = db.forget_video(&video_id)?;
            if removed == 0 {
                println!("No records for {video_id}.");
            } else {
                println!("Removed {removed} record(s) for {video_id}.");
            }
            Ok(())
        }
    }
}
