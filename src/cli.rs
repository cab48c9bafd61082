use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "tracksmith",
    version,
    about = "Download music with yt-dlp, split albums by chapter markers, organize with beets"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Full pipeline: download, classify, split, organize.
    Workflow {
        /// YouTube video or playlist URL.
        url: String,
        /// Directory for downloaded audio.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Directory for chapter-split tracks.
        #[arg(long)]
        splits: Option<PathBuf>,
        /// Review/edit chapters before splitting.
        #[arg(short, long)]
        review: bool,
        /// Skip chapter splitting even when chapters are found.
        #[arg(long)]
        no_split: bool,
        /// Skip the beets organize step.
        #[arg(long)]
        no_organize: bool,
        /// Import into the beets library (moves files).
        #[arg(short, long)]
        import: bool,
        /// Only write tags, do not move or import.
        #[arg(short, long)]
        tag_only: bool,
        /// Show what would happen without making changes.
        #[arg(short, long)]
        dry_run: bool,
        /// Parallel ffmpeg jobs (0 = auto from CPU count).
        #[arg(short, long, default_value_t = 0)]
        jobs: usize,
        /// Keep source audio and sidecars after splitting.
        #[arg(long)]
        keep_source: bool,
        /// Beets config file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Download audio, then report per file whether it is an album or a single.
    Download {
        /// YouTube URL (video or playlist).
        url: String,
        /// Directory for downloaded audio.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Skip writing chapter info (no .info.json).
        #[arg(long)]
        no_chapters: bool,
    },
    /// Split one audio file into tracks using chapter markers.
    Split {
        /// Audio file to split.
        path: PathBuf,
        /// Review/edit chapters before splitting.
        #[arg(short, long)]
        review: bool,
        /// Parallel ffmpeg jobs (0 = auto from CPU count).
        #[arg(short, long, default_value_t = 0)]
        jobs: usize,
        /// Output directory (default: <splits dir>/<album slug>).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Keep source audio and sidecars after splitting.
        #[arg(long)]
        keep_source: bool,
    },
    /// Tag/organize a file or directory with beets.
    Organize {
        /// Audio file or directory of tracks.
        path: PathBuf,
        /// Import into the beets library (moves files).
        #[arg(short, long)]
        import: bool,
        /// Only write tags, do not move or import.
        #[arg(short, long)]
        tag_only: bool,
        /// Show what beets would do without making changes.
        #[arg(short, long)]
        dry_run: bool,
        /// Beets config file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Inspect or prune the download/split/batch caches.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// List cached downloads, splits, and tracked batch items.
    Show,
    /// Remove cache records older than the given age.
    Clean {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
    /// Drop all cache and batch records for one video ID.
    Forget { video_id: String },
}
