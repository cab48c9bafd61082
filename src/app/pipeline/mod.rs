pub mod download;
pub mod organize;
pub mod probe;
pub mod process;
pub mod split;

use std::path::Path;

pub const AUDIO_EXTENSIONS: &[&str] = &["flac", "mp3", "m4a", "opus", "wav", "aac"];

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            AUDIO_EXTENSIONS.iter().any(|known| *known == ext)
        })
        .unwrap_or(false)
}
