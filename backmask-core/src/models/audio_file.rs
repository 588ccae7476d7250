use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use super::error::AudioError;

pub const ORIGINAL_AUDIO_FILENAME: &str = "original_audio";
pub const REVERSED_AUDIO_FILENAME: &str = "reversed_audio";

/// The two raw PCM files shared by recorder, reverser and player.
///
/// Neither file carries a header; the `AudioConfig` in use is the only
/// description of their content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFiles {
    pub original: PathBuf,
    pub reversed: PathBuf,
}

impl AudioFiles {
    /// Paths under `directory`, without touching the filesystem.
    pub fn in_directory(directory: &Path) -> Self {
        Self {
            original: directory.join(ORIGINAL_AUDIO_FILENAME),
            reversed: directory.join(REVERSED_AUDIO_FILENAME),
        }
    }

    /// Create `directory` and both files if absent. Existing audio is kept.
    pub fn bootstrap(directory: &Path) -> Result<Self, AudioError> {
        fs::create_dir_all(directory)
            .map_err(|e| AudioError::FileAccess(format!("failed to create directory: {}", e)))?;

        let files = Self::in_directory(directory);
        for path in [&files.original, &files.reversed] {
            ensure_exists(path)?;
        }
        log::debug!("Audio files ready in {}", directory.display());
        Ok(files)
    }
}

/// Create `path` if missing, without truncating it.
pub(crate) fn ensure_exists(path: &Path) -> Result<(), AudioError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|_| ())
        .map_err(|e| AudioError::FileAccess(format!("failed to create {}: {}", path.display(), e)))
}
