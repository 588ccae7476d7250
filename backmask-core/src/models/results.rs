use std::path::PathBuf;

/// Returned by `Recorder::stop()` once the original file is closed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub bytes_written: u64,
    pub frames: u64,
    pub duration_secs: f64,
    /// Lowercase hex SHA-256 of the finished file.
    pub checksum: String,
}

/// Outcome of one reversal job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReversalResult {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub frames_written: u64,
    /// Trailing bytes of the source that did not form a whole frame.
    pub dropped_bytes: u64,
    /// Lowercase hex SHA-256 of the destination file.
    pub checksum: String,
}

/// Reported when playback ends, whether by end of stream or by `stop()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub file_path: PathBuf,
    pub frames_played: u64,
}
