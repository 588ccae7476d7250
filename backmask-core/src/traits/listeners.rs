use crate::models::error::AudioError;
use crate::models::results::{PlaybackSummary, RecordingResult, ReversalResult};

/// Completion of a recording, fired once per `record()`.
///
/// Called from the thread that ended the recording: the caller of
/// `Recorder::stop()`, or the writer thread after a write failure.
pub trait RecorderListener: Send + Sync {
    fn on_recording_finished(&self, result: &Result<RecordingResult, AudioError>);
}

/// End of playback, fired once per `play()` from the streaming thread.
///
/// Natural end and `stop()` both land here.
pub trait PlaybackListener: Send + Sync {
    fn on_playback_ended(&self, result: &Result<PlaybackSummary, AudioError>);
}

/// Completion of a reversal job, fired once per `reverse()` from the job thread.
pub trait ReversalListener: Send + Sync {
    fn on_reversal_finished(&self, result: &Result<ReversalResult, AudioError>);
}
