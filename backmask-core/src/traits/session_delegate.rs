use crate::models::error::AudioError;
use crate::models::results::{PlaybackSummary, RecordingResult, ReversalResult};
use crate::models::state::Activity;

/// Event delegate for session notifications (the UI boundary).
///
/// Methods are called from background threads, not the UI thread.
/// Implementations should marshal to the UI thread if needed. By the time a
/// `*_finished`/`*_ended` method runs the session is already idle again.
pub trait SessionDelegate: Send + Sync {
    /// Called whenever the busy gate changes.
    fn on_activity_changed(&self, activity: Activity);

    fn on_recording_finished(&self, result: &Result<RecordingResult, AudioError>);

    fn on_playback_ended(&self, result: &Result<PlaybackSummary, AudioError>);

    fn on_reversal_finished(&self, result: &Result<ReversalResult, AudioError>);
}
