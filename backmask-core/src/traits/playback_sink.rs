use crate::models::audio_models::AudioDevice;
use crate::models::config::AudioConfig;
use crate::models::error::AudioError;

/// Interface for platform-specific audio outputs.
///
/// The player drives a sink from its streaming thread:
/// `start` once, `write` per chunk, `drain` on natural end, `stop` always.
pub trait PlaybackSink: Send + Sync {
    /// Whether the output device can currently be opened.
    fn is_available(&self) -> bool;

    /// Open the output stream for PCM in `config`'s layout.
    fn start(&mut self, config: &AudioConfig) -> Result<(), AudioError>;

    /// Queue PCM for output, blocking until all of it is accepted.
    fn write(&mut self, pcm: &[u8]) -> Result<(), AudioError>;

    /// Block until queued audio has been played.
    fn drain(&mut self) -> Result<(), AudioError>;

    /// Discard queued audio and release the device. Safe to call when not started.
    fn stop(&mut self) -> Result<(), AudioError>;

    /// Information about the device backing this sink.
    fn device_info(&self) -> AudioDevice;
}
