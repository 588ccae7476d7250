use std::sync::Arc;

use crate::models::audio_models::AudioDevice;
use crate::models::config::AudioConfig;
use crate::models::error::AudioError;

/// Callback invoked when captured audio is available.
///
/// `pcm` is interleaved PCM already converted to the `AudioConfig` passed to
/// `CaptureProvider::start`, and always holds whole frames.
pub type PcmBufferCallback = Arc<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// Interface for platform-specific microphone sources.
///
/// Implemented by:
/// - `CpalMicCapture` (backmask-cpal)
/// - `FakeCapture` (tests)
pub trait CaptureProvider: Send + Sync {
    /// Whether the capture device can currently be opened.
    fn is_available(&self) -> bool;

    /// Start capturing audio in `config`'s layout, delivering buffers via `callback`.
    ///
    /// The callback fires on a device thread; keep processing minimal.
    fn start(&mut self, config: &AudioConfig, callback: PcmBufferCallback) -> Result<(), AudioError>;

    /// Stop capturing. The device must be released before this returns.
    fn stop(&mut self) -> Result<(), AudioError>;

    /// Information about the device backing this provider.
    fn device_info(&self) -> AudioDevice;
}
