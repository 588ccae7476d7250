//! # backmask-core
//!
//! Platform-agnostic record / reverse / play core library.
//!
//! Records raw PCM from a microphone into one file, writes a frame-reversed
//! copy of it into a second file, and plays either file back. Platform
//! backends implement `CaptureProvider` and `PlaybackSink` and plug into the
//! generic `Session`, which lets only one of those three activities run at a time.
//!
//! ## Architecture
//!
//! ```text
//! backmask-core (this crate)
//! ├── traits/       ← CaptureProvider, PlaybackSink, listeners, SessionDelegate
//! ├── models/       ← AudioError, AudioConfig, states, AudioFiles, results
//! ├── processing/   ← RingBuffer, PCM encode/decode, FormatConverter, Resampler
//! ├── engine/       ← Recorder, Player, Reverser
//! ├── session/      ← Session (busy gate + playback selector)
//! └── storage/      ← PcmFileWriter, SHA-256 checksums
//! ```

pub mod engine;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod testing;

// Re-export key types at crate root for convenience.
pub use engine::player::Player;
pub use engine::recorder::Recorder;
pub use engine::reverser::{reverse_file, reverse_frames, Reverser};
pub use models::audio_file::{AudioFiles, ORIGINAL_AUDIO_FILENAME, REVERSED_AUDIO_FILENAME};
pub use models::audio_models::{AudioDevice, DeviceKind};
pub use models::config::{AudioConfig, SampleFormat};
pub use models::error::AudioError;
pub use models::results::{PlaybackSummary, RecordingResult, ReversalResult};
pub use models::state::{Activity, PlaybackTarget, PlayerState, RecorderState};
pub use processing::format_converter::{FormatConverter, Resampler};
pub use processing::ring_buffer::RingBuffer;
pub use session::interlock::Session;
pub use storage::pcm_writer::PcmFileWriter;
pub use traits::capture_provider::{CaptureProvider, PcmBufferCallback};
pub use traits::listeners::{PlaybackListener, RecorderListener, ReversalListener};
pub use traits::playback_sink::PlaybackSink;
pub use traits::session_delegate::SessionDelegate;
