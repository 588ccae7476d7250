//! # backmask-cpal
//!
//! Cross-platform device backend for backmask, built on cpal.
//!
//! Provides:
//! - `CpalMicCapture`: microphone capture, converted to the session's `AudioConfig`
//! - `CpalSpeakerOutput`: blocking PCM playback sink over a cpal output stream
//! - `DeviceEnumerator`: input/output device listing on the default host
//!
//! ## Usage
//! ```ignore
//! use backmask_core::{AudioConfig, AudioFiles, Session};
//! use backmask_cpal::{CpalMicCapture, CpalSpeakerOutput};
//!
//! let files = AudioFiles::bootstrap(data_dir)?;
//! let session = Session::new(
//!     files,
//!     AudioConfig::default_config(),
//!     CpalMicCapture::default_device(),
//!     CpalSpeakerOutput::default_device(),
//! )?;
//! session.start_recording()?;
//! ```

pub mod device_enumerator;
pub mod mic_capture;
pub mod speaker_output;

pub use device_enumerator::DeviceEnumerator;
pub use mic_capture::CpalMicCapture;
pub use speaker_output::CpalSpeakerOutput;
