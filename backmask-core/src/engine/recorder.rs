use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::audio_file;
use crate::models::audio_models::AudioDevice;
use crate::models::config::AudioConfig;
use crate::models::error::AudioError;
use crate::models::results::RecordingResult;
use crate::models::state::RecorderState;
use crate::processing::ring_buffer::RingBuffer;
use crate::storage::pcm_writer::PcmFileWriter;
use crate::traits::capture_provider::CaptureProvider;
use crate::traits::listeners::RecorderListener;

use super::worker::join_worker;

/// How often the writer thread drains captured audio into the file.
const DRAIN_INTERVAL: Duration = Duration::from_millis(50);

/// Seconds of audio the capture buffer holds before dropping the oldest frames.
const BUFFER_SECONDS: usize = 5;

/// Captures microphone audio into a raw PCM file.
///
/// Data flow:
/// ```text
/// [CaptureProvider] → [RingBuffer<u8>] → writer thread (50ms) → [PcmFileWriter]
/// ```
///
/// State machine: `stopped → record() → recording → stop() → stopped`.
/// A write failure on the writer thread also ends the recording: the
/// provider is stopped, the state returns to stopped and the listener
/// receives the error.
///
/// `record()` and `stop()` are serialized; listeners run with no recorder
/// lock held and may start the next take.
pub struct Recorder<P: CaptureProvider> {
    config: AudioConfig,
    file_path: PathBuf,
    provider: Arc<Mutex<P>>,
    state: Arc<Mutex<RecorderState>>,
    listener: Option<Arc<dyn RecorderListener>>,

    // Shared between the capture callback and the writer thread
    buffer: Arc<Mutex<RingBuffer<u8>>>,
    writer: Arc<Mutex<Option<PcmFileWriter>>>,

    // Writer thread control
    running: Arc<AtomicBool>,
    writer_handle: Mutex<Option<thread::JoinHandle<()>>>,
    op: Mutex<()>,

    // First write error seen by the writer thread during this take
    fault: Arc<Mutex<Option<AudioError>>>,
}

impl<P: CaptureProvider + 'static> Recorder<P> {
    /// Fails with `DeviceUnavailable` if the provider cannot capture, or
    /// `FileAccess` if `file_path` cannot be created. Existing audio in the
    /// file is kept until the first `record()`.
    pub fn new(config: AudioConfig, file_path: impl Into<PathBuf>, provider: P) -> Result<Self, AudioError> {
        if !provider.is_available() {
            return Err(AudioError::DeviceUnavailable(format!(
                "capture device {} cannot be opened",
                provider.device_info().name
            )));
        }

        let file_path = file_path.into();
        audio_file::ensure_exists(&file_path)?;

        let frame_size = config.bytes_per_frame();
        let capacity = config.sample_rate_hz() as usize * BUFFER_SECONDS * frame_size;

        Ok(Self {
            config,
            file_path,
            provider: Arc::new(Mutex::new(provider)),
            state: Arc::new(Mutex::new(RecorderState::Stopped)),
            listener: None,
            buffer: Arc::new(Mutex::new(RingBuffer::new(capacity))),
            writer: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            writer_handle: Mutex::new(None),
            op: Mutex::new(()),
            fault: Arc::new(Mutex::new(None)),
        })
    }

    pub fn set_listener(&mut self, listener: Arc<dyn RecorderListener>) {
        self.listener = Some(listener);
    }

    pub fn state(&self) -> RecorderState {
        *self.state.lock()
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn device_info(&self) -> AudioDevice {
        self.provider.lock().device_info()
    }

    /// Truncate the file and start capturing into it.
    ///
    /// Returns `InvalidState` if already recording; the running capture is
    /// left untouched.
    pub fn record(&self) -> Result<(), AudioError> {
        let previous;
        let started = {
            let _op = self.op.lock();
            if self.state.lock().is_recording() {
                return Err(AudioError::InvalidState("recorder is already recording".into()));
            }

            // A writer that ended the previous take on a write failure. Once the
            // state is stopped it touches nothing but its listener.
            previous = self.writer_handle.lock().take();
            *self.state.lock() = RecorderState::Recording;

            let started = self.start_capture();
            if started.is_err() {
                *self.writer.lock() = None;
                *self.state.lock() = RecorderState::Stopped;
            }
            started
        };

        // Joined without the op lock: that listener may call stop() or record().
        reap_writer(previous);
        if started.is_ok() {
            log::info!("Recording started into {}", self.file_path.display());
        }
        started
    }

    /// Stop capturing, flush and close the file.
    ///
    /// The capture device is released before this returns. The listener is
    /// notified with the same result that is returned.
    pub fn stop(&self) -> Result<RecordingResult, AudioError> {
        let op = self.op.lock();
        let was_recording = {
            let mut state = self.state.lock();
            let recording = state.is_recording();
            *state = RecorderState::Stopped;
            recording
        };

        if !was_recording {
            // A write failure may have ended the take; its writer may still be in
            // the listener, which may call back into the recorder.
            let previous = self.writer_handle.lock().take();
            drop(op);
            reap_writer(previous);
            return Err(AudioError::InvalidState("recorder is not recording".into()));
        }

        let result = self.finish_capture();
        drop(op);

        match &result {
            Ok(r) => log::info!(
                "Recording stopped: {} frames ({:.2}s) in {}",
                r.frames,
                r.duration_secs,
                r.file_path.display()
            ),
            Err(e) => log::error!("Recording failed to finalize: {}", e),
        }

        if let Some(ref listener) = self.listener {
            listener.on_recording_finished(&result);
        }
        result
    }

    // --- Internal helpers ---

    fn start_capture(&self) -> Result<(), AudioError> {
        let mut writer = PcmFileWriter::new(self.file_path.clone());
        writer.open()?;
        *self.writer.lock() = Some(writer);
        *self.fault.lock() = None;
        self.buffer.lock().reset();

        let buffer = Arc::clone(&self.buffer);
        let frame_size = self.config.bytes_per_frame();
        let callback = Arc::new(move |pcm: &[u8]| {
            let whole = pcm.len() - pcm.len() % frame_size;
            if whole != pcm.len() {
                log::warn!("Capture delivered a partial frame; dropping {} bytes", pcm.len() - whole);
            }
            let dropped = buffer.lock().write(&pcm[..whole]);
            if dropped > 0 {
                log::warn!("Capture buffer overflow; dropped {} bytes", dropped);
            }
        });

        self.provider.lock().start(&self.config, callback)?;

        self.running.store(true, Ordering::SeqCst);
        if let Err(e) = self.start_writer_loop() {
            self.running.store(false, Ordering::SeqCst);
            if let Err(stop_err) = self.provider.lock().stop() {
                log::error!("Failed to stop capture after writer spawn failure: {}", stop_err);
            }
            return Err(e);
        }
        Ok(())
    }

    fn finish_capture(&self) -> Result<RecordingResult, AudioError> {
        let stop_result = self.provider.lock().stop();
        // This take's writer never notifies once stop() has claimed the state.
        self.join_writer();

        let drained = drain_buffer(&self.buffer, &self.writer);
        if let Some(e) = self.fault.lock().take().or(drained.err()) {
            *self.writer.lock() = None;
            return Err(e);
        }
        stop_result?;

        let mut writer = self
            .writer
            .lock()
            .take()
            .ok_or_else(|| AudioError::FileAccess("file writer not available".into()))?;
        let bytes_written = writer.bytes_written();
        let checksum = writer.close()?;

        Ok(RecordingResult {
            file_path: self.file_path.clone(),
            bytes_written,
            frames: self.config.frames_in(bytes_written),
            duration_secs: self.config.duration_secs(bytes_written),
            checksum,
        })
    }

    /// Start the background loop that moves captured audio into the file.
    fn start_writer_loop(&self) -> Result<(), AudioError> {
        let running = Arc::clone(&self.running);
        let buffer = Arc::clone(&self.buffer);
        let writer = Arc::clone(&self.writer);
        let state = Arc::clone(&self.state);
        let provider = Arc::clone(&self.provider);
        let fault = Arc::clone(&self.fault);
        let listener = self.listener.clone();

        let handle = thread::Builder::new()
            .name("pcm-recorder-writer".into())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    thread::sleep(DRAIN_INTERVAL);

                    let Err(error) = drain_buffer(&buffer, &writer) else {
                        continue;
                    };
                    log::error!("Failed to write audio data: {}", error);
                    running.store(false, Ordering::SeqCst);
                    *fault.lock() = Some(error.clone());

                    // Whoever moves the state to stopped owns the teardown and
                    // the notification; otherwise stop() reports the fault.
                    {
                        let mut s = state.lock();
                        if !s.is_recording() {
                            break;
                        }
                        *s = RecorderState::Stopped;

                        if let Err(e) = provider.lock().stop() {
                            log::error!("Failed to stop capture after write failure: {}", e);
                        }
                        *writer.lock() = None;
                        *fault.lock() = None;
                        buffer.lock().reset();
                    }

                    if let Some(ref l) = listener {
                        l.on_recording_finished(&Err(error));
                    }
                    break;
                }
            })
            .map_err(|e| AudioError::Thread(format!("failed to spawn writer thread: {}", e)))?;

        *self.writer_handle.lock() = Some(handle);
        Ok(())
    }

    fn join_writer(&self) {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.writer_handle.lock().take();
        reap_writer(handle);
    }
}

fn reap_writer(handle: Option<thread::JoinHandle<()>>) {
    if let Some(handle) = handle {
        if !join_worker(handle) {
            log::error!("Recorder writer thread panicked");
        }
    }
}

impl<P: CaptureProvider> Drop for Recorder<P> {
    fn drop(&mut self) {
        let recording = self.state.lock().is_recording();
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.writer_handle.get_mut().take() {
            join_worker(handle);
        }
        if recording {
            log::warn!("Recorder dropped while recording; releasing capture device");
            *self.state.lock() = RecorderState::Stopped;
            if let Err(e) = self.provider.lock().stop() {
                log::error!("Failed to stop capture on teardown: {}", e);
            }
            if let Err(e) = drain_buffer(&self.buffer, &self.writer) {
                log::error!("Failed to flush audio on teardown: {}", e);
            }
            if let Some(mut writer) = self.writer.lock().take() {
                if let Err(e) = writer.close() {
                    log::error!("Failed to close audio file on teardown: {}", e);
                }
            }
        }
    }
}

/// Move every buffered frame into the open writer.
fn drain_buffer(buffer: &Mutex<RingBuffer<u8>>, writer: &Mutex<Option<PcmFileWriter>>) -> Result<(), AudioError> {
    let pcm = {
        let mut b = buffer.lock();
        let available = b.count();
        b.read(available)
    };
    if pcm.is_empty() {
        return Ok(());
    }

    match writer.lock().as_mut() {
        Some(w) => w.write(&pcm),
        None => Ok(()),
    }
}
