use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::models::audio_models::AudioDevice;
use crate::models::config::AudioConfig;
use crate::models::error::AudioError;
use crate::models::results::PlaybackSummary;
use crate::models::state::PlayerState;
use crate::traits::listeners::PlaybackListener;
use crate::traits::playback_sink::PlaybackSink;

use super::worker::join_worker;

/// Streams a raw PCM file to an output device.
///
/// State machine: `stopped → play() → playing → stop() / end of stream → stopped`.
///
/// Each `play()` runs on its own streaming thread and fires the listener
/// exactly once when it ends, whether by end of stream, by `stop()` or by a
/// device/file error. The player does not guard against switching files
/// mid-playback; the session interlock does. The listener may call `play()`
/// again straight from its callback.
pub struct Player<S: PlaybackSink> {
    config: AudioConfig,
    sink: Arc<Mutex<S>>,
    state: Arc<Mutex<PlayerState>>,
    listener: Option<Arc<dyn PlaybackListener>>,
    cancel: Arc<AtomicBool>,
    stream_handle: Mutex<Option<thread::JoinHandle<()>>>,
    op: Mutex<()>,
}

impl<S: PlaybackSink + 'static> Player<S> {
    /// Fails with `DeviceUnavailable` if the sink cannot open its device.
    pub fn new(config: AudioConfig, sink: S) -> Result<Self, AudioError> {
        if !sink.is_available() {
            return Err(AudioError::DeviceUnavailable(format!(
                "output device {} cannot be opened",
                sink.device_info().name
            )));
        }

        Ok(Self {
            config,
            sink: Arc::new(Mutex::new(sink)),
            state: Arc::new(Mutex::new(PlayerState::Stopped)),
            listener: None,
            cancel: Arc::new(AtomicBool::new(false)),
            stream_handle: Mutex::new(None),
            op: Mutex::new(()),
        })
    }

    pub fn set_listener(&mut self, listener: Arc<dyn PlaybackListener>) {
        self.listener = Some(listener);
    }

    pub fn state(&self) -> PlayerState {
        *self.state.lock()
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn device_info(&self) -> AudioDevice {
        self.sink.lock().device_info()
    }

    /// Start streaming `file_path` from offset 0 and return immediately.
    ///
    /// `InvalidState` if already playing, `FileAccess` if the file cannot be
    /// opened. A file with no whole frame ends immediately, as a natural end.
    pub fn play(&self, file_path: &Path) -> Result<(), AudioError> {
        let previous;
        let started = {
            let _op = self.op.lock();
            if self.state.lock().is_playing() {
                return Err(AudioError::InvalidState("player is already playing".into()));
            }
            // A playback that ended on its own; its thread may still be in the listener.
            previous = self.stream_handle.lock().take();
            self.spawn_stream(file_path)
        };

        // Joined without the op lock: that listener may call stop() or play().
        reap(previous);
        started
    }

    fn spawn_stream(&self, file_path: &Path) -> Result<(), AudioError> {
        let file = File::open(file_path)
            .map_err(|e| AudioError::FileAccess(format!("failed to open {}: {}", file_path.display(), e)))?;

        self.cancel.store(false, Ordering::SeqCst);
        *self.state.lock() = PlayerState::Playing;

        let job = StreamJob {
            config: self.config,
            file_path: file_path.to_path_buf(),
            sink: Arc::clone(&self.sink),
            state: Arc::clone(&self.state),
            cancel: Arc::clone(&self.cancel),
            listener: self.listener.clone(),
        };

        let spawned = thread::Builder::new()
            .name("pcm-player".into())
            .spawn(move || job.run(file));

        match spawned {
            Ok(handle) => {
                *self.stream_handle.lock() = Some(handle);
                log::info!("Playback started from {}", file_path.display());
                Ok(())
            }
            Err(e) => {
                *self.state.lock() = PlayerState::Stopped;
                Err(AudioError::Thread(format!("failed to spawn player thread: {}", e)))
            }
        }
    }

    /// Cancel playback and wait for the device to be released.
    ///
    /// A no-op when nothing is playing; no notification fires in that case.
    pub fn stop(&self) {
        // Take the handle under the op lock so a play() chained from the
        // listener installs a fresh one that this call does not wait for.
        let handle = {
            let _op = self.op.lock();
            if self.state.lock().is_playing() {
                self.cancel.store(true, Ordering::SeqCst);
            }
            self.stream_handle.lock().take()
        };
        if !reap(handle) {
            *self.state.lock() = PlayerState::Stopped;
        }
    }
}

/// Join a finished or cancelled streaming thread; false if it panicked.
fn reap(handle: Option<thread::JoinHandle<()>>) -> bool {
    match handle.map(join_worker) {
        Some(false) => {
            log::error!("Player thread panicked");
            false
        }
        _ => true,
    }
}

impl<S: PlaybackSink> Drop for Player<S> {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        if let Some(handle) = self.stream_handle.get_mut().take() {
            join_worker(handle);
        }
    }
}

/// Everything the streaming thread needs for one `play()`.
struct StreamJob<S: PlaybackSink> {
    config: AudioConfig,
    file_path: PathBuf,
    sink: Arc<Mutex<S>>,
    state: Arc<Mutex<PlayerState>>,
    cancel: Arc<AtomicBool>,
    listener: Option<Arc<dyn PlaybackListener>>,
}

impl<S: PlaybackSink> StreamJob<S> {
    fn run(self, file: File) {
        let result = self.stream(file);
        match &result {
            Ok(summary) => log::info!(
                "Playback ended after {} frames of {}",
                summary.frames_played,
                summary.file_path.display()
            ),
            Err(e) => log::error!("Playback of {} failed: {}", self.file_path.display(), e),
        }

        *self.state.lock() = PlayerState::Stopped;
        if let Some(ref l) = self.listener {
            l.on_playback_ended(&result);
        }
    }

    fn stream(&self, file: File) -> Result<PlaybackSummary, AudioError> {
        let frame_size = self.config.bytes_per_frame();
        let mut reader = BufReader::new(file);
        let mut chunk = vec![0u8; self.config.buffer_size_bytes()];
        let mut frames_played = 0u64;

        let mut output = SinkGuard::open(&self.sink, &self.config)?;

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }

            let filled = read_full(&mut reader, &mut chunk)?;
            let whole = filled - filled % frame_size;
            if whole > 0 {
                output.write(&chunk[..whole])?;
                frames_played += (whole / frame_size) as u64;
            }
            if filled < chunk.len() {
                // End of stream; let queued audio finish unless cancelled meanwhile.
                if !self.cancel.load(Ordering::SeqCst) {
                    output.drain()?;
                }
                break;
            }
        }

        Ok(PlaybackSummary {
            file_path: self.file_path.clone(),
            frames_played,
        })
    }
}

/// Holds the sink open for one playback; stops it on every exit path.
struct SinkGuard<'a, S: PlaybackSink> {
    sink: &'a Mutex<S>,
}

impl<'a, S: PlaybackSink> SinkGuard<'a, S> {
    fn open(sink: &'a Mutex<S>, config: &AudioConfig) -> Result<Self, AudioError> {
        let guard = Self { sink };
        let started = sink.lock().start(config);
        started.map(|()| guard)
    }

    fn write(&mut self, pcm: &[u8]) -> Result<(), AudioError> {
        self.sink.lock().write(pcm)
    }

    fn drain(&mut self) -> Result<(), AudioError> {
        self.sink.lock().drain()
    }
}

impl<S: PlaybackSink> Drop for SinkGuard<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.sink.lock().stop() {
            log::error!("Failed to release output device: {}", e);
        }
    }
}

/// Read until `buf` is full or the reader is exhausted.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize, AudioError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(AudioError::FileAccess(format!("read failed: {}", e))),
        }
    }
    Ok(filled)
}
