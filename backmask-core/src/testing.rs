//! In-memory devices and listener collectors shared by the unit tests.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::audio_models::{AudioDevice, DeviceKind};
use crate::models::config::AudioConfig;
use crate::models::error::AudioError;
use crate::models::results::{PlaybackSummary, RecordingResult, ReversalResult};
use crate::models::state::Activity;
use crate::traits::capture_provider::{CaptureProvider, PcmBufferCallback};
use crate::traits::listeners::{PlaybackListener, RecorderListener, ReversalListener};
use crate::traits::playback_sink::PlaybackSink;
use crate::traits::session_delegate::SessionDelegate;

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll `check` until it yields a value or the timeout passes.
pub fn wait_until<T>(mut check: impl FnMut() -> Option<T>) -> T {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    loop {
        if let Some(value) = check() {
            return value;
        }
        assert!(Instant::now() < deadline, "timed out waiting for condition");
        thread::sleep(Duration::from_millis(5));
    }
}

#[derive(Default)]
struct FakeCaptureState {
    unavailable: bool,
    fail_next_start: bool,
    callback: Option<PcmBufferCallback>,
    start_count: usize,
}

/// Microphone stand-in; clones share one device.
///
/// Audio is injected with `push`, which runs the recorder's callback on the
/// calling thread while the device is started.
#[derive(Clone, Default)]
pub struct FakeCapture {
    state: Arc<Mutex<FakeCaptureState>>,
}

impl FakeCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        let capture = Self::new();
        capture.state.lock().unavailable = true;
        capture
    }

    pub fn fail_next_start(&self) {
        self.state.lock().fail_next_start = true;
    }

    pub fn push(&self, pcm: &[u8]) {
        let callback = self.state.lock().callback.clone();
        if let Some(callback) = callback {
            callback(pcm);
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().callback.is_some()
    }

    pub fn start_count(&self) -> usize {
        self.state.lock().start_count
    }
}

impl CaptureProvider for FakeCapture {
    fn is_available(&self) -> bool {
        !self.state.lock().unavailable
    }

    fn start(&mut self, _config: &AudioConfig, callback: PcmBufferCallback) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_start) {
            return Err(AudioError::DeviceUnavailable("fake microphone refused to start".into()));
        }
        state.callback = Some(callback);
        state.start_count += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.state.lock().callback = None;
        Ok(())
    }

    fn device_info(&self) -> AudioDevice {
        AudioDevice {
            id: "fake-mic".into(),
            name: "Fake Microphone".into(),
            kind: DeviceKind::Input,
            is_default: true,
        }
    }
}

#[derive(Default)]
struct FakeSinkState {
    unavailable: bool,
    fail_writes: bool,
    started: bool,
    drained: bool,
    start_count: usize,
    write_delay: Duration,
    written: Vec<u8>,
}

/// Speaker stand-in that keeps everything written to it; clones share one device.
#[derive(Clone, Default)]
pub struct FakeSink {
    state: Arc<Mutex<FakeSinkState>>,
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        let sink = Self::new();
        sink.state.lock().unavailable = true;
        sink
    }

    /// Make every `write` take at least `delay`, like a real device paced by its clock.
    pub fn with_write_delay(self, delay: Duration) -> Self {
        self.state.lock().write_delay = delay;
        self
    }

    pub fn fail_writes(&self) {
        self.state.lock().fail_writes = true;
    }

    pub fn heal(&self) {
        self.state.lock().fail_writes = false;
    }

    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    pub fn was_drained(&self) -> bool {
        self.state.lock().drained
    }

    pub fn start_count(&self) -> usize {
        self.state.lock().start_count
    }
}

impl PlaybackSink for FakeSink {
    fn is_available(&self) -> bool {
        !self.state.lock().unavailable
    }

    fn start(&mut self, _config: &AudioConfig) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        state.started = true;
        state.drained = false;
        state.start_count += 1;
        state.written.clear();
        Ok(())
    }

    fn write(&mut self, pcm: &[u8]) -> Result<(), AudioError> {
        let delay = {
            let mut state = self.state.lock();
            if !state.started {
                return Err(AudioError::InvalidState("fake speaker not started".into()));
            }
            if state.fail_writes {
                return Err(AudioError::DeviceUnavailable("fake speaker unplugged".into()));
            }
            state.written.extend_from_slice(pcm);
            state.write_delay
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<(), AudioError> {
        self.state.lock().drained = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.state.lock().started = false;
        Ok(())
    }

    fn device_info(&self) -> AudioDevice {
        AudioDevice {
            id: "fake-speaker".into(),
            name: "Fake Speaker".into(),
            kind: DeviceKind::Output,
            is_default: true,
        }
    }
}

/// Collects listener results in arrival order.
pub struct Collector<T> {
    results: Mutex<Vec<Result<T, AudioError>>>,
}

impl<T: Clone> Collector<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(Vec::new()),
        })
    }

    pub fn results(&self) -> Vec<Result<T, AudioError>> {
        self.results.lock().clone()
    }

    /// Block until at least `count` results have arrived.
    pub fn wait_for(&self, count: usize) -> Vec<Result<T, AudioError>> {
        wait_until(|| {
            let results = self.results.lock();
            (results.len() >= count).then(|| results.clone())
        })
    }

    fn push(&self, result: &Result<T, AudioError>) {
        self.results.lock().push(result.clone());
    }
}

pub type RecordingCollector = Collector<RecordingResult>;
pub type PlaybackCollector = Collector<PlaybackSummary>;
pub type ReversalCollector = Collector<ReversalResult>;

impl RecorderListener for RecordingCollector {
    fn on_recording_finished(&self, result: &Result<RecordingResult, AudioError>) {
        self.push(result);
    }
}

impl PlaybackListener for PlaybackCollector {
    fn on_playback_ended(&self, result: &Result<PlaybackSummary, AudioError>) {
        self.push(result);
    }
}

impl ReversalListener for ReversalCollector {
    fn on_reversal_finished(&self, result: &Result<ReversalResult, AudioError>) {
        self.push(result);
    }
}

/// Session delegate that records every callback.
#[derive(Default)]
pub struct DelegateLog {
    pub activities: Mutex<Vec<Activity>>,
    pub recordings: Mutex<Vec<Result<RecordingResult, AudioError>>>,
    pub playbacks: Mutex<Vec<Result<PlaybackSummary, AudioError>>>,
    pub reversals: Mutex<Vec<Result<ReversalResult, AudioError>>>,
}

impl DelegateLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn activities(&self) -> Vec<Activity> {
        self.activities.lock().clone()
    }

    pub fn wait_for_recordings(&self, count: usize) -> Vec<Result<RecordingResult, AudioError>> {
        wait_until(|| {
            let results = self.recordings.lock();
            (results.len() >= count).then(|| results.clone())
        })
    }

    pub fn wait_for_playbacks(&self, count: usize) -> Vec<Result<PlaybackSummary, AudioError>> {
        wait_until(|| {
            let results = self.playbacks.lock();
            (results.len() >= count).then(|| results.clone())
        })
    }

    pub fn wait_for_reversals(&self, count: usize) -> Vec<Result<ReversalResult, AudioError>> {
        wait_until(|| {
            let results = self.reversals.lock();
            (results.len() >= count).then(|| results.clone())
        })
    }
}

impl SessionDelegate for DelegateLog {
    fn on_activity_changed(&self, activity: Activity) {
        self.activities.lock().push(activity);
    }

    fn on_recording_finished(&self, result: &Result<RecordingResult, AudioError>) {
        self.recordings.lock().push(result.clone());
    }

    fn on_playback_ended(&self, result: &Result<PlaybackSummary, AudioError>) {
        self.playbacks.lock().push(result.clone());
    }

    fn on_reversal_finished(&self, result: &Result<ReversalResult, AudioError>) {
        self.reversals.lock().push(result.clone());
    }
}
