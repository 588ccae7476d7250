use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::player::Player;
use crate::engine::recorder::Recorder;
use crate::engine::reverser::Reverser;
use crate::models::audio_file::{ensure_exists, AudioFiles};
use crate::models::config::AudioConfig;
use crate::models::error::AudioError;
use crate::models::results::{PlaybackSummary, RecordingResult, ReversalResult};
use crate::models::state::{Activity, PlaybackTarget};
use crate::traits::capture_provider::CaptureProvider;
use crate::traits::listeners::{PlaybackListener, RecorderListener, ReversalListener};
use crate::traits::playback_sink::PlaybackSink;
use crate::traits::session_delegate::SessionDelegate;

/// The busy gate and the playback selector, always read and written together.
#[derive(Debug, Default)]
struct Interlock {
    activity: Activity,
    target: PlaybackTarget,
}

type DelegateSlot = Arc<Mutex<Option<Arc<dyn SessionDelegate>>>>;

/// Record / reverse / play controller over one pair of audio files.
///
/// At most one of recording, playing or reversing runs at any time. Every
/// `start_*` claims the gate with a single check-and-set and fails with
/// `InvalidState` when something else holds it. The gate is released by the
/// component's completion notification, before that notification reaches the
/// delegate, so a delegate may chain the next operation straight away.
///
/// ```text
/// start_recording ──→ [Recorder] ──→ original_audio
/// start_reversal  ──→ [Reverser] original_audio ──→ reversed_audio
/// start_playback  ──→ [Player]   original_audio | reversed_audio (selector)
/// ```
///
/// All methods take `&self`; the session can be shared across threads in an `Arc`.
pub struct Session<P: CaptureProvider, S: PlaybackSink> {
    files: AudioFiles,
    config: AudioConfig,
    recorder: Recorder<P>,
    player: Player<S>,
    reverser: Reverser,
    gate: Gate,
}

impl<P: CaptureProvider + 'static, S: PlaybackSink + 'static> Session<P, S> {
    /// Build the three components over `files` and wire them into one gate.
    ///
    /// Both files are created if missing; existing audio is kept.
    pub fn new(files: AudioFiles, config: AudioConfig, capture: P, sink: S) -> Result<Self, AudioError> {
        let gate = Gate {
            interlock: Arc::new(Mutex::new(Interlock::default())),
            delegate: Arc::new(Mutex::new(None)),
        };

        ensure_exists(&files.reversed)?;

        let mut recorder = Recorder::new(config, files.original.clone(), capture)?;
        recorder.set_listener(Arc::new(gate.clone()));

        let mut player = Player::new(config, sink)?;
        player.set_listener(Arc::new(gate.clone()));

        let mut reverser = Reverser::new();
        reverser.set_listener(Arc::new(gate.clone()));

        log::debug!(
            "Session ready: original={}, reversed={}",
            files.original.display(),
            files.reversed.display()
        );

        Ok(Self {
            files,
            config,
            recorder,
            player,
            reverser,
            gate,
        })
    }

    pub fn set_delegate(&self, delegate: Arc<dyn SessionDelegate>) {
        *self.gate.delegate.lock() = Some(delegate);
    }

    pub fn activity(&self) -> Activity {
        self.gate.interlock.lock().activity
    }

    pub fn playback_target(&self) -> PlaybackTarget {
        self.gate.interlock.lock().target
    }

    pub fn files(&self) -> &AudioFiles {
        &self.files
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Start capturing into the original file, replacing the previous take.
    pub fn start_recording(&self) -> Result<(), AudioError> {
        self.claim(Activity::Recording)?;

        if let Err(e) = self.recorder.record() {
            self.gate.release(Activity::Recording, |_| {});
            return Err(e);
        }
        // The reversed file no longer matches the new take.
        self.gate.interlock.lock().target = PlaybackTarget::Original;
        Ok(())
    }

    /// Finish the current take. `InvalidState` when not recording.
    pub fn stop_recording(&self) -> Result<RecordingResult, AudioError> {
        self.recorder.stop()
    }

    /// Play whichever file the selector points at.
    pub fn start_playback(&self) -> Result<(), AudioError> {
        let target = self.claim(Activity::Playing)?;
        let path = self.path_for(target);

        if let Err(e) = self.player.play(&path) {
            self.gate.release(Activity::Playing, |_| {});
            return Err(e);
        }
        Ok(())
    }

    /// Stop playback and wait for the device to be released. No-op when idle.
    pub fn stop_playback(&self) {
        self.player.stop();
    }

    /// Write a reversed copy of the original file into the reversed file.
    ///
    /// Always derives from the original, so repeating it rewrites the same
    /// content. The reversed file becomes the playback target on success.
    pub fn start_reversal(&self) -> Result<(), AudioError> {
        self.claim(Activity::Reversing)?;

        if let Err(e) = self.reverser.reverse(&self.files.original, &self.files.reversed, &self.config) {
            self.gate.release(Activity::Reversing, |_| {});
            return Err(e);
        }
        Ok(())
    }

    /// Point playback at `target`. Rejected while playing.
    pub fn select_playback(&self, target: PlaybackTarget) -> Result<(), AudioError> {
        let mut interlock = self.gate.interlock.lock();
        if interlock.activity == Activity::Playing {
            return Err(AudioError::InvalidState(
                "cannot change playback target while playing".into(),
            ));
        }
        interlock.target = target;
        Ok(())
    }

    fn path_for(&self, target: PlaybackTarget) -> PathBuf {
        match target {
            PlaybackTarget::Original => self.files.original.clone(),
            PlaybackTarget::Reversed => self.files.reversed.clone(),
        }
    }

    /// Atomically move the gate from idle to `activity`; returns the selector.
    fn claim(&self, activity: Activity) -> Result<PlaybackTarget, AudioError> {
        let target = {
            let mut interlock = self.gate.interlock.lock();
            if !interlock.activity.is_idle() {
                return Err(AudioError::InvalidState(format!(
                    "cannot start {} while {}",
                    activity, interlock.activity
                )));
            }
            interlock.activity = activity;
            interlock.target
        };
        log::debug!("Session activity: {}", activity);
        self.gate.announce(activity);
        Ok(target)
    }
}

/// Listener adapter between the components and the session gate.
#[derive(Clone)]
struct Gate {
    interlock: Arc<Mutex<Interlock>>,
    delegate: DelegateSlot,
}

impl Gate {
    /// Return the gate to idle if `activity` still holds it, then let `update`
    /// adjust the selector under the same lock.
    fn release(&self, activity: Activity, update: impl FnOnce(&mut PlaybackTarget)) {
        let released = {
            let mut interlock = self.interlock.lock();
            update(&mut interlock.target);
            if interlock.activity == activity {
                interlock.activity = Activity::Idle;
                true
            } else {
                false
            }
        };
        if released {
            log::debug!("Session activity: {}", Activity::Idle);
            self.announce(Activity::Idle);
        } else {
            log::warn!("Completion of {} arrived while the gate was not held by it", activity);
        }
    }

    fn announce(&self, activity: Activity) {
        if let Some(d) = self.delegate() {
            d.on_activity_changed(activity);
        }
    }

    fn delegate(&self) -> Option<Arc<dyn SessionDelegate>> {
        self.delegate.lock().clone()
    }
}

impl RecorderListener for Gate {
    fn on_recording_finished(&self, result: &Result<RecordingResult, AudioError>) {
        self.release(Activity::Recording, |_| {});
        if let Some(d) = self.delegate() {
            d.on_recording_finished(result);
        }
    }
}

impl PlaybackListener for Gate {
    fn on_playback_ended(&self, result: &Result<PlaybackSummary, AudioError>) {
        self.release(Activity::Playing, |_| {});
        if let Some(d) = self.delegate() {
            d.on_playback_ended(result);
        }
    }
}

impl ReversalListener for Gate {
    fn on_reversal_finished(&self, result: &Result<ReversalResult, AudioError>) {
        self.release(Activity::Reversing, |target| {
            if result.is_ok() {
                *target = PlaybackTarget::Reversed;
            }
        });
        if let Some(d) = self.delegate() {
            d.on_reversal_finished(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::reverser::reverse_frames;
    use crate::testing::{wait_until, DelegateLog, FakeCapture, FakeSink};
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    fn config() -> AudioConfig {
        AudioConfig::new(1000, 2, 16).unwrap()
    }

    fn session_in(dir: &Path, sink: FakeSink) -> (Session<FakeCapture, FakeSink>, FakeCapture) {
        let files = AudioFiles::bootstrap(dir).unwrap();
        let capture = FakeCapture::new();
        let session = Session::new(files, config(), capture.clone(), sink).unwrap();
        (session, capture)
    }

    fn wait_idle(session: &Session<FakeCapture, FakeSink>) {
        wait_until(|| session.activity().is_idle().then_some(()));
    }

    #[test]
    fn new_session_is_idle_and_targets_original() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session_in(dir.path(), FakeSink::new());

        assert_eq!(session.activity(), Activity::Idle);
        assert_eq!(session.playback_target(), PlaybackTarget::Original);
        assert!(session.files().reversed.exists());
    }

    #[test]
    fn unavailable_devices_fail_construction() {
        let dir = tempfile::tempdir().unwrap();
        let files = AudioFiles::bootstrap(dir.path()).unwrap();

        let err = Session::new(files.clone(), config(), FakeCapture::unavailable(), FakeSink::new())
            .err()
            .unwrap();
        assert!(matches!(err, AudioError::DeviceUnavailable(_)));

        let err = Session::new(files, config(), FakeCapture::new(), FakeSink::unavailable())
            .err()
            .unwrap();
        assert!(matches!(err, AudioError::DeviceUnavailable(_)));
    }

    #[test]
    fn record_reverse_play_round() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FakeSink::new();
        let (session, capture) = session_in(dir.path(), sink.clone());
        let log = DelegateLog::new();
        session.set_delegate(log.clone());

        session.start_recording().unwrap();
        assert_eq!(session.activity(), Activity::Recording);
        capture.push(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        let recording = session.stop_recording().unwrap();
        assert_eq!(recording.frames, 3);
        assert_eq!(session.activity(), Activity::Idle);

        session.start_reversal().unwrap();
        let reversals = log.wait_for_reversals(1);
        assert_eq!(reversals[0].as_ref().unwrap().frames_written, 3);
        assert_eq!(session.playback_target(), PlaybackTarget::Reversed);

        session.start_playback().unwrap();
        let playbacks = log.wait_for_playbacks(1);
        wait_idle(&session);

        let original = fs::read(&session.files().original).unwrap();
        assert_eq!(original, (1..=12).collect::<Vec<u8>>());
        assert_eq!(sink.written(), reverse_frames(&original, 4));
        assert_eq!(playbacks[0].as_ref().unwrap().file_path, session.files().reversed);
        assert_eq!(log.recordings.lock().len(), 1);
        assert_eq!(
            log.activities(),
            vec![
                Activity::Recording,
                Activity::Idle,
                Activity::Reversing,
                Activity::Idle,
                Activity::Playing,
                Activity::Idle,
            ]
        );
    }

    #[test]
    fn start_is_rejected_while_another_activity_runs() {
        let dir = tempfile::tempdir().unwrap();
        let (session, capture) = session_in(dir.path(), FakeSink::new());

        session.start_recording().unwrap();
        capture.push(&[1, 2, 3, 4]);

        assert!(matches!(session.start_recording(), Err(AudioError::InvalidState(_))));
        assert!(matches!(session.start_playback(), Err(AudioError::InvalidState(_))));
        assert!(matches!(session.start_reversal(), Err(AudioError::InvalidState(_))));
        assert_eq!(capture.start_count(), 1);

        capture.push(&[5, 6, 7, 8]);
        let result = session.stop_recording().unwrap();
        assert_eq!(result.bytes_written, 8);
    }

    #[test]
    fn playback_is_rejected_until_reversal_completes() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session_in(dir.path(), FakeSink::new());

        session.gate.interlock.lock().activity = Activity::Reversing;
        assert!(matches!(session.start_playback(), Err(AudioError::InvalidState(_))));
        assert!(matches!(session.start_recording(), Err(AudioError::InvalidState(_))));

        session.gate.on_reversal_finished(&Ok(ReversalResult {
            source: session.files().original.clone(),
            destination: session.files().reversed.clone(),
            frames_written: 0,
            dropped_bytes: 0,
            checksum: String::new(),
        }));

        session.start_playback().unwrap();
        session.stop_playback();
        wait_idle(&session);
    }

    /// Checks the gate state seen by the delegate when a reversal completes.
    struct ChainingDelegate {
        interlock: Arc<Mutex<Interlock>>,
        seen: Mutex<Vec<Activity>>,
    }

    impl SessionDelegate for ChainingDelegate {
        fn on_activity_changed(&self, _activity: Activity) {}
        fn on_recording_finished(&self, _result: &Result<RecordingResult, AudioError>) {}
        fn on_playback_ended(&self, _result: &Result<PlaybackSummary, AudioError>) {}
        fn on_reversal_finished(&self, _result: &Result<ReversalResult, AudioError>) {
            self.seen.lock().push(self.interlock.lock().activity);
        }
    }

    #[test]
    fn gate_is_idle_before_delegate_hears_of_completion() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session_in(dir.path(), FakeSink::new());
        let delegate = Arc::new(ChainingDelegate {
            interlock: Arc::clone(&session.gate.interlock),
            seen: Mutex::new(Vec::new()),
        });
        session.set_delegate(delegate.clone());

        session.start_reversal().unwrap();
        let seen = wait_until(|| {
            let seen = delegate.seen.lock();
            (!seen.is_empty()).then(|| seen.clone())
        });

        assert_eq!(seen, vec![Activity::Idle]);
    }

    #[test]
    fn repeated_reversal_rewrites_from_original() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session_in(dir.path(), FakeSink::new());
        let log = DelegateLog::new();
        session.set_delegate(log.clone());
        let original: Vec<u8> = (0..40).collect();
        fs::write(&session.files().original, &original).unwrap();

        session.start_reversal().unwrap();
        log.wait_for_reversals(1);
        wait_idle(&session);
        let first = fs::read(&session.files().reversed).unwrap();

        session.start_reversal().unwrap();
        log.wait_for_reversals(2);
        wait_idle(&session);

        assert_eq!(fs::read(&session.files().reversed).unwrap(), first);
        assert_eq!(first, reverse_frames(&original, 4));
        assert_eq!(fs::read(&session.files().original).unwrap(), original);
        assert_eq!(session.playback_target(), PlaybackTarget::Reversed);
    }

    #[test]
    fn failed_reversal_keeps_selector_and_frees_gate() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session_in(dir.path(), FakeSink::new());
        let log = DelegateLog::new();
        session.set_delegate(log.clone());
        fs::remove_file(&session.files().original).unwrap();

        session.start_reversal().unwrap();
        let reversals = log.wait_for_reversals(1);
        wait_idle(&session);

        assert!(matches!(reversals[0], Err(AudioError::FileAccess(_))));
        assert_eq!(session.playback_target(), PlaybackTarget::Original);
    }

    #[test]
    fn new_recording_selects_original_again() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session_in(dir.path(), FakeSink::new());

        session.select_playback(PlaybackTarget::Reversed).unwrap();
        session.start_recording().unwrap();
        assert_eq!(session.playback_target(), PlaybackTarget::Original);
        session.stop_recording().unwrap();
    }

    #[test]
    fn selector_is_locked_while_playing() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FakeSink::new().with_write_delay(Duration::from_millis(20));
        let (session, _) = session_in(dir.path(), sink.clone());
        let log = DelegateLog::new();
        session.set_delegate(log.clone());
        fs::write(&session.files().original, vec![0u8; 400 * 50]).unwrap();

        session.start_playback().unwrap();
        assert_eq!(session.activity(), Activity::Playing);
        assert!(matches!(
            session.select_playback(PlaybackTarget::Reversed),
            Err(AudioError::InvalidState(_))
        ));

        session.stop_playback();

        assert_eq!(session.activity(), Activity::Idle);
        assert!(!sink.is_started());
        assert_eq!(log.playbacks.lock().len(), 1);
        session.select_playback(PlaybackTarget::Reversed).unwrap();
    }

    #[test]
    fn stop_calls_when_idle() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session_in(dir.path(), FakeSink::new());
        let log = DelegateLog::new();
        session.set_delegate(log.clone());

        session.stop_playback();
        assert!(matches!(session.stop_recording(), Err(AudioError::InvalidState(_))));

        assert_eq!(session.activity(), Activity::Idle);
        assert!(log.activities().is_empty());
        assert!(log.playbacks.lock().is_empty());
    }

    #[test]
    fn failed_playback_start_frees_gate() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session_in(dir.path(), FakeSink::new());
        fs::remove_file(&session.files().reversed).unwrap();
        session.select_playback(PlaybackTarget::Reversed).unwrap();

        assert!(matches!(session.start_playback(), Err(AudioError::FileAccess(_))));
        assert_eq!(session.activity(), Activity::Idle);
    }

    /// Plays the reversed file as soon as the reversal lands.
    struct AutoPlay {
        session: Mutex<Option<std::sync::Weak<Session<FakeCapture, FakeSink>>>>,
        started: Mutex<Vec<Result<(), AudioError>>>,
        ended: Mutex<usize>,
    }

    impl SessionDelegate for AutoPlay {
        fn on_activity_changed(&self, _activity: Activity) {}
        fn on_recording_finished(&self, _result: &Result<RecordingResult, AudioError>) {}
        fn on_playback_ended(&self, _result: &Result<PlaybackSummary, AudioError>) {
            *self.ended.lock() += 1;
        }
        fn on_reversal_finished(&self, _result: &Result<ReversalResult, AudioError>) {
            let session = self.session.lock().as_ref().and_then(|w| w.upgrade());
            if let Some(session) = session {
                self.started.lock().push(session.start_playback());
            }
        }
    }

    #[test]
    fn delegate_can_chain_reversal_into_playback() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FakeSink::new();
        let (session, _) = session_in(dir.path(), sink.clone());
        fs::write(&session.files().original, [1u8, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let session = Arc::new(session);
        let delegate = Arc::new(AutoPlay {
            session: Mutex::new(Some(Arc::downgrade(&session))),
            started: Mutex::new(Vec::new()),
            ended: Mutex::new(0),
        });
        session.set_delegate(delegate.clone());

        session.start_reversal().unwrap();
        wait_until(|| (*delegate.ended.lock() == 1).then_some(()));
        wait_idle(&session);

        assert_eq!(*delegate.started.lock(), vec![Ok(())]);
        assert_eq!(sink.written(), vec![5, 6, 7, 8, 1, 2, 3, 4]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn write_failure_while_recording_frees_gate() {
        let dir = tempfile::tempdir().unwrap();
        let files = AudioFiles {
            original: PathBuf::from("/dev/full"),
            reversed: dir.path().join("reversed_audio"),
        };
        let capture = FakeCapture::new();
        let session = Session::new(files, config(), capture.clone(), FakeSink::new()).unwrap();
        let log = DelegateLog::new();
        session.set_delegate(log.clone());

        session.start_recording().unwrap();
        capture.push(&vec![0u8; 16 * 1024]);

        let recordings = log.wait_for_recordings(1);
        assert!(matches!(recordings[0], Err(AudioError::FileAccess(_))));
        assert_eq!(session.activity(), Activity::Idle);
        assert_eq!(log.activities(), vec![Activity::Recording, Activity::Idle]);
        assert!(!capture.is_running());
        assert!(matches!(session.stop_recording(), Err(AudioError::InvalidState(_))));

        // The gate accepts the next activity.
        session.select_playback(PlaybackTarget::Reversed).unwrap();
        session.start_playback().unwrap();
        log.wait_for_playbacks(1);
        wait_idle(&session);
        assert_eq!(log.recordings.lock().len(), 1);
    }

    /// Lingers in the first end-of-playback callback, then stops whatever plays next.
    struct StopPlaybackLater {
        session: Mutex<Option<std::sync::Weak<Session<FakeCapture, FakeSink>>>>,
        ended: Mutex<usize>,
        stop_returned: AtomicBool,
    }

    impl SessionDelegate for StopPlaybackLater {
        fn on_activity_changed(&self, _activity: Activity) {}
        fn on_recording_finished(&self, _result: &Result<RecordingResult, AudioError>) {}
        fn on_playback_ended(&self, _result: &Result<PlaybackSummary, AudioError>) {
            let first = {
                let mut ended = self.ended.lock();
                *ended += 1;
                *ended == 1
            };
            if !first {
                return;
            }
            thread::sleep(Duration::from_millis(200));
            let session = self.session.lock().as_ref().and_then(|w| w.upgrade());
            if let Some(session) = session {
                session.stop_playback();
            }
            self.stop_returned.store(true, Ordering::SeqCst);
        }
        fn on_reversal_finished(&self, _result: &Result<ReversalResult, AudioError>) {}
    }

    #[test]
    fn delegate_may_stop_playback_while_foreground_restarts_it() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FakeSink::new().with_write_delay(Duration::from_millis(20));
        let (session, _) = session_in(dir.path(), sink.clone());
        fs::write(&session.files().original, vec![0u8; 400 * 20]).unwrap();
        let session = Arc::new(session);
        let delegate = Arc::new(StopPlaybackLater {
            session: Mutex::new(Some(Arc::downgrade(&session))),
            ended: Mutex::new(0),
            stop_returned: AtomicBool::new(false),
        });
        session.set_delegate(delegate.clone());

        session.start_playback().unwrap();
        wait_until(|| (*delegate.ended.lock() >= 1).then_some(()));

        let foreground = {
            let session = Arc::clone(&session);
            thread::spawn(move || session.start_playback())
        };

        wait_until(|| delegate.stop_returned.load(Ordering::SeqCst).then_some(()));
        assert!(foreground.join().unwrap().is_ok());
        wait_until(|| (*delegate.ended.lock() == 2).then_some(()));
        wait_idle(&session);

        assert_eq!(sink.start_count(), 2);
        assert!(!sink.is_started());
    }
}
