use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::models::config::AudioConfig;
use crate::models::error::AudioError;
use crate::models::results::ReversalResult;
use crate::storage::pcm_writer::PcmFileWriter;
use crate::traits::listeners::ReversalListener;

use super::worker::join_worker;

/// Writes a frame-order-reversed copy of a raw PCM file on a background thread.
///
/// Only the order of frames changes; the bytes inside each frame are copied
/// as-is, so multi-byte and multi-channel samples survive intact. The source
/// is never written to.
///
/// Raw PCM has no header, so a wrong `AudioConfig` is only visible when the
/// file length is not a whole number of frames. By default that trailing
/// partial frame is dropped with a warning; with `strict_alignment(true)` the
/// job fails with `ConfigMismatch` instead. An aligned file reversed with the
/// wrong frame size cannot be detected.
///
/// There is no cancellation: a started job runs to completion or failure,
/// and dropping the `Reverser` waits for it.
pub struct Reverser {
    listener: Option<Arc<dyn ReversalListener>>,
    strict_alignment: bool,
    jobs: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl Reverser {
    pub fn new() -> Self {
        Self {
            listener: None,
            strict_alignment: false,
            jobs: Mutex::new(Vec::new()),
        }
    }

    /// Fail misaligned sources with `ConfigMismatch` instead of truncating them.
    pub fn strict_alignment(mut self, strict: bool) -> Self {
        self.strict_alignment = strict;
        self
    }

    pub fn set_listener(&mut self, listener: Arc<dyn ReversalListener>) {
        self.listener = Some(listener);
    }

    /// Start reversing `source` into `destination` and return immediately.
    ///
    /// The listener is notified exactly once with the outcome. Only a failure
    /// to spawn the job thread is returned here, and then no notification fires.
    pub fn reverse(&self, source: &Path, destination: &Path, config: &AudioConfig) -> Result<(), AudioError> {
        let source = source.to_path_buf();
        let destination = destination.to_path_buf();
        let config = *config;
        let strict = self.strict_alignment;
        let listener = self.listener.clone();

        let handle = thread::Builder::new()
            .name("pcm-reverser".into())
            .spawn(move || {
                let result = reverse_file(&source, &destination, &config, strict);
                match &result {
                    Ok(r) => log::info!(
                        "Reversed {} frames from {} into {}",
                        r.frames_written,
                        r.source.display(),
                        r.destination.display()
                    ),
                    Err(e) => log::error!("Reversal of {} failed: {}", source.display(), e),
                }
                if let Some(ref l) = listener {
                    l.on_reversal_finished(&result);
                }
            })
            .map_err(|e| AudioError::Thread(format!("failed to spawn reverser thread: {}", e)))?;

        let mut jobs = self.jobs.lock();
        jobs.retain(|job| !job.is_finished());
        jobs.push(handle);
        Ok(())
    }

    /// Whether a job is still running.
    pub fn is_busy(&self) -> bool {
        self.jobs.lock().iter().any(|job| !job.is_finished())
    }

    /// Block until every started job has finished.
    pub fn wait(&self) {
        let jobs: Vec<_> = self.jobs.lock().drain(..).collect();
        for job in jobs {
            if !join_worker(job) {
                log::error!("Reverser thread panicked");
            }
        }
    }
}

impl Default for Reverser {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Reverser {
    fn drop(&mut self) {
        self.wait();
    }
}

/// Reverse `source` into `destination` synchronously.
///
/// Walks the source from its end in chunks of `config.buffer_size_bytes()`,
/// so memory use stays bounded regardless of file length.
pub fn reverse_file(
    source: &Path,
    destination: &Path,
    config: &AudioConfig,
    strict_alignment: bool,
) -> Result<ReversalResult, AudioError> {
    if same_file(source, destination) {
        return Err(AudioError::FileAccess(format!(
            "source and destination are the same file: {}",
            source.display()
        )));
    }

    let mut input = File::open(source)
        .map_err(|e| AudioError::FileAccess(format!("failed to open {}: {}", source.display(), e)))?;
    let len = input
        .metadata()
        .map_err(|e| AudioError::FileAccess(format!("failed to stat {}: {}", source.display(), e)))?
        .len();

    let frame_size = config.bytes_per_frame();
    let dropped_bytes = len % frame_size as u64;
    if dropped_bytes != 0 {
        let message = format!(
            "{} is {} bytes, not a multiple of the {}-byte frame size",
            source.display(),
            len,
            frame_size
        );
        if strict_alignment {
            return Err(AudioError::ConfigMismatch(message));
        }
        log::warn!("{}; dropping {} trailing bytes", message, dropped_bytes);
    }
    let usable = len - dropped_bytes;

    let mut writer = PcmFileWriter::new(destination.to_path_buf());
    writer.open()?;

    let chunk_len = (config.buffer_size_bytes() / frame_size).max(1) * frame_size;
    let mut chunk = vec![0u8; chunk_len];
    let mut reversed = Vec::with_capacity(chunk_len);

    let mut end = usable;
    while end > 0 {
        let start = end.saturating_sub(chunk_len as u64);
        let buf = &mut chunk[..(end - start) as usize];

        input
            .seek(SeekFrom::Start(start))
            .map_err(|e| AudioError::FileAccess(format!("seek failed: {}", e)))?;
        input
            .read_exact(buf)
            .map_err(|e| AudioError::FileAccess(format!("read failed: {}", e)))?;

        reversed.clear();
        reverse_frames_into(buf, frame_size, &mut reversed);
        writer.write(&reversed)?;

        end = start;
    }

    let frames_written = writer.bytes_written() / frame_size as u64;
    let checksum = writer.close()?;

    Ok(ReversalResult {
        source: source.to_path_buf(),
        destination: destination.to_path_buf(),
        frames_written,
        dropped_bytes,
        checksum,
    })
}

/// Reverse the order of `bytes_per_frame`-sized frames in `data`.
///
/// Frame contents are unchanged; a trailing partial frame is dropped.
pub fn reverse_frames(data: &[u8], bytes_per_frame: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    reverse_frames_into(data, bytes_per_frame, &mut out);
    out
}

fn reverse_frames_into(data: &[u8], bytes_per_frame: usize, out: &mut Vec<u8>) {
    for frame in data.chunks_exact(bytes_per_frame).rev() {
        out.extend_from_slice(frame);
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
