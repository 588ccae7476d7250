//! cpal speaker playback sink.
//!
//! The output stream lives on a dedicated thread and pulls f32 samples from a
//! ring buffer; `write` converts session PCM to the device format and blocks
//! until the ring has room. An empty ring plays silence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, StreamTrait};
use parking_lot::Mutex;

use backmask_core::models::audio_models::{AudioDevice, DeviceKind};
use backmask_core::models::config::AudioConfig;
use backmask_core::models::error::AudioError;
use backmask_core::processing::format_converter::FormatConverter;
use backmask_core::processing::pcm;
use backmask_core::processing::ring_buffer::RingBuffer;
use backmask_core::traits::playback_sink::PlaybackSink;

use crate::device_enumerator::{describe_configured, DeviceEnumerator};

/// Seconds of device audio the ring holds.
const QUEUE_SECONDS: usize = 1;

/// How long `write`/`drain` wait without progress before declaring the device stalled.
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Tail allowance for audio already handed to the device when the ring empties.
const DEVICE_LATENCY: Duration = Duration::from_millis(100);

type SampleQueue = Arc<Mutex<RingBuffer<f32>>>;

/// The open device stream: session format plus the converter feeding it.
#[derive(Debug)]
struct OpenStream {
    config: AudioConfig,
    converter: FormatConverter,
}

/// Speaker output through cpal.
pub struct CpalSpeakerOutput {
    device_name: Option<String>,
    queue: SampleQueue,
    running: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    stream_handle: Option<thread::JoinHandle<()>>,
    open: Option<OpenStream>,
}

impl CpalSpeakerOutput {
    /// Play through the host's default output device.
    pub fn default_device() -> Self {
        Self::build(None)
    }

    /// Play through the output device with this cpal name.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self::build(Some(name.into()))
    }

    fn build(device_name: Option<String>) -> Self {
        Self {
            device_name,
            queue: Arc::new(Mutex::new(RingBuffer::new(1))),
            running: Arc::new(AtomicBool::new(false)),
            failed: Arc::new(AtomicBool::new(false)),
            stream_handle: None,
            open: None,
        }
    }

    fn open_stream(&mut self) -> Result<&mut OpenStream, AudioError> {
        self.open
            .as_mut()
            .ok_or_else(|| AudioError::InvalidState("speaker output not started".into()))
    }

    fn check_device(&self) -> Result<(), AudioError> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(AudioError::DeviceUnavailable("output stream failed".into()));
        }
        Ok(())
    }
}

impl PlaybackSink for CpalSpeakerOutput {
    fn is_available(&self) -> bool {
        DeviceEnumerator::new().find_output(self.device_name.as_deref()).is_some()
    }

    fn start(&mut self, config: &AudioConfig) -> Result<(), AudioError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(AudioError::InvalidState("speaker output already running".into()));
        }

        self.failed.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let failed = Arc::clone(&self.failed);
        let queue = Arc::clone(&self.queue);
        let device_name = self.device_name.clone();
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("cpal-speaker-output".into())
            .spawn(move || {
                let (stream, format) = match open_output(device_name.as_deref(), queue, failed) {
                    Ok(opened) => opened,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(format));

                while running.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(10));
                }
                drop(stream);
                log::debug!("Speaker stream closed");
            })
            .map_err(|e| AudioError::Thread(format!("failed to spawn speaker thread: {}", e)))?;

        let opened = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(AudioError::DeviceUnavailable("speaker thread exited before opening".into())));

        match opened {
            Ok((device_rate, device_channels)) => {
                self.stream_handle = Some(handle);
                self.open = Some(OpenStream {
                    config: *config,
                    converter: FormatConverter::new(
                        config.sample_rate_hz(),
                        config.channel_count(),
                        device_rate,
                        device_channels,
                    ),
                });
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(e)
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), AudioError> {
        let open = self.open_stream()?;
        let samples = pcm::decode(data, open.config.sample_format());
        let device_samples = open.converter.convert(&samples);

        let mut offset = 0;
        let mut last_progress = Instant::now();
        while offset < device_samples.len() {
            self.check_device()?;
            let accepted = enqueue(&self.queue, &device_samples[offset..]);
            if accepted > 0 {
                offset += accepted;
                last_progress = Instant::now();
            } else if last_progress.elapsed() > STALL_TIMEOUT {
                return Err(AudioError::DeviceUnavailable("output device stopped consuming audio".into()));
            } else {
                thread::sleep(Duration::from_millis(5));
            }
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<(), AudioError> {
        self.open_stream()?;
        let mut last_count = self.queue.lock().count();
        let mut last_progress = Instant::now();
        while last_count > 0 {
            self.check_device()?;
            thread::sleep(Duration::from_millis(5));
            let count = self.queue.lock().count();
            if count < last_count {
                last_progress = Instant::now();
            } else if last_progress.elapsed() > STALL_TIMEOUT {
                return Err(AudioError::DeviceUnavailable("output device stopped consuming audio".into()));
            }
            last_count = count;
        }
        thread::sleep(DEVICE_LATENCY);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::SeqCst);
        self.open = None;
        let joined = match self.stream_handle.take() {
            Some(handle) => handle.join().map_err(|_| AudioError::Thread("speaker thread panicked".into())),
            None => Ok(()),
        };
        self.queue.lock().reset();
        joined
    }

    fn device_info(&self) -> AudioDevice {
        describe_configured(self.device_name.as_deref(), DeviceKind::Output)
    }
}

impl Drop for CpalSpeakerOutput {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("Failed to stop speaker output on drop: {}", e);
        }
    }
}

/// Open and start the output stream; returns it with the device rate and channel count.
fn open_output(
    device_name: Option<&str>,
    queue: SampleQueue,
    failed: Arc<AtomicBool>,
) -> Result<(cpal::Stream, (u32, u16)), AudioError> {
    let device = DeviceEnumerator::new()
        .find_output(device_name)
        .ok_or_else(|| AudioError::DeviceUnavailable("no output device".into()))?;

    let supported = device
        .default_output_config()
        .map_err(|e| AudioError::DeviceUnavailable(format!("failed to get output config: {}", e)))?;
    let sample_format = supported.sample_format();
    let stream_config: cpal::StreamConfig = supported.config();
    let device_rate = stream_config.sample_rate.0;
    let device_channels = stream_config.channels;

    *queue.lock() = RingBuffer::new(device_rate as usize * device_channels as usize * QUEUE_SECONDS);

    log::info!(
        "Speaker opened: {} Hz, {} ch, {:?}",
        device_rate,
        device_channels,
        sample_format
    );

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_output::<f32>(&device, &stream_config, queue, failed)?,
        cpal::SampleFormat::I16 => build_output::<i16>(&device, &stream_config, queue, failed)?,
        cpal::SampleFormat::U16 => build_output::<u16>(&device, &stream_config, queue, failed)?,
        other => {
            return Err(AudioError::DeviceUnavailable(format!(
                "unsupported output sample format: {:?}",
                other
            )))
        }
    };

    stream
        .play()
        .map_err(|e| AudioError::DeviceUnavailable(format!("failed to start output stream: {}", e)))?;
    Ok((stream, (device_rate, device_channels)))
}

fn build_output<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    queue: SampleQueue,
    failed: Arc<AtomicBool>,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
{
    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_output_stream(
            stream_config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                fill_output(data, &queue, &mut scratch);
            },
            move |err| {
                log::error!("Speaker stream error: {}", err);
                failed.store(true, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| AudioError::DeviceUnavailable(format!("failed to build output stream: {}", e)))
}

/// Push as many samples as fit; returns how many were accepted.
fn enqueue(queue: &Mutex<RingBuffer<f32>>, samples: &[f32]) -> usize {
    let mut queue = queue.lock();
    let take = queue.free().min(samples.len());
    if take > 0 {
        queue.write(&samples[..take]);
    }
    take
}

/// Fill a device buffer from the queue, padding with silence on underrun.
pub(crate) fn fill_output<T>(data: &mut [T], queue: &Mutex<RingBuffer<f32>>, scratch: &mut Vec<f32>)
where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    scratch.clear();
    scratch.resize(data.len(), 0.0);
    queue.lock().read_into(scratch);
    for (out, &sample) in data.iter_mut().zip(scratch.iter()) {
        *out = T::from_sample(sample);
    }
}
