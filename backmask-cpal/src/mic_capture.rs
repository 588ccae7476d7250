//! cpal microphone capture provider.
//!
//! Opens the input device in its default format on a dedicated thread, which
//! owns the cpal stream for its whole life. Device samples are converted to
//! the session's `AudioConfig` before they reach the `PcmBufferCallback`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use parking_lot::Mutex;

use backmask_core::models::audio_models::{AudioDevice, DeviceKind};
use backmask_core::models::config::AudioConfig;
use backmask_core::models::error::AudioError;
use backmask_core::processing::format_converter::FormatConverter;
use backmask_core::processing::pcm;
use backmask_core::traits::capture_provider::{CaptureProvider, PcmBufferCallback};

use crate::device_enumerator::{describe_configured, DeviceEnumerator};

/// Microphone capture through cpal.
pub struct CpalMicCapture {
    device_name: Option<String>,
    running: Arc<AtomicBool>,
    capture_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl CpalMicCapture {
    /// Capture from the host's default input device.
    pub fn default_device() -> Self {
        Self {
            device_name: None,
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: Mutex::new(None),
        }
    }

    /// Capture from the input device with this cpal name.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: Mutex::new(None),
        }
    }
}

impl CaptureProvider for CpalMicCapture {
    fn is_available(&self) -> bool {
        DeviceEnumerator::new().find_input(self.device_name.as_deref()).is_some()
    }

    fn start(&mut self, config: &AudioConfig, callback: PcmBufferCallback) -> Result<(), AudioError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(AudioError::InvalidState("mic capture already running".into()));
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let device_name = self.device_name.clone();
        let config = *config;
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("cpal-mic-capture".into())
            .spawn(move || {
                let stream = match open_input(device_name.as_deref(), &config, callback) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                while running.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(10));
                }
                drop(stream);
                log::debug!("Mic stream closed");
            })
            .map_err(|e| AudioError::Thread(format!("failed to spawn mic thread: {}", e)))?;

        let opened = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(AudioError::DeviceUnavailable("mic thread exited before opening".into())));

        match opened {
            Ok(()) => {
                *self.capture_handle.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(e)
            }
        }
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.lock().take() {
            if handle.join().is_err() {
                return Err(AudioError::Thread("mic thread panicked".into()));
            }
        }
        Ok(())
    }

    fn device_info(&self) -> AudioDevice {
        describe_configured(self.device_name.as_deref(), DeviceKind::Input)
    }
}

impl Drop for CpalMicCapture {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("Failed to stop mic capture on drop: {}", e);
        }
    }
}

/// Open and start the input stream, converting to `config` on the way out.
fn open_input(
    device_name: Option<&str>,
    config: &AudioConfig,
    callback: PcmBufferCallback,
) -> Result<cpal::Stream, AudioError> {
    let device = DeviceEnumerator::new()
        .find_input(device_name)
        .ok_or_else(|| AudioError::DeviceUnavailable("no input device".into()))?;

    let supported = device
        .default_input_config()
        .map_err(|e| AudioError::DeviceUnavailable(format!("failed to get input config: {}", e)))?;
    let sample_format = supported.sample_format();
    let stream_config: cpal::StreamConfig = supported.config();
    let device_rate = stream_config.sample_rate.0;
    let device_channels = stream_config.channels;

    log::info!(
        "Mic opened: {} Hz, {} ch, {:?}; recording at {} Hz, {} ch, {}-bit",
        device_rate,
        device_channels,
        sample_format,
        config.sample_rate_hz(),
        config.channel_count(),
        config.bits_per_sample()
    );

    let mut converter = FormatConverter::new(
        device_rate,
        device_channels,
        config.sample_rate_hz(),
        config.channel_count(),
    );
    let format = config.sample_format();
    let deliver = move |samples: &[f32]| {
        let converted = converter.convert(samples);
        if !converted.is_empty() {
            callback(&pcm::encode(&converted, format));
        }
    };

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_input::<f32, _>(&device, &stream_config, deliver)?,
        cpal::SampleFormat::I16 => build_input::<i16, _>(&device, &stream_config, deliver)?,
        cpal::SampleFormat::U16 => build_input::<u16, _>(&device, &stream_config, deliver)?,
        other => {
            return Err(AudioError::DeviceUnavailable(format!(
                "unsupported input sample format: {:?}",
                other
            )))
        }
    };

    stream
        .play()
        .map_err(|e| AudioError::DeviceUnavailable(format!("failed to start input stream: {}", e)))?;
    Ok(stream)
}

fn build_input<T, D>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    mut deliver: D,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
    D: FnMut(&[f32]) + Send + 'static,
{
    device
        .build_input_stream(
            stream_config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                deliver(&to_f32(data));
            },
            |err| log::error!("Mic stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::DeviceUnavailable(format!("failed to build input stream: {}", e)))
}

/// Convert device samples of any cpal format to f32 in [-1, 1].
pub(crate) fn to_f32<T>(data: &[T]) -> Vec<f32>
where
    T: cpal::Sample,
    f32: cpal::FromSample<T>,
{
    data.iter().map(|&s| <f32 as cpal::Sample>::from_sample(s)).collect()
}
