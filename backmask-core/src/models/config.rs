use super::error::AudioError;

/// Linear PCM sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// Unsigned 8-bit, silence at 128.
    Pcm8,
    /// Signed 16-bit little-endian.
    Pcm16,
}

impl SampleFormat {
    pub fn from_bits(bits_per_sample: u16) -> Result<Self, AudioError> {
        match bits_per_sample {
            8 => Ok(Self::Pcm8),
            16 => Ok(Self::Pcm16),
            other => Err(AudioError::InvalidConfig(format!(
                "unsupported bit depth: {}",
                other
            ))),
        }
    }

    pub fn bits_per_sample(self) -> u16 {
        match self {
            Self::Pcm8 => 8,
            Self::Pcm16 => 16,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        self.bits_per_sample() as usize / 8
    }
}

/// Sampling parameters of a raw PCM stream.
///
/// Immutable once built. Recorder, player and reverser must share one value,
/// otherwise reversed audio plays back at the wrong speed or pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConfig {
    sample_rate_hz: u32,
    channel_count: u16,
    sample_format: SampleFormat,
    buffer_size_bytes: usize,
}

impl AudioConfig {
    pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 44_100;

    /// Milliseconds of audio per I/O buffer.
    const BUFFER_MILLIS: u32 = 100;

    pub fn new(sample_rate_hz: u32, channel_count: u16, bits_per_sample: u16) -> Result<Self, AudioError> {
        if sample_rate_hz == 0 {
            return Err(AudioError::InvalidConfig("sample rate must be positive".into()));
        }
        if ![1, 2].contains(&channel_count) {
            return Err(AudioError::InvalidConfig(format!(
                "unsupported channel count: {}",
                channel_count
            )));
        }
        let sample_format = SampleFormat::from_bits(bits_per_sample)?;

        Ok(Self::build(sample_rate_hz, channel_count, sample_format))
    }

    /// Application-wide default: 44.1 kHz, mono, 16-bit.
    pub fn default_config() -> Self {
        Self::build(Self::DEFAULT_SAMPLE_RATE_HZ, 1, SampleFormat::Pcm16)
    }

    /// Derive the buffer size from already-validated parameters.
    fn build(sample_rate_hz: u32, channel_count: u16, sample_format: SampleFormat) -> Self {
        let bytes_per_frame = channel_count as usize * sample_format.bytes_per_sample();
        let frames_per_buffer = (sample_rate_hz as usize * Self::BUFFER_MILLIS as usize / 1000).max(1);

        Self {
            sample_rate_hz,
            channel_count,
            sample_format,
            buffer_size_bytes: frames_per_buffer * bytes_per_frame,
        }
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.sample_format.bits_per_sample()
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.sample_format.bytes_per_sample()
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.channel_count as usize * self.bytes_per_sample()
    }

    /// I/O buffer size; always a whole number of frames.
    pub fn buffer_size_bytes(&self) -> usize {
        self.buffer_size_bytes
    }

    /// Number of whole frames in `byte_len` bytes.
    pub fn frames_in(&self, byte_len: u64) -> u64 {
        byte_len / self.bytes_per_frame() as u64
    }

    /// Playback duration of `byte_len` bytes of PCM.
    pub fn duration_secs(&self, byte_len: u64) -> f64 {
        self.frames_in(byte_len) as f64 / self.sample_rate_hz as f64
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self::default_config()
    }
}
