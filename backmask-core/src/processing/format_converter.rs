/// Channel remapping and sample-rate conversion between a device's native
/// format and the session's `AudioConfig`.
///
/// All operations work on interleaved `&[f32]` buffers with no platform
/// dependencies. Resampling is linear interpolation, which is adequate for
/// voice clips. Converters are stateful: feed one stream through one
/// converter, buffer after buffer.
#[derive(Debug, Clone)]
pub struct FormatConverter {
    source_channels: u16,
    target_channels: u16,
    resampler: Resampler,
}

impl FormatConverter {
    pub fn new(source_rate: u32, source_channels: u16, target_rate: u32, target_channels: u16) -> Self {
        Self {
            source_channels,
            target_channels,
            resampler: Resampler::new(
                source_channels.min(target_channels) as usize,
                source_rate,
                target_rate,
            ),
        }
    }

    /// Convert the next buffer of the stream.
    ///
    /// Resampling runs at the smaller channel count: downmixes remap first,
    /// upmixes resample first.
    pub fn convert(&mut self, samples: &[f32]) -> Vec<f32> {
        let from = self.source_channels as usize;
        let to = self.target_channels as usize;
        if to < from {
            let remapped = remap_channels(samples, from, to);
            self.resampler.process(&remapped)
        } else {
            let resampled = self.resampler.process(samples);
            remap_channels(&resampled, from, to)
        }
    }

    /// Forget the carried stream position, ready for an unrelated stream.
    pub fn reset(&mut self) {
        self.resampler.reset();
    }
}

/// Map interleaved audio from `from` to `to` channels.
///
/// Mono fans out to every output channel, anything folds to mono by averaging
/// each frame, and other layouts copy the shared channels and leave the rest silent.
pub fn remap_channels(samples: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }

    let frame_count = samples.len() / from;
    let mut output = Vec::with_capacity(frame_count * to);

    for frame in samples.chunks_exact(from) {
        if from == 1 {
            output.extend(std::iter::repeat(frame[0]).take(to));
        } else if to == 1 {
            let sum: f32 = frame.iter().sum();
            output.push(sum / from as f32);
        } else {
            for ch in 0..to {
                output.push(frame.get(ch).copied().unwrap_or(0.0));
            }
        }
    }
    output
}

/// Streaming linear-interpolation resampler for interleaved audio.
///
/// The read position is kept as an exact rational (units of `1 / target_rate`
/// source frames) and the last input frame is carried into the next call, so
/// a stream split into buffers yields the same frames as the whole stream
/// converted at once. Each output frame interpolates between two input frames,
/// which delays the stream by at most one input frame.
#[derive(Debug, Clone)]
pub struct Resampler {
    channels: usize,
    source_rate: u64,
    target_rate: u64,
    /// Position of the next output frame, relative to the first frame of `carry`.
    position: u64,
    carry: Vec<f32>,
}

impl Resampler {
    pub fn new(channels: usize, source_rate: u32, target_rate: u32) -> Self {
        Self {
            channels,
            source_rate: source_rate as u64,
            target_rate: target_rate as u64,
            position: 0,
            carry: Vec::new(),
        }
    }

    /// True when buffers pass through untouched.
    pub fn is_passthrough(&self) -> bool {
        self.source_rate == self.target_rate || self.channels == 0 || self.source_rate == 0 || self.target_rate == 0
    }

    /// Resample the next buffer. A trailing partial frame is ignored.
    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        if self.is_passthrough() {
            return samples.to_vec();
        }

        let channels = self.channels;
        let whole = samples.len() / channels * channels;
        if whole == 0 {
            return Vec::new();
        }

        let mut frames = Vec::with_capacity(self.carry.len() + whole);
        frames.extend_from_slice(&self.carry);
        frames.extend_from_slice(&samples[..whole]);
        let frame_count = frames.len() / channels;
        let end = (frame_count as u64 - 1) * self.target_rate;

        let estimate = (end.saturating_sub(self.position) / self.source_rate + 1) as usize;
        let mut output = Vec::with_capacity(estimate * channels);
        while self.position < end {
            let index = (self.position / self.target_rate) as usize;
            let fraction = ((self.position % self.target_rate) as f64 / self.target_rate as f64) as f32;
            let current = &frames[index * channels..(index + 1) * channels];
            let next = &frames[(index + 1) * channels..(index + 2) * channels];
            output.extend(current.iter().zip(next).map(|(&a, &b)| a + (b - a) * fraction));
            self.position += self.source_rate;
        }

        self.position -= end;
        self.carry.clear();
        self.carry.extend_from_slice(&frames[(frame_count - 1) * channels..]);
        output
    }

    pub fn reset(&mut self) {
        self.position = 0;
        self.carry.clear();
    }
}
