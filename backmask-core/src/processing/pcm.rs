//! Conversion between normalized `f32` samples and raw PCM bytes.

use crate::models::config::SampleFormat;

/// Encode `[-1.0, 1.0]` samples as PCM bytes. Out-of-range values are clamped.
///
/// 16-bit output is little-endian; 8-bit output is unsigned with silence at 128.
pub fn encode(samples: &[f32], format: SampleFormat) -> Vec<u8> {
    match format {
        SampleFormat::Pcm16 => {
            let mut data = Vec::with_capacity(samples.len() * 2);
            for &sample in samples {
                let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                data.extend_from_slice(&value.to_le_bytes());
            }
            data
        }
        SampleFormat::Pcm8 => samples
            .iter()
            .map(|&sample| (sample.clamp(-1.0, 1.0) * 127.0 + 128.0).round() as u8)
            .collect(),
    }
}

/// Decode PCM bytes to `[-1.0, 1.0]` samples. A trailing partial sample is ignored.
pub fn decode(data: &[u8], format: SampleFormat) -> Vec<f32> {
    match format {
        SampleFormat::Pcm16 => data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / i16::MAX as f32)
            .collect(),
        SampleFormat::Pcm8 => data.iter().map(|&b| (b as f32 - 128.0) / 127.0).collect(),
    }
}
