//! PCM sample conversions shared by the capture and playback paths.
//!
//! Everything here is pure arithmetic over sample buffers: float/i16
//! conversion with clamping, little-endian byte packing, linear
//! resampling for device-rate adaptation, and RMS level for the meter.

/// Convert floating-point samples in [-1.0, 1.0] to signed 16-bit PCM.
/// Out-of-range input is clamped, never wrapped.
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect()
}

/// Convert signed 16-bit PCM samples to floating point in [-1.0, 1.0).
pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| f32::from(s) / 32768.0).collect()
}

/// Pack i16 samples as little-endian bytes.
pub fn i16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Unpack little-endian bytes into i16 samples. A trailing odd byte is
/// dropped.
pub fn le_bytes_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Duration in seconds of `sample_count` mono samples at `sample_rate`.
pub fn duration_secs(sample_count: usize, sample_rate: u32) -> f64 {
    sample_count as f64 / f64::from(sample_rate)
}

/// Root-mean-square level of a sample buffer, for the level meter.
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|&s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Linear-interpolation resampling of mono samples from `from_rate` to
/// `to_rate`. Returns the input unchanged when the rates match.
pub fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let output_len = (input.len() as f64 / ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_idx = i as f64 * ratio;
        let src_floor = src_idx.floor() as usize;
        let frac = (src_idx - src_floor as f64) as f32;

        let sample = if src_floor + 1 < input.len() {
            input[src_floor] * (1.0 - frac) + input[src_floor + 1] * frac
        } else if src_floor < input.len() {
            input[src_floor]
        } else {
            0.0
        };
        output.push(sample);
    }

    output
}

/// Average interleaved stereo down to mono. Passes mono through.
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = usize::from(channels);
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

// ── Tests ──────────────────────────────────────────────────────────
