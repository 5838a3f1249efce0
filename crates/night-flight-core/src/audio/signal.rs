//! Kick-band energy extraction from a frequency snapshot.
//!
//! Snapshots follow the analyser convention: `fft_size / 2` bins of
//! byte magnitudes (0-255) spanning 0 Hz to Nyquist.

/// A live frequency-domain view of the audio being played.
///
/// Reads are non-blocking: if no new audio arrived since the last frame the
/// source hands back the previous snapshot. Before audio starts the
/// snapshot may be empty.
pub trait FrequencySource {
    /// Latest magnitude snapshot, one byte per bin
    fn frequency_snapshot(&self) -> &[u8];
    /// Sample rate of the stream behind the snapshot (Hz)
    fn sample_rate(&self) -> f32;
}

/// Mean magnitude over `[low_hz, high_hz]`.
///
/// The bin range is derived from the sample rate on every call since it
/// changes when the audio source changes. Returns 0 for an empty snapshot.
pub fn band_energy(snapshot: &[u8], sample_rate: f32, low_hz: f32, high_hz: f32) -> f32 {
    if snapshot.is_empty() || sample_rate <= 0.0 {
        return 0.0;
    }

    let fft_size = (snapshot.len() * 2) as f32;
    let last = snapshot.len() - 1;
    let start = ((low_hz.max(0.0) * fft_size / sample_rate).floor() as usize).min(last);
    let end = ((high_hz.max(0.0) * fft_size / sample_rate).floor() as usize).clamp(start, last);

    let sum: u32 = snapshot[start..=end].iter().map(|&m| m as u32).sum();
    sum as f32 / (end - start + 1) as f32
}

/// Fixed snapshot, handy for tests and for running without an audio device
#[derive(Debug, Clone, Default)]
pub struct StaticSnapshot {
    pub bins: Vec<u8>,
    pub sample_rate: f32,
}

impl FrequencySource for StaticSnapshot {
    fn frequency_snapshot(&self) -> &[u8] {
        &self.bins
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}
