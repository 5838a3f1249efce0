//! FFT analysis producing byte-scaled magnitude snapshots.
//!
//! Each frame the latest samples are Blackman-windowed and transformed;
//! per-bin magnitudes are smoothed over time, converted to dB and mapped
//! from [`MIN_DB`, `MAX_DB`] onto 0-255. The result is what the beat
//! classifier reads through `FrequencySource`.

use night_flight_core::FrequencySource;
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// At 44.1kHz this gives ~21.5 Hz bins, four to five of them in the kick band
pub const FFT_SIZE: usize = 2048;
const SMOOTHING: f32 = 0.8;
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    fft_buffer: Vec<Complex<f32>>,
    fft_window: Vec<f32>,
    smoothed: Vec<f32>,
    bytes: Vec<u8>,
    sample_rate: f32,
}

impl SpectrumAnalyzer {
    pub fn new(sample_rate: f32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);

        let n = FFT_SIZE as f32;
        let fft_window: Vec<f32> = (0..FFT_SIZE)
            .map(|i| {
                let x = i as f32 / n;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();

        Self {
            fft,
            fft_buffer: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            fft_window,
            smoothed: vec![0.0; FFT_SIZE / 2],
            bytes: vec![0; FFT_SIZE / 2],
            sample_rate,
        }
    }

    /// Track the capture device's rate; bin frequencies depend on it
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    /// Analyze the newest samples. Call once per frame.
    pub fn analyze(&mut self, samples: &[f32]) {
        // Newest FFT_SIZE samples, zero padded at the front when short
        let take = samples.len().min(FFT_SIZE);
        let offset = FFT_SIZE - take;
        let recent = &samples[samples.len() - take..];

        for i in 0..FFT_SIZE {
            let s = if i >= offset { recent[i - offset] } else { 0.0 };
            self.fft_buffer[i] = Complex::new(s * self.fft_window[i], 0.0);
        }

        self.fft.process(&mut self.fft_buffer);

        let scale = 1.0 / FFT_SIZE as f32;
        for (bin, (smoothed, byte)) in self.smoothed.iter_mut().zip(self.bytes.iter_mut()).enumerate() {
            let magnitude = self.fft_buffer[bin].norm() * scale;
            *smoothed = SMOOTHING * *smoothed + (1.0 - SMOOTHING) * magnitude;

            let db = 20.0 * (*smoothed + 1e-12).log10();
            let t = (db - MIN_DB) / (MAX_DB - MIN_DB);
            *byte = (t * 255.0).clamp(0.0, 255.0) as u8;
        }
    }

    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|s| *s = 0.0);
        self.bytes.iter_mut().for_each(|b| *b = 0);
    }
}

impl FrequencySource for SpectrumAnalyzer {
    fn frequency_snapshot(&self) -> &[u8] {
        &self.bytes
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}
