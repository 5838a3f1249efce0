//! Real-time beat classification from kick-band energy.
//!
//! Each frame one energy sample enters two rolling windows:
//! - a short (~0.7s) window that baselines ordinary beats and heavy shifts
//! - a long (~2s) window that baselines transitions
//!
//! Three independent checks then run, each with its own debounce timer:
//! 1. Heavy shift: a spike well above the short mean, preceded by quiet
//! 2. Transition: the last half second departs sharply from the long mean
//!    (drop/build-up above, breakdown below)
//! 3. Beat: energy clearly above the short mean
//!
//! Quiet input never fires anything: every check requires its window mean
//! to clear a floor first.

use serde::{Deserialize, Serialize};

use super::signal::{band_energy, FrequencySource};
use super::window::RollingWindow;
use crate::events::{BeatKind, EventEmitter, FrameEvents, SubscriptionId};

/// Calibration for the beat classifier.
///
/// Thresholds are multiples of the relevant window mean; debounces are in
/// milliseconds of the timestamps passed to `update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Lower edge of the analysed band (Hz)
    pub band_low_hz: f32,
    /// Upper edge of the analysed band (Hz)
    pub band_high_hz: f32,
    /// Short window capacity in frames
    pub short_window: usize,
    /// Long window capacity in frames
    pub long_window: usize,

    /// Beat fires when energy exceeds this multiple of the short mean
    pub beat_threshold: f32,
    pub beat_debounce_ms: f64,
    /// Short-window mean below this suppresses beats and heavy shifts
    pub min_short_mean: f32,

    /// Heavy shift fires when energy exceeds this multiple of the short mean
    pub heavy_threshold: f32,
    pub heavy_debounce_ms: f64,
    /// Frames immediately before the spike that must be quiet
    pub pre_silence_frames: usize,
    /// "Quiet" means the pre-spike mean is below this fraction of the short mean
    pub pre_silence_ratio: f32,

    pub transition_debounce_ms: f64,
    /// Long-window mean below this suppresses transitions
    pub min_long_mean: f32,
    /// Recent frames compared against the long mean
    pub transition_recent_frames: usize,
    /// recent/long ratio above this is a drop or build-up
    pub transition_spike_ratio: f32,
    /// recent/long ratio below this is a breakdown
    pub transition_dip_ratio: f32,
    /// Transitions weaker than this are ignored
    pub min_transition_intensity: f32,

    /// Per-frame decay of the current beat intensity
    pub intensity_decay: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            band_low_hz: 60.0,
            band_high_hz: 150.0,
            short_window: 43,
            long_window: 120,
            beat_threshold: 1.5,
            beat_debounce_ms: 100.0,
            min_short_mean: 10.0,
            heavy_threshold: 2.5,
            heavy_debounce_ms: 2000.0,
            pre_silence_frames: 12,
            pre_silence_ratio: 0.5,
            transition_debounce_ms: 8000.0,
            min_long_mean: 15.0,
            transition_recent_frames: 30,
            transition_spike_ratio: 2.0,
            transition_dip_ratio: 0.5,
            min_transition_intensity: 0.2,
            intensity_decay: 0.05,
        }
    }
}

fn clamp01(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Classifies each frame's kick energy into beats, transitions and heavy shifts
pub struct BeatClassifier {
    config: ClassifierConfig,
    short: RollingWindow,
    long: RollingWindow,
    last_beat_ms: Option<f64>,
    last_transition_ms: Option<f64>,
    last_heavy_ms: Option<f64>,
    /// 1.0-ish on a beat, decays toward 0 between beats
    beat_intensity: f32,
    last_energy: f32,
    beat_listeners: EventEmitter<f32>,
    transition_listeners: EventEmitter<f32>,
    heavy_listeners: EventEmitter<f32>,
}

impl Default for BeatClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl BeatClassifier {
    pub fn new() -> Self {
        Self::with_config(ClassifierConfig::default())
    }

    pub fn with_config(config: ClassifierConfig) -> Self {
        Self {
            short: RollingWindow::new(config.short_window),
            long: RollingWindow::new(config.long_window),
            config,
            last_beat_ms: None,
            last_transition_ms: None,
            last_heavy_ms: None,
            beat_intensity: 0.0,
            last_energy: 0.0,
            beat_listeners: EventEmitter::new(),
            transition_listeners: EventEmitter::new(),
            heavy_listeners: EventEmitter::new(),
        }
    }

    /// Subscribe to ordinary beats. The listener receives the intensity.
    pub fn on_beat<F: FnMut(&f32) + 'static>(&mut self, listener: F) -> SubscriptionId {
        self.beat_listeners.subscribe(listener)
    }

    /// Subscribe to transitions (drops, build-ups, breakdowns)
    pub fn on_transition<F: FnMut(&f32) + 'static>(&mut self, listener: F) -> SubscriptionId {
        self.transition_listeners.subscribe(listener)
    }

    /// Subscribe to heavy beat shifts
    pub fn on_heavy_beat_shift<F: FnMut(&f32) + 'static>(&mut self, listener: F) -> SubscriptionId {
        self.heavy_listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, kind: BeatKind, id: SubscriptionId) -> bool {
        match kind {
            BeatKind::Beat => self.beat_listeners.unsubscribe(id),
            BeatKind::Transition => self.transition_listeners.unsubscribe(id),
            BeatKind::HeavyShift => self.heavy_listeners.unsubscribe(id),
        }
    }

    /// Read the latest snapshot from `source` and classify it. Call once per frame.
    ///
    /// `now_ms` is a monotonic timestamp in milliseconds.
    pub fn update(&mut self, source: &dyn FrequencySource, now_ms: f64) -> FrameEvents {
        let energy = band_energy(
            source.frequency_snapshot(),
            source.sample_rate(),
            self.config.band_low_hz,
            self.config.band_high_hz,
        );
        self.process_energy(energy, now_ms)
    }

    /// Classify one pre-computed energy sample
    pub fn process_energy(&mut self, energy: f32, now_ms: f64) -> FrameEvents {
        let energy = energy.max(0.0);
        self.last_energy = energy;
        self.short.push(energy);
        self.long.push(energy);

        let events = FrameEvents {
            heavy_shift: self.check_heavy_shift(energy, now_ms),
            transition: self.check_transition(now_ms),
            beat: self.check_beat(energy, now_ms),
        };

        if let Some(intensity) = events.heavy_shift {
            log::debug!("heavy beat shift: energy {:.1}, intensity {:.2}", energy, intensity);
            self.heavy_listeners.emit(&intensity);
        }
        if let Some(intensity) = events.transition {
            log::debug!("transition: intensity {:.2}", intensity);
            self.transition_listeners.emit(&intensity);
        }
        if let Some(intensity) = events.beat {
            self.beat_listeners.emit(&intensity);
        }

        events
    }

    fn debounced(last: Option<f64>, now_ms: f64, debounce_ms: f64) -> bool {
        match last {
            Some(t) => now_ms - t < debounce_ms,
            None => false,
        }
    }

    fn check_heavy_shift(&mut self, energy: f32, now_ms: f64) -> Option<f32> {
        let cfg = &self.config;
        if self.short.len() < cfg.pre_silence_frames + 5 {
            return None;
        }

        let mean = self.short.mean();
        if mean < cfg.min_short_mean || mean <= 0.0 {
            return None;
        }
        if Self::debounced(self.last_heavy_ms, now_ms, cfg.heavy_debounce_ms) {
            return None;
        }

        let threshold = mean * cfg.heavy_threshold;
        if energy <= threshold {
            return None;
        }

        // The frames right before the spike, excluding the spike itself
        let pre_mean = self.short.mean_of_recent(cfg.pre_silence_frames, 1)?;
        if pre_mean >= mean * cfg.pre_silence_ratio {
            return None;
        }

        self.last_heavy_ms = Some(now_ms);
        Some(clamp01((energy / threshold - 1.0) * 2.0))
    }

    fn check_transition(&mut self, now_ms: f64) -> Option<f32> {
        let cfg = &self.config;
        if !self.long.is_full() {
            return None;
        }
        if Self::debounced(self.last_transition_ms, now_ms, cfg.transition_debounce_ms) {
            return None;
        }

        let mean = self.long.mean();
        if mean < cfg.min_long_mean || mean <= 0.0 {
            return None;
        }

        let recent = self.long.mean_of_recent(cfg.transition_recent_frames, 0)?;
        let ratio = recent / mean;

        let intensity = if ratio > cfg.transition_spike_ratio {
            clamp01((ratio - cfg.transition_spike_ratio) / cfg.transition_spike_ratio)
        } else if ratio < cfg.transition_dip_ratio {
            if ratio <= f32::EPSILON {
                1.0
            } else {
                let inverse_floor = 1.0 / cfg.transition_dip_ratio;
                clamp01((1.0 / ratio - inverse_floor) / inverse_floor)
            }
        } else {
            return None;
        };

        if intensity <= cfg.min_transition_intensity {
            return None;
        }

        self.last_transition_ms = Some(now_ms);
        Some(intensity)
    }

    fn check_beat(&mut self, energy: f32, now_ms: f64) -> Option<f32> {
        let fired = self.beat_trigger(energy, now_ms);
        match fired {
            Some(intensity) => {
                self.last_beat_ms = Some(now_ms);
                self.beat_intensity = intensity;
            }
            None => {
                self.beat_intensity = (self.beat_intensity - self.config.intensity_decay).max(0.0);
            }
        }
        fired
    }

    fn beat_trigger(&self, energy: f32, now_ms: f64) -> Option<f32> {
        let cfg = &self.config;
        // At least half full
        if self.short.len() * 2 < self.short.capacity() {
            return None;
        }

        let mean = self.short.mean();
        if mean < cfg.min_short_mean || mean <= 0.0 {
            return None;
        }
        if Self::debounced(self.last_beat_ms, now_ms, cfg.beat_debounce_ms) {
            return None;
        }

        let threshold = mean * cfg.beat_threshold;
        if energy <= threshold {
            return None;
        }
        Some(clamp01((energy / threshold - 1.0) * 2.0))
    }

    /// Intensity of the most recent beat, decaying toward 0 between beats
    pub fn beat_intensity(&self) -> f32 {
        self.beat_intensity
    }

    /// Energy of the last processed frame
    pub fn last_energy(&self) -> f32 {
        self.last_energy
    }

    pub fn short_mean(&self) -> f32 {
        self.short.mean()
    }

    pub fn long_mean(&self) -> f32 {
        self.long.mean()
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Forget all history and debounce timers (e.g. after switching audio source).
    /// Subscribers are kept.
    pub fn reset(&mut self) {
        self.short = RollingWindow::new(self.config.short_window);
        self.long = RollingWindow::new(self.config.long_window);
        self.last_beat_ms = None;
        self.last_transition_ms = None;
        self.last_heavy_ms = None;
        self.beat_intensity = 0.0;
        self.last_energy = 0.0;
    }
}
