use std::collections::VecDeque;

/// Fixed-capacity history of energy samples with a running mean.
///
/// The oldest sample is evicted once the window is full.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<f32>,
    capacity: usize,
    // f64 keeps the incremental sum from drifting over long sessions
    sum: f64,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
        }
    }

    pub fn push(&mut self, sample: f32) {
        if self.samples.len() == self.capacity {
            if let Some(evicted) = self.samples.pop_front() {
                self.sum -= evicted as f64;
            }
        }
        self.samples.push_back(sample);
        self.sum += sample as f64;
    }

    /// Arithmetic mean of the retained samples (0 when empty)
    pub fn mean(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        (self.sum / self.samples.len() as f64) as f32
    }

    /// Mean of `count` samples ending `skip` samples before the newest.
    ///
    /// `mean_of_recent(30, 0)` is the mean of the last 30 samples;
    /// `mean_of_recent(12, 1)` is the 12 samples before the newest one.
    /// Returns `None` if the window doesn't hold `count + skip` samples.
    pub fn mean_of_recent(&self, count: usize, skip: usize) -> Option<f32> {
        if count == 0 || self.samples.len() < count + skip {
            return None;
        }
        let sum: f64 = self
            .samples
            .iter()
            .rev()
            .skip(skip)
            .take(count)
            .map(|&s| s as f64)
            .sum();
        Some((sum / count as f64) as f32)
    }

    pub fn latest(&self) -> Option<f32> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        self.samples.iter()
    }
}
