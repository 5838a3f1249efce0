//! Beat events and a small observer list for fanning them out.
//!
//! Everything here is single-threaded: listeners run synchronously inside
//! the frame update that emits, in subscription order.

/// Kind of musical event recognized by the beat classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeatKind {
    /// Ordinary kick/beat: energy clearly above the short-term average
    Beat,
    /// Drop, build-up or breakdown: the last half second departs from the
    /// two-second average
    Transition,
    /// Sharp spike preceded by near-silence
    HeavyShift,
}

/// A classified event with its strength in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEvent {
    pub kind: BeatKind,
    pub intensity: f32,
}

/// Everything the classifier fired during one frame.
///
/// Returned from `BeatClassifier::update` so frame-scoped consumers (the
/// flight director) can react in the same frame without holding callbacks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameEvents {
    pub beat: Option<f32>,
    pub transition: Option<f32>,
    pub heavy_shift: Option<f32>,
}

impl FrameEvents {
    pub fn is_empty(&self) -> bool {
        self.beat.is_none() && self.transition.is_none() && self.heavy_shift.is_none()
    }

    /// Events in the order the classifier evaluates them
    pub fn iter(&self) -> impl Iterator<Item = BeatEvent> {
        [
            (BeatKind::HeavyShift, self.heavy_shift),
            (BeatKind::Transition, self.transition),
            (BeatKind::Beat, self.beat),
        ]
        .into_iter()
        .filter_map(|(kind, intensity)| intensity.map(|intensity| BeatEvent { kind, intensity }))
    }
}

/// Handle returned by [`EventEmitter::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered list of listeners for one event stream
pub struct EventEmitter<T> {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Box<dyn FnMut(&T)>)>,
}

impl<T> Default for EventEmitter<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            listeners: Vec::new(),
        }
    }
}

impl<T> EventEmitter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Any number of listeners may observe the same stream.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&T) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Invoke every listener with `value`
    pub fn emit(&mut self, value: &T) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(value);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
