//! Per-frame reactions to classified audio events.
//!
//! Runs after the classifier and before the camera update so that the
//! reaction lands in the same frame as the event.

use serde::{Deserialize, Serialize};

use super::camera::CameraController;
use super::turn::TurnDirection;
use crate::events::FrameEvents;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorConfig {
    /// Speed multiplier for a full-intensity beat
    pub max_boost: f32,
    /// Fraction of the gap to base speed closed every frame
    pub ease_factor: f32,
    /// Turn on heavy beat shifts
    pub turns_enabled: bool,
    /// Switch to third person on transitions
    pub perspective_enabled: bool,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            max_boost: 1.6,
            ease_factor: 0.05,
            turns_enabled: true,
            perspective_enabled: true,
        }
    }
}

/// What happened to a requested turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Started(TurnDirection),
    /// Neither direction was clear
    Blocked,
    /// A turn was already running
    Busy,
}

pub struct FlightDirector {
    config: DirectorConfig,
    last_turn: Option<TurnDirection>,
    turns_taken: u32,
    turns_skipped: u32,
}

impl FlightDirector {
    pub fn new(config: DirectorConfig) -> Self {
        Self {
            config,
            last_turn: None,
            turns_taken: 0,
            turns_skipped: 0,
        }
    }

    /// React to this frame's events. Call once per frame, even without events.
    pub fn apply(&mut self, events: &FrameEvents, camera: &mut CameraController) {
        if let Some(intensity) = events.beat {
            let multiplier = 1.0 + intensity.clamp(0.0, 1.0) * (self.config.max_boost - 1.0);
            camera.boost_speed(multiplier);
        }

        if let Some(intensity) = events.heavy_shift {
            if self.config.turns_enabled {
                let outcome = self.choose_and_turn(camera);
                log::debug!("heavy shift ({:.2}): {:?}", intensity, outcome);
            }
        }

        if events.transition.is_some() && self.config.perspective_enabled {
            camera.switch_to_third_person();
        }

        camera.ease_to_base_speed(self.config.ease_factor);
    }

    /// Turn whichever way is clear, alternating when both are
    pub fn choose_and_turn(&mut self, camera: &mut CameraController) -> TurnOutcome {
        if camera.is_turning() {
            return TurnOutcome::Busy;
        }

        let left = camera.can_turn_safely(TurnDirection::Left);
        let right = camera.can_turn_safely(TurnDirection::Right);
        let direction = match (left, right) {
            (false, false) => {
                self.turns_skipped += 1;
                return TurnOutcome::Blocked;
            }
            (true, false) => TurnDirection::Left,
            (false, true) => TurnDirection::Right,
            (true, true) => self
                .last_turn
                .map(TurnDirection::opposite)
                .unwrap_or(TurnDirection::Left),
        };

        self.start_turn(camera, direction)
    }

    /// Manual turn in a fixed direction, still gated by the safety check
    pub fn request_turn(&mut self, camera: &mut CameraController, direction: TurnDirection) -> TurnOutcome {
        if camera.is_turning() {
            return TurnOutcome::Busy;
        }
        if !camera.can_turn_safely(direction) {
            self.turns_skipped += 1;
            log::debug!("manual turn {:?} blocked", direction);
            return TurnOutcome::Blocked;
        }
        self.start_turn(camera, direction)
    }

    fn start_turn(&mut self, camera: &mut CameraController, direction: TurnDirection) -> TurnOutcome {
        if !camera.execute_turn(direction) {
            return TurnOutcome::Busy;
        }
        self.last_turn = Some(direction);
        self.turns_taken += 1;
        TurnOutcome::Started(direction)
    }

    pub fn turns_taken(&self) -> u32 {
        self.turns_taken
    }

    pub fn turns_skipped(&self) -> u32 {
        self.turns_skipped
    }

    pub fn last_turn(&self) -> Option<TurnDirection> {
        self.last_turn
    }

    pub fn config(&self) -> &DirectorConfig {
        &self.config
    }
}

impl Default for FlightDirector {
    fn default() -> Self {
        Self::new(DirectorConfig::default())
    }
}
