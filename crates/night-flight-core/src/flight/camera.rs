//! Camera placement along the flight path.
//!
//! The "bullet" is the point flying along the path at `distance`. The
//! first-person camera sits on it; the third-person camera trails behind
//! and above it in the bullet's local frame. Switching perspective blends
//! between the two over a fixed duration.

use std::f32::consts::PI;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::path::{heading_direction, FlightConfig, FlightPath};
use super::turn::{TurnController, TurnDirection};
use crate::events::{EventEmitter, SubscriptionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Perspective {
    FirstPerson,
    ThirdPerson,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Seconds to blend between perspectives
    pub transition_secs: f32,
    /// Third person falls back to first person after this long
    pub third_person_hold_secs: f32,
    /// Third-person offset behind the bullet
    pub follow_distance: f32,
    /// Third-person offset above the bullet
    pub follow_height: f32,
    /// Third-person sideways offset (positive = right)
    pub follow_side: f32,
    /// How far ahead of the bullet the camera looks
    pub look_ahead: f32,
    /// Exponential fade of the bank angle once a turn has committed (1/s)
    pub bank_fade_rate: f32,
    /// Speeds up the bank curve so the roll peaks before the turn is halfway
    pub bank_lead: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            transition_secs: 0.8,
            third_person_hold_secs: 6.0,
            follow_distance: 14.0,
            follow_height: 5.0,
            follow_side: 0.0,
            look_ahead: 50.0,
            bank_fade_rate: 12.0,
            bank_lead: 1.25,
        }
    }
}

/// Everything the renderer needs to place the view for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    /// Eye position
    pub position: Vec3,
    /// Look-at point
    pub target: Vec3,
    /// Unit look direction in the ground plane
    pub forward: Vec3,
    /// Up vector after banking
    pub up: Vec3,
    /// The point flying along the path
    pub bullet: Vec3,
    /// Roll in radians, positive when banking left
    pub bank: f32,
}

/// Tell the turn controller where the bullet is and which crossing a turn
/// started now would kink at: the one nearest to where the bullet will be
/// when the turn commits.
fn track_turn_origin(turn: &mut TurnController, path: &FlightPath, distance: f32, speed: f32) {
    let commit = distance + speed * turn.config().duration_secs;
    let pivot = path.nearest_crossing(commit);
    turn.track_position(path.position_at_distance(distance));
    turn.track_pivot(path.position_at_distance(pivot), pivot);
}

/// Hermite smoothstep on [0, 1]
fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

pub struct CameraController {
    config: CameraConfig,
    path: FlightPath,
    turn: TurnController,

    distance: f32,
    base_speed: f32,
    current_speed: f32,

    perspective: Perspective,
    /// 0 = fully first person, 1 = fully third person
    perspective_progress: f32,
    third_person_elapsed: f32,
    perspective_listeners: EventEmitter<Perspective>,

    bank: f32,
    pose: CameraPose,
}

impl CameraController {
    pub fn new(flight: FlightConfig, config: CameraConfig, mut turn: TurnController, start: Vec3) -> Self {
        let base_speed = flight.base_speed;
        let path = FlightPath::new(flight, start);
        let bullet = path.position_at_distance(0.0);
        track_turn_origin(&mut turn, &path, 0.0, base_speed);

        let forward = path.tangent_at_distance(0.0);
        let pose = CameraPose {
            position: bullet,
            target: bullet + forward * config.look_ahead,
            forward,
            up: Vec3::Y,
            bullet,
            bank: 0.0,
        };

        Self {
            config,
            path,
            turn,
            distance: 0.0,
            base_speed,
            current_speed: base_speed,
            perspective: Perspective::FirstPerson,
            perspective_progress: 0.0,
            third_person_elapsed: 0.0,
            perspective_listeners: EventEmitter::new(),
            bank: 0.0,
            pose,
        }
    }

    /// Advance one frame. `dt` is in seconds.
    pub fn update(&mut self, dt: f32) {
        let dt = dt.max(0.0);

        self.distance += self.current_speed * dt;
        self.path.extend_if_needed_by_distance(self.distance);

        self.turn.update(dt, &mut self.path, self.distance);
        track_turn_origin(&mut self.turn, &self.path, self.distance, self.current_speed);

        self.update_perspective(dt);
        self.update_bank(dt);
        self.pose = self.compute_pose();
    }

    fn update_perspective(&mut self, dt: f32) {
        if self.perspective == Perspective::ThirdPerson {
            self.third_person_elapsed += dt;
            if self.third_person_elapsed >= self.config.third_person_hold_secs {
                self.switch_to_first_person();
            }
        }

        let goal = match self.perspective {
            Perspective::FirstPerson => 0.0,
            Perspective::ThirdPerson => 1.0,
        };
        let step = dt / self.config.transition_secs.max(f32::EPSILON);
        if self.perspective_progress < goal {
            self.perspective_progress = (self.perspective_progress + step).min(goal);
        } else {
            self.perspective_progress = (self.perspective_progress - step).max(goal);
        }
    }

    fn update_bank(&mut self, dt: f32) {
        match self.turn.direction() {
            Some(direction) => {
                let t = (self.turn.progress() * self.config.bank_lead).min(1.0);
                self.bank = direction.sign() * self.turn.config().max_bank * (PI * t).sin();
            }
            None => {
                self.bank *= (-self.config.bank_fade_rate * dt).exp();
                if self.bank.abs() < 1e-4 {
                    self.bank = 0.0;
                }
            }
        }
    }

    fn compute_pose(&self) -> CameraPose {
        let bullet = self.path.position_at_distance(self.distance);
        let forward = if self.turn.is_turning() {
            heading_direction(self.turn.visual_heading())
        } else {
            self.path.tangent_at_distance(self.distance)
        };
        let right = forward.cross(Vec3::Y).normalize_or_zero();

        let first_person = bullet;
        let third_person = bullet - forward * self.config.follow_distance
            + Vec3::Y * self.config.follow_height
            + right * self.config.follow_side;
        let blend = smoothstep(self.perspective_progress);
        let position = first_person.lerp(third_person, blend);

        let up = Quat::from_axis_angle(forward, -self.bank) * Vec3::Y;

        CameraPose {
            position,
            target: bullet + forward * self.config.look_ahead,
            forward,
            up,
            bullet,
            bank: self.bank,
        }
    }

    /// Jump to `base_speed × multiplier` immediately
    pub fn boost_speed(&mut self, multiplier: f32) {
        self.current_speed = self.base_speed * multiplier;
    }

    /// Ease the current speed toward the base speed; `factor` is the fraction
    /// of the gap closed this call
    pub fn ease_to_base_speed(&mut self, factor: f32) {
        let factor = factor.clamp(0.0, 1.0);
        self.current_speed += (self.base_speed - self.current_speed) * factor;
    }

    pub fn set_base_speed(&mut self, speed: f32) {
        self.base_speed = speed.max(0.0);
    }

    pub fn base_speed(&self) -> f32 {
        self.base_speed
    }

    pub fn current_speed(&self) -> f32 {
        self.current_speed
    }

    pub fn current_distance(&self) -> f32 {
        self.distance
    }

    /// Eye position of the last update
    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    pub fn pose(&self) -> &CameraPose {
        &self.pose
    }

    pub fn perspective(&self) -> Perspective {
        self.perspective
    }

    /// Blend between first (0) and third (1) person
    pub fn perspective_blend(&self) -> f32 {
        smoothstep(self.perspective_progress)
    }

    /// Switch to the trailing camera. Calling again while already in third
    /// person restarts the hold timer.
    pub fn switch_to_third_person(&mut self) {
        self.third_person_elapsed = 0.0;
        self.set_perspective(Perspective::ThirdPerson);
    }

    pub fn switch_to_first_person(&mut self) {
        self.set_perspective(Perspective::FirstPerson);
    }

    pub fn toggle_perspective(&mut self) {
        match self.perspective {
            Perspective::FirstPerson => self.switch_to_third_person(),
            Perspective::ThirdPerson => self.switch_to_first_person(),
        }
    }

    fn set_perspective(&mut self, perspective: Perspective) {
        if self.perspective == perspective {
            return;
        }
        self.perspective = perspective;
        log::debug!("perspective -> {:?}", perspective);
        self.perspective_listeners.emit(&perspective);
    }

    pub fn on_perspective_change<F: FnMut(&Perspective) + 'static>(&mut self, listener: F) -> SubscriptionId {
        self.perspective_listeners.subscribe(listener)
    }

    pub fn unsubscribe_perspective(&mut self, id: SubscriptionId) -> bool {
        self.perspective_listeners.unsubscribe(id)
    }

    pub fn execute_turn(&mut self, direction: TurnDirection) -> bool {
        self.turn.execute_turn(direction)
    }

    pub fn can_turn_safely(&self, direction: TurnDirection) -> bool {
        self.turn.can_turn_safely(direction)
    }

    pub fn is_turning(&self) -> bool {
        self.turn.is_turning()
    }

    /// Committed heading
    pub fn heading(&self) -> f32 {
        self.turn.base_angle()
    }

    pub fn path(&self) -> &FlightPath {
        &self.path
    }

    pub fn turn(&self) -> &TurnController {
        &self.turn
    }

    pub fn turn_mut(&mut self) -> &mut TurnController {
        &mut self.turn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::TurnConfig;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn camera() -> CameraController {
        let turn = TurnController::new(TurnConfig::default(), Box::new(|_: f32, _: f32| false), 10.0);
        CameraController::new(FlightConfig::default(), CameraConfig::default(), turn, Vec3::ZERO)
    }

    #[test]
    fn test_update_advances_distance() {
        let mut cam = camera();
        cam.update(0.5);
        assert!(approx(cam.current_distance(), 30.0));
        assert!(approx(cam.pose().bullet.z, 30.0));
        assert!(approx(cam.position().y, 30.0));
    }

    #[test]
    fn test_boost_and_ease() {
        let mut cam = camera();
        cam.boost_speed(1.5);
        assert!(approx(cam.current_speed(), 90.0));

        let mut prev = cam.current_speed();
        for _ in 0..200 {
            cam.ease_to_base_speed(0.05);
            assert!(cam.current_speed() <= prev);
            assert!(cam.current_speed() >= 60.0);
            prev = cam.current_speed();
        }
        assert!(approx(cam.current_speed(), 60.0));
    }

    #[test]
    fn test_perspective_blend_and_notifications() {
        let mut cam = camera();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        cam.on_perspective_change(move |p| s.borrow_mut().push(*p));

        cam.switch_to_third_person();
        cam.switch_to_third_person();
        assert_eq!(*seen.borrow(), vec![Perspective::ThirdPerson]);

        cam.update(0.4);
        let half = cam.perspective_blend();
        assert!(half > 0.0 && half < 1.0);

        cam.update(0.5);
        assert_eq!(cam.perspective_blend(), 1.0);
        let pose = cam.pose();
        assert!(approx(pose.position.z, pose.bullet.z - 14.0));
        assert!(approx(pose.position.y, pose.bullet.y + 5.0));
    }

    #[test]
    fn test_third_person_auto_reverts() {
        let mut cam = camera();
        cam.switch_to_third_person();
        for _ in 0..50 {
            cam.update(0.1);
        }
        assert_eq!(cam.perspective(), Perspective::ThirdPerson);

        // Re-triggering restarts the hold
        cam.switch_to_third_person();
        for _ in 0..50 {
            cam.update(0.1);
        }
        assert_eq!(cam.perspective(), Perspective::ThirdPerson);

        for _ in 0..15 {
            cam.update(0.1);
        }
        assert_eq!(cam.perspective(), Perspective::FirstPerson);

        for _ in 0..10 {
            cam.update(0.1);
        }
        assert_eq!(cam.perspective_blend(), 0.0);
        assert_eq!(cam.position(), cam.pose().bullet);
    }

    #[test]
    fn test_turn_through_camera() {
        let mut cam = camera();
        cam.update(1.0);
        assert!(cam.execute_turn(TurnDirection::Left));
        assert!(!cam.execute_turn(TurnDirection::Right));

        for _ in 0..12 {
            cam.update(0.016);
        }
        assert!(!cam.is_turning());
        assert!((cam.heading() - std::f32::consts::FRAC_PI_2).abs() < 1e-6);

        // Turn started at z=60 and commits near z=71: the kink is the z=84
        // crossing, still ahead of the bullet
        assert!(cam.pose().bullet.z < 84.0);
        cam.update(1.0);
        let after = cam.pose().bullet;
        assert!((after.x - (cam.current_distance() - 84.0)).abs() < 1e-2);
        assert_eq!(after.z, 84.0);
    }

    #[test]
    fn test_bank_rolls_into_turn_and_fades() {
        let mut cam = camera();
        cam.execute_turn(TurnDirection::Left);
        cam.update(0.05);

        let pose = *cam.pose();
        assert!(pose.bank > 0.0);
        // Heading +Z, left is +X: up leans that way
        assert!(pose.up.x > 0.0);
        assert!(approx(pose.up.length(), 1.0));

        for _ in 0..60 {
            cam.update(0.016);
        }
        assert!(cam.pose().bank.abs() < 1e-3);
    }

    #[test]
    fn test_path_keeps_ahead_of_camera() {
        let mut cam = camera();
        for _ in 0..600 {
            cam.update(0.1);
        }
        assert!((cam.current_distance() - 3600.0).abs() < 0.5);
        assert!(cam.path().total_length() - cam.current_distance() >= 500.0 - 84.0 * 5.0);
        assert!(cam.path().total_length() > cam.current_distance());
    }
}
