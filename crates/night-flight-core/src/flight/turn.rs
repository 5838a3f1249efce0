//! Quarter-turn state machine.
//!
//! A turn rotates the heading by exactly 90° over a short, fixed duration.
//! While it runs, `visual_heading` eases between the start and target
//! headings (cubic in-out) for the camera's look direction and banking; the
//! committed heading only changes once the turn completes, at which point
//! the flight path is kinked into the new heading at the street crossing
//! that was checked when the turn started.
//!
//! Turns can't be cancelled and only one can run at a time.

use std::f32::consts::FRAC_PI_2;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::path::{heading_direction, normalize_angle, FlightPath};
use crate::events::{EventEmitter, SubscriptionId};
use crate::world::{CityGrid, ObstacleMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TurnDirection {
    Left,
    Right,
}

impl TurnDirection {
    /// Heading change sign: left is counter-clockwise seen from above (+90°)
    pub fn sign(self) -> f32 {
        match self {
            TurnDirection::Left => 1.0,
            TurnDirection::Right => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            TurnDirection::Left => TurnDirection::Right,
            TurnDirection::Right => TurnDirection::Left,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    /// Duration of the heading change in seconds
    pub duration_secs: f32,
    /// Distance checked from the current position in the new heading
    pub turn_look_ahead: f32,
    /// Distance checked for the path right after the turn
    pub exit_look_ahead: f32,
    /// Spacing between oracle samples; defaults to half a grid cell
    pub sample_spacing: Option<f32>,
    /// Peak camera roll during a turn, radians
    pub max_bank: f32,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            duration_secs: 0.175,
            turn_look_ahead: 100.0,
            exit_look_ahead: 200.0,
            sample_spacing: None,
            max_bank: 0.35,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TurnState {
    Idle,
    Turning {
        direction: TurnDirection,
        progress: f32,
        start_heading: f32,
        target_heading: f32,
        /// Path distance of the crossing to kink at
        pivot: Option<f32>,
    },
}

/// Cubic ease-in-out on [0, 1]
pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

pub struct TurnController {
    config: TurnConfig,
    state: TurnState,
    base_heading: f32,
    obstacles: Box<dyn ObstacleMap>,
    sample_spacing: f32,
    /// Latest camera position; `None` until someone provides one
    position: Option<Vec3>,
    /// Crossing a turn started now would kink at, with its path distance
    pivot: Option<(Vec3, f32)>,
    turn_listeners: EventEmitter<f32>,
}

impl TurnController {
    pub fn new(config: TurnConfig, obstacles: Box<dyn ObstacleMap>, default_spacing: f32) -> Self {
        let sample_spacing = config.sample_spacing.unwrap_or(default_spacing).max(0.5);
        Self {
            config,
            state: TurnState::Idle,
            base_heading: 0.0,
            obstacles,
            sample_spacing,
            position: None,
            pivot: None,
            turn_listeners: EventEmitter::new(),
        }
    }

    /// Controller checking turns against the city grid oracle
    pub fn with_grid(config: TurnConfig, grid: CityGrid) -> Self {
        let spacing = grid.cell_size / 2.0;
        Self::new(config, Box::new(grid), spacing)
    }

    /// Feed the camera position used by safety checks. Called every frame.
    pub fn track_position(&mut self, position: Vec3) {
        self.position = Some(position);
    }

    /// Feed the street crossing where a turn started now would be committed,
    /// and its distance along the path. Called every frame with the position.
    pub fn track_pivot(&mut self, crossing: Vec3, distance: f32) {
        self.pivot = Some((crossing, distance));
    }

    pub fn clear_position(&mut self) {
        self.position = None;
        self.pivot = None;
    }

    /// Subscribe to completed turns. The listener receives the committed heading.
    pub fn on_turn_complete<F: FnMut(&f32) + 'static>(&mut self, listener: F) -> SubscriptionId {
        self.turn_listeners.subscribe(listener)
    }

    /// Start a 90° turn. Returns false (and changes nothing) if one is already running.
    ///
    /// Does not check safety; callers are expected to ask `can_turn_safely`
    /// first. The tracked pivot is recorded here and the path is kinked
    /// there on completion, so the corridor flown after the turn is the one
    /// that was checked. Nothing is re-checked at commit time, which assumes
    /// the obstacle map doesn't change while the turn runs.
    pub fn execute_turn(&mut self, direction: TurnDirection) -> bool {
        if self.is_turning() {
            return false;
        }
        let start_heading = self.base_heading;
        let target_heading = start_heading + direction.sign() * FRAC_PI_2;
        self.state = TurnState::Turning {
            direction,
            progress: 0.0,
            start_heading,
            target_heading,
            pivot: self.pivot.map(|(_, distance)| distance),
        };
        log::debug!("turn {:?} started from heading {:.3}", direction, start_heading);
        true
    }

    /// Whether a turn in `direction` would keep the camera out of buildings.
    ///
    /// Samples two stretches in the candidate heading: the turn itself
    /// (from the current position) and the path just after it (starting
    /// halfway along the first stretch). The same stretches are sampled
    /// from the tracked pivot, which is where the new heading actually
    /// begins. Without a known position nothing can be judged unsafe, so
    /// this fails open.
    pub fn can_turn_safely(&self, direction: TurnDirection) -> bool {
        if self.is_turning() {
            return false;
        }

        let heading = self.base_heading + direction.sign() * FRAC_PI_2;
        let dir = heading_direction(heading);

        self.position
            .into_iter()
            .chain(self.pivot.map(|(crossing, _)| crossing))
            .all(|origin| self.corridor_is_clear(origin, dir))
    }

    fn corridor_is_clear(&self, origin: Vec3, dir: Vec3) -> bool {
        let turn_clear = self.stretch_is_clear(origin, dir, self.config.turn_look_ahead);
        let exit_start = origin + dir * (self.config.turn_look_ahead / 2.0);
        turn_clear && self.stretch_is_clear(exit_start, dir, self.config.exit_look_ahead)
    }

    fn stretch_is_clear(&self, from: Vec3, dir: Vec3, length: f32) -> bool {
        let steps = (length / self.sample_spacing).ceil() as usize;
        (0..=steps).all(|i| {
            let p = from + dir * (i as f32 * self.sample_spacing).min(length);
            !self.obstacles.is_blocked(p.x, p.z)
        })
    }

    /// Advance the running turn. On completion the heading is committed,
    /// the path is kinked into the new heading at the pivot recorded when
    /// the turn started (or at the crossing nearest `distance` if none was
    /// tracked) and listeners are notified. Returns the committed heading on
    /// the completing frame.
    pub fn update(&mut self, dt: f32, path: &mut FlightPath, distance: f32) -> Option<f32> {
        let TurnState::Turning {
            direction,
            progress,
            start_heading,
            target_heading,
            pivot,
        } = self.state
        else {
            return None;
        };

        let progress = progress + dt.max(0.0) / self.config.duration_secs;
        if progress < 1.0 {
            self.state = TurnState::Turning {
                direction,
                progress,
                start_heading,
                target_heading,
                pivot,
            };
            return None;
        }

        let committed = normalize_angle(target_heading);
        self.base_heading = committed;
        self.state = TurnState::Idle;
        path.turn_at(pivot.unwrap_or(distance), committed);
        self.turn_listeners.emit(&committed);
        log::debug!("turn {:?} committed, heading {:.3}", direction, committed);
        Some(committed)
    }

    pub fn config(&self) -> &TurnConfig {
        &self.config
    }

    pub fn is_turning(&self) -> bool {
        matches!(self.state, TurnState::Turning { .. })
    }

    /// Turn progress in [0, 1); 0 when idle
    pub fn progress(&self) -> f32 {
        match self.state {
            TurnState::Turning { progress, .. } => progress,
            TurnState::Idle => 0.0,
        }
    }

    pub fn direction(&self) -> Option<TurnDirection> {
        match self.state {
            TurnState::Turning { direction, .. } => Some(direction),
            TurnState::Idle => None,
        }
    }

    /// Heading the running turn will commit to
    pub fn target_heading(&self) -> Option<f32> {
        match self.state {
            TurnState::Turning { target_heading, .. } => Some(target_heading),
            TurnState::Idle => None,
        }
    }

    /// Last committed heading, in (−π, π]
    pub fn base_angle(&self) -> f32 {
        self.base_heading
    }

    /// Eased heading for the look direction while a turn runs
    pub fn visual_heading(&self) -> f32 {
        match self.state {
            TurnState::Turning {
                progress,
                start_heading,
                target_heading,
                ..
            } => start_heading + (target_heading - start_heading) * ease_in_out_cubic(progress),
            TurnState::Idle => self.base_heading,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::FlightConfig;
    use std::f32::consts::PI;

    fn open_sky() -> TurnController {
        TurnController::new(TurnConfig::default(), Box::new(|_: f32, _: f32| false), 10.0)
    }

    fn path() -> FlightPath {
        FlightPath::new(FlightConfig::default(), Vec3::ZERO)
    }

    #[test]
    fn test_left_turn_takes_175ms() {
        let mut turn = open_sky();
        let mut path = path();

        assert!(turn.execute_turn(TurnDirection::Left));
        let mut elapsed_ms = 0;
        while elapsed_ms < 175 {
            assert!(turn.is_turning(), "finished early at {}ms", elapsed_ms);
            turn.update(0.016, &mut path, 0.0);
            elapsed_ms += 16;
        }

        assert!(!turn.is_turning());
        assert!(elapsed_ms >= 175);
        assert!((turn.base_angle() - FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_committed_heading_is_exact_quarter() {
        let mut turn = open_sky();
        let mut path = path();
        let mut headings = Vec::new();

        for direction in [
            TurnDirection::Right,
            TurnDirection::Right,
            TurnDirection::Right,
            TurnDirection::Left,
        ] {
            let before = turn.base_angle();
            turn.execute_turn(direction);
            let mut committed = None;
            // Uneven frame times should not leak into the result
            for dt in [0.05, 0.033, 0.07, 0.1] {
                if let Some(h) = turn.update(dt, &mut path, 0.0) {
                    committed = Some(h);
                }
            }
            let committed = committed.expect("turn should have completed");
            let expected = normalize_angle(before + direction.sign() * FRAC_PI_2);
            assert!((committed - expected).abs() < 1e-5);
            headings.push(committed);
        }

        assert!((headings[0] + FRAC_PI_2).abs() < 1e-5);
        assert!((headings[1] - PI).abs() < 1e-5);
        assert!((headings[2] - FRAC_PI_2).abs() < 1e-5);
        assert!((headings[3] - PI).abs() < 1e-5);
        assert!((path.heading() - PI).abs() < 1e-5);
    }

    #[test]
    fn test_second_turn_rejected_while_turning() {
        let mut turn = open_sky();
        let mut path = path();

        assert!(turn.execute_turn(TurnDirection::Left));
        turn.update(0.05, &mut path, 0.0);
        let target = turn.target_heading();

        assert!(!turn.execute_turn(TurnDirection::Right));
        assert!(!turn.can_turn_safely(TurnDirection::Right));
        assert_eq!(turn.target_heading(), target);
        assert_eq!(turn.direction(), Some(TurnDirection::Left));
    }

    #[test]
    fn test_visual_heading_eases() {
        let mut turn = open_sky();
        let mut path = path();
        turn.execute_turn(TurnDirection::Left);

        assert_eq!(turn.visual_heading(), 0.0);
        turn.update(0.175 / 4.0, &mut path, 0.0);
        // Cubic ease lags a linear blend in the first half
        assert!(turn.visual_heading() < FRAC_PI_2 / 4.0);
        assert!(turn.visual_heading() > 0.0);
        turn.update(0.175 / 4.0, &mut path, 0.0);
        assert!((turn.visual_heading() - FRAC_PI_2 / 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_completion_kinks_path_and_notifies() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut turn = open_sky();
        let mut path = path();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        turn.on_turn_complete(move |h| s.borrow_mut().push(*h));

        turn.execute_turn(TurnDirection::Right);
        turn.update(0.2, &mut path, 70.0);

        // Kinked at the crossing closest to the camera
        assert_eq!(seen.borrow().len(), 1);
        assert!(path.tangent_at_distance(85.0).distance(-Vec3::X) < 1e-4);
        assert!(path.tangent_at_distance(83.0).distance(Vec3::Z) < 1e-4);
    }

    #[test]
    fn test_kink_lands_on_pivot_recorded_at_start() {
        let mut turn = open_sky();
        let mut path = path();
        turn.track_position(Vec3::new(0.0, 30.0, 80.0));
        turn.track_pivot(Vec3::new(0.0, 30.0, 84.0), 84.0);
        turn.execute_turn(TurnDirection::Left);

        // Pivot moves on while the turn runs; the recorded one still wins
        turn.track_pivot(Vec3::new(0.0, 30.0, 168.0), 168.0);
        turn.update(0.2, &mut path, 120.0);

        assert!(path.tangent_at_distance(83.0).distance(Vec3::Z) < 1e-4);
        assert!(path.tangent_at_distance(85.0).distance(Vec3::X) < 1e-4);
        assert!(path.position_at_distance(120.0).distance(Vec3::new(36.0, 30.0, 84.0)) < 1e-3);
    }

    #[test]
    fn test_safety_checks_from_pivot() {
        // Clear from the camera's line at z=0, blocked along the z=84 street
        let oracle = |x: f32, z: f32| (x - 40.0).abs() <= 5.0 && (z - 84.0).abs() <= 5.0;
        let mut turn = TurnController::new(TurnConfig::default(), Box::new(oracle), 10.0);
        turn.track_position(Vec3::ZERO);
        assert!(turn.can_turn_safely(TurnDirection::Left));

        turn.track_pivot(Vec3::new(0.0, 30.0, 84.0), 84.0);
        assert!(!turn.can_turn_safely(TurnDirection::Left));
        assert!(turn.can_turn_safely(TurnDirection::Right));

        turn.clear_position();
        assert!(turn.can_turn_safely(TurnDirection::Left));
    }

    #[test]
    fn test_safety_fails_open_without_position() {
        let turn = TurnController::new(TurnConfig::default(), Box::new(|_: f32, _: f32| true), 10.0);
        assert!(turn.can_turn_safely(TurnDirection::Left));
    }

    #[test]
    fn test_safety_clear_corridor() {
        let mut turn = open_sky();
        turn.track_position(Vec3::new(0.0, 30.0, 0.0));
        assert!(turn.can_turn_safely(TurnDirection::Left));
        assert!(turn.can_turn_safely(TurnDirection::Right));
    }

    #[test]
    fn test_safety_single_obstacle_in_turn_stretch() {
        // Left from +Z heads toward +X; put one small building on that stretch
        for along in [3.0, 27.0, 61.0, 99.0] {
            let oracle = move |x: f32, z: f32| (x - along).abs() <= 5.0 && z.abs() <= 5.0;
            let mut turn = TurnController::new(TurnConfig::default(), Box::new(oracle), 10.0);
            turn.track_position(Vec3::new(0.0, 30.0, 0.0));

            assert!(!turn.can_turn_safely(TurnDirection::Left), "missed obstacle at {}", along);
            assert!(turn.can_turn_safely(TurnDirection::Right));
        }
    }

    #[test]
    fn test_safety_obstacle_after_turn() {
        // Beyond the first 100 units but within the exit stretch (50..250)
        let oracle = |x: f32, z: f32| (x - 230.0).abs() <= 5.0 && z.abs() <= 5.0;
        let mut turn = TurnController::new(TurnConfig::default(), Box::new(oracle), 10.0);
        turn.track_position(Vec3::ZERO);
        assert!(!turn.can_turn_safely(TurnDirection::Left));

        // Past the whole 250-unit corridor: safe
        let oracle = |x: f32, z: f32| (x - 300.0).abs() <= 5.0 && z.abs() <= 5.0;
        let mut turn = TurnController::new(TurnConfig::default(), Box::new(oracle), 10.0);
        turn.track_position(Vec3::ZERO);
        assert!(turn.can_turn_safely(TurnDirection::Left));
    }

    #[test]
    fn test_safety_on_city_grid() {
        let grid = CityGrid::default();
        let mut turn = TurnController::with_grid(TurnConfig::default(), grid);

        // At an intersection both cross streets are open
        turn.track_position(Vec3::new(0.0, 30.0, grid.block_pitch()));
        assert!(turn.can_turn_safely(TurnDirection::Left));
        assert!(turn.can_turn_safely(TurnDirection::Right));

        // Mid-block, turning means flying into the block
        turn.track_position(Vec3::new(0.0, 30.0, grid.block_pitch() / 2.0));
        assert!(!turn.can_turn_safely(TurnDirection::Left));
        assert!(!turn.can_turn_safely(TurnDirection::Right));
    }

    #[test]
    fn test_ease_in_out_cubic() {
        assert_eq!(ease_in_out_cubic(0.0), 0.0);
        assert_eq!(ease_in_out_cubic(1.0), 1.0);
        assert!((ease_in_out_cubic(0.5) - 0.5).abs() < 1e-6);
        assert!(ease_in_out_cubic(0.25) < 0.25);
        assert!(ease_in_out_cubic(0.75) > 0.75);
    }
}
