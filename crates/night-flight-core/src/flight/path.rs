//! Distance-parameterized polyline the camera flies along.
//!
//! The path is made of straight, axis-aligned segments following the
//! streets. Turns are sharp kinks at street crossings: no spline smoothing,
//! so the tangent only changes at the intersection the turn was committed to.

use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    /// Flight altitude (y of every control point)
    pub altitude: f32,
    /// Distance between consecutive control points
    pub segment_length: f32,
    /// Extend once less than this much path remains ahead
    pub extend_threshold: f32,
    /// Points appended per extension in the current heading
    pub extend_batch: usize,
    /// Points appended in the new heading after a turn
    pub turn_batch: usize,
    /// Path length seeded ahead of the start position
    pub initial_length: f32,
    /// Cruise speed (units per second)
    pub base_speed: f32,
    /// Spacing of street centerlines; kinks snap to multiples of it (0 disables snapping)
    pub street_pitch: f32,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            altitude: 30.0,
            segment_length: 84.0,
            extend_threshold: 500.0,
            extend_batch: 5,
            turn_batch: 10,
            initial_length: 1000.0,
            base_speed: 60.0,
            street_pitch: 84.0,
        }
    }
}

/// Unit direction for a heading in the XZ plane (0 = +Z, π/2 = +X).
///
/// Components within rounding noise of zero are snapped so that quarter-turn
/// headings produce exactly axis-aligned segments.
pub fn heading_direction(heading: f32) -> Vec3 {
    let snap = |v: f32| if v.abs() < 1e-4 { 0.0 } else { v };
    Vec3::new(snap(heading.sin()), 0.0, snap(heading.cos())).normalize_or_zero()
}

/// Wrap an angle into (−π, π]
pub fn normalize_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

pub struct FlightPath {
    config: FlightConfig,
    points: Vec<Vec3>,
    /// cumulative[i] = path distance from points[0] to points[i]
    cumulative: Vec<f32>,
    heading: f32,
    /// Distance where the current straight leg begins
    leg_start: f32,
}

impl FlightPath {
    /// Seed a straight path heading +Z from `start`, lifted to flight
    /// altitude and moved sideways onto the nearest street centerline
    pub fn new(config: FlightConfig, start: Vec3) -> Self {
        let start = Vec3::new(snap(start.x, config.street_pitch), config.altitude, start.z);
        let mut path = Self {
            config,
            points: vec![start],
            cumulative: vec![0.0],
            heading: 0.0,
            leg_start: 0.0,
        };
        while path.total_length() < path.config.initial_length {
            path.append_points(1);
        }
        path
    }

    pub fn total_length(&self) -> f32 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    pub fn heading(&self) -> f32 {
        self.heading
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn config(&self) -> &FlightConfig {
        &self.config
    }

    /// Index of the segment `[points[i], points[i + 1]]` holding distance `d`
    fn segment_index(&self, d: f32) -> usize {
        let upper = self.cumulative.partition_point(|&c| c <= d);
        upper.saturating_sub(1).min(self.points.len().saturating_sub(2))
    }

    /// World position `d` units along the path, clamped to the endpoints
    pub fn position_at_distance(&self, d: f32) -> Vec3 {
        if self.points.len() < 2 || d <= 0.0 {
            return self.points[0];
        }
        if d >= self.total_length() {
            return self.points[self.points.len() - 1];
        }

        let i = self.segment_index(d);
        let length = self.cumulative[i + 1] - self.cumulative[i];
        if length <= f32::EPSILON {
            return self.points[i];
        }
        let t = (d - self.cumulative[i]) / length;
        self.points[i].lerp(self.points[i + 1], t)
    }

    /// Unit direction of the segment containing `d`
    pub fn tangent_at_distance(&self, d: f32) -> Vec3 {
        if self.points.len() < 2 {
            return heading_direction(self.heading);
        }
        let i = self.segment_index(d.clamp(0.0, self.total_length()));
        let dir = (self.points[i + 1] - self.points[i]).normalize_or_zero();
        if dir == Vec3::ZERO {
            heading_direction(self.heading)
        } else {
            dir
        }
    }

    /// Append a batch in the current heading if the end is getting close.
    /// Returns true if points were added.
    pub fn extend_if_needed_by_distance(&mut self, current_distance: f32) -> bool {
        if self.total_length() - current_distance >= self.config.extend_threshold {
            return false;
        }
        self.append_points(self.config.extend_batch);
        true
    }

    /// Set a new heading and continue the path from its current end in that heading
    pub fn set_flight_direction(&mut self, heading: f32) {
        self.heading = normalize_angle(heading);
        self.leg_start = self.total_length();
        self.append_points(self.config.turn_batch);
    }

    /// Distance of the street crossing on the current leg closest to `d`.
    ///
    /// Never earlier than the start of the leg, so a turn cannot reach back
    /// past the previous kink.
    pub fn nearest_crossing(&self, d: f32) -> f32 {
        let d = d.clamp(self.leg_start, self.total_length());
        let pitch = self.config.street_pitch;
        if pitch <= 0.0 {
            return d;
        }

        let p = self.position_at_distance(d);
        let t = self.tangent_at_distance(d);
        let (along, sign) = if t.x.abs() > t.z.abs() {
            (p.x, t.x.signum())
        } else {
            (p.z, t.z.signum())
        };
        let crossing = d + (snap(along, pitch) - along) * sign;
        crossing.clamp(self.leg_start, self.total_length())
    }

    /// Kink the path at the street crossing nearest to distance `d` and
    /// continue it in `heading`.
    ///
    /// This is the one operation that removes points: every control point
    /// past the kink is discarded, look-ahead included, and replaced by a
    /// fresh batch in the new heading. If the camera has already passed the
    /// crossing, the part of its flown leg beyond the crossing goes too.
    pub fn turn_at(&mut self, d: f32, heading: f32) {
        let d = self.nearest_crossing(d);
        let mut kink = self.position_at_distance(d);
        kink.x = snap(kink.x, self.config.street_pitch);
        kink.z = snap(kink.z, self.config.street_pitch);

        let keep = self.cumulative.partition_point(|&c| c <= d).max(1);
        self.points.truncate(keep);
        self.cumulative.truncate(keep);

        let last = self.points[keep - 1];
        if last.distance(kink) > 1e-3 {
            let length = self.total_length() + last.distance(kink);
            self.points.push(kink);
            self.cumulative.push(length);
        }

        log::debug!(
            "path kink at d={:.1} ({:.1}, {:.1}) heading {:.3}",
            d,
            kink.x,
            kink.z,
            heading
        );
        self.set_flight_direction(heading);
    }

    fn append_points(&mut self, count: usize) {
        let dir = heading_direction(self.heading);
        for _ in 0..count {
            let last = self.points[self.points.len() - 1];
            let mut next = last + dir * self.config.segment_length;
            // Keep the cross-axis coordinate bit-exact so segments stay on their street
            if dir.x == 0.0 {
                next.x = last.x;
            }
            if dir.z == 0.0 {
                next.z = last.z;
            }
            next.y = self.config.altitude;

            let length = self.total_length() + last.distance(next);
            self.points.push(next);
            self.cumulative.push(length);
        }
    }
}

/// Round `v` to the nearest multiple of `pitch`
fn snap(v: f32, pitch: f32) -> f32 {
    if pitch > 0.0 {
        (v / pitch).round() * pitch
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn approx(a: Vec3, b: Vec3) -> bool {
        a.distance(b) < 1e-3
    }

    fn path() -> FlightPath {
        FlightPath::new(FlightConfig::default(), Vec3::ZERO)
    }

    #[test]
    fn test_seeded_path() {
        let path = path();
        assert!(path.total_length() >= 1000.0);
        assert_eq!(path.points()[0], Vec3::new(0.0, 30.0, 0.0));
        assert!(path.cumulative.windows(2).all(|w| w[1] > w[0]));
        assert!(path.points().iter().all(|p| p.x == 0.0 && p.y == 30.0));
    }

    #[test]
    fn test_endpoints_and_clamping() {
        let path = path();
        let first = path.points()[0];
        let last = *path.points().last().unwrap();

        assert_eq!(path.position_at_distance(0.0), first);
        assert_eq!(path.position_at_distance(-5.0), first);
        assert!(approx(path.position_at_distance(path.total_length()), last));
        assert_eq!(path.position_at_distance(path.total_length() + 500.0), last);
    }

    #[test]
    fn test_positions_advance_with_distance() {
        let mut path = path();
        path.turn_at(130.0, FRAC_PI_2);

        let mut prev = path.position_at_distance(0.0);
        let mut travelled = 0.0;
        for step in 1..=180 {
            let d = step as f32 * 5.0;
            let p = path.position_at_distance(d);
            travelled += prev.distance(p);
            prev = p;
            // Straight segments: arc length equals chord sum
            assert!((travelled - d).abs() < 1e-2, "d={} travelled={}", d, travelled);
        }
    }

    #[test]
    fn test_tangent_is_axis_aligned() {
        let path = path();
        assert!(approx(path.tangent_at_distance(10.0), Vec3::Z));
        assert!(approx(path.tangent_at_distance(1e6), Vec3::Z));
    }

    #[test]
    fn test_extend_if_needed() {
        let mut path = path();
        let before = path.points().len();

        assert!(!path.extend_if_needed_by_distance(0.0));
        assert_eq!(path.points().len(), before);

        let near_end = path.total_length() - 100.0;
        assert!(path.extend_if_needed_by_distance(near_end));
        assert_eq!(path.points().len(), before + 5);
        assert!(path.points().iter().all(|p| p.x == 0.0));
    }

    #[test]
    fn test_set_flight_direction_appends_at_end() {
        let mut path = path();
        let before = path.points().to_vec();
        let end = *before.last().unwrap();

        path.set_flight_direction(FRAC_PI_2);

        assert_eq!(&path.points()[..before.len()], &before[..]);
        assert_eq!(path.points().len(), before.len() + 10);
        let new_end = *path.points().last().unwrap();
        assert_eq!(new_end.z, end.z);
        assert!((new_end.x - end.x - 840.0).abs() < 1e-2);
    }

    #[test]
    fn test_turn_at_snaps_to_nearest_crossing() {
        let mut path = path();
        path.turn_at(130.0, -FRAC_PI_2);

        // 130 is closer to the crossing at 168 than to the one at 84
        assert_eq!(path.points()[0], Vec3::new(0.0, 30.0, 0.0));
        assert_eq!(path.points()[1], Vec3::new(0.0, 30.0, 84.0));
        assert_eq!(path.points()[2], Vec3::new(0.0, 30.0, 168.0));

        // Right turn from +Z heads toward -X along the z=168 street
        assert!(approx(path.tangent_at_distance(169.0), -Vec3::X));
        assert!(approx(path.tangent_at_distance(167.0), Vec3::Z));
        assert!(approx(path.position_at_distance(178.0), Vec3::new(-10.0, 30.0, 168.0)));
        assert!((path.heading() + FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_turn_at_behind_camera_drops_overshoot() {
        let mut path = path();
        path.turn_at(100.0, FRAC_PI_2);

        assert_eq!(path.points()[1], Vec3::new(0.0, 30.0, 84.0));
        assert_eq!(path.points()[2].z, 84.0);
        assert!(approx(path.position_at_distance(100.0), Vec3::new(16.0, 30.0, 84.0)));
    }

    #[test]
    fn test_nearest_crossing_stays_on_current_leg() {
        let mut path = path();
        assert_eq!(path.nearest_crossing(30.0), 0.0);
        assert_eq!(path.nearest_crossing(50.0), 84.0);

        path.turn_at(84.0, FRAC_PI_2);
        // Heading +X from (0, 84): the crossing behind the kink is out of reach
        assert_eq!(path.nearest_crossing(90.0), 84.0);
        assert_eq!(path.nearest_crossing(140.0), 168.0);
    }

    #[test]
    fn test_turns_keep_points_on_street_centerlines() {
        let pitch = FlightConfig::default().street_pitch;
        let mut path = path();
        let mut heading = 0.0;
        for (i, d) in [130.0, 333.3, 410.0, 777.7].into_iter().enumerate() {
            heading += if i % 2 == 0 { FRAC_PI_2 } else { -FRAC_PI_2 };
            path.turn_at(d, heading);
        }

        let on_street = |v: f32| (v / pitch - (v / pitch).round()).abs() < 1e-4;
        for pair in path.points().windows(2) {
            let dir = pair[1] - pair[0];
            // Cross-axis coordinate of every segment sits on a street
            if dir.x == 0.0 {
                assert!(on_street(pair[0].x), "{:?}", pair);
            } else {
                assert_eq!(dir.z, 0.0, "{:?}", pair);
                assert!(on_street(pair[0].z), "{:?}", pair);
            }
        }
        assert!(path.points().iter().all(|p| on_street(p.x) && on_street(p.z)));
    }

    #[test]
    fn test_start_moves_onto_street() {
        let path = FlightPath::new(FlightConfig::default(), Vec3::new(30.0, 0.0, 42.0));
        assert_eq!(path.points()[0], Vec3::new(0.0, 30.0, 42.0));
    }

    #[test]
    fn test_turn_at_control_point() {
        let mut path = path();
        path.turn_at(84.0, FRAC_PI_2);
        assert_eq!(path.points().len(), 2 + 10);
        assert!(approx(path.tangent_at_distance(85.0), Vec3::X));
    }

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(3.0 * FRAC_PI_2) + FRAC_PI_2).abs() < 1e-5);
        assert!((normalize_angle(-PI) - PI).abs() < 1e-5);
        assert!((normalize_angle(PI) - PI).abs() < 1e-5);
        assert!(normalize_angle(2.0 * PI).abs() < 1e-5);
    }
}
