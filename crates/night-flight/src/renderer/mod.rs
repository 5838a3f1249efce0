//! Wireframe city rendering.
//!
//! Buildings are projected with a look-at view and a perspective
//! projection, then drawn as neon edge outlines with nannou's `Draw`. Beats
//! pulse the outline brightness through a shared cell the classifier's beat
//! subscription writes into.

mod debug;

pub use debug::{DebugHud, HudInfo};

use glam::{Mat4, Vec2, Vec3, Vec4};
use nannou::prelude::*;
use night_flight_core::{Building, CameraPose, CityChunks};
use std::cell::Cell;
use std::rc::Rc;

const FOV_Y: f32 = 1.1;
const NEAR: f32 = 0.5;
const FAR: f32 = 900.0;
const PULSE_DECAY: f32 = 0.9;

/// Edges of a box, as corner index pairs (bit 0 = x, bit 1 = y, bit 2 = z)
const BOX_EDGES: [(usize, usize); 12] = [
    (0, 1), (2, 3), (4, 5), (6, 7),
    (0, 2), (1, 3), (4, 6), (5, 7),
    (0, 4), (1, 5), (2, 6), (3, 7),
];

/// Combined view-projection for a camera pose
pub fn view_projection(pose: &CameraPose, aspect: f32) -> Mat4 {
    let view = Mat4::look_at_rh(pose.position, pose.target, pose.up);
    let projection = Mat4::perspective_rh(FOV_Y, aspect.max(0.01), NEAR, FAR);
    projection * view
}

/// Project a world point to window coordinates (origin at the center, y up).
/// Returns `None` for points behind the near plane.
pub fn project(view_proj: &Mat4, point: Vec3, half_size: Vec2) -> Option<Vec2> {
    let clip: Vec4 = *view_proj * point.extend(1.0);
    if clip.w <= NEAR {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    Some(Vec2::new(ndc.x * half_size.x, ndc.y * half_size.y))
}

fn building_corners(b: &Building) -> [Vec3; 8] {
    let mut corners = [Vec3::ZERO; 8];
    for (i, corner) in corners.iter_mut().enumerate() {
        let x = if i & 1 == 0 { -b.half_width_x } else { b.half_width_x };
        let y = if i & 2 == 0 { 0.0 } else { b.height };
        let z = if i & 4 == 0 { -b.half_width_z } else { b.half_width_z };
        *corner = Vec3::new(b.center_x + x, y, b.center_z + z);
    }
    corners
}

pub struct Renderer {
    /// Beat pulse in [0, 1]; set by the beat subscription, decayed here
    pulse: Rc<Cell<f32>>,
    debug_hud: DebugHud,
    show_debug: bool,
}

impl Renderer {
    pub fn new(pulse: Rc<Cell<f32>>) -> Self {
        Self {
            pulse,
            debug_hud: DebugHud::new(),
            show_debug: false,
        }
    }

    pub fn toggle_debug_viz(&mut self) {
        self.show_debug = !self.show_debug;
    }

    pub fn update(&mut self, info: HudInfo) {
        self.pulse.set(self.pulse.get() * PULSE_DECAY);
        self.debug_hud.update(info);
    }

    pub fn draw(&self, draw: &Draw, bounds: Rect, pose: &CameraPose, city: &CityChunks) {
        draw.background().color(rgb(0.01, 0.0, 0.03));

        let half = Vec2::new(bounds.w() / 2.0, bounds.h() / 2.0);
        let view_proj = view_projection(pose, bounds.w() / bounds.h().max(1.0));
        let pulse = self.pulse.get();

        self.draw_streets(draw, &view_proj, half, pose, city);

        for building in city.buildings() {
            let center = Vec3::new(building.center_x, pose.position.y, building.center_z);
            let distance = center.distance(pose.position);
            if distance > FAR {
                continue;
            }
            // Far buildings fade into the haze
            let fade = 1.0 - (distance / FAR).powf(1.5);
            let lightness = 0.35 + 0.3 * pulse;
            let color = hsla(building.hue / 360.0, 0.9, lightness, fade);

            let corners = building_corners(building);
            let projected = corners.map(|c| project(&view_proj, c, half));
            for (a, b) in BOX_EDGES {
                if let (Some(start), Some(end)) = (projected[a], projected[b]) {
                    draw.line()
                        .start(pt2(start.x, start.y))
                        .end(pt2(end.x, end.y))
                        .weight(1.0 + 1.5 * pulse)
                        .color(color);
                }
            }
        }
    }

    /// Faint street centerlines around the camera
    fn draw_streets(&self, draw: &Draw, view_proj: &Mat4, half: Vec2, pose: &CameraPose, city: &CityChunks) {
        let pitch = city.grid().block_pitch();
        let reach = (FAR / pitch).ceil() as i32;
        let cx = (pose.position.x / pitch).round() as i32;
        let cz = (pose.position.z / pitch).round() as i32;
        let color = rgba(0.2, 0.05, 0.35, 0.5);

        for k in -reach..=reach {
            let x = (cx + k) as f32 * pitch;
            let z = (cz + k) as f32 * pitch;
            let lines = [
                (Vec3::new(x, 0.0, pose.position.z - FAR), Vec3::new(x, 0.0, pose.position.z + FAR)),
                (Vec3::new(pose.position.x - FAR, 0.0, z), Vec3::new(pose.position.x + FAR, 0.0, z)),
            ];
            for (a, b) in lines {
                if let Some((start, end)) = clip_segment(view_proj, a, b, half) {
                    draw.line().start(pt2(start.x, start.y)).end(pt2(end.x, end.y)).weight(1.0).color(color);
                }
            }
        }
    }

    pub fn draw_debug_viz(&self, draw: &Draw, bounds: Rect) {
        if self.show_debug {
            self.debug_hud.draw(draw, bounds);
        }
    }
}

/// Project a segment, trimming the part behind the near plane
fn clip_segment(view_proj: &Mat4, a: Vec3, b: Vec3, half: Vec2) -> Option<(Vec2, Vec2)> {
    let wa = (*view_proj * a.extend(1.0)).w;
    let wb = (*view_proj * b.extend(1.0)).w;
    let min_w = NEAR * 2.0;
    if wa <= min_w && wb <= min_w {
        return None;
    }
    let (a, b) = if wa <= min_w {
        (a.lerp(b, (min_w - wa) / (wb - wa)), b)
    } else if wb <= min_w {
        (a, a.lerp(b, (min_w - wa) / (wb - wa)))
    } else {
        (a, b)
    };
    Some((project(view_proj, a, half)?, project(view_proj, b, half)?))
}
