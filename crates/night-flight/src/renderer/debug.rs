//! Debug HUD.
//!
//! Text overlay with the classifier and flight state, drawn on top of the city.

use nannou::prelude::*;
use night_flight_core::Perspective;
use std::time::Instant;

/// Snapshot of the state shown in the HUD
#[derive(Debug, Clone, Default)]
pub struct HudInfo {
    pub energy: f32,
    pub short_mean: f32,
    pub long_mean: f32,
    pub beat_intensity: f32,
    pub speed: f32,
    pub base_speed: f32,
    pub heading: f32,
    pub perspective: Option<Perspective>,
    pub turning: bool,
    pub turns_taken: u32,
    pub turns_skipped: u32,
    pub buildings: usize,
    pub device: Option<String>,
}

pub struct DebugHud {
    last_frame_time: Instant,
    display_fps: f32,
    info: HudInfo,
}

impl DebugHud {
    pub fn new() -> Self {
        Self {
            last_frame_time: Instant::now(),
            display_fps: 0.0,
            info: HudInfo::default(),
        }
    }

    pub fn update(&mut self, info: HudInfo) {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame_time).as_secs_f32();
        let current_fps = if delta > 0.0 { 1.0 / delta } else { 0.0 };
        // Exponential moving average
        self.display_fps = self.display_fps * 0.9 + current_fps * 0.1;
        self.last_frame_time = now;
        self.info = info;
    }

    pub fn lines(&self) -> Vec<String> {
        let info = &self.info;
        let perspective = match info.perspective {
            Some(Perspective::ThirdPerson) => "third person",
            _ => "first person",
        };
        vec![
            format!("fps {:.0}", self.display_fps),
            format!(
                "energy {:.1}  short {:.1}  long {:.1}",
                info.energy, info.short_mean, info.long_mean
            ),
            format!("beat {:.2}", info.beat_intensity),
            format!("speed {:.1} / {:.1}", info.speed, info.base_speed),
            format!(
                "heading {:.0}°{}",
                info.heading.to_degrees(),
                if info.turning { "  turning" } else { "" }
            ),
            format!("turns {}  skipped {}", info.turns_taken, info.turns_skipped),
            format!("{}  buildings {}", perspective, info.buildings),
            format!("audio {}", info.device.as_deref().unwrap_or("silent")),
        ]
    }

    pub fn draw(&self, draw: &Draw, bounds: Rect) {
        let lines = self.lines();
        let line_height = 18.0;
        let width = 320.0;
        let height = line_height * lines.len() as f32 + 16.0;
        let left = bounds.left() + 12.0;
        let top = bounds.top() - 12.0;

        draw.rect()
            .x_y(left + width / 2.0, top - height / 2.0)
            .w_h(width, height)
            .color(rgba(0.0, 0.0, 0.0, 0.6));

        for (i, line) in lines.iter().enumerate() {
            let y = top - 8.0 - line_height * (i as f32 + 0.5);
            draw.text(line)
                .x_y(left + width / 2.0, y)
                .w_h(width - 16.0, line_height)
                .left_justify()
                .font_size(13)
                .color(rgb(0.6, 1.0, 0.8));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_show_state() {
        let mut hud = DebugHud::new();
        hud.update(HudInfo {
            heading: std::f32::consts::FRAC_PI_2,
            turning: true,
            turns_taken: 3,
            perspective: Some(Perspective::ThirdPerson),
            ..Default::default()
        });
        let lines = hud.lines();
        assert!(lines.iter().any(|l| l.contains("heading 90°  turning")));
        assert!(lines.iter().any(|l| l.contains("turns 3")));
        assert!(lines.iter().any(|l| l.starts_with("third person")));
        assert!(lines.iter().any(|l| l == "audio silent"));
    }
}
