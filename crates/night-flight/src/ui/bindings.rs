//! Keyboard bindings and input handling.

use nannou::prelude::*;
use night_flight_core::TurnDirection;

/// Base speed change per Up/Down press
pub const SPEED_STEP: f32 = 10.0;

/// Actions that can be triggered by key presses
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Quit,
    TogglePerspective,
    Turn(TurnDirection),
    ToggleDebugViz,
    /// Add this much to the base speed
    AdjustSpeed(f32),
    /// Switch to the audio device with this index
    SelectDevice(usize),
}

/// Map a key press to an action
pub fn parse_key(key: Key, shift: bool) -> Option<Action> {
    let digit = match key {
        Key::Key0 => Some(0),
        Key::Key1 => Some(1),
        Key::Key2 => Some(2),
        Key::Key3 => Some(3),
        Key::Key4 => Some(4),
        Key::Key5 => Some(5),
        Key::Key6 => Some(6),
        Key::Key7 => Some(7),
        Key::Key8 => Some(8),
        Key::Key9 => Some(9),
        _ => None,
    };
    if let Some(d) = digit {
        return Some(Action::SelectDevice(if shift { d + 10 } else { d }));
    }

    match key {
        Key::Q => Some(Action::Quit),
        Key::P => Some(Action::TogglePerspective),
        Key::Left => Some(Action::Turn(TurnDirection::Left)),
        Key::Right => Some(Action::Turn(TurnDirection::Right)),
        Key::D => Some(Action::ToggleDebugViz),
        Key::Up => Some(Action::AdjustSpeed(SPEED_STEP)),
        Key::Down => Some(Action::AdjustSpeed(-SPEED_STEP)),
        _ => None,
    }
}
