//! Flight along the street grid: path, turns, camera and the beat-driven director.

mod camera;
mod director;
mod path;
mod turn;

pub use camera::{CameraConfig, CameraController, CameraPose, Perspective};
pub use director::{DirectorConfig, FlightDirector, TurnOutcome};
pub use path::{heading_direction, normalize_angle, FlightConfig, FlightPath};
pub use turn::{ease_in_out_cubic, TurnConfig, TurnController, TurnDirection};
