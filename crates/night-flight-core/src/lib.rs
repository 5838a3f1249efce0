//! Beat-synchronized flight through a procedural night city.
//!
//! This crate holds everything that decides *where* the camera is and *when*
//! it moves: audio energy extraction and beat classification, the street
//! grid shared by world generation and collision checks, the flight path,
//! the turn state machine and the camera controller. Rendering and audio
//! capture live in the `night-flight` binary.

pub mod audio;
pub mod error;
pub mod events;
pub mod flight;
pub mod world;

pub use audio::{band_energy, BeatClassifier, ClassifierConfig, FrequencySource, RollingWindow};
pub use error::GridError;
pub use events::{BeatEvent, BeatKind, EventEmitter, FrameEvents, SubscriptionId};
pub use flight::{
    CameraConfig, CameraController, CameraPose, DirectorConfig, FlightConfig, FlightDirector,
    FlightPath, Perspective, TurnConfig, TurnController, TurnDirection, TurnOutcome,
};
pub use world::{Building, ChunkCoord, CityChunks, CityGrid, ObstacleMap};
