mod chunks;
mod grid;

pub use chunks::{Building, ChunkCoord, CityChunks};
pub use grid::{CityGrid, ObstacleMap};
