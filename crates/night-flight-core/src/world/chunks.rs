//! Procedural building placement around the camera.
//!
//! The world is split into square chunks of `CityGrid::chunk_size()`. Chunks
//! within the view radius of the camera are generated on demand and dropped
//! once the camera moves away. Generation is a pure function of the world
//! seed and the slot coordinate, so a chunk that is unloaded and later
//! regenerated comes back identical.

use std::collections::HashMap;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::grid::CityGrid;

/// Chance that a slot is left as an empty lot
const DEFAULT_EMPTY_LOT_CHANCE: f32 = 0.12;
/// Chunks loaded in each direction around the camera's chunk
const DEFAULT_VIEW_RADIUS: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the ground point `(x, z)`
    pub fn containing(grid: &CityGrid, x: f32, z: f32) -> Self {
        let size = grid.chunk_size();
        Self {
            x: (x / size).floor() as i32,
            z: (z / size).floor() as i32,
        }
    }

    /// Chebyshev distance in chunks
    pub fn distance(&self, other: &ChunkCoord) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }
}

/// One generated building, an axis-aligned box standing on the ground
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Building {
    /// Grid slot the building occupies
    pub slot: (i64, i64),
    pub center_x: f32,
    pub center_z: f32,
    pub half_width_x: f32,
    pub half_width_z: f32,
    pub height: f32,
    /// Neon tint in degrees (0-360)
    pub hue: f32,
}

impl Building {
    /// Whether the ground point lies inside the footprint
    pub fn contains(&self, x: f32, z: f32) -> bool {
        (x - self.center_x).abs() <= self.half_width_x
            && (z - self.center_z).abs() <= self.half_width_z
    }
}

/// Registry of the buildings currently generated around the camera
pub struct CityChunks {
    grid: CityGrid,
    seed: u64,
    view_radius: i32,
    empty_lot_chance: f32,
    chunks: HashMap<ChunkCoord, Vec<Building>>,
    center: Option<ChunkCoord>,
}

impl CityChunks {
    pub fn new(grid: CityGrid, seed: u64) -> Self {
        Self {
            grid,
            seed,
            view_radius: DEFAULT_VIEW_RADIUS,
            empty_lot_chance: DEFAULT_EMPTY_LOT_CHANCE,
            chunks: HashMap::new(),
            center: None,
        }
    }

    pub fn with_view_radius(mut self, radius: i32) -> Self {
        self.view_radius = radius.max(0);
        self
    }

    pub fn with_empty_lot_chance(mut self, chance: f32) -> Self {
        self.empty_lot_chance = chance.clamp(0.0, 1.0);
        self
    }

    /// Load chunks around the camera and drop distant ones.
    ///
    /// Cheap when the camera hasn't left its chunk. Returns true if the set
    /// of loaded chunks changed.
    pub fn update(&mut self, camera: Vec3) -> bool {
        let center = ChunkCoord::containing(&self.grid, camera.x, camera.z);
        if self.center == Some(center) {
            return false;
        }
        self.center = Some(center);

        let radius = self.view_radius;
        let before = self.chunks.len();
        self.chunks.retain(|coord, _| coord.distance(&center) <= radius);
        let unloaded = before - self.chunks.len();

        let mut loaded = 0;
        for dx in -radius..=radius {
            for dz in -radius..=radius {
                let coord = ChunkCoord::new(center.x + dx, center.z + dz);
                if !self.chunks.contains_key(&coord) {
                    let buildings = self.generate_chunk(coord);
                    self.chunks.insert(coord, buildings);
                    loaded += 1;
                }
            }
        }

        log::debug!(
            "chunks around ({}, {}): +{} -{} ({} loaded, {} buildings)",
            center.x,
            center.z,
            loaded,
            unloaded,
            self.chunks.len(),
            self.building_count()
        );
        loaded > 0 || unloaded > 0
    }

    /// Deterministically build every slot of one chunk
    pub fn generate_chunk(&self, coord: ChunkCoord) -> Vec<Building> {
        let slots = (self.grid.blocks_per_chunk * self.grid.slots_per_block) as i64;
        let first_x = coord.x as i64 * slots;
        let first_z = coord.z as i64 * slots;

        let mut buildings = Vec::with_capacity((slots * slots) as usize);
        for sx in first_x..first_x + slots {
            for sz in first_z..first_z + slots {
                if let Some(building) = self.generate_slot(sx, sz) {
                    buildings.push(building);
                }
            }
        }
        buildings
    }

    fn generate_slot(&self, sx: i64, sz: i64) -> Option<Building> {
        let mut rng = StdRng::seed_from_u64(slot_seed(self.seed, sx, sz));
        if rng.random::<f32>() < self.empty_lot_chance {
            return None;
        }

        let grid = &self.grid;
        let (center_x, center_z) = grid.slot_center(sx, sz);
        let min = grid.min_building_half_width;
        let max = grid.max_building_half_width;
        let height_min = grid.min_building_height.min(grid.max_building_height);

        // Occasional towers; most of the skyline stays low
        let height_t = rng.random::<f32>().powf(2.2);

        Some(Building {
            slot: (sx, sz),
            center_x,
            center_z,
            half_width_x: rng.random_range(min..=max),
            half_width_z: rng.random_range(min..=max),
            height: height_min + height_t * (grid.max_building_height - height_min),
            hue: rng.random_range(170.0..=330.0),
        })
    }

    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.chunks.values().flatten()
    }

    pub fn chunk_buildings(&self, coord: ChunkCoord) -> Option<&[Building]> {
        self.chunks.get(&coord).map(Vec::as_slice)
    }

    pub fn is_loaded(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn building_count(&self) -> usize {
        self.chunks.values().map(Vec::len).sum()
    }

    pub fn grid(&self) -> &CityGrid {
        &self.grid
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// Mix the world seed with a slot coordinate
fn slot_seed(seed: u64, sx: i64, sz: i64) -> u64 {
    let mut h = seed ^ (sx as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    h = h.rotate_left(31) ^ (sz as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    // splitmix64 finalizer
    h ^= h >> 30;
    h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h ^= h >> 27;
    h = h.wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^ (h >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::ObstacleMap;

    #[test]
    fn test_generation_is_deterministic() {
        let grid = CityGrid::default();
        let a = CityChunks::new(grid, 42);
        let b = CityChunks::new(grid, 42);
        let c = CityChunks::new(grid, 43);

        let coord = ChunkCoord::new(-1, 3);
        assert_eq!(a.generate_chunk(coord), b.generate_chunk(coord));
        assert_ne!(a.generate_chunk(coord), c.generate_chunk(coord));
    }

    #[test]
    fn test_oracle_covers_every_building() {
        let grid = CityGrid::default();
        let mut city = CityChunks::new(grid, 7);
        city.update(Vec3::ZERO);
        assert!(city.building_count() > 0);

        for b in city.buildings() {
            for (dx, dz) in [(-1.0, -1.0), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0), (0.0, 0.0)] {
                let x = b.center_x + dx * b.half_width_x;
                let z = b.center_z + dz * b.half_width_z;
                assert!(grid.is_blocked(x, z), "building {:?} corner not blocked", b.slot);
            }
            assert!(b.height >= grid.min_building_height && b.height <= grid.max_building_height);
        }
    }

    #[test]
    fn test_streets_never_cross_buildings() {
        let grid = CityGrid::default();
        let mut city = CityChunks::new(grid, 11).with_empty_lot_chance(0.0);
        city.update(Vec3::ZERO);

        let pitch = grid.block_pitch();
        for b in city.buildings() {
            for k in -12..=12 {
                let line = k as f32 * pitch;
                assert!(!b.contains(line, b.center_z));
                assert!(!b.contains(b.center_x, line));
            }
        }
    }

    #[test]
    fn test_update_loads_and_unloads_around_camera() {
        let grid = CityGrid::default();
        let mut city = CityChunks::new(grid, 1).with_view_radius(1);

        assert!(city.update(Vec3::new(10.0, 30.0, 10.0)));
        assert_eq!(city.chunk_count(), 9);
        assert!(city.is_loaded(ChunkCoord::new(-1, -1)));

        // Same chunk: nothing to do
        assert!(!city.update(Vec3::new(20.0, 30.0, 20.0)));

        let far = grid.chunk_size() * 5.5;
        assert!(city.update(Vec3::new(0.0, 30.0, far)));
        assert_eq!(city.chunk_count(), 9);
        assert!(!city.is_loaded(ChunkCoord::new(0, 0)));
        assert!(city.is_loaded(ChunkCoord::new(0, 5)));
    }

    #[test]
    fn test_chunk_has_every_slot_without_empty_lots() {
        let grid = CityGrid::default();
        let city = CityChunks::new(grid, 3).with_empty_lot_chance(0.0);
        let per_side = (grid.blocks_per_chunk * grid.slots_per_block) as usize;
        assert_eq!(city.generate_chunk(ChunkCoord::new(2, -2)).len(), per_side * per_side);
    }
}
