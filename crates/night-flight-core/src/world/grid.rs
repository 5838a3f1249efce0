//! Street grid layout shared by world generation and collision checks.
//!
//! The city is a lattice of square blocks separated by streets. Each block
//! holds `slots_per_block × slots_per_block` building slots, one every
//! `cell_size` units. Street centerlines sit at every multiple of
//! `block_pitch()` on both axes.
//!
//! `CityChunks` places buildings only at `slot_center` with half-widths no
//! larger than `max_building_half_width`, and the oracle blocks a box of
//! `max_building_half_width + safety_buffer` around every slot, so a point
//! the oracle calls clear can never be inside a generated building.

use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// Answers "is this ground position inside (or too close to) a building?"
pub trait ObstacleMap {
    fn is_blocked(&self, x: f32, z: f32) -> bool;
}

impl<F> ObstacleMap for F
where
    F: Fn(f32, f32) -> bool,
{
    fn is_blocked(&self, x: f32, z: f32) -> bool {
        self(x, z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CityGrid {
    /// Spacing between building slots inside a block
    pub cell_size: f32,
    /// Slots along each side of a block
    pub slots_per_block: u32,
    /// Width of the street between two blocks
    pub street_width: f32,
    /// Largest footprint half-width the generator may produce
    pub max_building_half_width: f32,
    pub min_building_half_width: f32,
    /// Extra clearance added around every footprint by the oracle
    pub safety_buffer: f32,
    pub min_building_height: f32,
    pub max_building_height: f32,
    /// Blocks along each side of a generation chunk
    pub blocks_per_chunk: u32,
}

impl Default for CityGrid {
    fn default() -> Self {
        Self {
            cell_size: 20.0,
            slots_per_block: 3,
            street_width: 24.0,
            max_building_half_width: 8.0,
            min_building_half_width: 4.0,
            safety_buffer: 2.0,
            min_building_height: 15.0,
            max_building_height: 120.0,
            blocks_per_chunk: 4,
        }
    }
}

impl CityGrid {
    /// Distance between two parallel street centerlines
    pub fn block_pitch(&self) -> f32 {
        self.slots_per_block as f32 * self.cell_size + self.street_width
    }

    /// Side length of a generation chunk
    pub fn chunk_size(&self) -> f32 {
        self.blocks_per_chunk as f32 * self.block_pitch()
    }

    /// Half-extent of the box the oracle treats as solid around each slot
    pub fn blocked_reach(&self) -> f32 {
        self.max_building_half_width + self.safety_buffer
    }

    /// Check that streets stay clear and buildings fit their cells
    pub fn validate(&self) -> Result<(), GridError> {
        for (name, value) in [
            ("cell_size", self.cell_size),
            ("street_width", self.street_width),
            ("max_building_half_width", self.max_building_half_width),
            ("min_building_half_width", self.min_building_half_width),
            ("max_building_height", self.max_building_height),
            ("slots_per_block", self.slots_per_block as f32),
            ("blocks_per_chunk", self.blocks_per_chunk as f32),
        ] {
            if !(value > 0.0) {
                return Err(GridError::NonPositive { name, value });
            }
        }
        if self.safety_buffer < 0.0 {
            return Err(GridError::NonPositive {
                name: "safety_buffer",
                value: self.safety_buffer,
            });
        }
        if self.min_building_half_width > self.max_building_half_width {
            return Err(GridError::InvertedHalfWidth {
                min: self.min_building_half_width,
                max: self.max_building_half_width,
            });
        }

        let clearance = self.street_width / 2.0 + self.cell_size / 2.0;
        let reach = self.blocked_reach();
        if reach >= clearance {
            return Err(GridError::StreetBlocked { reach, clearance });
        }

        let half_cell = self.cell_size / 2.0;
        if self.max_building_half_width > half_cell {
            return Err(GridError::BuildingOverflowsCell {
                half_width: self.max_building_half_width,
                half_cell,
            });
        }
        Ok(())
    }

    /// World coordinate of slot `index` along one axis.
    ///
    /// Slot 0 is the first slot of block 0, which starts half a street after
    /// the centerline at 0.
    pub fn axis_slot_center(&self, index: i64) -> f32 {
        let n = self.slots_per_block as i64;
        let block = index.div_euclid(n);
        let local = index.rem_euclid(n);
        block as f32 * self.block_pitch()
            + self.street_width / 2.0
            + (local as f32 + 0.5) * self.cell_size
    }

    /// Ground position of the slot at `(sx, sz)`
    pub fn slot_center(&self, sx: i64, sz: i64) -> (f32, f32) {
        (self.axis_slot_center(sx), self.axis_slot_center(sz))
    }

    /// Index of the slot whose center is closest to `v` on one axis
    pub fn nearest_axis_slot(&self, v: f32) -> i64 {
        let pitch = self.block_pitch();
        let n = self.slots_per_block as i64;
        let block = (v / pitch).floor() as i64;
        let local = (v - block as f32 * pitch - self.street_width / 2.0) / self.cell_size;
        let guess = block * n + (local.floor() as i64).clamp(0, n - 1);

        // In the street the closest slot may belong to the neighbouring block
        [guess - 1, guess, guess + 1]
            .into_iter()
            .min_by(|&a, &b| {
                let da = (self.axis_slot_center(a) - v).abs();
                let db = (self.axis_slot_center(b) - v).abs();
                da.total_cmp(&db)
            })
            .unwrap_or(guess)
    }

    /// Distance along one axis to the closest slot center
    pub fn axis_distance_to_slot(&self, v: f32) -> f32 {
        (self.axis_slot_center(self.nearest_axis_slot(v)) - v).abs()
    }

    /// Nearest street centerline coordinate on one axis
    pub fn nearest_street(&self, v: f32) -> f32 {
        let pitch = self.block_pitch();
        (v / pitch).round() * pitch
    }
}

impl ObstacleMap for CityGrid {
    fn is_blocked(&self, x: f32, z: f32) -> bool {
        // Slots form a product grid, so both axes can be tested separately
        let reach = self.blocked_reach();
        self.axis_distance_to_slot(x) <= reach && self.axis_distance_to_slot(z) <= reach
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grid_is_valid() {
        let grid = CityGrid::default();
        assert!(grid.validate().is_ok());
        assert_eq!(grid.block_pitch(), 84.0);
    }

    #[test]
    fn test_streets_are_clear() {
        let grid = CityGrid::default();
        for street in -3..=3 {
            let line = street as f32 * grid.block_pitch();
            for step in -400..400 {
                let along = step as f32 * 1.7;
                assert!(!grid.is_blocked(line, along), "x street {} at z={}", line, along);
                assert!(!grid.is_blocked(along, line), "z street {} at x={}", line, along);
            }
        }
    }

    #[test]
    fn test_slot_centers_are_blocked() {
        let grid = CityGrid::default();
        for sx in -7..7 {
            for sz in -7..7 {
                let (x, z) = grid.slot_center(sx, sz);
                assert!(grid.is_blocked(x, z));
                assert!(grid.is_blocked(x + grid.blocked_reach() - 0.01, z));
            }
        }
    }

    #[test]
    fn test_axis_slot_centers() {
        let grid = CityGrid::default();
        assert_eq!(grid.axis_slot_center(0), 22.0);
        assert_eq!(grid.axis_slot_center(2), 62.0);
        assert_eq!(grid.axis_slot_center(3), 106.0);
        assert_eq!(grid.axis_slot_center(-1), -22.0);
        assert_eq!(grid.nearest_axis_slot(-5.0), -1);
        assert_eq!(grid.nearest_axis_slot(5.0), 0);
        assert_eq!(grid.nearest_axis_slot(70.0), 2);
    }

    #[test]
    fn test_nearest_street() {
        let grid = CityGrid::default();
        assert_eq!(grid.nearest_street(40.0), 0.0);
        assert_eq!(grid.nearest_street(43.0), 84.0);
        assert_eq!(grid.nearest_street(-100.0), -84.0);
    }

    #[test]
    fn test_validate_rejects_blocked_streets() {
        let grid = CityGrid {
            max_building_half_width: 20.0,
            ..CityGrid::default()
        };
        assert!(matches!(grid.validate(), Err(GridError::StreetBlocked { .. })));

        let grid = CityGrid {
            cell_size: 0.0,
            ..CityGrid::default()
        };
        assert!(matches!(
            grid.validate(),
            Err(GridError::NonPositive { name: "cell_size", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_overlapping_buildings() {
        // Streets stay clear (reach 10 < 18) but 8-unit footprints overlap in 12-unit cells
        let grid = CityGrid {
            cell_size: 12.0,
            ..CityGrid::default()
        };
        assert_eq!(
            grid.validate(),
            Err(GridError::BuildingOverflowsCell {
                half_width: 8.0,
                half_cell: 6.0,
            })
        );

        let grid = CityGrid {
            cell_size: 16.0,
            ..CityGrid::default()
        };
        assert!(grid.validate().is_ok());
    }
}
