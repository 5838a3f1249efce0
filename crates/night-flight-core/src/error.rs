//! Error types for the few fallible edges of the core.

use thiserror::Error;

/// Reasons a [`CityGrid`](crate::world::CityGrid) layout is rejected.
#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("grid dimension `{name}` must be positive (got {value})")]
    NonPositive { name: &'static str, value: f32 },

    /// Buildings (plus buffer) would reach into the street corridor, so a
    /// centerline flight could clip a facade.
    #[error(
        "building reach {reach:.2} leaves no clear street corridor (street half-width + half cell = {clearance:.2})"
    )]
    StreetBlocked { reach: f32, clearance: f32 },

    #[error("min building half-width {min:.2} exceeds max {max:.2}")]
    InvertedHalfWidth { min: f32, max: f32 },

    /// Neighbouring footprints in one block would overlap.
    #[error("building half-width {half_width:.2} exceeds half a cell ({half_cell:.2})")]
    BuildingOverflowsCell { half_width: f32, half_cell: f32 },
}
