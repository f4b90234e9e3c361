//! Synthetic cumulative precipitation grids.
//!
//! Values are predictable so that deltas between lead times can be checked
//! exactly: cell `k` at lead time `h` holds `h * (k + 1) * 0.5` millimetres.

use wgf4::{Cell, GridGeometry, InMemoryGrid};

use crate::fixtures::geometry::{SMALL, SMALL_NI, SMALL_NJ};

/// Cumulative precipitation at `offset_hours` over the [`SMALL`] geometry.
pub fn cumulative_grid(offset_hours: u32) -> InMemoryGrid {
    cumulative_grid_with(SMALL, SMALL_NI * SMALL_NJ, offset_hours)
}

/// Cumulative precipitation with `len` cells over an arbitrary geometry.
pub fn cumulative_grid_with(geometry: GridGeometry, len: usize, offset_hours: u32) -> InMemoryGrid {
    let cells = (0..len)
        .map(|k| Cell::Value(f64::from(offset_hours) * (k as f64 + 1.0) * 0.5))
        .collect();
    InMemoryGrid::new(geometry, cells)
}

/// Expected delta of cell `k` between two consecutive lead times.
pub fn expected_hourly_delta(k: usize) -> f32 {
    ((k as f64 + 1.0) * 0.5) as f32
}

/// Mark every `stride`-th cell (starting at 0) as missing.
pub fn with_missing_every(mut grid: InMemoryGrid, stride: usize) -> InMemoryGrid {
    for (k, cell) in grid.cells.iter_mut().enumerate() {
        if k % stride == 0 {
            *cell = Cell::Missing;
        }
    }
    grid
}
