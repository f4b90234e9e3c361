//! WGF4 raster encoding for cumulative weather grids.
//!
//! A WGF4 file stores the per-cell difference between two grids that share
//! the same regular lat/lon geometry. Layout (all little-endian):
//!
//! ```text
//! +---------------------------------------------+
//! | 7 x i32  min_lat max_lat min_lon max_lon     |
//! |          step_lan step_lon multiplier        |
//! +---------------------------------------------+
//! | 1 x f32  empty value (sentinel)              |
//! +---------------------------------------------+
//! | N x f32  cell deltas, row-major,             |
//! |          left-to-right then bottom-to-top    |
//! +---------------------------------------------+
//! ```
//!
//! Geo fields are stored as fixed point: degrees multiplied by `multiplier`.
//!
//! # Example
//!
//! ```ignore
//! use wgf4::{DeltaEncoder, InMemoryGrid};
//!
//! let encoder = DeltaEncoder::default();
//! let written = encoder.convert(&start, &end, "out/PRATE.wgf4")?;
//! ```

pub mod encoder;
pub mod error;
pub mod grid;
pub mod raster;

pub use encoder::{DeltaEncoder, DEFAULT_EMPTY_VALUE, DEFAULT_MULTIPLIER};
pub use error::{Result, Wgf4Error};
pub use grid::{Cell, GeoField, GridGeometry, GridMessage, InMemoryGrid};
pub use raster::{Wgf4Header, Wgf4Raster, HEADER_LEN, PREAMBLE_LEN};
