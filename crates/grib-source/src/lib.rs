//! GRIB2 adapter for the delta encoder.
//!
//! Decoding itself is delegated to the `grib` crate. This crate only maps a
//! decoded submessage onto [`wgf4::GridMessage`]: bounding box and spacing
//! from the regular lat/lon grid definition (template 3.0, integer
//! microdegrees), and bitmap-masked points (decoded as NaN) onto
//! [`wgf4::Cell::Missing`].

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use thiserror::Error;
use tracing::debug;
use grib::{GridDefinitionTemplateValues, LatLonGridDefinition};
use wgf4::{Cell, GridGeometry, InMemoryGrid};

/// Errors raised while decoding a GRIB2 file.
#[derive(Error, Debug)]
pub enum GribSourceError {
    #[error("failed to open GRIB2 file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse GRIB2 data: {0}")]
    Parse(String),

    #[error("GRIB2 file contains no messages")]
    NoMessages,

    #[error("failed to decode GRIB2 values: {0}")]
    Decode(String),

    #[error("unsupported grid: {0}")]
    UnsupportedGrid(String),
}

/// Result type for GRIB2 decoding.
pub type Result<T> = std::result::Result<T, GribSourceError>;

/// Grid definition values are stored in units of 1e-6 degree.
const MICRODEGREES: f64 = 1_000_000.0;

const FULL_CIRCLE: i64 = 360_000_000;

/// Offset of the i/j direction increments in the section 3 payload
/// (octets 64-71 of the section).
const INCREMENTS_OFFSET: usize = 58;

/// Decode the first message of a GRIB2 file into an in-memory grid.
pub fn read_first_message(path: impl AsRef<Path>) -> Result<InMemoryGrid> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let grib2 = grib::from_reader(reader).map_err(|e| GribSourceError::Parse(e.to_string()))?;

    let (_, submessage) = grib2.iter().next().ok_or(GribSourceError::NoMessages)?;

    let grid_def = submessage.grid_def();
    let definition = match GridDefinitionTemplateValues::try_from(grid_def) {
        Ok(GridDefinitionTemplateValues::Template0(definition)) => definition,
        Ok(other) => {
            return Err(GribSourceError::UnsupportedGrid(format!(
                "expected a regular lat/lon grid, got {}",
                other.short_name()
            )))
        }
        Err(e) => return Err(GribSourceError::UnsupportedGrid(e.to_string())),
    };
    let payload: Vec<u8> = grid_def.iter().copied().collect();
    let geometry = geometry_from_definition(&definition, declared_increments(&payload))?;
    let (ni, nj) = definition.grid_shape();

    let decoder = grib::Grib2SubmessageDecoder::from(submessage)
        .map_err(|e| GribSourceError::Decode(e.to_string()))?;
    // A bitmap is decoded in whole octets; padding bits past the last point
    // come out as extra missing values.
    let cells: Vec<Cell> = decoder
        .dispatch()
        .map_err(|e| GribSourceError::Decode(e.to_string()))?
        .take(ni * nj)
        .map(cell_from_decoded)
        .collect();

    if cells.len() != ni * nj {
        return Err(GribSourceError::Decode(format!(
            "expected {} values for a {}x{} grid, got {}",
            ni * nj,
            ni,
            nj,
            cells.len()
        )));
    }

    debug!(
        path = %path.display(),
        ni = ni,
        nj = nj,
        missing = cells.iter().filter(|c| c.is_missing()).count(),
        "Decoded GRIB2 message"
    );

    Ok(InMemoryGrid::new(geometry, cells))
}

/// Bitmap-masked points come out of the decoder as NaN.
fn cell_from_decoded(value: f32) -> Cell {
    if value.is_nan() {
        Cell::Missing
    } else {
        Cell::Value(f64::from(value))
    }
}

/// The i and j direction increments (microdegrees) declared in a template
/// 3.0 payload. All-ones means "not given".
pub fn declared_increments(payload: &[u8]) -> Option<(u32, u32)> {
    let read = |offset: usize| -> Option<u32> {
        let bytes = payload.get(offset..offset + 4)?;
        let value = u32::from_be_bytes(bytes.try_into().ok()?);
        (value != u32::MAX).then_some(value)
    };
    Some((read(INCREMENTS_OFFSET)?, read(INCREMENTS_OFFSET + 4)?))
}

/// Derive bounds and spacing of a regular lat/lon grid from its definition.
///
/// `step_lan` is the i-direction increment and `step_lon` the j-direction
/// increment. Without declared increments they are derived from the corner
/// points and the grid shape. A box in the 0..360 convention is shifted as a
/// whole, so grids crossing the antimeridian keep a contiguous range.
pub fn geometry_from_definition(
    definition: &LatLonGridDefinition,
    increments: Option<(u32, u32)>,
) -> Result<GridGeometry> {
    let (ni, nj) = definition.grid_shape();
    if ni == 0 || nj == 0 {
        return Err(GribSourceError::UnsupportedGrid(format!(
            "empty grid shape {}x{}",
            ni, nj
        )));
    }

    let degrees = |microdegrees: i64| microdegrees as f64 / MICRODEGREES;
    let first_lat = i64::from(definition.first_point_lat);
    let last_lat = i64::from(definition.last_point_lat);

    let (west, east) = if definition.scanning_mode.scans_positively_for_i() {
        (definition.first_point_lon, definition.last_point_lon)
    } else {
        (definition.last_point_lon, definition.first_point_lon)
    };
    let (mut west, mut east) = (i64::from(west), i64::from(east));
    if east < west {
        east += FULL_CIRCLE;
    }
    if west > FULL_CIRCLE / 2 {
        west -= FULL_CIRCLE;
        east -= FULL_CIRCLE;
    }

    let (step_lan, step_lon) = match increments {
        Some((di, dj)) => (degrees(i64::from(di)), degrees(i64::from(dj))),
        None => (
            spacing(east - west, ni),
            spacing((last_lat - first_lat).abs(), nj),
        ),
    };

    Ok(GridGeometry::new(
        degrees(first_lat.min(last_lat)),
        degrees(first_lat.max(last_lat)),
        degrees(west),
        degrees(east),
        step_lan,
        step_lon,
    ))
}

/// Point spacing in degrees for `n` points over `span` microdegrees.
fn spacing(span: i64, n: usize) -> f64 {
    if n < 2 {
        return 0.0;
    }
    span as f64 / MICRODEGREES / (n - 1) as f64
}
