//! Delta encoder: subtracts two cumulative grids and serializes the result.

use std::fs;
use std::path::{Path, PathBuf};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, instrument};

use crate::error::{Result, Wgf4Error};
use crate::grid::{Cell, GeoField, GridMessage};
use crate::raster::PREAMBLE_LEN;

/// Default fixed-point multiplier (4 decimal digits of degree precision).
pub const DEFAULT_MULTIPLIER: i32 = 10_000;

/// Default value written for missing cells.
pub const DEFAULT_EMPTY_VALUE: f32 = -100_500.0;

/// Scaled header values closer than this to an integer are rounded to it
/// before truncation, so that e.g. `0.1 * 10000` encodes as 1000.
const SNAP_EPSILON: f64 = 1e-6;

/// Encodes the difference `end - start` of two grids as a WGF4 raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaEncoder {
    multiplier: i32,
    empty_value: f32,
}

impl Default for DeltaEncoder {
    fn default() -> Self {
        Self {
            multiplier: DEFAULT_MULTIPLIER,
            empty_value: DEFAULT_EMPTY_VALUE,
        }
    }
}

impl DeltaEncoder {
    /// Create an encoder. `multiplier` must be positive.
    pub fn new(multiplier: i32, empty_value: f32) -> Result<Self> {
        if multiplier <= 0 {
            return Err(Wgf4Error::InvalidMultiplier(multiplier));
        }
        Ok(Self {
            multiplier,
            empty_value,
        })
    }

    pub fn multiplier(&self) -> i32 {
        self.multiplier
    }

    pub fn empty_value(&self) -> f32 {
        self.empty_value
    }

    /// Build the complete WGF4 byte stream in memory.
    ///
    /// Fails with `GridMismatch` if the geometries differ and with
    /// `GridLengthMismatch` if the cell sequences differ in length.
    pub fn encode<S, E>(&self, start: &S, end: &E) -> Result<Bytes>
    where
        S: GridMessage + ?Sized,
        E: GridMessage + ?Sized,
    {
        let geometry = start.geometry();
        if let Some(field) = geometry.first_mismatch(&end.geometry()) {
            return Err(Wgf4Error::GridMismatch { field });
        }

        let mut buf = BytesMut::with_capacity(PREAMBLE_LEN);
        for (field, value) in geometry.fields() {
            buf.put_i32_le(scale_field(field, value, self.multiplier)?);
        }
        buf.put_i32_le(self.multiplier);
        buf.put_f32_le(self.empty_value);

        let mut start_cells = start.cells();
        let mut end_cells = end.cells();
        let mut count = 0usize;
        loop {
            match (start_cells.next(), end_cells.next()) {
                (Some(s), Some(e)) => {
                    buf.put_f32_le(self.delta(s, e));
                    count += 1;
                }
                (None, None) => break,
                (Some(_), None) => {
                    return Err(Wgf4Error::GridLengthMismatch {
                        start: count + 1 + start_cells.count(),
                        end: count,
                    });
                }
                (None, Some(_)) => {
                    return Err(Wgf4Error::GridLengthMismatch {
                        start: count,
                        end: count + 1 + end_cells.count(),
                    });
                }
            }
        }

        debug!(cells = count, bytes = buf.len(), "Encoded WGF4 raster");
        Ok(buf.freeze())
    }

    /// Encode and write the raster to `path`.
    ///
    /// Nothing is written unless encoding succeeds. The file appears at
    /// `path` in a single rename, so readers never observe a partial file.
    /// Returns the number of bytes written.
    #[instrument(skip(self, start, end), fields(path = %path.as_ref().display()))]
    pub fn convert<S, E>(&self, start: &S, end: &E, path: impl AsRef<Path>) -> Result<u64>
    where
        S: GridMessage + ?Sized,
        E: GridMessage + ?Sized,
    {
        let data = self.encode(start, end)?;
        write_atomic(path.as_ref(), &data)?;
        Ok(data.len() as u64)
    }

    fn delta(&self, start: Cell, end: Cell) -> f32 {
        match (start, end) {
            (Cell::Value(s), Cell::Value(e)) => (e - s) as f32,
            _ => self.empty_value,
        }
    }
}

/// Scale a geo field to fixed point, truncating toward zero.
fn scale_field(field: GeoField, value: f64, multiplier: i32) -> Result<i32> {
    let scaled = value * f64::from(multiplier);
    let nearest = scaled.round();
    let scaled = if (scaled - nearest).abs() < SNAP_EPSILON {
        nearest
    } else {
        scaled.trunc()
    };

    if !scaled.is_finite() || scaled < f64::from(i32::MIN) || scaled > f64::from(i32::MAX) {
        return Err(Wgf4Error::HeaderOverflow { field, value });
    }
    Ok(scaled as i32)
}

/// Write `data` to a sibling temp file and rename it over `path`.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let sink_err = |source| Wgf4Error::SinkWriteFailure {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(sink_err)?;
    }

    let partial = partial_path(path);
    if let Err(e) = fs::write(&partial, data) {
        fs::remove_file(&partial).ok();
        return Err(sink_err(e));
    }
    if let Err(e) = fs::rename(&partial, path) {
        fs::remove_file(&partial).ok();
        return Err(sink_err(e));
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "wgf4".to_string());
    path.with_file_name(format!(".{}.partial", name))
}
