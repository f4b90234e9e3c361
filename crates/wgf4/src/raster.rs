//! Reading WGF4 rasters back into memory.

use std::path::Path;

use bytes::Buf;
use serde::Serialize;

use crate::error::{Result, Wgf4Error};
use crate::grid::GridGeometry;

/// Size of the fixed-point header: 7 x i32.
pub const HEADER_LEN: usize = 7 * 4;

/// Header plus the f32 empty value.
pub const PREAMBLE_LEN: usize = HEADER_LEN + 4;

/// Fixed-point header of a WGF4 file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Wgf4Header {
    pub min_lat: i32,
    pub max_lat: i32,
    pub min_lon: i32,
    pub max_lon: i32,
    pub step_lan: i32,
    pub step_lon: i32,
    pub multiplier: i32,
}

impl Wgf4Header {
    /// Header integers in file order.
    pub fn to_array(&self) -> [i32; 7] {
        [
            self.min_lat,
            self.max_lat,
            self.min_lon,
            self.max_lon,
            self.step_lan,
            self.step_lon,
            self.multiplier,
        ]
    }

    /// Geometry in degrees (lossy: limited by the multiplier).
    pub fn geometry(&self) -> GridGeometry {
        let m = f64::from(self.multiplier);
        GridGeometry::new(
            f64::from(self.min_lat) / m,
            f64::from(self.max_lat) / m,
            f64::from(self.min_lon) / m,
            f64::from(self.max_lon) / m,
            f64::from(self.step_lan) / m,
            f64::from(self.step_lon) / m,
        )
    }
}

/// A decoded WGF4 file.
#[derive(Debug, Clone, PartialEq)]
pub struct Wgf4Raster {
    pub header: Wgf4Header,
    pub empty_value: f32,
    pub values: Vec<f32>,
}

impl Wgf4Raster {
    /// Parse a complete WGF4 byte stream.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < PREAMBLE_LEN {
            return Err(Wgf4Error::malformed(format!(
                "need at least {} bytes, got {}",
                PREAMBLE_LEN,
                data.len()
            )));
        }
        if (data.len() - PREAMBLE_LEN) % 4 != 0 {
            return Err(Wgf4Error::malformed(format!(
                "cell section of {} bytes is not a multiple of 4",
                data.len() - PREAMBLE_LEN
            )));
        }

        let mut buf = data;
        let header = Wgf4Header {
            min_lat: buf.get_i32_le(),
            max_lat: buf.get_i32_le(),
            min_lon: buf.get_i32_le(),
            max_lon: buf.get_i32_le(),
            step_lan: buf.get_i32_le(),
            step_lon: buf.get_i32_le(),
            multiplier: buf.get_i32_le(),
        };
        if header.multiplier <= 0 {
            return Err(Wgf4Error::malformed(format!(
                "non-positive multiplier {}",
                header.multiplier
            )));
        }
        let empty_value = buf.get_f32_le();

        let mut values = Vec::with_capacity(buf.remaining() / 4);
        while buf.has_remaining() {
            values.push(buf.get_f32_le());
        }

        Ok(Self {
            header,
            empty_value,
            values,
        })
    }

    /// Read and parse a WGF4 file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Number of cells not equal to the empty value.
    pub fn valid_count(&self) -> usize {
        self.valid_values().count()
    }

    /// Minimum and maximum over non-empty cells.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.valid_values().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    fn valid_values(&self) -> impl Iterator<Item = f32> + '_ {
        self.values
            .iter()
            .copied()
            .filter(move |v| *v != self.empty_value)
    }
}
