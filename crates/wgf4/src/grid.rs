//! Grid model shared by decoders and the delta encoder.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One grid cell as exposed by a decoder.
///
/// Missing cells are tagged explicitly; a `Value(0.0)` is a real zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
    Value(f64),
    Missing,
}

impl Cell {
    /// Build a cell from an optional value.
    pub fn from_option(value: Option<f64>) -> Self {
        match value {
            Some(v) => Cell::Value(v),
            None => Cell::Missing,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Cell::Value(v) => Some(*v),
            Cell::Missing => None,
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Value(value)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        Cell::from_option(value)
    }
}

/// The six scalar fields that identify a regular lat/lon grid.
///
/// Variants are declared in header order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeoField {
    MinLat,
    MaxLat,
    MinLon,
    MaxLon,
    StepLan,
    StepLon,
}

impl GeoField {
    /// All fields in header order.
    pub const ALL: [GeoField; 6] = [
        GeoField::MinLat,
        GeoField::MaxLat,
        GeoField::MinLon,
        GeoField::MaxLon,
        GeoField::StepLan,
        GeoField::StepLon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GeoField::MinLat => "min_lat",
            GeoField::MaxLat => "max_lat",
            GeoField::MinLon => "min_lon",
            GeoField::MaxLon => "max_lon",
            GeoField::StepLan => "step_lan",
            GeoField::StepLon => "step_lon",
        }
    }
}

impl fmt::Display for GeoField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounding box and spacing of a regular lat/lon grid, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
    /// Row spacing (latitude direction)
    pub step_lan: f64,
    /// Column spacing (longitude direction)
    pub step_lon: f64,
}

impl GridGeometry {
    pub fn new(
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
        step_lan: f64,
        step_lon: f64,
    ) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
            step_lan,
            step_lon,
        }
    }

    pub fn field(&self, field: GeoField) -> f64 {
        match field {
            GeoField::MinLat => self.min_lat,
            GeoField::MaxLat => self.max_lat,
            GeoField::MinLon => self.min_lon,
            GeoField::MaxLon => self.max_lon,
            GeoField::StepLan => self.step_lan,
            GeoField::StepLon => self.step_lon,
        }
    }

    /// Field values in header order.
    pub fn fields(&self) -> [(GeoField, f64); 6] {
        GeoField::ALL.map(|f| (f, self.field(f)))
    }

    /// First field (in header order) on which `other` differs.
    ///
    /// Comparison is exact; there is no tolerance.
    pub fn first_mismatch(&self, other: &GridGeometry) -> Option<GeoField> {
        GeoField::ALL
            .into_iter()
            .find(|&f| self.field(f) != other.field(f))
    }
}

/// A decoded grid message: geometry plus a lazy row-major cell sequence.
///
/// Cells are yielded left-to-right, then bottom-to-top. `cells` may be
/// called more than once; each call restarts the sequence.
pub trait GridMessage {
    fn geometry(&self) -> GridGeometry;

    fn cells(&self) -> Box<dyn Iterator<Item = Cell> + '_>;
}

/// A fully materialized grid.
#[derive(Debug, Clone, PartialEq)]
pub struct InMemoryGrid {
    pub geometry: GridGeometry,
    pub cells: Vec<Cell>,
}

impl InMemoryGrid {
    pub fn new(geometry: GridGeometry, cells: Vec<Cell>) -> Self {
        Self { geometry, cells }
    }

    /// Build a grid from optional values, `None` marking a missing cell.
    pub fn from_values(geometry: GridGeometry, values: impl IntoIterator<Item = Option<f64>>) -> Self {
        Self {
            geometry,
            cells: values.into_iter().map(Cell::from_option).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl GridMessage for InMemoryGrid {
    fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    fn cells(&self) -> Box<dyn Iterator<Item = Cell> + '_> {
        Box::new(self.cells.iter().copied())
    }
}

impl<T: GridMessage + ?Sized> GridMessage for Box<T> {
    fn geometry(&self) -> GridGeometry {
        (**self).geometry()
    }

    fn cells(&self) -> Box<dyn Iterator<Item = Cell> + '_> {
        (**self).cells()
    }
}
