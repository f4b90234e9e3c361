//! A minimal GRIB2 writer for decoder tests.
//!
//! Produces a single message with a regular lat/lon grid (template 3.0),
//! simple packing (template 5.0) and, when any cell is missing, a bitmap.
//! Values are packed as 16-bit integers with a binary scale of -1, so only
//! non-negative multiples of 0.5 up to 32767.5 survive exactly.

use wgf4::{Cell, InMemoryGrid};

const MICRODEGREES: f64 = 1_000_000.0;
const FULL_CIRCLE: i64 = 360_000_000;

/// Scanning mode flags: +i west to east, +j south to north.
const SOUTH_TO_NORTH: u8 = 0b0100_0000;

/// Encode `grid` as a GRIB2 message of `ni` columns by `nj` rows.
///
/// The first point is the south-west corner, longitudes are written in the
/// 0..360 convention, and the i/j increments are taken from `step_lan` and
/// `step_lon`.
pub fn encode_grib2(grid: &InMemoryGrid, ni: usize, nj: usize) -> Vec<u8> {
    assert_eq!(grid.len(), ni * nj, "grid has {} cells, expected {}x{}", grid.len(), ni, nj);

    let mut body = Vec::new();
    body.extend(identification_section());
    body.extend(grid_definition_section(grid, ni, nj));
    body.extend(product_definition_section());

    let encoded: Vec<u16> = grid
        .cells
        .iter()
        .filter_map(|cell| cell.value())
        .map(pack)
        .collect();
    body.extend(data_representation_section(encoded.len()));
    body.extend(bitmap_section(&grid.cells));
    body.extend(data_section(&encoded));
    body.extend_from_slice(b"7777");

    let total = (16 + body.len()) as u64;
    let mut message = Vec::with_capacity(total as usize);
    message.extend_from_slice(b"GRIB");
    message.extend_from_slice(&[0, 0, 0, 2]);
    message.extend_from_slice(&total.to_be_bytes());
    message.extend(body);
    message
}

fn section(number: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 5);
    out.extend_from_slice(&((payload.len() + 5) as u32).to_be_bytes());
    out.push(number);
    out.extend_from_slice(payload);
    out
}

fn identification_section() -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&78u16.to_be_bytes()); // centre: DWD Offenbach
    p.extend_from_slice(&255u16.to_be_bytes());
    p.extend_from_slice(&[2, 0, 1]);
    p.extend_from_slice(&2024u16.to_be_bytes());
    p.extend_from_slice(&[6, 1, 0, 0, 0, 0, 1]);
    section(1, &p)
}

fn grid_definition_section(grid: &InMemoryGrid, ni: usize, nj: usize) -> Vec<u8> {
    let g = grid.geometry;
    let mut p = vec![0];
    p.extend_from_slice(&((ni * nj) as u32).to_be_bytes());
    p.extend_from_slice(&[0, 0]);
    p.extend_from_slice(&0u16.to_be_bytes());

    // Shape of the earth and radii, unused here.
    p.push(6);
    p.extend_from_slice(&[0; 15]);
    p.extend_from_slice(&(ni as u32).to_be_bytes());
    p.extend_from_slice(&(nj as u32).to_be_bytes());
    p.extend_from_slice(&0u32.to_be_bytes());
    p.extend_from_slice(&u32::MAX.to_be_bytes());
    p.extend_from_slice(&signed(microdegrees(g.min_lat)));
    p.extend_from_slice(&signed(microdegrees(g.min_lon).rem_euclid(FULL_CIRCLE)));
    p.push(0x30);
    p.extend_from_slice(&signed(microdegrees(g.max_lat)));
    p.extend_from_slice(&signed(microdegrees(g.max_lon).rem_euclid(FULL_CIRCLE)));
    p.extend_from_slice(&(microdegrees(g.step_lan) as u32).to_be_bytes());
    p.extend_from_slice(&(microdegrees(g.step_lon) as u32).to_be_bytes());
    p.push(SOUTH_TO_NORTH);
    section(3, &p)
}

fn product_definition_section() -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&0u16.to_be_bytes());
    p.extend_from_slice(&0u16.to_be_bytes());
    // Moisture / total precipitation, surface.
    p.extend_from_slice(&[1, 52, 2, 0, 0]);
    p.extend_from_slice(&0u16.to_be_bytes());
    p.extend_from_slice(&[0, 1]);
    p.extend_from_slice(&0u32.to_be_bytes());
    p.extend_from_slice(&[1, 0]);
    p.extend_from_slice(&0u32.to_be_bytes());
    p.extend_from_slice(&[255, 0]);
    p.extend_from_slice(&0u32.to_be_bytes());
    section(4, &p)
}

fn data_representation_section(num_encoded: usize) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&(num_encoded as u32).to_be_bytes());
    p.extend_from_slice(&0u16.to_be_bytes());
    p.extend_from_slice(&0f32.to_be_bytes());
    // Binary scale -1 in sign-magnitude, decimal scale 0.
    p.extend_from_slice(&0x8001u16.to_be_bytes());
    p.extend_from_slice(&0u16.to_be_bytes());
    p.extend_from_slice(&[16, 0]);
    section(5, &p)
}

fn bitmap_section(cells: &[Cell]) -> Vec<u8> {
    if !cells.iter().any(Cell::is_missing) {
        return section(6, &[255]);
    }
    let mut p = vec![0; 1 + cells.len().div_ceil(8)];
    for (k, cell) in cells.iter().enumerate() {
        if !cell.is_missing() {
            p[1 + k / 8] |= 0x80 >> (k % 8);
        }
    }
    section(6, &p)
}

fn data_section(encoded: &[u16]) -> Vec<u8> {
    let p: Vec<u8> = encoded.iter().flat_map(|x| x.to_be_bytes()).collect();
    section(7, &p)
}

fn pack(value: f64) -> u16 {
    assert!(
        (0.0..=32767.5).contains(&value),
        "value {value} cannot be packed"
    );
    (value * 2.0).round() as u16
}

fn microdegrees(degrees: f64) -> i64 {
    (degrees * MICRODEGREES).round() as i64
}

/// Sign-magnitude 32-bit integer as used by GRIB2 coordinates.
fn signed(value: i64) -> [u8; 4] {
    let magnitude = value.unsigned_abs() as u32;
    let bits = if value < 0 { magnitude | 0x8000_0000 } else { magnitude };
    bits.to_be_bytes()
}
