//! Test support for the prate-wgf4 workspace.
//!
//! - Synthetic cumulative precipitation grids with known hourly deltas
//! - A minimal GRIB2 writer so decoding can be tested without sample files
//! - Fixed geometries, DWD file names and listing pages
//! - Lookup of optional real GRIB2 samples

pub mod fixtures;
pub mod generators;
pub mod grib2;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use grib2::*;
pub use paths::*;

/// Path of an optional sample file, or return early from the test.
///
/// ```ignore
/// let path = test_utils::require_test_file!("icon-d2_tot_prec_001.grib2");
/// ```
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!("skipping: sample {} not found (set TEST_DATA_DIR)", $name);
                return;
            }
        }
    }};
}
