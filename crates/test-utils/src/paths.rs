//! Locating optional GRIB2 samples.

use std::path::{Path, PathBuf};

/// First existing `name` under `$TEST_DATA_DIR`, then `testdata/` of the
/// grib-source crate, then `testdata/` at the workspace root.
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");

    std::env::var_os("TEST_DATA_DIR")
        .map(PathBuf::from)
        .into_iter()
        .chain([root.join("crates/grib-source/testdata"), root.join("testdata")])
        .map(|dir| dir.join(name))
        .find(|path| path.exists())
}
