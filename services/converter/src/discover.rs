//! Finds raw grids already stored under an output directory.

use std::path::Path;

use conversion::{LeadTimeId, StorageLayout};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Lead times whose `<dir_name>/<grib_name>` file exists under the layout
/// root. Directories whose names do not parse are skipped.
pub fn discover(layout: &StorageLayout) -> Vec<LeadTimeId> {
    let mut ids: Vec<LeadTimeId> = WalkDir::new(layout.root())
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == layout.grib_name())
        .filter_map(|entry| {
            let dir = entry.path().parent()?;
            let id = dir_id(dir);
            if id.is_none() {
                debug!(path = %entry.path().display(), "Skipping grid in unrecognized directory");
            }
            id
        })
        .collect();

    ids.sort();
    info!(root = %layout.root().display(), count = ids.len(), "Discovered raw grids");
    ids
}

fn dir_id(dir: &Path) -> Option<LeadTimeId> {
    dir.file_name()
        .and_then(|name| name.to_str())
        .and_then(LeadTimeId::from_dir_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use test_utils::sample_issuance;

    #[test]
    fn test_discovers_grids_in_lead_time_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path(), "grib", "PRATE.wgf4");
        let ids: Vec<_> = [4, 0, 2].map(|h| LeadTimeId::new(sample_issuance(), h)).into();

        for id in &ids {
            fs::create_dir_all(layout.lead_time_dir(id)).unwrap();
            fs::write(layout.raw_grid_path(id), b"GRIB").unwrap();
        }
        // A lead-time directory without a grid, and noise.
        let empty = LeadTimeId::new(sample_issuance(), 7);
        fs::create_dir_all(layout.lead_time_dir(&empty)).unwrap();
        fs::create_dir_all(dir.path().join("not-a-lead-time")).unwrap();
        fs::write(dir.path().join("not-a-lead-time").join("grib"), b"GRIB").unwrap();
        fs::write(dir.path().join("grib"), b"GRIB").unwrap();

        let found = discover(&layout);
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        let layout = StorageLayout::new("/nonexistent/prate", "grib", "PRATE.wgf4");
        assert!(discover(&layout).is_empty());
    }
}
