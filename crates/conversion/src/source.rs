//! Grid sources and the on-disk layout of lead-time data.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;
use wgf4::{GridMessage, InMemoryGrid};

use crate::error::{ConversionError, Result};
use crate::job::ConversionJob;
use crate::lead_time::LeadTimeId;

/// Produces the decoded grid of an available lead time.
pub trait GridSource: Send + Sync + 'static {
    fn open(&self, id: &LeadTimeId) -> Result<Box<dyn GridMessage + Send>>;
}

/// Directory layout: one directory per lead time holding the raw grid and,
/// for the later member of a pair, the converted output.
///
/// ```text
/// {root}/
///   01.06.2024_00:00_1717200000/grib
///   01.06.2024_01:00_1717203600/grib
///   01.06.2024_01:00_1717203600/PRATE.wgf4
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
    grib_name: String,
    output_name: String,
}

impl StorageLayout {
    pub fn new(
        root: impl Into<PathBuf>,
        grib_name: impl Into<String>,
        output_name: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            grib_name: grib_name.into(),
            output_name: output_name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn grib_name(&self) -> &str {
        &self.grib_name
    }

    pub fn lead_time_dir(&self, id: &LeadTimeId) -> PathBuf {
        self.root.join(id.dir_name())
    }

    /// Where the decompressed raw grid of `id` is stored.
    pub fn raw_grid_path(&self, id: &LeadTimeId) -> PathBuf {
        self.lead_time_dir(id).join(&self.grib_name)
    }

    /// Where the output of `job` is written (next to the later grid).
    pub fn output_path(&self, job: &ConversionJob) -> PathBuf {
        self.lead_time_dir(&job.current()).join(&self.output_name)
    }
}

/// Decodes raw grids stored according to a [`StorageLayout`].
#[derive(Debug, Clone)]
pub struct GribFileSource {
    layout: StorageLayout,
}

impl GribFileSource {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }
}

impl GridSource for GribFileSource {
    fn open(&self, id: &LeadTimeId) -> Result<Box<dyn GridMessage + Send>> {
        let path = self.layout.raw_grid_path(id);
        debug!(id = %id, path = %path.display(), "Opening raw grid");
        let grid = grib_source::read_first_message(&path)
            .map_err(|e| ConversionError::source_unavailable(*id, e.to_string()))?;
        Ok(Box::new(grid))
    }
}

/// Grids held in memory, keyed by lead time.
#[derive(Debug, Clone, Default)]
pub struct MemoryGridSource {
    grids: HashMap<LeadTimeId, InMemoryGrid>,
}

impl MemoryGridSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: LeadTimeId, grid: InMemoryGrid) {
        self.grids.insert(id, grid);
    }

    pub fn with_grid(mut self, id: LeadTimeId, grid: InMemoryGrid) -> Self {
        self.insert(id, grid);
        self
    }
}

impl GridSource for MemoryGridSource {
    fn open(&self, id: &LeadTimeId) -> Result<Box<dyn GridMessage + Send>> {
        self.grids
            .get(id)
            .cloned()
            .map(|grid| Box::new(grid) as Box<dyn GridMessage + Send>)
            .ok_or_else(|| ConversionError::source_unavailable(*id, "no grid in memory"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn id(offset: u32) -> LeadTimeId {
        LeadTimeId::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(), offset)
    }

    #[test]
    fn test_layout_paths() {
        let layout = StorageLayout::new("/data/tot_prec", "grib", "PRATE.wgf4");
        let job = ConversionJob::new(id(0), id(1)).unwrap();

        assert_eq!(
            layout.raw_grid_path(&id(0)),
            PathBuf::from("/data/tot_prec/01.06.2024_00:00_1717200000/grib")
        );
        assert_eq!(
            layout.output_path(&job),
            PathBuf::from("/data/tot_prec/01.06.2024_01:00_1717203600/PRATE.wgf4")
        );
    }

    #[test]
    fn test_memory_source() {
        let source = MemoryGridSource::new().with_grid(id(1), test_utils::cumulative_grid(1));
        assert!(source.open(&id(1)).is_ok());
        assert!(matches!(
            source.open(&id(2)),
            Err(ConversionError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_grib_source_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = GribFileSource::new(StorageLayout::new(dir.path(), "grib", "PRATE.wgf4"));
        match source.open(&id(3)) {
            Err(ConversionError::SourceUnavailable { id: failed, .. }) => assert_eq!(failed, id(3)),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }
}
