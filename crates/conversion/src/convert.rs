//! The production job converter: open both grids, encode, write.

use tracing::debug;
use wgf4::DeltaEncoder;

use crate::error::ConversionError;
use crate::job::ConversionJob;
use crate::scheduler::JobConverter;
use crate::source::{GridSource, StorageLayout};

/// Converts a job by subtracting the previous grid from the current one and
/// writing the WGF4 output next to the current grid.
pub struct DeltaJobConverter<S> {
    source: S,
    encoder: DeltaEncoder,
    layout: StorageLayout,
}

impl<S: GridSource> DeltaJobConverter<S> {
    pub fn new(source: S, encoder: DeltaEncoder, layout: StorageLayout) -> Self {
        Self {
            source,
            encoder,
            layout,
        }
    }
}

impl<S: GridSource> JobConverter for DeltaJobConverter<S> {
    fn convert(&self, job: &ConversionJob) -> Result<(), ConversionError> {
        let start = self.source.open(&job.previous())?;
        let end = self.source.open(&job.current())?;

        let path = self.layout.output_path(job);
        let bytes = self.encoder.convert(&*start, &*end, &path)?;

        debug!(job = %job, path = %path.display(), bytes = bytes, "Wrote WGF4 raster");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead_time::LeadTimeId;
    use crate::source::MemoryGridSource;
    use chrono::{TimeZone, Utc};
    use test_utils::{cumulative_grid, expected_hourly_delta};
    use wgf4::{Wgf4Error, Wgf4Raster};

    fn id(offset: u32) -> LeadTimeId {
        LeadTimeId::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(), offset)
    }

    #[test]
    fn test_converts_into_current_directory() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path(), "grib", "PRATE.wgf4");
        let source = MemoryGridSource::new()
            .with_grid(id(2), cumulative_grid(2))
            .with_grid(id(3), cumulative_grid(3));
        let converter = DeltaJobConverter::new(source, DeltaEncoder::default(), layout.clone());

        let job = ConversionJob::new(id(2), id(3)).unwrap();
        converter.convert(&job).unwrap();

        let raster = Wgf4Raster::read(layout.output_path(&job)).unwrap();
        for (k, value) in raster.values.iter().enumerate() {
            assert_eq!(*value, expected_hourly_delta(k));
        }
    }

    #[test]
    fn test_missing_source_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path(), "grib", "PRATE.wgf4");
        let source = MemoryGridSource::new().with_grid(id(3), cumulative_grid(3));
        let converter = DeltaJobConverter::new(source, DeltaEncoder::default(), layout.clone());

        let job = ConversionJob::new(id(2), id(3)).unwrap();
        assert!(matches!(
            converter.convert(&job),
            Err(ConversionError::SourceUnavailable { .. })
        ));
        assert!(!layout.output_path(&job).exists());
    }

    #[test]
    fn test_geometry_mismatch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path(), "grib", "PRATE.wgf4");
        let mut shifted = cumulative_grid(3);
        shifted.geometry.min_lon += 0.25;
        let source = MemoryGridSource::new()
            .with_grid(id(2), cumulative_grid(2))
            .with_grid(id(3), shifted);
        let converter = DeltaJobConverter::new(source, DeltaEncoder::default(), layout.clone());

        let job = ConversionJob::new(id(2), id(3)).unwrap();
        assert!(matches!(
            converter.convert(&job),
            Err(ConversionError::Encode(Wgf4Error::GridMismatch { .. }))
        ));
        assert!(!layout.output_path(&job).exists());
    }
}
