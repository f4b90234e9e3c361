//! Pipeline driver: availability notifications in, conversion jobs out.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use crate::config::ConversionConfig;
use crate::convert::DeltaJobConverter;
use crate::error::PipelineError;
use crate::job::ConversionJob;
use crate::lead_time::LeadTimeId;
use crate::resolver::DependencyResolver;
use crate::scheduler::{ConversionScheduler, JobConverter, PoolReport};
use crate::source::{GridSource, StorageLayout};

/// Final counts of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    pub available: usize,
    pub scheduled: usize,
    pub pool: PoolReport,
}

/// Connects the dependency resolver to a running conversion pool.
///
/// `mark_available` takes `&self` and may be called concurrently from
/// several download tasks. `finish` must be called once all of them are done.
pub struct Pipeline {
    resolver: DependencyResolver,
    scheduler: ConversionScheduler,
}

impl Pipeline {
    /// Start a pipeline with an arbitrary converter.
    pub fn start(
        resolver: DependencyResolver,
        workers: usize,
        converter: Arc<dyn JobConverter>,
    ) -> Result<Self, PipelineError> {
        let mut scheduler = ConversionScheduler::new(workers, converter)?;
        scheduler.start()?;
        Ok(Self {
            resolver,
            scheduler,
        })
    }

    /// Start a pipeline that delta-encodes grids from `source` into `root`.
    pub fn with_source<S: GridSource>(
        config: &ConversionConfig,
        resolver: DependencyResolver,
        source: S,
        layout: StorageLayout,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let converter = DeltaJobConverter::new(source, config.encoder()?, layout);
        Self::start(resolver, config.workers, Arc::new(converter))
    }

    /// Record an arrival and queue every pair it completes.
    #[instrument(skip(self), fields(id = %id))]
    pub fn mark_available(&self, id: LeadTimeId) -> Result<Vec<ConversionJob>, PipelineError> {
        let jobs = self.resolver.mark_available(id)?;
        for job in &jobs {
            self.scheduler.submit(*job)?;
            info!(job = %job, "Scheduled conversion");
        }
        Ok(jobs)
    }

    /// Stop the pool after the queue drains and report.
    pub async fn finish(mut self) -> Result<PipelineSummary, PipelineError> {
        let pool = self.scheduler.stop().await?;
        let summary = PipelineSummary {
            available: self.resolver.available_count(),
            scheduled: self.resolver.scheduled_count(),
            pool,
        };
        info!(
            available = summary.available,
            scheduled = summary.scheduled,
            converted = summary.pool.converted,
            failed = summary.pool.failed,
            "Pipeline finished"
        );
        Ok(summary)
    }
}
