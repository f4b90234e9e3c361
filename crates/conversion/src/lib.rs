//! Lead-time delta conversion pipeline.
//!
//! Turns a stream of "lead time X is now available" notifications into WGF4
//! rate rasters, one per pair of consecutive lead times.
//!
//! # Architecture
//!
//! ```text
//! downloader ──mark_available(id)──► Pipeline
//!                                      │
//!                                      ├─► DependencyResolver
//!                                      │     (which pairs became eligible?)
//!                                      │
//!                                      └─► ConversionScheduler ──► worker
//!                                            (shared queue)          │
//!                                                                    ▼
//!                                         GridSource x2 ──► DeltaEncoder ──► PRATE.wgf4
//! ```
//!
//! # Example
//!
//! ```ignore
//! use conversion::{ConversionConfig, DependencyResolver, GribFileSource, Pipeline, StorageLayout};
//!
//! let layout = StorageLayout::new("tot_prec", "grib", "PRATE.wgf4");
//! let pipeline = Pipeline::with_source(
//!     &ConversionConfig::default(),
//!     DependencyResolver::new(),
//!     GribFileSource::new(layout.clone()),
//!     layout,
//! )?;
//! pipeline.mark_available(id)?;
//! let summary = pipeline.finish().await?;
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod job;
pub mod lead_time;
pub mod pipeline;
pub mod resolver;
pub mod scheduler;
pub mod source;

pub use config::ConversionConfig;
pub use convert::DeltaJobConverter;
pub use error::{ConversionError, PipelineError, ResolverError, Result, SchedulerError};
pub use job::ConversionJob;
pub use lead_time::LeadTimeId;
pub use pipeline::{Pipeline, PipelineSummary};
pub use resolver::DependencyResolver;
pub use scheduler::{ConversionScheduler, JobConverter, PoolReport};
pub use source::{GribFileSource, GridSource, MemoryGridSource, StorageLayout};
