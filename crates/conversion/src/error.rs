//! Error types for the conversion crate.

use chrono::{DateTime, Utc};
use thiserror::Error;
use wgf4::Wgf4Error;

use crate::lead_time::LeadTimeId;

/// Errors raised while converting a single job.
///
/// These never leave the worker that ran the job.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// The grid for an available lead time could not be opened or decoded.
    #[error("grid for {id} is unavailable: {reason}")]
    SourceUnavailable { id: LeadTimeId, reason: String },

    /// Geometry, length, or output errors from the encoder.
    #[error(transparent)]
    Encode(#[from] Wgf4Error),
}

impl ConversionError {
    /// Create a SourceUnavailable error.
    pub fn source_unavailable(id: LeadTimeId, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            id,
            reason: reason.into(),
        }
    }
}

/// Contract violations reported by the dependency resolver.
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("lead time {got} does not belong to cycle {expected}")]
    ForeignCycle {
        expected: DateTime<Utc>,
        got: LeadTimeId,
    },
}

/// Worker pool lifecycle errors.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("worker count must be positive")]
    InvalidWorkerCount,

    #[error("worker pool already started")]
    AlreadyStarted,

    #[error("worker pool is not running")]
    NotRunning,
}

/// Errors surfaced by the pipeline driver.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for single conversions.
pub type Result<T> = std::result::Result<T, ConversionError>;
