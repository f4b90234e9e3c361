//! Conversion jobs.

use std::fmt;

use serde::Serialize;

use crate::lead_time::LeadTimeId;

/// A pair of adjacent lead times whose delta should be converted.
///
/// Jobs are values: two jobs with the same pair are the same job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConversionJob {
    previous: LeadTimeId,
    current: LeadTimeId,
}

impl ConversionJob {
    /// Create a job if `current` directly follows `previous`.
    pub fn new(previous: LeadTimeId, current: LeadTimeId) -> Option<Self> {
        previous
            .is_followed_by(&current)
            .then_some(Self { previous, current })
    }

    pub fn previous(&self) -> LeadTimeId {
        self.previous
    }

    pub fn current(&self) -> LeadTimeId {
        self.current
    }
}

impl fmt::Display for ConversionJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.previous, self.current)
    }
}
