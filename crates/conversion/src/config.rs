//! Conversion settings.

use serde::{Deserialize, Serialize};
use wgf4::{DeltaEncoder, DEFAULT_EMPTY_VALUE, DEFAULT_MULTIPLIER};

use crate::error::PipelineError;

/// Settings for the conversion stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Number of conversion workers
    pub workers: usize,
    /// Fixed-point multiplier for header geo fields
    pub multiplier: i32,
    /// Value written for missing cells
    pub empty_value: f32,
    /// File name of the raw grid inside a lead-time directory
    pub grib_name: String,
    /// File name of the converted output
    pub output_name: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            workers: 12,
            multiplier: DEFAULT_MULTIPLIER,
            empty_value: DEFAULT_EMPTY_VALUE,
            grib_name: "grib".to_string(),
            output_name: "PRATE.wgf4".to_string(),
        }
    }
}

impl ConversionConfig {
    /// Reject settings that would fail later at runtime.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.workers == 0 {
            return Err(PipelineError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.multiplier <= 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "multiplier must be positive, got {}",
                self.multiplier
            )));
        }
        if self.grib_name.is_empty() || self.output_name.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "grib_name and output_name must not be empty".to_string(),
            ));
        }
        if self.grib_name == self.output_name {
            return Err(PipelineError::InvalidConfig(
                "output_name would overwrite the raw grid".to_string(),
            ));
        }
        Ok(())
    }

    pub fn encoder(&self) -> Result<DeltaEncoder, PipelineError> {
        DeltaEncoder::new(self.multiplier, self.empty_value)
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))
    }
}
