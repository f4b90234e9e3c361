//! Converter configuration.
//!
//! Precedence, lowest first: built-in defaults, YAML file, `PRATE_*`
//! environment variables, command-line flags. Environment and flags are both
//! handled by clap through [`ConfigOverrides`].

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use conversion::ConversionConfig;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const DEFAULT_DATA_PAGE: &str = "https://opendata.dwd.de/weather/nwp/icon-d2/grib/00/tot_prec/";

/// Full service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Directory listing with the DWD files to download
    pub data_page: String,
    /// Root of the lead-time directories; derived from `data_page` if unset
    pub output_dir: Option<PathBuf>,
    /// Concurrent downloads
    pub downloads: usize,
    /// Delete raw grids once the run is over
    pub remove_gribs: bool,
    pub conversion: ConversionConfig,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            data_page: DEFAULT_DATA_PAGE.to_string(),
            output_dir: None,
            downloads: 2,
            remove_gribs: false,
            conversion: ConversionConfig::default(),
        }
    }
}

/// Overrides taken from the command line or `PRATE_*` variables.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Directory listing to download from
    #[arg(long, env = "PRATE_DATA_PAGE")]
    pub data_page: Option<String>,

    /// Output directory for lead-time directories
    #[arg(long, env = "PRATE_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Number of conversion workers
    #[arg(long, env = "PRATE_WORKERS")]
    pub workers: Option<usize>,

    /// Maximum concurrent downloads
    #[arg(long, env = "PRATE_DOWNLOADS")]
    pub downloads: Option<usize>,

    /// Fixed-point multiplier for header fields
    #[arg(long, env = "PRATE_MULTIPLIER")]
    pub multiplier: Option<i32>,

    /// Value written for missing cells
    #[arg(long, env = "PRATE_EMPTY_VALUE", allow_hyphen_values = true)]
    pub empty_value: Option<f32>,

    /// Output file name inside each lead-time directory
    #[arg(long, env = "PRATE_OUTPUT_NAME")]
    pub output_name: Option<String>,

    /// Delete raw grids after converting
    #[arg(long, env = "PRATE_REMOVE_GRIBS")]
    pub remove_gribs: bool,
}

impl ConverterConfig {
    /// Load from an optional YAML file; a missing path means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            debug!("No config file given, using defaults");
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(data_page) = &overrides.data_page {
            self.data_page = data_page.clone();
        }
        if let Some(output_dir) = &overrides.output_dir {
            self.output_dir = Some(output_dir.clone());
        }
        if let Some(workers) = overrides.workers {
            self.conversion.workers = workers;
        }
        if let Some(downloads) = overrides.downloads {
            self.downloads = downloads;
        }
        if let Some(multiplier) = overrides.multiplier {
            self.conversion.multiplier = multiplier;
        }
        if let Some(empty_value) = overrides.empty_value {
            self.conversion.empty_value = empty_value;
        }
        if let Some(output_name) = &overrides.output_name {
            self.conversion.output_name = output_name.clone();
        }
        if overrides.remove_gribs {
            self.remove_gribs = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.conversion.validate()?;
        if self.downloads == 0 {
            bail!("downloads must be at least 1");
        }
        self.data_page_url()?;
        Ok(())
    }

    pub fn data_page_url(&self) -> Result<Url> {
        Url::parse(&self.data_page)
            .with_context(|| format!("Invalid data page URL: {}", self.data_page))
    }

    /// The configured output directory, or the last path segment of the data
    /// page (`tot_prec` for the default page).
    pub fn output_dir(&self) -> PathBuf {
        if let Some(dir) = &self.output_dir {
            return dir.clone();
        }
        let segment = self
            .data_page
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty() && !s.contains(':'))
            .unwrap_or("output");
        PathBuf::from(segment)
    }
}
