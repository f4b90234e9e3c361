//! ICON-D2 precipitation rate converter.
//!
//! Downloads cumulative total precipitation grids for every lead time of a
//! model run and writes one WGF4 rate raster per pair of consecutive lead
//! times. Conversions start as soon as both grids of a pair are on disk.

mod config;
mod discover;
mod fetch;
#[cfg(test)]
mod test_server;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use conversion::{DependencyResolver, GribFileSource, Pipeline, PipelineSummary, StorageLayout};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use wgf4::Wgf4Raster;

use config::{ConfigOverrides, ConverterConfig};
use fetch::Fetcher;

#[derive(Parser, Debug)]
#[command(name = "prate-converter")]
#[command(about = "Convert cumulative precipitation lead times into WGF4 rate rasters")]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "PRATE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Write Prometheus metrics to this file when the run ends
    #[arg(long, env = "PRATE_METRICS_OUT", global = true)]
    metrics_out: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the listed lead times and convert them
    Run {
        #[command(flatten)]
        overrides: ConfigOverrides,
    },
    /// Convert raw grids already stored in an output directory
    ConvertDir {
        /// Directory holding `<lead time>/grib` entries
        dir: PathBuf,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },
    /// Print the header and value range of a WGF4 file
    Inspect { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    match args.command {
        Command::Run { overrides } => {
            let config = load_config(args.config.as_deref(), &overrides)?;
            run(config).await?;
        }
        Command::ConvertDir { dir, mut overrides } => {
            overrides.output_dir = Some(dir);
            let config = load_config(args.config.as_deref(), &overrides)?;
            convert_dir(config).await?;
        }
        Command::Inspect { path } => {
            inspect(&path)?;
            return Ok(());
        }
    }

    if let Some(path) = &args.metrics_out {
        write_metrics(&prometheus, path).await?;
    }
    Ok(())
}

fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<ConverterConfig> {
    let mut config = ConverterConfig::load(path)?;
    config.apply(overrides);
    config.validate()?;
    Ok(config)
}

fn layout(config: &ConverterConfig) -> StorageLayout {
    StorageLayout::new(
        config.output_dir(),
        config.conversion.grib_name.clone(),
        config.conversion.output_name.clone(),
    )
}

fn start_pipeline(config: &ConverterConfig, layout: &StorageLayout) -> Result<Pipeline> {
    let pipeline = Pipeline::with_source(
        &config.conversion,
        DependencyResolver::new(),
        GribFileSource::new(layout.clone()),
        layout.clone(),
    )?;
    Ok(pipeline)
}

async fn run(config: ConverterConfig) -> Result<PipelineSummary> {
    let layout = layout(&config);
    info!(
        data_page = %config.data_page,
        output_dir = %layout.root().display(),
        workers = config.conversion.workers,
        downloads = config.downloads,
        "Starting download and conversion run"
    );

    tokio::fs::create_dir_all(layout.root())
        .await
        .with_context(|| format!("Failed to create {}", layout.root().display()))?;

    let fetcher = Fetcher::new(layout.clone(), config.downloads)?;
    let urls = fetcher.list(&config.data_page_url()?).await?;

    let pipeline = start_pipeline(&config, &layout)?;
    let report = fetcher.fetch_all(urls, &pipeline).await;
    let summary = pipeline.finish().await?;

    if config.remove_gribs {
        fetch::remove_gribs(&layout, &report.available).await;
    }

    log_summary(&summary, report.failed);
    Ok(summary)
}

async fn convert_dir(config: ConverterConfig) -> Result<PipelineSummary> {
    let layout = layout(&config);
    let ids = discover::discover(&layout);

    let pipeline = start_pipeline(&config, &layout)?;
    for id in &ids {
        pipeline.mark_available(*id)?;
    }
    let summary = pipeline.finish().await?;

    if config.remove_gribs {
        fetch::remove_gribs(&layout, &ids).await;
    }

    log_summary(&summary, 0);
    Ok(summary)
}

fn log_summary(summary: &PipelineSummary, download_failures: usize) {
    info!(
        available = summary.available,
        scheduled = summary.scheduled,
        submitted = summary.pool.submitted,
        converted = summary.pool.converted,
        failed = summary.pool.failed,
        download_failures = download_failures,
        "Run complete"
    );
}

fn inspect(path: &Path) -> Result<()> {
    let raster = Wgf4Raster::read(path)
        .with_context(|| format!("Failed to read WGF4 file: {}", path.display()))?;

    let report = serde_json::json!({
        "path": path.display().to_string(),
        "header": raster.header,
        "geometry": raster.header.geometry(),
        "empty_value": raster.empty_value,
        "cells": raster.values.len(),
        "valid_cells": raster.valid_count(),
        "range": raster.value_range(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn write_metrics(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    tokio::fs::write(path, handle.render())
        .await
        .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    info!(path = %path.display(), "Metrics written");
    Ok(())
}
