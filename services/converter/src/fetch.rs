//! Downloads lead-time grids from the DWD open-data listing.
//!
//! Each file is fetched, decompressed, written as `<dir_name>/grib` via a
//! `.partial` file and handed to the pipeline as soon as it is in place.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use conversion::{LeadTimeId, Pipeline, StorageLayout};
use futures::{stream, StreamExt};
use metrics::{counter, histogram};
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

/// Marker selecting the regular lat/lon product from the listing.
const GRID_MARKER: &str = "regular-lat-lon";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to download {url}: HTTP {status}")]
    FailedToDownload { url: String, status: StatusCode },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("file name {0} does not carry a run time and lead time")]
    UnrecognizedFile(String),

    #[error("failed to decompress {name}: {source}")]
    Decompress {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Payload compression, chosen by file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Bzip2,
    Gzip,
    None,
}

impl Compression {
    pub fn from_name(name: &str) -> Self {
        if name.ends_with(".bz2") {
            Self::Bzip2
        } else if name.ends_with(".gz") {
            Self::Gzip
        } else {
            Self::None
        }
    }

    pub fn decompress(self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(data.len() * 4);
        match self {
            Self::Bzip2 => {
                bzip2::read::BzDecoder::new(data).read_to_end(&mut out)?;
            }
            Self::Gzip => {
                flate2::read::GzDecoder::new(data).read_to_end(&mut out)?;
            }
            Self::None => out.extend_from_slice(data),
        }
        Ok(out)
    }
}

/// Every `href` in a listing page that names a regular lat/lon file,
/// in page order and without duplicates.
pub fn extract_links(html: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    let mut rest = html;
    while let Some(start) = rest.find("href=\"") {
        rest = &rest[start + 6..];
        let Some(end) = rest.find('"') else {
            break;
        };
        let link = &rest[..end];
        rest = &rest[end + 1..];

        if link.contains(GRID_MARKER) && !links.iter().any(|l| l == link) {
            links.push(link.to_string());
        }
    }
    links
}

/// Outcome of a download run.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub available: Vec<LeadTimeId>,
    pub failed: usize,
}

pub struct Fetcher {
    client: Client,
    layout: StorageLayout,
    concurrency: usize,
}

impl Fetcher {
    pub fn new(layout: StorageLayout, concurrency: usize) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(concurrency.max(1))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            layout,
            concurrency: concurrency.max(1),
        })
    }

    /// Fetch the listing page and resolve its grid links.
    #[instrument(skip(self), fields(page = %page))]
    pub async fn list(&self, page: &Url) -> Result<Vec<Url>, FetchError> {
        let response = self
            .client
            .get(page.clone())
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: page.to_string(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(FetchError::FailedToDownload {
                url: page.to_string(),
                status: response.status(),
            });
        }
        let html = response.text().await.map_err(|source| FetchError::Request {
            url: page.to_string(),
            source,
        })?;

        let urls = extract_links(&html)
            .iter()
            .map(|link| {
                page.join(link)
                    .map_err(|e| FetchError::InvalidUrl(format!("{link}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(count = urls.len(), "Found grid files in listing");
        Ok(urls)
    }

    /// Download every URL with bounded concurrency, notifying `pipeline` as
    /// each raw grid lands. Failed downloads are logged and skipped.
    pub async fn fetch_all(&self, urls: Vec<Url>, pipeline: &Pipeline) -> FetchReport {
        let mut report = FetchReport::default();
        let mut downloads = stream::iter(urls)
            .map(|url| async move {
                let result = self.download(&url).await;
                (url, result)
            })
            .buffer_unordered(self.concurrency);

        while let Some((url, result)) = downloads.next().await {
            match result {
                Ok(id) => {
                    report.available.push(id);
                    if let Err(e) = pipeline.mark_available(id) {
                        error!(id = %id, error = %e, "Pipeline rejected lead time");
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    counter!("prate_download_failures_total").increment(1);
                    warn!(url = %url, error = %e, "Download failed, skipping");
                }
            }
        }

        info!(
            downloaded = report.available.len(),
            failed = report.failed,
            "Downloads finished"
        );
        report
    }

    /// Download one file into its lead-time directory.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn download(&self, url: &Url) -> Result<LeadTimeId, FetchError> {
        let name = url
            .path_segments()
            .and_then(|segments| segments.last())
            .unwrap_or_default()
            .to_string();
        let id = LeadTimeId::from_filename(&name)
            .ok_or_else(|| FetchError::UnrecognizedFile(name.clone()))?;

        let started = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(FetchError::FailedToDownload {
                url: url.to_string(),
                status: response.status(),
            });
        }
        let body = response.bytes().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;
        debug!(bytes = body.len(), "Downloaded payload");

        let compression = Compression::from_name(&name);
        let raw = tokio::task::spawn_blocking(move || compression.decompress(&body))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
            .map_err(|source| FetchError::Decompress {
                name: name.clone(),
                source,
            })?;

        let path = self.layout.raw_grid_path(&id);
        write_atomic(&path, &raw).await?;

        counter!("prate_downloads_total").increment(1);
        histogram!("prate_download_duration_seconds").record(started.elapsed().as_secs_f64());
        info!(id = %id, path = %path.display(), bytes = raw.len(), "Raw grid stored");
        Ok(id)
    }
}

/// Write through a `.partial` sibling so readers never see a truncated grid.
async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), FetchError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let partial = partial_path(path);
    let written = match fs::write(&partial, data).await {
        Ok(()) => fs::rename(&partial, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        fs::remove_file(&partial).await.ok();
        return Err(e.into());
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}

/// Delete the raw grids of `ids`. Missing files are ignored.
pub async fn remove_gribs(layout: &StorageLayout, ids: &[LeadTimeId]) -> usize {
    let mut removed = 0;
    for id in ids {
        let path = layout.raw_grid_path(id);
        match fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove raw grid"),
        }
    }
    info!(removed = removed, "Removed raw grids");
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::serve_listing;
    use conversion::{ConversionConfig, DependencyResolver, GribFileSource};
    use std::io::Write;
    use test_utils::geometry::SMALL;
    use test_utils::{dwd_filename, dwd_listing_html, expected_hourly_delta, sample_issuance};
    use tokio_test::assert_ok;
    use wgf4::Wgf4Raster;

    fn id(offset: u32) -> LeadTimeId {
        LeadTimeId::new(sample_issuance(), offset)
    }

    #[test]
    fn test_extract_links_keeps_regular_grids_only() {
        let html = dwd_listing_html(&[0, 1, 2]);
        let links = extract_links(&html);
        assert_eq!(links, vec![dwd_filename(0), dwd_filename(1), dwd_filename(2)]);
    }

    #[test]
    fn test_extract_links_deduplicates() {
        let name = dwd_filename(5);
        let html = format!("<a href=\"{name}\">x</a><a href=\"{name}\">{name}</a><a href=\"broken");
        assert_eq!(extract_links(&html), vec![name]);
    }

    #[test]
    fn test_links_resolve_against_page() {
        let page = Url::parse("https://opendata.dwd.de/weather/nwp/icon-d2/grib/00/tot_prec/").unwrap();
        let url = page.join(&dwd_filename(3)).unwrap();
        assert_eq!(
            url.as_str(),
            format!("https://opendata.dwd.de/weather/nwp/icon-d2/grib/00/tot_prec/{}", dwd_filename(3))
        );
        let id = LeadTimeId::from_filename(url.path()).unwrap();
        assert_eq!(id, LeadTimeId::new(sample_issuance(), 3));
    }

    #[test]
    fn test_compression_by_suffix() {
        assert_eq!(Compression::from_name("a.grib2.bz2"), Compression::Bzip2);
        assert_eq!(Compression::from_name("a.grib2.gz"), Compression::Gzip);
        assert_eq!(Compression::from_name("a.grib2"), Compression::None);
    }

    #[test]
    fn test_decompress_payloads() {
        let payload = b"GRIB fake payload 7777".repeat(10);

        let mut bz = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        bz.write_all(&payload).unwrap();
        let bz = bz.finish().unwrap();
        assert_eq!(Compression::Bzip2.decompress(&bz).unwrap(), payload);

        let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        gz.write_all(&payload).unwrap();
        let gz = gz.finish().unwrap();
        assert_eq!(Compression::Gzip.decompress(&gz).unwrap(), payload);

        assert_eq!(Compression::None.decompress(&payload).unwrap(), payload);
        assert!(Compression::Bzip2.decompress(b"not bzip2").is_err());
    }

    #[tokio::test]
    async fn test_write_atomic_leaves_no_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("01.06.2024_01:00_1717203600").join("grib");

        assert_ok!(write_atomic(&path, b"GRIB").await);

        assert_eq!(std::fs::read(&path).unwrap(), b"GRIB");
        assert!(!partial_path(&path).exists());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_write_atomic_removes_partial_on_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grib");
        // Writes through this link fail with ENOSPC.
        std::os::unix::fs::symlink("/dev/full", partial_path(&path)).unwrap();

        assert!(write_atomic(&path, b"GRIB").await.is_err());

        assert!(std::fs::symlink_metadata(partial_path(&path)).is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_download_missing_file() {
        let page = serve_listing(&[0], &[]).await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(StorageLayout::new(dir.path(), "grib", "PRATE.wgf4"), 1).unwrap();

        let err = fetcher.download(&page.join(&dwd_filename(0)).unwrap()).await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::FailedToDownload { status: StatusCode::NOT_FOUND, .. }
        ));
        assert!(!dir.path().join(id(0).dir_name()).exists());
    }

    #[tokio::test]
    async fn test_fetch_all_converts_downloaded_pairs() {
        let page = serve_listing(&[0, 1, 2, 3], &[0, 1, 3]).await;
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path(), "grib", "PRATE.wgf4");
        let fetcher = Fetcher::new(layout.clone(), 2).unwrap();

        let urls = fetcher.list(&page).await.unwrap();
        assert_eq!(urls.len(), 5);

        let pipeline = Pipeline::with_source(
            &ConversionConfig::default(),
            DependencyResolver::for_cycle(sample_issuance()),
            GribFileSource::new(layout.clone()),
            layout.clone(),
        )
        .unwrap();
        let mut report = fetcher.fetch_all(urls, &pipeline).await;
        let summary = pipeline.finish().await.unwrap();

        // Lead time 2 is a 404 and the undated link has no lead time.
        report.available.sort();
        assert_eq!(report.available, vec![id(0), id(1), id(3)]);
        assert_eq!(report.failed, 2);
        assert_eq!(summary.scheduled, 1);
        assert_eq!(summary.pool.converted, 1);
        assert_eq!(summary.pool.failed, 0);

        let output = |offset| layout.lead_time_dir(&id(offset)).join("PRATE.wgf4");
        assert!(!output(0).exists());
        assert!(!output(3).exists());

        let raster = Wgf4Raster::read(output(1)).unwrap();
        assert_eq!(raster.header.geometry(), SMALL);
        let expected: Vec<f32> = (0..raster.values.len()).map(expected_hourly_delta).collect();
        assert_eq!(raster.values, expected);
    }

    #[tokio::test]
    async fn test_remove_gribs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path(), "grib", "PRATE.wgf4");
        let ids = [id(1), id(2)];
        write_atomic(&layout.raw_grid_path(&ids[0]), b"GRIB").await.unwrap();

        assert_eq!(remove_gribs(&layout, &ids).await, 1);
        assert!(!layout.raw_grid_path(&ids[0]).exists());
        assert!(layout.lead_time_dir(&ids[0]).exists());
    }
}
