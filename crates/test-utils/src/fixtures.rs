//! Common test fixtures.

use chrono::{DateTime, TimeZone, Utc};
use wgf4::GridGeometry;

/// Geometries used across the test suite.
pub mod geometry {
    use super::GridGeometry;

    /// ICON-D2 regular lat/lon domain (0.02 degree spacing).
    pub const ICON_D2: GridGeometry = GridGeometry {
        min_lat: 43.18,
        max_lat: 58.08,
        min_lon: -3.94,
        max_lon: 20.34,
        step_lan: 0.02,
        step_lon: 0.02,
    };

    /// A 4x3 grid used by the synthetic generators.
    pub const SMALL: GridGeometry = GridGeometry {
        min_lat: 50.0,
        max_lat: 50.5,
        min_lon: 10.0,
        max_lon: 10.75,
        step_lan: 0.25,
        step_lon: 0.25,
    };

    /// Number of columns of [`SMALL`].
    pub const SMALL_NI: usize = 4;
    /// Number of rows of [`SMALL`].
    pub const SMALL_NJ: usize = 3;
}

/// Issuance time of the sample ICON-D2 cycle (2024-06-01 00 UTC).
pub fn sample_issuance() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

/// DWD open-data file name for a lead time of `sample_issuance()`.
pub fn dwd_filename(offset_hours: u32) -> String {
    format!(
        "icon-d2_germany_regular-lat-lon_single-level_{}_{:03}_2d_tot_prec.grib2.bz2",
        sample_issuance().format("%Y%m%d%H"),
        offset_hours
    )
}

/// A directory listing page as served by opendata.dwd.de.
pub fn dwd_listing_html(offsets: &[u32]) -> String {
    let mut html = String::from("<html><head><title>Index of /weather/nwp/icon-d2/grib/00/tot_prec/</title></head><body><pre>\n<a href=\"../\">../</a>\n");
    for offset in offsets {
        let name = dwd_filename(*offset);
        html.push_str(&format!("<a href=\"{name}\">{name}</a> 01-Jun-2024 02:10  1234\n"));
        let icosahedral = name.replace("regular-lat-lon", "icosahedral");
        html.push_str(&format!("<a href=\"{icosahedral}\">{icosahedral}</a> 01-Jun-2024 02:10  4321\n"));
    }
    html.push_str("</pre></body></html>\n");
    html
}
