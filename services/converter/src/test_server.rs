//! Local stand-in for the DWD open-data directory.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use reqwest::Url;
use test_utils::geometry::{SMALL_NI, SMALL_NJ};
use test_utils::{cumulative_grid, dwd_filename, dwd_listing_html, encode_grib2};

/// A regular lat/lon link without run time or lead time.
pub const UNDATED_FILE: &str = "icon-d2_germany_regular-lat-lon_readme.txt";

struct Listing {
    page: String,
    files: HashMap<String, Vec<u8>>,
}

/// Serve a listing naming `listed` lead times, with bzip2 GRIB2 payloads for
/// those in `served` only. Returns the listing URL.
pub async fn serve_listing(listed: &[u32], served: &[u32]) -> Url {
    let mut page = dwd_listing_html(listed);
    page.push_str(&format!("<a href=\"{UNDATED_FILE}\">{UNDATED_FILE}</a>\n"));

    let files = served
        .iter()
        .map(|&offset| {
            let grib = encode_grib2(&cumulative_grid(offset), SMALL_NI, SMALL_NJ);
            let mut bz = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
            bz.write_all(&grib).unwrap();
            (dwd_filename(offset), bz.finish().unwrap())
        })
        .collect();

    let app = Router::new()
        .route("/tot_prec/", get(listing_handler))
        .route("/tot_prec/:name", get(file_handler))
        .layer(Extension(Arc::new(Listing { page, files })));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Url::parse(&format!("http://{addr}/tot_prec/")).unwrap()
}

async fn listing_handler(Extension(listing): Extension<Arc<Listing>>) -> Html<String> {
    Html(listing.page.clone())
}

async fn file_handler(
    Extension(listing): Extension<Arc<Listing>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match listing.files.get(&name) {
        Some(body) => (StatusCode::OK, body.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
