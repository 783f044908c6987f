// src/fetch/mod.rs
//
// HTTP collaborators: Google Maps, the realtor statistics API and the
// listing site. Nothing here interprets payloads beyond decoding them.

pub mod google;
pub mod listing;
pub mod realtor;

pub use google::{CommuteMode, Coordinates, GoogleMaps, NearbyPlace};
pub use listing::ListingSite;
pub use realtor::RealtorStats;

use reqwest::RequestBuilder;
use tracing::debug;
use url::Url;

use crate::error::{HubError, Result};

/// Send `req` and return the body, failing on a non-success status.
async fn read_text(req: RequestBuilder, url: &Url) -> Result<String> {
    let shown = without_query(url);
    debug!(url = %shown, "GET");
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(HubError::Status {
            url: shown,
            status: status.as_u16(),
        });
    }
    Ok(resp.text().await?)
}

/// URL for logs and errors; query strings may carry API keys.
fn without_query(url: &Url) -> String {
    let mut u = url.clone();
    u.set_query(None);
    u.to_string()
}
