//! HTTP fetching behind a swappable client seam.
//!
//! The realtime importer only ever issues a GET and reads bytes, so the
//! [`HttpClient`] trait is the whole surface tests need to fake.

mod api_key;
mod basic;
mod client;

pub use api_key::ApiKey;
pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::Result;
use tracing::warn;

/// GETs `url` and returns the response body, or `None` when the status is
/// not a success. Transport-level failures propagate as errors.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Option<Vec<u8>>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    if !resp.status().is_success() {
        warn!(status = %resp.status(), url, "fetch returned non-success status");
        return Ok(None);
    }
    Ok(Some(resp.bytes().await?.to_vec()))
}
