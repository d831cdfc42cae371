//! Price-list fetching.
//!
//! Supplier uploads name a URL; the document is downloaded here and handed
//! to `PriceList::parse`. Only `http` and `https` URLs are accepted, and
//! the body is read in chunks up to a configured size.

use std::time::Duration;

use market_core::{CoreError, CoreResult, ValidationError};
use tracing::{debug, warn};
use url::Url;

/// Checks that `raw` is an absolute http(s) URL.
pub fn validate_url(raw: &str) -> CoreResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| CoreError::argument(format!("Invalid URL '{raw}': {e}")))?;

    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        "http" | "https" => Err(CoreError::argument(format!("Invalid URL '{raw}': missing host"))),
        other => Err(CoreError::argument(format!(
            "Invalid URL '{raw}': unsupported scheme '{other}'"
        ))),
    }
}

/// HTTP client for supplier price lists.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl Fetcher {
    /// Creates a fetcher whose requests give up after `timeout` and whose
    /// documents may be at most `max_bytes` long.
    pub fn new(timeout: Duration, max_bytes: usize) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Fetcher { client, max_bytes })
    }

    /// Downloads the document at `url`.
    ///
    /// ## Errors
    /// - `Network` on transport failure or a non-2xx response
    /// - `Validation` when the document is larger than `max_bytes`
    pub async fn fetch(&self, url: &Url) -> CoreResult<Vec<u8>> {
        let mut response = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!(%url, error = %e, "Price list request failed");
            CoreError::Network(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "Price list request rejected");
            return Err(CoreError::Network(format!("{url} responded with {status}")));
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes as u64 {
                warn!(%url, declared, limit = self.max_bytes, "Price list too large");
                return Err(self.too_large());
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| CoreError::Network(e.to_string()))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                warn!(%url, limit = self.max_bytes, "Price list too large");
                return Err(self.too_large());
            }
            body.extend_from_slice(&chunk);
        }
        debug!(%url, bytes = body.len(), "Price list downloaded");

        Ok(body)
    }

    fn too_large(&self) -> CoreError {
        ValidationError::invalid("document", format!("larger than {} bytes", self.max_bytes)).into()
    }
}
