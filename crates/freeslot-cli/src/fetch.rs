//! Feed retrieval: HTTP(S) URL, local file, or stdin.

use std::io::{self, Read};
use std::time::Duration;

use freeslot_engine::FreeSlotError;
use tracing::{debug, info};

/// Where the calendar feed comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Url(String),
    File(String),
    Stdin,
}

impl FeedSource {
    /// Read the raw feed bytes. Every failure is a [`FreeSlotError::Fetch`].
    pub fn load(&self, timeout: Duration) -> Result<Vec<u8>, FreeSlotError> {
        match self {
            FeedSource::Url(url) => fetch_url(url, timeout),
            FeedSource::File(path) => std::fs::read(path)
                .map_err(|e| FreeSlotError::Fetch(format!("cannot read {}: {}", path, e))),
            FeedSource::Stdin => {
                let mut buf = Vec::new();
                io::stdin()
                    .read_to_end(&mut buf)
                    .map_err(|e| FreeSlotError::Fetch(format!("cannot read stdin: {}", e)))?;
                Ok(buf)
            }
        }
    }
}

fn fetch_url(url: &str, timeout: Duration) -> Result<Vec<u8>, FreeSlotError> {
    // Calendar apps hand out webcal:// links for the same HTTPS resource.
    let url = match url.strip_prefix("webcal://") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(10))
        .user_agent(concat!("freeslot/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| FreeSlotError::Fetch(format!("cannot create HTTP client: {}", e)))?;

    info!(%url, "fetching calendar feed");
    let response = client
        .get(&url)
        .send()
        .map_err(|e| FreeSlotError::Fetch(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FreeSlotError::Fetch(format!("{} returned {}", url, status)));
    }

    let body = response
        .bytes()
        .map_err(|e| FreeSlotError::Fetch(format!("cannot read response body: {}", e)))?;
    debug!(bytes = body.len(), "feed downloaded");
    Ok(body.to_vec())
}
