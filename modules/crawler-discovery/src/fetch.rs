//! Shared homepage fetch used by the Template and Homepage Classifier
//! discovery methods.

use std::time::Duration;

use crate::outcome::classify_status;

/// Per-fetch deadline, spec §5 default.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub enum PageFetchError {
    Transport(reqwest::Error),
    Status(reqwest::StatusCode),
}

impl PageFetchError {
    pub fn to_outcome(&self) -> crawler_common::DiscoveryOutcome {
        use crawler_common::DiscoveryOutcome::*;
        match self {
            PageFetchError::Transport(e) if e.is_timeout() => Timeout,
            PageFetchError::Transport(_) => ConnectionError,
            PageFetchError::Status(status) => classify_status(*status).unwrap_or(ServerError),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            PageFetchError::Status(status) => Some(status.as_u16()),
            _ => None,
        }
    }
}

pub async fn fetch_homepage(client: &reqwest::Client, host: &str) -> Result<(String, url::Url), PageFetchError> {
    let url = format!("https://{host}/");
    let resp = client
        .get(&url)
        .timeout(FETCH_TIMEOUT)
        .header("User-Agent", "crawler-discovery/0.1")
        .send()
        .await
        .map_err(PageFetchError::Transport)?;

    let status = resp.status();
    if !status.is_success() {
        return Err(PageFetchError::Status(status));
    }

    let final_url = resp.url().clone();
    let body = resp.text().await.map_err(PageFetchError::Transport)?;
    Ok((body, final_url))
}
