//! RSS/Atom feed discovery, grounded on the corpus's `feed-rs` usage for
//! fetching and parsing syndication feeds.

use std::time::Duration;

use crawler_common::domain_of;

use crate::outcome::classify_status;

/// Per-fetch deadline, spec §5 default.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Common feed paths tried against a source's host, in order.
pub fn candidate_feed_urls(host: &str) -> Vec<String> {
    [
        "/feed", "/feed.xml", "/rss.xml", "/rss", "/atom.xml", "/feeds/posts/default",
    ]
    .iter()
    .map(|path| format!("https://{host}{path}"))
    .collect()
}

pub struct FetchedFeed {
    pub links: Vec<String>,
}

/// Why every candidate feed path failed. Carries enough information for the
/// engine to classify the attempt per spec §4.C without re-deriving it from
/// a raw `reqwest::Error`.
pub enum RssFetchError {
    Transport(reqwest::Error),
    Status(reqwest::StatusCode),
    /// Every path returned a body that didn't parse as a feed, or parsed to
    /// zero usable entries.
    NoUsableFeed,
}

/// Fetch and parse the first feed path that returns a well-formed feed body
/// with at least one linked entry.
pub async fn discover(client: &reqwest::Client, host: &str) -> Result<FetchedFeed, RssFetchError> {
    let mut last_err = RssFetchError::NoUsableFeed;

    for url in candidate_feed_urls(host) {
        let resp = match client
            .get(&url)
            .timeout(FETCH_TIMEOUT)
            .header("User-Agent", "crawler-discovery/0.1")
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                last_err = RssFetchError::Transport(e);
                continue;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            last_err = RssFetchError::Status(status);
            continue;
        }

        let bytes = match resp.bytes().await {
            Ok(b) => b,
            Err(e) => {
                last_err = RssFetchError::Transport(e);
                continue;
            }
        };

        let Ok(feed) = feed_rs::parser::parse(&bytes[..]) else {
            last_err = RssFetchError::NoUsableFeed;
            continue;
        };

        let links: Vec<String> = feed
            .entries
            .into_iter()
            .filter_map(|entry| entry.links.first().map(|l| l.href.clone()))
            .filter(|link| domain_of(link).is_some())
            .collect();

        if !links.is_empty() {
            return Ok(FetchedFeed { links });
        }
        last_err = RssFetchError::NoUsableFeed;
    }

    Err(last_err)
}

impl RssFetchError {
    /// Map to the outcome vocabulary used for telemetry and RSS bookkeeping.
    pub fn to_outcome(&self) -> crawler_common::DiscoveryOutcome {
        use crawler_common::DiscoveryOutcome::*;
        match self {
            RssFetchError::Transport(e) => {
                if e.is_timeout() {
                    Timeout
                } else if e.is_connect() {
                    ConnectionError
                } else {
                    ConnectionError
                }
            }
            RssFetchError::Status(status) => classify_status(*status).unwrap_or(ServerError),
            RssFetchError::NoUsableFeed => NoFeed,
        }
    }

    /// HTTP status code carried by this failure, if any (feeds transient bookkeeping).
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RssFetchError::Status(status) => Some(status.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_urls_cover_common_feed_paths() {
        let urls = candidate_feed_urls("example.com");
        assert!(urls.contains(&"https://example.com/feed".to_string()));
        assert!(urls.contains(&"https://example.com/rss.xml".to_string()));
        assert!(urls.contains(&"https://example.com/atom.xml".to_string()));
    }

    #[test]
    fn no_usable_feed_maps_to_no_feed_outcome() {
        assert_eq!(
            RssFetchError::NoUsableFeed.to_outcome(),
            crawler_common::DiscoveryOutcome::NoFeed
        );
    }

    #[test]
    fn forbidden_status_maps_to_blocked_outcome() {
        let err = RssFetchError::Status(reqwest::StatusCode::FORBIDDEN);
        assert_eq!(err.to_outcome(), crawler_common::DiscoveryOutcome::Blocked);
        assert_eq!(err.status_code(), Some(403));
    }
}
