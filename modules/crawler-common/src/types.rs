use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a [`CandidateLink`], per spec §4.H.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Discovered,
    Verified,
    Article,
    Extracted,
    NotArticle,
    VerifyFailed,
    Paused,
}

impl CandidateStatus {
    /// True if this status is terminal — no further transitions are allowed out of it.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CandidateStatus::NotArticle | CandidateStatus::VerifyFailed | CandidateStatus::Paused
        )
    }
}

impl std::fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CandidateStatus::Discovered => "discovered",
            CandidateStatus::Verified => "verified",
            CandidateStatus::Article => "article",
            CandidateStatus::Extracted => "extracted",
            CandidateStatus::NotArticle => "not_article",
            CandidateStatus::VerifyFailed => "verify_failed",
            CandidateStatus::Paused => "paused",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for CandidateStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "discovered" => Ok(Self::Discovered),
            "verified" => Ok(Self::Verified),
            "article" => Ok(Self::Article),
            "extracted" => Ok(Self::Extracted),
            "not_article" => Ok(Self::NotArticle),
            "verify_failed" => Ok(Self::VerifyFailed),
            "paused" => Ok(Self::Paused),
            other => Err(format!("unknown CandidateStatus: {other}")),
        }
    }
}

/// Lifecycle status of an [`Article`], per spec §4.H.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Extracted,
    Cleaned,
    Local,
    Wire,
    Labeled,
    Paused,
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ArticleStatus::Extracted => "extracted",
            ArticleStatus::Cleaned => "cleaned",
            ArticleStatus::Local => "local",
            ArticleStatus::Wire => "wire",
            ArticleStatus::Labeled => "labeled",
            ArticleStatus::Paused => "paused",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ArticleStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "extracted" => Ok(Self::Extracted),
            "cleaned" => Ok(Self::Cleaned),
            "local" => Ok(Self::Local),
            "wire" => Ok(Self::Wire),
            "labeled" => Ok(Self::Labeled),
            "paused" => Ok(Self::Paused),
            other => Err(format!("unknown ArticleStatus: {other}")),
        }
    }
}

/// Discovery method a source's candidate links were found through, per spec §4.C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    RssFeed,
    Template,
    HomepageClassifier,
}

impl std::fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DiscoveryMethod::RssFeed => "rss_feed",
            DiscoveryMethod::Template => "template",
            DiscoveryMethod::HomepageClassifier => "homepage_classifier",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for DiscoveryMethod {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "rss_feed" => Ok(Self::RssFeed),
            "template" => Ok(Self::Template),
            "homepage_classifier" => Ok(Self::HomepageClassifier),
            other => Err(format!("unknown DiscoveryMethod: {other}")),
        }
    }
}

/// Outcome recorded for a single discovery method attempt, per spec §4.C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryOutcome {
    Success,
    NoFeed,
    Timeout,
    ConnectionError,
    ParseError,
    Blocked,
    ServerError,
    Skipped,
}

impl DiscoveryOutcome {
    /// Non-network failures increment the consecutive-failure counter (spec §4.C).
    pub fn is_non_network_failure(self) -> bool {
        matches!(self, DiscoveryOutcome::NoFeed | DiscoveryOutcome::ParseError)
    }

    /// Transient failures (429/403/5xx-shaped) feed the rolling window counter.
    pub fn is_transient_failure(self) -> bool {
        matches!(self, DiscoveryOutcome::Blocked | DiscoveryOutcome::ServerError)
    }

    /// Pure network failures only set `rss_last_failed`, no counters.
    pub fn is_network_failure(self) -> bool {
        matches!(self, DiscoveryOutcome::Timeout | DiscoveryOutcome::ConnectionError)
    }
}

impl std::fmt::Display for DiscoveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DiscoveryOutcome::Success => "success",
            DiscoveryOutcome::NoFeed => "no_feed",
            DiscoveryOutcome::Timeout => "timeout",
            DiscoveryOutcome::ConnectionError => "connection_error",
            DiscoveryOutcome::ParseError => "parse_error",
            DiscoveryOutcome::Blocked => "blocked",
            DiscoveryOutcome::ServerError => "server_error",
            DiscoveryOutcome::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// A transient HTTP failure code seen while polling an RSS-style feed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TransientFailure {
    pub timestamp: DateTime<Utc>,
    pub code: u16,
}

/// Scheduling hints and failure-state bookkeeping for a [`Source`], per spec §3.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMeta {
    pub cadence_hours: Option<u32>,
    pub rss_missing: Option<DateTime<Utc>>,
    pub rss_consecutive_failures: u32,
    pub rss_transient_failures: Vec<TransientFailure>,
    pub rss_last_failed: Option<DateTime<Utc>>,
    pub last_successful_method: Option<DiscoveryMethod>,
    pub last_discovered_at: Option<DateTime<Utc>>,
}

/// A configured news source, per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub host: String,
    pub display_name: String,
    pub dataset: String,
    pub meta: SourceMeta,
    pub attempt_count: u32,
    pub created_at: DateTime<Utc>,
}

/// A discovered candidate URL not yet confirmed to be an article, per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateLink {
    pub id: Uuid,
    pub source_id: Uuid,
    pub url: String,
    pub status: CandidateStatus,
    pub discovered_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub error_count: u32,
    pub domain: String,
}

/// An extracted article, per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub candidate_link_id: Uuid,
    pub url: String,
    pub title: String,
    pub text: Option<String>,
    pub authors: Vec<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub status: ArticleStatus,
    pub extracted_at: DateTime<Utc>,
    pub extraction_method: String,
    pub proxy_status: Option<String>,
}

/// Per (source, method) telemetry, per spec §3. The 32-column canonical
/// variant per spec §9 — see DESIGN.md.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryMethodEffectiveness {
    pub id: Uuid,
    pub source_id: Uuid,
    pub method: DiscoveryMethod,
    pub status: DiscoveryOutcome,
    pub articles_found: u32,
    pub success_rate: f64,
    pub attempt_count: u32,
    pub avg_response_time_ms: f64,
    pub recent_status_codes: Vec<u16>,
    pub recorded_at: DateTime<Utc>,
}

/// Normalize a URL for dedup purposes, per spec §4.C: lowercase host, strip
/// trailing `/`, strip `utm_*`/`fbclid` query params, drop the fragment.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut url) = url::Url::parse(raw) else {
        return raw.trim_end_matches('/').to_string();
    };
    url.set_fragment(None);

    if let Some(host) = url.host_str() {
        let lowered = host.to_lowercase();
        let _ = url.set_host(Some(&lowered));
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !k.starts_with("utm_") && k != "fbclid")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        let qs = kept
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&qs));
    }

    let mut s = url.to_string();
    if s.ends_with('/') && url.path() == "/" {
        // keep bare-host slash off
        s.pop();
    } else if s.ends_with('/') {
        s.pop();
    }
    s
}

/// Extract the registrable host/domain from a URL, lowercased.
pub fn domain_of(raw: &str) -> Option<String> {
    url::Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_trailing_slash_and_case() {
        assert_eq!(
            normalize_url("https://Example.COM/story/"),
            "https://example.com/story"
        );
    }

    #[test]
    fn strips_tracking_params() {
        let normalized = normalize_url("https://example.com/a?utm_source=x&fbclid=123&id=7");
        assert_eq!(normalized, "https://example.com/a?id=7");
    }

    #[test]
    fn drops_fragment() {
        assert_eq!(
            normalize_url("https://example.com/a#section"),
            "https://example.com/a"
        );
    }

    #[test]
    fn domain_is_lowercased() {
        assert_eq!(
            domain_of("https://WWW.Example.COM/a").as_deref(),
            Some("www.example.com")
        );
    }

    #[test]
    fn status_round_trips_through_display_and_fromstr() {
        use std::str::FromStr;
        for s in [
            CandidateStatus::Discovered,
            CandidateStatus::Verified,
            CandidateStatus::Article,
            CandidateStatus::Extracted,
            CandidateStatus::NotArticle,
            CandidateStatus::VerifyFailed,
            CandidateStatus::Paused,
        ] {
            let parsed = CandidateStatus::from_str(&s.to_string()).unwrap();
            assert_eq!(parsed, s);
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(CandidateStatus::NotArticle.is_terminal());
        assert!(CandidateStatus::VerifyFailed.is_terminal());
        assert!(CandidateStatus::Paused.is_terminal());
        assert!(!CandidateStatus::Discovered.is_terminal());
        assert!(!CandidateStatus::Article.is_terminal());
    }
}
