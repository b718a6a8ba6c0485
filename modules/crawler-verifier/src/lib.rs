//! Verifies `discovered` candidate links: issues a HEAD (falling back to
//! GET on 403/405), classifies the URL shape, and drives the candidate
//! through `verified -> {article, not_article, verify_failed}` (spec §4.D).

pub mod fetch;
pub mod retry;

use reqwest::StatusCode;

use crawler_common::{url_shape_score, ARTICLE_SHAPE_THRESHOLD, CandidateLink, CandidateStatus, CrawlerError};
use crawler_store::Store;

use crate::fetch::{verify_once, VerifyAttemptOutcome};
use crate::retry::{base_backoff, with_jitter, MAX_RETRIES};

pub struct Verifier {
    client: reqwest::Client,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Verifier {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .build()
                .expect("failed to build verifier HTTP client"),
        }
    }

    /// Verify one candidate, driving it all the way to a terminal or
    /// post-verification status. Candidates not currently `discovered` are
    /// left untouched (the caller's batch selection should already filter
    /// on status, but this keeps the CAS honest under races).
    pub async fn verify(&self, store: &dyn Store, candidate: &CandidateLink) -> Result<CandidateStatus, CrawlerError> {
        if candidate.status != CandidateStatus::Discovered {
            return Ok(candidate.status);
        }

        let moved_to_verified = store
            .promote_candidate_status(candidate.id, CandidateStatus::Discovered, CandidateStatus::Verified)
            .await?;
        if !moved_to_verified {
            // Lost the race to another verifier run; re-read and report current status.
            return Ok(store
                .get_candidate(candidate.id)
                .await?
                .map(|c| c.status)
                .unwrap_or(CandidateStatus::Discovered));
        }

        // attempt 0 is the initial fetch; attempts 1..=MAX_RETRIES are
        // retries, each preceded by the backoff for the retry it's about
        // to make (so all of base_backoff(0..MAX_RETRIES) get exercised).
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(with_jitter(base_backoff(attempt - 1))).await;
            }
            match verify_once(&self.client, &candidate.url).await {
                VerifyAttemptOutcome::Status(status) if status.is_success() => {
                    let to = classify(&candidate.url);
                    store.promote_candidate_status(candidate.id, CandidateStatus::Verified, to).await?;
                    tracing::debug!(candidate_id = %candidate.id, %status, ?to, "candidate verified");
                    return Ok(to);
                }
                VerifyAttemptOutcome::Status(status) => {
                    tracing::debug!(candidate_id = %candidate.id, %status, attempt, "verification attempt failed");
                    if status == StatusCode::NOT_FOUND || !retryable(status) {
                        // Terminal negative response (e.g. 404): no point retrying.
                        break;
                    }
                }
                VerifyAttemptOutcome::Timeout | VerifyAttemptOutcome::ConnectionError => {
                    tracing::debug!(candidate_id = %candidate.id, attempt, "verification attempt timed out or failed to connect");
                }
            }
        }

        store
            .promote_candidate_status(candidate.id, CandidateStatus::Verified, CandidateStatus::VerifyFailed)
            .await?;
        tracing::warn!(candidate_id = %candidate.id, url = %candidate.url, "candidate exhausted verification retries");
        Ok(CandidateStatus::VerifyFailed)
    }
}

/// Whether a non-2xx status is worth retrying (4xx other than 404, and 5xx).
fn retryable(status: StatusCode) -> bool {
    status.is_server_error() || (status.is_client_error() && status != StatusCode::NOT_FOUND)
}

fn classify(url: &str) -> CandidateStatus {
    if url_shape_score(url) >= ARTICLE_SHAPE_THRESHOLD {
        CandidateStatus::Article
    } else {
        CandidateStatus::NotArticle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crawler_store::MemoryStore;
    use uuid::Uuid;

    fn candidate(url: &str, source_id: Uuid) -> CandidateLink {
        CandidateLink {
            id: Uuid::new_v4(),
            source_id,
            url: url.to_string(),
            status: CandidateStatus::Discovered,
            discovered_at: Utc::now(),
            verified_at: None,
            error_count: 0,
            domain: "example.com".to_string(),
        }
    }

    #[test]
    fn classifies_dated_hyphenated_url_as_article() {
        assert_eq!(
            classify("https://example.com/2024/03/this-is-a-long-headline"),
            CandidateStatus::Article
        );
    }

    #[test]
    fn classifies_shallow_url_as_not_article() {
        assert_eq!(classify("https://example.com/about"), CandidateStatus::NotArticle);
    }

    #[test]
    fn four_oh_four_is_not_retryable() {
        assert!(!retryable(StatusCode::NOT_FOUND));
    }

    #[test]
    fn server_errors_and_other_client_errors_are_retryable() {
        assert!(retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(retryable(StatusCode::TOO_MANY_REQUESTS));
    }

    #[tokio::test]
    async fn verify_skips_candidates_not_in_discovered_state() {
        let store = MemoryStore::new();
        let mut c = candidate("https://example.com/2024/03/headline-story", Uuid::new_v4());
        c.status = CandidateStatus::Article;
        let verifier = Verifier::new();
        let result = verifier.verify(&store, &c).await.unwrap();
        assert_eq!(result, CandidateStatus::Article);
    }
}
