//! In-memory `Store` implementation used by unit tests across the workspace
//! (mirrors the corpus's `MockSignalReader`/`fixtures.rs` fake-store pattern
//! so component tests don't need a live Postgres).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crawler_common::{
    domain_of, normalize_url, Article, ArticleStatus, CandidateLink, CandidateStatus, CrawlerError,
    DiscoveryMethodEffectiveness, Source,
};

use crate::state_machine::{article_transition_allowed, candidate_transition_allowed};
use crate::traits::{NewArticle, SourceMetaPatch, Store};

#[derive(Default)]
struct Inner {
    sources: HashMap<Uuid, Source>,
    candidates: HashMap<Uuid, CandidateLink>,
    candidates_by_url: HashMap<String, Uuid>,
    articles: HashMap<Uuid, Article>,
    articles_by_url: HashMap<String, Uuid>,
    effectiveness: Vec<DiscoveryMethodEffectiveness>,
    claimed: std::collections::HashSet<Uuid>,
}

/// A process-local, lock-guarded `Store`. Not durable, not for production —
/// but it implements the exact same CAS and uniqueness semantics as
/// `PgStore`, so logic tested against it carries over.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_source(&self, source: Source) -> Result<(Uuid, bool), CrawlerError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner
            .sources
            .values()
            .find(|s| s.host == source.host && s.dataset == source.dataset)
        {
            return Ok((existing.id, false));
        }
        let id = source.id;
        inner.sources.insert(id, source);
        Ok((id, true))
    }

    async fn get_source(&self, id: Uuid) -> Result<Option<Source>, CrawlerError> {
        Ok(self.inner.lock().unwrap().sources.get(&id).cloned())
    }

    async fn list_sources(&self) -> Result<Vec<Source>, CrawlerError> {
        Ok(self.inner.lock().unwrap().sources.values().cloned().collect())
    }

    async fn update_source_meta(&self, source_id: Uuid, patch: SourceMetaPatch) -> Result<(), CrawlerError> {
        let mut inner = self.inner.lock().unwrap();
        let source = inner
            .sources
            .get_mut(&source_id)
            .ok_or_else(|| CrawlerError::Store(format!("source {source_id} not found")))?;

        if patch.reset_rss_failure_state {
            source.meta.rss_missing = None;
            source.meta.rss_consecutive_failures = 0;
            source.meta.rss_transient_failures.clear();
            source.meta.rss_last_failed = None;
        }
        if let Some(v) = patch.last_discovered_at {
            source.meta.last_discovered_at = Some(v);
        }
        if let Some(v) = patch.rss_missing {
            source.meta.rss_missing = v;
        }
        if let Some(v) = patch.rss_consecutive_failures {
            source.meta.rss_consecutive_failures = v;
        }
        if let Some(list) = patch.rss_transient_failures_set {
            source.meta.rss_transient_failures = list;
        }
        if let Some(v) = patch.rss_last_failed {
            source.meta.rss_last_failed = Some(v);
        }
        if let Some(v) = patch.last_successful_method {
            source.meta.last_successful_method = Some(v);
        }
        if patch.attempt_count_increment {
            source.attempt_count += 1;
        }
        Ok(())
    }

    async fn upsert_candidate(&self, url: &str, source_id: Uuid) -> Result<(Uuid, bool), CrawlerError> {
        let normalized = normalize_url(url);
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing_id) = inner.candidates_by_url.get(&normalized).copied() {
            return Ok((existing_id, false));
        }
        let domain = domain_of(&normalized).unwrap_or_default();
        let id = Uuid::new_v4();
        let link = CandidateLink {
            id,
            source_id,
            url: normalized.clone(),
            status: CandidateStatus::Discovered,
            discovered_at: Utc::now(),
            verified_at: None,
            error_count: 0,
            domain,
        };
        inner.candidates.insert(id, link);
        inner.candidates_by_url.insert(normalized, id);
        Ok((id, true))
    }

    async fn get_candidate(&self, id: Uuid) -> Result<Option<CandidateLink>, CrawlerError> {
        Ok(self.inner.lock().unwrap().candidates.get(&id).cloned())
    }

    async fn candidates_by_status(&self, status: CandidateStatus) -> Result<Vec<CandidateLink>, CrawlerError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .candidates
            .values()
            .filter(|c| c.status == status)
            .cloned()
            .collect())
    }

    async fn promote_candidate_status(
        &self,
        candidate_id: Uuid,
        from: CandidateStatus,
        to: CandidateStatus,
    ) -> Result<bool, CrawlerError> {
        if !candidate_transition_allowed(from, to) {
            return Err(CrawlerError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        let mut inner = self.inner.lock().unwrap();
        let Some(link) = inner.candidates.get_mut(&candidate_id) else {
            return Ok(false);
        };
        if link.status != from {
            return Ok(false);
        }
        link.status = to;
        if to == CandidateStatus::Verified || to == CandidateStatus::Article {
            link.verified_at = Some(Utc::now());
        }
        Ok(true)
    }

    async fn batch_claim_for_extraction(
        &self,
        domains: &[String],
        limit: usize,
    ) -> Result<Vec<CandidateLink>, CrawlerError> {
        let mut inner = self.inner.lock().unwrap();
        let domain_set: std::collections::HashSet<&String> = domains.iter().collect();
        let mut claimed_ids = Vec::new();
        {
            let mut candidate_ids: Vec<Uuid> = inner
                .candidates
                .values()
                .filter(|c| {
                    c.status == CandidateStatus::Article
                        && domain_set.contains(&c.domain)
                        && !inner.claimed.contains(&c.id)
                })
                .map(|c| c.id)
                .collect();
            candidate_ids.sort();
            candidate_ids.truncate(limit);
            claimed_ids = candidate_ids;
        }
        for id in &claimed_ids {
            inner.claimed.insert(*id);
        }
        Ok(claimed_ids
            .into_iter()
            .filter_map(|id| inner.candidates.get(&id).cloned())
            .collect())
    }

    async fn insert_article_if_absent(&self, article: NewArticle) -> Result<Option<Uuid>, CrawlerError> {
        let normalized = normalize_url(&article.url);
        let mut inner = self.inner.lock().unwrap();
        if inner.articles_by_url.contains_key(&normalized) {
            tracing::debug!(url = %normalized, "article already present, skipping insert");
            return Ok(None);
        }
        let id = Uuid::new_v4();
        let row = Article {
            id,
            candidate_link_id: article.candidate_link_id,
            url: normalized.clone(),
            title: article.title,
            text: article.text,
            authors: article.authors,
            publish_date: article.publish_date,
            status: ArticleStatus::Extracted,
            extracted_at: Utc::now(),
            extraction_method: article.extraction_method,
            proxy_status: article.proxy_status,
        };
        inner.articles.insert(id, row);
        inner.articles_by_url.insert(normalized, id);
        Ok(Some(id))
    }

    async fn find_article_by_id(&self, id: Uuid) -> Result<Option<Article>, CrawlerError> {
        Ok(self.inner.lock().unwrap().articles.get(&id).cloned())
    }

    async fn articles_by_status_before(
        &self,
        status: ArticleStatus,
        cutoff: chrono::DateTime<Utc>,
    ) -> Result<Vec<Article>, CrawlerError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .articles
            .values()
            .filter(|a| a.status == status && a.extracted_at < cutoff)
            .cloned()
            .collect())
    }

    async fn articles_with_null_text(&self, status: ArticleStatus) -> Result<Vec<Article>, CrawlerError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .articles
            .values()
            .filter(|a| a.status == status && a.text.is_none())
            .cloned()
            .collect())
    }

    async fn promote_article_status(
        &self,
        article_id: Uuid,
        from: ArticleStatus,
        to: ArticleStatus,
    ) -> Result<bool, CrawlerError> {
        if !article_transition_allowed(from, to) {
            return Err(CrawlerError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        let mut inner = self.inner.lock().unwrap();
        let Some(article) = inner.articles.get_mut(&article_id) else {
            return Ok(false);
        };
        if article.status != from {
            return Ok(false);
        }
        article.status = to;
        Ok(true)
    }

    async fn record_discovery_effectiveness(
        &self,
        record: DiscoveryMethodEffectiveness,
    ) -> Result<(), CrawlerError> {
        self.inner.lock().unwrap().effectiveness.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawler_common::SourceMeta;

    fn make_source() -> Source {
        Source {
            id: Uuid::new_v4(),
            host: "example.com".to_string(),
            display_name: "Example".to_string(),
            dataset: "test".to_string(),
            meta: SourceMeta::default(),
            attempt_count: 0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_candidate_is_idempotent() {
        let store = MemoryStore::new();
        let (source_id, _) = store.upsert_source(make_source()).await.unwrap();

        let (id1, inserted1) = store
            .upsert_candidate("https://example.com/story", source_id)
            .await
            .unwrap();
        assert!(inserted1);

        let (id2, inserted2) = store
            .upsert_candidate("https://Example.com/story/", source_id)
            .await
            .unwrap();
        assert!(!inserted2);
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn promote_rejects_disallowed_transition() {
        let store = MemoryStore::new();
        let (source_id, _) = store.upsert_source(make_source()).await.unwrap();
        let (cid, _) = store.upsert_candidate("https://example.com/a", source_id).await.unwrap();

        let err = store
            .promote_candidate_status(cid, CandidateStatus::Discovered, CandidateStatus::Article)
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlerError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn promote_is_compare_and_set() {
        let store = MemoryStore::new();
        let (source_id, _) = store.upsert_source(make_source()).await.unwrap();
        let (cid, _) = store.upsert_candidate("https://example.com/a", source_id).await.unwrap();

        let transitioned = store
            .promote_candidate_status(cid, CandidateStatus::Discovered, CandidateStatus::Verified)
            .await
            .unwrap();
        assert!(transitioned);

        // Same CAS again fails because status has already moved on.
        let transitioned_again = store
            .promote_candidate_status(cid, CandidateStatus::Discovered, CandidateStatus::Verified)
            .await
            .unwrap();
        assert!(!transitioned_again);
    }

    #[tokio::test]
    async fn batch_claim_does_not_double_claim() {
        let store = MemoryStore::new();
        let (source_id, _) = store.upsert_source(make_source()).await.unwrap();
        let (cid, _) = store.upsert_candidate("https://example.com/a", source_id).await.unwrap();
        store
            .promote_candidate_status(cid, CandidateStatus::Discovered, CandidateStatus::Verified)
            .await
            .unwrap();
        store
            .promote_candidate_status(cid, CandidateStatus::Verified, CandidateStatus::Article)
            .await
            .unwrap();

        let domains = vec!["example.com".to_string()];
        let batch1 = store.batch_claim_for_extraction(&domains, 10).await.unwrap();
        assert_eq!(batch1.len(), 1);
        let batch2 = store.batch_claim_for_extraction(&domains, 10).await.unwrap();
        assert!(batch2.is_empty(), "already-claimed row must not be claimable again");
    }

    #[tokio::test]
    async fn insert_article_is_unique_on_url() {
        let store = MemoryStore::new();
        let (source_id, _) = store.upsert_source(make_source()).await.unwrap();
        let (cid, _) = store.upsert_candidate("https://example.com/a", source_id).await.unwrap();

        let new_article = NewArticle {
            candidate_link_id: cid,
            url: "https://example.com/a".to_string(),
            title: "Title".to_string(),
            text: Some("body".to_string()),
            authors: vec![],
            publish_date: None,
            extraction_method: "cached_snapshot".to_string(),
            proxy_status: None,
        };
        let first = store.insert_article_if_absent(new_article.clone()).await.unwrap();
        assert!(first.is_some());
        let second = store.insert_article_if_absent(new_article).await.unwrap();
        assert!(second.is_none(), "duplicate insert must silently no-op");
    }
}
