//! Extraction worker (spec §4.F): claims a batch (via the coordinator when
//! configured, falling back to a direct Store claim otherwise), runs each
//! item through the extraction method chain, and persists successes with a
//! post-commit read-back.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use uuid::Uuid;

use crawler_common::{CandidateStatus, Config, CrawlerError};
use crawler_store::{NewArticle, Store};

use crate::backoff::CaptchaBackoff;
use crate::coordinator_client::CoordinatorClient;
use crate::methods::{default_chain, ExtractionMethod};

struct ClaimedItem {
    candidate_id: Uuid,
    url: String,
    domain: String,
}

enum ItemOutcome {
    Extracted,
    Failed,
    DomainAbort(String),
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub extracted: usize,
    pub failed: usize,
    pub aborted_domains: Vec<String>,
}

pub struct ExtractionWorker {
    worker_id: String,
    store: Arc<dyn Store>,
    client: reqwest::Client,
    methods: Vec<Box<dyn ExtractionMethod>>,
    coordinator: Option<CoordinatorClient>,
    config: Config,
    captcha_backoff: StdMutex<CaptchaBackoff>,
}

impl ExtractionWorker {
    pub fn new(worker_id: impl Into<String>, store: Arc<dyn Store>, config: Config, coordinator_base_url: Option<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            store,
            client: reqwest::Client::new(),
            methods: default_chain(),
            coordinator: coordinator_base_url.map(CoordinatorClient::new),
            config,
            captcha_backoff: StdMutex::new(CaptchaBackoff::new()),
        }
    }

    /// Claims one batch and processes it to completion.
    pub async fn run_once(&self, batch_size: usize, max_per_domain: usize) -> Result<BatchReport, CrawlerError> {
        let items = self.claim_batch(batch_size, max_per_domain).await?;
        Ok(self.process_batch(items).await)
    }

    async fn claim_batch(&self, batch_size: usize, max_per_domain: usize) -> Result<Vec<ClaimedItem>, CrawlerError> {
        if let Some(coordinator) = &self.coordinator {
            match coordinator.request_work(&self.worker_id, batch_size, max_per_domain).await {
                Ok(batch) => {
                    return Ok(batch
                        .items
                        .into_iter()
                        .map(|i| ClaimedItem {
                            candidate_id: i.id,
                            url: i.url,
                            domain: i.source,
                        })
                        .collect());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "coordinator unreachable, degrading to direct claim");
                }
            }
        }
        self.claim_direct(batch_size).await
    }

    /// Fallback mode (spec §4.E): claim straight from Store with no
    /// cross-worker coordination. Strictly worse pacing, never wrong.
    async fn claim_direct(&self, limit: usize) -> Result<Vec<ClaimedItem>, CrawlerError> {
        let pool = self.store.candidates_by_status(CandidateStatus::Article).await?;
        let domains: Vec<String> = pool.into_iter().map(|c| c.domain).collect::<BTreeSet<_>>().into_iter().collect();
        let claimed = self.store.batch_claim_for_extraction(&domains, limit).await?;
        Ok(claimed
            .into_iter()
            .map(|c| ClaimedItem {
                candidate_id: c.id,
                url: c.url,
                domain: c.domain,
            })
            .collect())
    }

    async fn process_batch(&self, items: Vec<ClaimedItem>) -> BatchReport {
        let mut grouped: HashMap<String, Vec<ClaimedItem>> = HashMap::new();
        for item in items {
            grouped.entry(item.domain.clone()).or_default().push(item);
        }

        let mut report = BatchReport::default();

        // Items in the same domain group are serialized within this worker
        // (spec §5: "items belonging to the same domain are serialized").
        for (domain, domain_items) in grouped {
            let mut aborted = false;
            for item in domain_items {
                if aborted {
                    report.failed += 1;
                    continue;
                }
                match self.extract_one(&item).await {
                    ItemOutcome::Extracted => report.extracted += 1,
                    ItemOutcome::Failed => report.failed += 1,
                    ItemOutcome::DomainAbort(reason) => {
                        tracing::warn!(domain = %domain, reason = %reason, "aborting remainder of domain's batch");
                        report.failed += 1;
                        report.aborted_domains.push(domain.clone());
                        aborted = true;
                        self.handle_domain_block(&domain).await;
                    }
                }
            }
        }

        report
    }

    async fn extract_one(&self, item: &ClaimedItem) -> ItemOutcome {
        for method in &self.methods {
            match method.try_extract(&self.client, &item.url).await {
                Ok(Some(content)) => {
                    return self.persist(item, method.name(), content).await;
                }
                Ok(None) => continue,
                Err(CrawlerError::RateLimited(reason)) => return ItemOutcome::DomainAbort(reason),
                Err(e) => {
                    tracing::debug!(error = %e, method = method.name(), url = %item.url, "extraction method errored");
                    continue;
                }
            }
        }
        ItemOutcome::Failed
    }

    async fn persist(&self, item: &ClaimedItem, method_name: &str, content: crate::methods::ExtractedContent) -> ItemOutcome {
        let new_article = NewArticle {
            candidate_link_id: item.candidate_id,
            url: item.url.clone(),
            title: content.title,
            text: Some(content.text),
            authors: content.authors,
            publish_date: None,
            extraction_method: method_name.to_string(),
            proxy_status: None,
        };

        let inserted = match self.store.insert_article_if_absent(new_article).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, candidate_id = %item.candidate_id, "failed to persist extracted article");
                return ItemOutcome::Failed;
            }
        };

        let Some(article_id) = inserted else {
            // URL already had an article row (e.g. a retried batch); the
            // candidate link is already effectively extracted.
            return self.promote_candidate(item).await;
        };

        // Post-commit verification (spec §4.F): read the row back by ID in
        // case the insert silently didn't land.
        match self.store.find_article_by_id(article_id).await {
            Ok(Some(_)) => self.promote_candidate(item).await,
            Ok(None) => {
                tracing::error!(
                    marker = "SILENT_COMMIT",
                    article_id = %article_id,
                    candidate_id = %item.candidate_id,
                    "post-commit verification found no row after insert"
                );
                ItemOutcome::Failed
            }
            Err(e) => {
                tracing::warn!(error = %e, article_id = %article_id, "post-commit read failed");
                ItemOutcome::Failed
            }
        }
    }

    async fn promote_candidate(&self, item: &ClaimedItem) -> ItemOutcome {
        match self
            .store
            .promote_candidate_status(item.candidate_id, CandidateStatus::Article, CandidateStatus::Extracted)
            .await
        {
            Ok(_) => ItemOutcome::Extracted,
            Err(e) => {
                tracing::warn!(error = %e, candidate_id = %item.candidate_id, "failed to promote candidate to extracted");
                ItemOutcome::Failed
            }
        }
    }

    async fn handle_domain_block(&self, domain: &str) {
        let backoff = {
            let mut guard = self.captcha_backoff.lock().expect("captcha backoff lock poisoned");
            guard.strike(domain, self.config.captcha_backoff_base, self.config.captcha_backoff_cap)
        };
        tracing::warn!(domain, backoff_secs = backoff.as_secs(), "domain blocked, local backoff extended");

        if let Some(coordinator) = &self.coordinator {
            if let Err(e) = coordinator.report_failure(&self.worker_id, domain).await {
                tracing::warn!(error = %e, domain, "failed to report domain failure to coordinator");
            }
        }
    }

    #[cfg(test)]
    fn with_methods(store: Arc<dyn Store>, config: Config, methods: Vec<Box<dyn ExtractionMethod>>) -> Self {
        Self {
            worker_id: "test-worker".to_string(),
            store,
            client: reqwest::Client::new(),
            methods,
            coordinator: None,
            config,
            captcha_backoff: StdMutex::new(CaptchaBackoff::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use crawler_common::Source;
    use crawler_store::MemoryStore;
    use crate::methods::ExtractedContent;

    struct AlwaysSucceeds;

    #[async_trait]
    impl ExtractionMethod for AlwaysSucceeds {
        fn name(&self) -> &'static str {
            "cached_snapshot"
        }

        async fn try_extract(&self, _client: &reqwest::Client, _url: &str) -> Result<Option<ExtractedContent>, CrawlerError> {
            Ok(Some(ExtractedContent {
                title: "Some Headline".to_string(),
                text: "body text".to_string(),
                authors: Vec::new(),
            }))
        }
    }

    struct AlwaysBlocked;

    #[async_trait]
    impl ExtractionMethod for AlwaysBlocked {
        fn name(&self) -> &'static str {
            "cached_snapshot"
        }

        async fn try_extract(&self, _client: &reqwest::Client, _url: &str) -> Result<Option<ExtractedContent>, CrawlerError> {
            Err(CrawlerError::RateLimited("status 429".to_string()))
        }
    }

    async fn seeded_store() -> (Arc<MemoryStore>, Uuid, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let source = Source {
            id: Uuid::new_v4(),
            host: "example.com".to_string(),
            display_name: "Example Daily".to_string(),
            dataset: "test".to_string(),
            meta: Default::default(),
            attempt_count: 0,
            created_at: Utc::now(),
        };
        let source_id = source.id;
        store.upsert_source(source).await.unwrap();

        let (candidate_id, _) = store
            .upsert_candidate("https://example.com/2024/03/some-headline", source_id)
            .await
            .unwrap();
        store
            .promote_candidate_status(candidate_id, CandidateStatus::Discovered, CandidateStatus::Verified)
            .await
            .unwrap();
        store
            .promote_candidate_status(candidate_id, CandidateStatus::Verified, CandidateStatus::Article)
            .await
            .unwrap();

        (store, source_id, candidate_id)
    }

    #[tokio::test]
    async fn successful_extraction_persists_article_and_promotes_candidate() {
        let (store, _source_id, candidate_id) = seeded_store().await;
        let worker = ExtractionWorker::with_methods(store.clone(), Config::default(), vec![Box::new(AlwaysSucceeds)]);

        let report = worker.run_once(10, 5).await.unwrap();
        assert_eq!(report.extracted, 1);
        assert_eq!(report.failed, 0);

        let candidate = store.get_candidate(candidate_id).await.unwrap().unwrap();
        assert_eq!(candidate.status, CandidateStatus::Extracted);
    }

    #[tokio::test]
    async fn domain_block_aborts_batch_and_reports_failure() {
        let (store, source_id, _candidate_id) = seeded_store().await;
        // second candidate on the same domain so we can see the abort skip it
        let (second_id, _) = store
            .upsert_candidate("https://example.com/2024/03/another-headline", source_id)
            .await
            .unwrap();
        store
            .promote_candidate_status(second_id, CandidateStatus::Discovered, CandidateStatus::Verified)
            .await
            .unwrap();
        store
            .promote_candidate_status(second_id, CandidateStatus::Verified, CandidateStatus::Article)
            .await
            .unwrap();

        let worker = ExtractionWorker::with_methods(store.clone(), Config::default(), vec![Box::new(AlwaysBlocked)]);
        let report = worker.run_once(10, 5).await.unwrap();

        assert_eq!(report.extracted, 0);
        assert_eq!(report.failed, 2);
        assert_eq!(report.aborted_domains, vec!["example.com".to_string()]);
    }
}
