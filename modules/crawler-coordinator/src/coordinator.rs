//! Work queue coordinator, spec §4.E: domain-partitioned dispatch so a fleet
//! of extraction workers never stampedes the same handful of domains.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crawler_common::{CandidateStatus, Config, CrawlerError};
use crawler_store::Store;

use crate::lease::{CoordinatorStats, LeaseTable};

#[derive(Debug, Clone, Serialize)]
pub struct WorkItem {
    pub id: Uuid,
    pub url: String,
    pub source: String,
    pub canonical_name: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct WorkBatch {
    pub items: Vec<WorkItem>,
    pub worker_domains: Vec<String>,
}

pub struct Coordinator {
    store: Arc<dyn Store>,
    config: Config,
    table: Mutex<LeaseTable>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        Self {
            store,
            config,
            table: Mutex::new(LeaseTable::new()),
        }
    }

    /// Assigns (or reuses) this worker's domain lease, claims eligible work
    /// within it, and advances the pacing clock for every domain served.
    pub async fn request_work(
        &self,
        worker_id: &str,
        batch_size: usize,
        max_per_domain: usize,
    ) -> Result<WorkBatch, CrawlerError> {
        let now = Utc::now();
        let pool = self.store.candidates_by_status(CandidateStatus::Article).await?;
        let pool_domains: BTreeSet<String> = pool.iter().map(|c| c.domain.clone()).collect();
        warn_if_single_domain_pacing_too_aggressive(&pool_domains, &self.config);

        let mut table = self.table.lock().await;
        table.reclaim_timed_out_workers(now, self.config.worker_timeout);
        let leased = table.ensure_lease(
            worker_id,
            now,
            &pool_domains,
            self.config.min_domains_per_worker,
            self.config.max_domains_per_worker,
        );

        let mut items = Vec::new();
        let mut source_names: HashMap<Uuid, String> = HashMap::new();
        for domain in &leased {
            if items.len() >= batch_size {
                break;
            }
            if !table.domain_ready(domain, now, self.config.domain_cooldown) {
                continue;
            }

            let remaining = batch_size - items.len();
            let claim_limit = remaining.min(max_per_domain);
            let claimed = self
                .store
                .batch_claim_for_extraction(std::slice::from_ref(domain), claim_limit)
                .await?;
            table.record_request(domain, now);

            for candidate in claimed {
                let canonical_name = match source_names.get(&candidate.source_id) {
                    Some(name) => name.clone(),
                    None => {
                        let name = self
                            .store
                            .get_source(candidate.source_id)
                            .await?
                            .map(|s| s.display_name)
                            .unwrap_or_default();
                        source_names.insert(candidate.source_id, name.clone());
                        name
                    }
                };
                items.push(WorkItem {
                    id: candidate.id,
                    url: candidate.url,
                    source: candidate.domain,
                    canonical_name,
                });
            }
        }

        Ok(WorkBatch {
            items,
            worker_domains: leased,
        })
    }

    /// Applies the failure/cooldown escalation for `domain` and keeps
    /// `worker_id`'s lease alive (a failure report is itself a liveness signal).
    pub async fn report_failure(&self, worker_id: &str, domain: &str) -> Result<(), CrawlerError> {
        let now = Utc::now();
        let mut table = self.table.lock().await;
        table.touch_worker(worker_id, now);
        table.report_failure(domain, now, self.config.domain_pause);
        tracing::warn!(worker_id, domain, "domain failure reported");
        Ok(())
    }

    pub async fn stats(&self) -> Result<CoordinatorStats, CrawlerError> {
        let now = Utc::now();
        let pool = self.store.candidates_by_status(CandidateStatus::Article).await?;
        let pool_domains: Vec<String> = pool.into_iter().map(|c| c.domain).collect();
        let table = self.table.lock().await;
        Ok(table.stats(now, &pool_domains))
    }

    /// Background sweep (spec §4.E: every 60s) reclaiming workers that have
    /// gone quiet past `WORKER_TIMEOUT`. Spawned once at process startup.
    pub async fn run_reclamation_sweep(self: Arc<Self>) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            let now = Utc::now();
            let mut table = self.table.lock().await;
            table.reclaim_timed_out_workers(now, self.config.worker_timeout);
        }
    }
}

/// Single-domain dataset detection (spec §4.E): a candidate pool with exactly
/// one distinct domain needs much gentler pacing than the multi-domain
/// default. The configured batch-sleep/inter-request values are fixed at
/// startup, so we can only warn here, not clamp in place.
fn warn_if_single_domain_pacing_too_aggressive(pool_domains: &BTreeSet<String>, config: &Config) {
    if pool_domains.len() != 1 {
        return;
    }
    if config.batch_sleep_single_domain.as_secs() < 300 || config.inter_request_min_single_domain.as_secs() < 90 {
        tracing::warn!(
            batch_sleep_single_domain_secs = config.batch_sleep_single_domain.as_secs(),
            inter_request_min_single_domain_secs = config.inter_request_min_single_domain.as_secs(),
            "single-domain dataset detected with pacing below the recommended floor (BATCH_SLEEP>=300s, INTER_REQUEST_MIN>=90s)"
        );
    }
}
