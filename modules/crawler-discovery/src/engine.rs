//! Orchestrates the discovery method chain for a single source, spec §4.C:
//! RSS feed, then template parser, then homepage classifier, short-circuiting
//! on the first method that yields candidates.

use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crawler_common::{Config, DiscoveryMethod, DiscoveryOutcome, DiscoveryMethodEffectiveness, Source};
use crawler_store::Store;

use crate::anchors::{extract_anchors, homepage_classifier_candidates, template_candidates};
use crate::bookkeeping::rss_attempt_patch;
use crate::fetch::fetch_homepage;
use crate::rss;

/// Outcome of running the full method chain against one source.
#[derive(Debug, Clone)]
pub struct DiscoverySummary {
    pub source_id: Uuid,
    pub method_used: Option<DiscoveryMethod>,
    pub candidates_inserted: usize,
}

pub struct DiscoveryEngine {
    client: reqwest::Client,
}

impl Default for DiscoveryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryEngine {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .build()
                .expect("failed to build discovery HTTP client"),
        }
    }

    /// Run the method chain for one source. `skip_rss` comes from the
    /// scheduler's `rss_missing` + retry-window decision (spec §4.B).
    pub async fn discover_source(
        &self,
        store: &dyn Store,
        source: &Source,
        skip_rss: bool,
        config: &Config,
    ) -> Result<DiscoverySummary, crawler_common::CrawlerError> {
        if !skip_rss {
            if let Some(summary) = self.try_rss(store, source, config).await? {
                return Ok(summary);
            }
        } else {
            self.record_effectiveness(store, source, DiscoveryMethod::RssFeed, DiscoveryOutcome::Skipped, 0, 0.0)
                .await?;
        }

        if let Some(summary) = self.try_template(store, source).await? {
            return Ok(summary);
        }

        if let Some(summary) = self.try_homepage_classifier(store, source).await? {
            return Ok(summary);
        }

        store
            .update_source_meta(source.id, crawler_store::SourceMetaPatch {
                last_discovered_at: Some(Utc::now()),
                attempt_count_increment: true,
                ..Default::default()
            })
            .await?;

        Ok(DiscoverySummary {
            source_id: source.id,
            method_used: None,
            candidates_inserted: 0,
        })
    }

    async fn try_rss(
        &self,
        store: &dyn Store,
        source: &Source,
        config: &Config,
    ) -> Result<Option<DiscoverySummary>, crawler_common::CrawlerError> {
        let started = Instant::now();
        let now = Utc::now();

        match rss::discover(&self.client, &source.host).await {
            Ok(feed) => {
                let inserted = self.persist_links(store, source, &feed.links).await?;
                let patch = rss_attempt_patch(source, DiscoveryOutcome::Success, None, now, config);
                store.update_source_meta(source.id, patch).await?;
                self.record_effectiveness(
                    store,
                    source,
                    DiscoveryMethod::RssFeed,
                    DiscoveryOutcome::Success,
                    inserted,
                    started.elapsed().as_millis() as f64,
                )
                .await?;
                Ok(Some(DiscoverySummary {
                    source_id: source.id,
                    method_used: Some(DiscoveryMethod::RssFeed),
                    candidates_inserted: inserted,
                }))
            }
            Err(e) => {
                let outcome = e.to_outcome();
                let patch = rss_attempt_patch(source, outcome, e.status_code(), now, config);
                store.update_source_meta(source.id, patch).await?;
                self.record_effectiveness(
                    store,
                    source,
                    DiscoveryMethod::RssFeed,
                    outcome,
                    0,
                    started.elapsed().as_millis() as f64,
                )
                .await?;
                Ok(None)
            }
        }
    }

    async fn try_template(
        &self,
        store: &dyn Store,
        source: &Source,
    ) -> Result<Option<DiscoverySummary>, crawler_common::CrawlerError> {
        let started = Instant::now();
        match fetch_homepage(&self.client, &source.host).await {
            Ok((html, base_url)) => {
                let anchors = extract_anchors(&html, &base_url);
                let candidates = template_candidates(&anchors, &source.host);
                let outcome = if candidates.is_empty() {
                    DiscoveryOutcome::ParseError
                } else {
                    DiscoveryOutcome::Success
                };
                let inserted = self.persist_links(store, source, &candidates).await?;
                self.record_effectiveness(
                    store,
                    source,
                    DiscoveryMethod::Template,
                    outcome,
                    inserted,
                    started.elapsed().as_millis() as f64,
                )
                .await?;
                if inserted > 0 {
                    self.mark_method_successful(store, source, DiscoveryMethod::Template).await?;
                    Ok(Some(DiscoverySummary {
                        source_id: source.id,
                        method_used: Some(DiscoveryMethod::Template),
                        candidates_inserted: inserted,
                    }))
                } else {
                    Ok(None)
                }
            }
            Err(e) => {
                self.record_effectiveness(
                    store,
                    source,
                    DiscoveryMethod::Template,
                    e.to_outcome(),
                    0,
                    started.elapsed().as_millis() as f64,
                )
                .await?;
                Ok(None)
            }
        }
    }

    async fn try_homepage_classifier(
        &self,
        store: &dyn Store,
        source: &Source,
    ) -> Result<Option<DiscoverySummary>, crawler_common::CrawlerError> {
        let started = Instant::now();
        match fetch_homepage(&self.client, &source.host).await {
            Ok((html, base_url)) => {
                let anchors = extract_anchors(&html, &base_url);
                let candidates = homepage_classifier_candidates(&anchors, &source.host);
                let outcome = if candidates.is_empty() {
                    DiscoveryOutcome::ParseError
                } else {
                    DiscoveryOutcome::Success
                };
                let inserted = self.persist_links(store, source, &candidates).await?;
                self.record_effectiveness(
                    store,
                    source,
                    DiscoveryMethod::HomepageClassifier,
                    outcome,
                    inserted,
                    started.elapsed().as_millis() as f64,
                )
                .await?;
                if inserted > 0 {
                    self.mark_method_successful(store, source, DiscoveryMethod::HomepageClassifier)
                        .await?;
                    Ok(Some(DiscoverySummary {
                        source_id: source.id,
                        method_used: Some(DiscoveryMethod::HomepageClassifier),
                        candidates_inserted: inserted,
                    }))
                } else {
                    Ok(None)
                }
            }
            Err(e) => {
                self.record_effectiveness(
                    store,
                    source,
                    DiscoveryMethod::HomepageClassifier,
                    e.to_outcome(),
                    0,
                    started.elapsed().as_millis() as f64,
                )
                .await?;
                Ok(None)
            }
        }
    }

    async fn mark_method_successful(
        &self,
        store: &dyn Store,
        source: &Source,
        method: DiscoveryMethod,
    ) -> Result<(), crawler_common::CrawlerError> {
        store
            .update_source_meta(source.id, crawler_store::SourceMetaPatch {
                last_discovered_at: Some(Utc::now()),
                last_successful_method: Some(method),
                attempt_count_increment: true,
                ..Default::default()
            })
            .await
    }

    async fn persist_links(
        &self,
        store: &dyn Store,
        source: &Source,
        links: &[String],
    ) -> Result<usize, crawler_common::CrawlerError> {
        let mut inserted = 0;
        for link in links {
            let (_, was_new) = store.upsert_candidate(link, source.id).await?;
            if was_new {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn record_effectiveness(
        &self,
        store: &dyn Store,
        source: &Source,
        method: DiscoveryMethod,
        status: DiscoveryOutcome,
        articles_found: usize,
        response_time_ms: f64,
    ) -> Result<(), crawler_common::CrawlerError> {
        store
            .record_discovery_effectiveness(DiscoveryMethodEffectiveness {
                id: Uuid::new_v4(),
                source_id: source.id,
                method,
                status,
                articles_found: articles_found as u32,
                success_rate: if status == DiscoveryOutcome::Success { 1.0 } else { 0.0 },
                attempt_count: 1,
                avg_response_time_ms: response_time_ms,
                recent_status_codes: Vec::new(),
                recorded_at: Utc::now(),
            })
            .await
    }
}
