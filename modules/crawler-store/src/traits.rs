use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crawler_common::{
    Article, ArticleStatus, CandidateLink, CandidateStatus, CrawlerError, DiscoveryMethodEffectiveness,
    Source,
};

/// Fields a caller wants to patch on a [`Source`]'s metadata. Unset fields
/// are left untouched. Mirrors the narrow `update_source_meta` operation
/// from spec §4.A — callers never write the whole row.
#[derive(Debug, Clone, Default)]
pub struct SourceMetaPatch {
    pub last_discovered_at: Option<DateTime<Utc>>,
    pub rss_missing: Option<Option<DateTime<Utc>>>,
    pub rss_consecutive_failures: Option<u32>,
    /// Replaces the stored transient-failure list wholesale (callers prune
    /// entries outside the rolling window before computing this).
    pub rss_transient_failures_set: Option<Vec<crawler_common::TransientFailure>>,
    pub rss_last_failed: Option<DateTime<Utc>>,
    pub last_successful_method: Option<crawler_common::DiscoveryMethod>,
    pub reset_rss_failure_state: bool,
    pub attempt_count_increment: bool,
}

/// Fields required to insert a newly-extracted article (spec §4.F).
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub candidate_link_id: Uuid,
    pub url: String,
    pub title: String,
    pub text: Option<String>,
    pub authors: Vec<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub extraction_method: String,
    pub proxy_status: Option<String>,
}

/// Durable state for sources, candidate links, articles, and telemetry,
/// spec §3/§4.A. The only component permitted to touch the database
/// directly; everything else goes through these narrow operations.
#[async_trait]
pub trait Store: Send + Sync {
    async fn upsert_source(&self, source: Source) -> Result<(Uuid, bool), CrawlerError>;
    async fn get_source(&self, id: Uuid) -> Result<Option<Source>, CrawlerError>;
    async fn list_sources(&self) -> Result<Vec<Source>, CrawlerError>;
    async fn update_source_meta(&self, source_id: Uuid, patch: SourceMetaPatch) -> Result<(), CrawlerError>;

    /// Idempotent on normalized URL. Returns `(id, inserted)`.
    async fn upsert_candidate(&self, url: &str, source_id: Uuid) -> Result<(Uuid, bool), CrawlerError>;
    async fn get_candidate(&self, id: Uuid) -> Result<Option<CandidateLink>, CrawlerError>;
    async fn candidates_by_status(&self, status: CandidateStatus) -> Result<Vec<CandidateLink>, CrawlerError>;

    /// Compare-and-set. Returns whether the row actually transitioned.
    async fn promote_candidate_status(
        &self,
        candidate_id: Uuid,
        from: CandidateStatus,
        to: CandidateStatus,
    ) -> Result<bool, CrawlerError>;

    /// Atomic claim: marks up to `limit` rows across `domains` as claimed so
    /// no other worker can take them. Race-free (row-level exclusion).
    async fn batch_claim_for_extraction(
        &self,
        domains: &[String],
        limit: usize,
    ) -> Result<Vec<CandidateLink>, CrawlerError>;

    /// Unique on URL; silently no-ops on conflict. Returns `None` on conflict,
    /// `Some(id)` on insert.
    async fn insert_article_if_absent(&self, article: NewArticle) -> Result<Option<Uuid>, CrawlerError>;
    async fn find_article_by_id(&self, id: Uuid) -> Result<Option<Article>, CrawlerError>;
    async fn articles_by_status_before(
        &self,
        status: ArticleStatus,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Article>, CrawlerError>;
    async fn articles_with_null_text(&self, status: ArticleStatus) -> Result<Vec<Article>, CrawlerError>;

    async fn promote_article_status(
        &self,
        article_id: Uuid,
        from: ArticleStatus,
        to: ArticleStatus,
    ) -> Result<bool, CrawlerError>;

    async fn record_discovery_effectiveness(
        &self,
        record: DiscoveryMethodEffectiveness,
    ) -> Result<(), CrawlerError>;
}
