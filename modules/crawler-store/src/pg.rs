//! Postgres-backed `Store`, grounded on `rootsignal-domains`'s
//! `sqlx::query_as::<_, Self>` style: runtime-checked queries, no
//! `query_as!` macros (those need a live `DATABASE_URL` at build time).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crawler_common::{
    domain_of, normalize_url, Article, ArticleStatus, CandidateLink, CandidateStatus, CrawlerError,
    DiscoveryMethod, DiscoveryMethodEffectiveness, Source, SourceMeta, TransientFailure,
};

use crate::state_machine::{article_transition_allowed, candidate_transition_allowed};
use crate::traits::{NewArticle, SourceMetaPatch, Store};

fn store_err(e: sqlx::Error) -> CrawlerError {
    CrawlerError::Store(e.to_string())
}

#[derive(sqlx::FromRow)]
struct SourceRow {
    id: Uuid,
    host: String,
    display_name: String,
    dataset: String,
    cadence_hours: Option<i32>,
    rss_missing: Option<DateTime<Utc>>,
    rss_consecutive_failures: i32,
    rss_transient_failures: Json<Vec<TransientFailure>>,
    rss_last_failed: Option<DateTime<Utc>>,
    last_successful_method: Option<String>,
    last_discovered_at: Option<DateTime<Utc>>,
    attempt_count: i32,
    created_at: DateTime<Utc>,
}

impl From<SourceRow> for Source {
    fn from(r: SourceRow) -> Self {
        Source {
            id: r.id,
            host: r.host,
            display_name: r.display_name,
            dataset: r.dataset,
            meta: SourceMeta {
                cadence_hours: r.cadence_hours.map(|v| v as u32),
                rss_missing: r.rss_missing,
                rss_consecutive_failures: r.rss_consecutive_failures as u32,
                rss_transient_failures: r.rss_transient_failures.0,
                rss_last_failed: r.rss_last_failed,
                last_successful_method: r
                    .last_successful_method
                    .and_then(|s| s.parse::<DiscoveryMethod>().ok()),
                last_discovered_at: r.last_discovered_at,
            },
            attempt_count: r.attempt_count as u32,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CandidateLinkRow {
    id: Uuid,
    source_id: Uuid,
    url: String,
    status: String,
    discovered_at: DateTime<Utc>,
    verified_at: Option<DateTime<Utc>>,
    error_count: i32,
    domain: String,
}

impl TryFrom<CandidateLinkRow> for CandidateLink {
    type Error = CrawlerError;
    fn try_from(r: CandidateLinkRow) -> Result<Self, Self::Error> {
        Ok(CandidateLink {
            id: r.id,
            source_id: r.source_id,
            url: r.url,
            status: r
                .status
                .parse()
                .map_err(|e| CrawlerError::Store(format!("bad candidate status in row: {e}")))?,
            discovered_at: r.discovered_at,
            verified_at: r.verified_at,
            error_count: r.error_count as u32,
            domain: r.domain,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: Uuid,
    candidate_link_id: Uuid,
    url: String,
    title: String,
    text: Option<String>,
    authors: Vec<String>,
    publish_date: Option<DateTime<Utc>>,
    status: String,
    extracted_at: DateTime<Utc>,
    extraction_method: String,
    proxy_status: Option<String>,
}

impl TryFrom<ArticleRow> for Article {
    type Error = CrawlerError;
    fn try_from(r: ArticleRow) -> Result<Self, Self::Error> {
        Ok(Article {
            id: r.id,
            candidate_link_id: r.candidate_link_id,
            url: r.url,
            title: r.title,
            text: r.text,
            authors: r.authors,
            publish_date: r.publish_date,
            status: r
                .status
                .parse()
                .map_err(|e| CrawlerError::Store(format!("bad article status in row: {e}")))?,
            extracted_at: r.extracted_at,
            extraction_method: r.extraction_method,
            proxy_status: r.proxy_status,
        })
    }
}

/// Postgres-backed implementation, spec §4.A. Holds a single pool; callers
/// (binaries) decide whether http-serving and worker-claiming traffic share
/// it or get separate pools, same split as the teacher's `main.rs`.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), CrawlerError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CrawlerError::Store(e.to_string()))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_source(&self, source: Source) -> Result<(Uuid, bool), CrawlerError> {
        let existing = sqlx::query_as::<_, (Uuid,)>(
            "SELECT id FROM sources WHERE host = $1 AND dataset = $2",
        )
        .bind(&source.host)
        .bind(&source.dataset)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        if let Some((id,)) = existing {
            return Ok((id, false));
        }

        let row = sqlx::query_as::<_, (Uuid,)>(
            r#"
            INSERT INTO sources (id, host, display_name, dataset, cadence_hours, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(source.id)
        .bind(&source.host)
        .bind(&source.display_name)
        .bind(&source.dataset)
        .bind(source.meta.cadence_hours.map(|v| v as i32))
        .bind(source.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok((row.0, true))
    }

    async fn get_source(&self, id: Uuid) -> Result<Option<Source>, CrawlerError> {
        let row = sqlx::query_as::<_, SourceRow>("SELECT * FROM sources WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(row.map(Source::from))
    }

    async fn list_sources(&self) -> Result<Vec<Source>, CrawlerError> {
        let rows = sqlx::query_as::<_, SourceRow>("SELECT * FROM sources ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(Source::from).collect())
    }

    async fn update_source_meta(&self, source_id: Uuid, patch: SourceMetaPatch) -> Result<(), CrawlerError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        if patch.reset_rss_failure_state {
            sqlx::query(
                r#"
                UPDATE sources
                SET rss_missing = NULL,
                    rss_consecutive_failures = 0,
                    rss_transient_failures = '[]',
                    rss_last_failed = NULL
                WHERE id = $1
                "#,
            )
            .bind(source_id)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }

        if let Some(v) = patch.last_discovered_at {
            sqlx::query("UPDATE sources SET last_discovered_at = $2 WHERE id = $1")
                .bind(source_id)
                .bind(v)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }

        if let Some(v) = patch.rss_missing {
            sqlx::query("UPDATE sources SET rss_missing = $2 WHERE id = $1")
                .bind(source_id)
                .bind(v)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }

        if let Some(v) = patch.rss_consecutive_failures {
            sqlx::query("UPDATE sources SET rss_consecutive_failures = $2 WHERE id = $1")
                .bind(source_id)
                .bind(v as i32)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }

        if let Some(list) = patch.rss_transient_failures_set {
            sqlx::query("UPDATE sources SET rss_transient_failures = $2 WHERE id = $1")
                .bind(source_id)
                .bind(Json(list))
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }

        if let Some(v) = patch.rss_last_failed {
            sqlx::query("UPDATE sources SET rss_last_failed = $2 WHERE id = $1")
                .bind(source_id)
                .bind(v)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }

        if let Some(v) = patch.last_successful_method {
            sqlx::query("UPDATE sources SET last_successful_method = $2 WHERE id = $1")
                .bind(source_id)
                .bind(v.to_string())
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }

        if patch.attempt_count_increment {
            sqlx::query("UPDATE sources SET attempt_count = attempt_count + 1 WHERE id = $1")
                .bind(source_id)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn upsert_candidate(&self, url: &str, source_id: Uuid) -> Result<(Uuid, bool), CrawlerError> {
        let normalized = normalize_url(url);
        let domain = domain_of(&normalized).unwrap_or_default();

        let row = sqlx::query_as::<_, (Uuid, bool)>(
            r#"
            INSERT INTO candidate_links (id, source_id, url, status, domain)
            VALUES ($1, $2, $3, 'discovered', $4)
            ON CONFLICT (url) DO UPDATE SET url = EXCLUDED.url
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(source_id)
        .bind(&normalized)
        .bind(&domain)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row)
    }

    async fn get_candidate(&self, id: Uuid) -> Result<Option<CandidateLink>, CrawlerError> {
        let row = sqlx::query_as::<_, CandidateLinkRow>("SELECT * FROM candidate_links WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.map(CandidateLink::try_from).transpose()
    }

    async fn candidates_by_status(&self, status: CandidateStatus) -> Result<Vec<CandidateLink>, CrawlerError> {
        let rows = sqlx::query_as::<_, CandidateLinkRow>(
            "SELECT * FROM candidate_links WHERE status = $1 ORDER BY discovered_at ASC",
        )
        .bind(status.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(CandidateLink::try_from).collect()
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

        let verified_at_clause = matches!(to, CandidateStatus::Verified | CandidateStatus::Article);

        let result = if verified_at_clause {
            sqlx::query(
                "UPDATE candidate_links SET status = $3, verified_at = NOW() WHERE id = $1 AND status = $2",
            )
            .bind(candidate_id)
            .bind(from.to_string())
            .bind(to.to_string())
            .execute(&self.pool)
            .await
        } else {
            sqlx::query("UPDATE candidate_links SET status = $3 WHERE id = $1 AND status = $2")
                .bind(candidate_id)
                .bind(from.to_string())
                .bind(to.to_string())
                .execute(&self.pool)
                .await
        }
        .map_err(store_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn batch_claim_for_extraction(
        &self,
        domains: &[String],
        limit: usize,
    ) -> Result<Vec<CandidateLink>, CrawlerError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let rows = sqlx::query_as::<_, CandidateLinkRow>(
            r#"
            SELECT * FROM candidate_links
            WHERE status = 'article'
              AND domain = ANY($1)
              AND claimed_at IS NULL
            ORDER BY discovered_at ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(domains)
        .bind(limit as i64)
        .fetch_all(&mut *tx)
        .await
        .map_err(store_err)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        if !ids.is_empty() {
            sqlx::query("UPDATE candidate_links SET claimed_at = NOW() WHERE id = ANY($1)")
                .bind(&ids)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        rows.into_iter().map(CandidateLink::try_from).collect()
    }

    async fn insert_article_if_absent(&self, article: NewArticle) -> Result<Option<Uuid>, CrawlerError> {
        let normalized = normalize_url(&article.url);
        let new_id = Uuid::new_v4();

        let row = sqlx::query_as::<_, (Uuid,)>(
            r#"
            INSERT INTO articles
                (id, candidate_link_id, url, title, text, authors, publish_date, status, extraction_method, proxy_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'extracted', $8, $9)
            ON CONFLICT (url) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new_id)
        .bind(article.candidate_link_id)
        .bind(&normalized)
        .bind(&article.title)
        .bind(&article.text)
        .bind(&article.authors)
        .bind(article.publish_date)
        .bind(&article.extraction_method)
        .bind(&article.proxy_status)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        if row.is_none() {
            tracing::debug!(url = %normalized, "article already present, skipping insert");
        }
        Ok(row.map(|r| r.0))
    }

    async fn find_article_by_id(&self, id: Uuid) -> Result<Option<Article>, CrawlerError> {
        let row = sqlx::query_as::<_, ArticleRow>("SELECT * FROM articles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.map(Article::try_from).transpose()
    }

    async fn articles_by_status_before(
        &self,
        status: ArticleStatus,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Article>, CrawlerError> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            "SELECT * FROM articles WHERE status = $1 AND extracted_at < $2",
        )
        .bind(status.to_string())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(Article::try_from).collect()
    }

    async fn articles_with_null_text(&self, status: ArticleStatus) -> Result<Vec<Article>, CrawlerError> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            "SELECT * FROM articles WHERE status = $1 AND text IS NULL",
        )
        .bind(status.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(Article::try_from).collect()
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
        let result = sqlx::query("UPDATE articles SET status = $3 WHERE id = $1 AND status = $2")
            .bind(article_id)
            .bind(from.to_string())
            .bind(to.to_string())
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn record_discovery_effectiveness(
        &self,
        record: DiscoveryMethodEffectiveness,
    ) -> Result<(), CrawlerError> {
        let codes: Vec<i32> = record.recent_status_codes.iter().map(|&c| c as i32).collect();
        sqlx::query(
            r#"
            INSERT INTO discovery_method_effectiveness
                (id, source_id, method, status, articles_found, success_rate, attempt_count, avg_response_time_ms, recent_status_codes, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id)
        .bind(record.source_id)
        .bind(record.method.to_string())
        .bind(record.status.to_string())
        .bind(record.articles_found as i32)
        .bind(record.success_rate)
        .bind(record.attempt_count as i32)
        .bind(record.avg_response_time_ms)
        .bind(&codes)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }
}
