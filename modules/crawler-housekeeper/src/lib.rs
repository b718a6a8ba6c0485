//! Daily housekeeping sweep (spec §4.G): expires stale candidates, pauses
//! articles that extracted with no text, and warns (without writing) about
//! items stuck past a pipeline stage's expected lifetime.

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crawler_common::{ArticleStatus, CandidateStatus, Config, CrawlerError};
use crawler_store::Store;

/// How long an item may sit in a non-terminal stage before it's worth
/// flagging to an operator. Not separately configurable in spec §6 — fixed
/// at the documented default.
const STUCK_STAGE_HOURS: i64 = 24;

#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub candidates_expired: usize,
    pub articles_null_text_paused: usize,
    pub stuck_extracted_warned: usize,
    pub stuck_cleaned_warned: usize,
    pub stuck_verified_warned: usize,
    pub dry_run: bool,
}

/// Runs one sweep. In `dry_run` mode the expiry/pause counts are computed but
/// no writes happen; the stuck-stage checks never write regardless (spec
/// §4.G: "warning only, no state change").
pub async fn run_sweep(store: &dyn Store, config: &Config, now: DateTime<Utc>, dry_run: bool) -> Result<SweepReport, CrawlerError> {
    let mut report = SweepReport {
        dry_run,
        ..Default::default()
    };

    expire_stale_candidates(store, config, now, dry_run, &mut report).await?;
    pause_null_text_articles(store, dry_run, &mut report).await?;
    warn_stuck_stages(store, now, &mut report).await?;

    Ok(report)
}

async fn expire_stale_candidates(
    store: &dyn Store,
    config: &Config,
    now: DateTime<Utc>,
    dry_run: bool,
    report: &mut SweepReport,
) -> Result<(), CrawlerError> {
    let cutoff = now - ChronoDuration::days(config.candidate_expiration_days);
    let stale: Vec<_> = store
        .candidates_by_status(CandidateStatus::Article)
        .await?
        .into_iter()
        .filter(|c| c.discovered_at < cutoff)
        .collect();

    report.candidates_expired = stale.len();
    if dry_run {
        return Ok(());
    }

    for candidate in stale {
        store
            .promote_candidate_status(candidate.id, CandidateStatus::Article, CandidateStatus::Paused)
            .await?;
    }
    Ok(())
}

async fn pause_null_text_articles(store: &dyn Store, dry_run: bool, report: &mut SweepReport) -> Result<(), CrawlerError> {
    let null_text = store.articles_with_null_text(ArticleStatus::Extracted).await?;
    report.articles_null_text_paused = null_text.len();
    if dry_run {
        return Ok(());
    }

    for article in null_text {
        store
            .promote_article_status(article.id, ArticleStatus::Extracted, ArticleStatus::Paused)
            .await?;
        tracing::info!(article_id = %article.id, reason = "null_text", "article paused by housekeeper");
    }
    Ok(())
}

async fn warn_stuck_stages(store: &dyn Store, now: DateTime<Utc>, report: &mut SweepReport) -> Result<(), CrawlerError> {
    let cutoff = now - ChronoDuration::hours(STUCK_STAGE_HOURS);

    let stuck_extracted = store.articles_by_status_before(ArticleStatus::Extracted, cutoff).await?;
    for article in &stuck_extracted {
        tracing::warn!(article_id = %article.id, status = "extracted", extracted_at = %article.extracted_at, "article stuck past stage threshold");
    }
    report.stuck_extracted_warned = stuck_extracted.len();

    let stuck_cleaned = store.articles_by_status_before(ArticleStatus::Cleaned, cutoff).await?;
    for article in &stuck_cleaned {
        tracing::warn!(article_id = %article.id, status = "cleaned", extracted_at = %article.extracted_at, "article stuck past stage threshold");
    }
    report.stuck_cleaned_warned = stuck_cleaned.len();

    let stuck_verified: Vec<_> = store
        .candidates_by_status(CandidateStatus::Verified)
        .await?
        .into_iter()
        .filter(|c| c.verified_at.map(|t| t < cutoff).unwrap_or(false))
        .collect();
    for candidate in &stuck_verified {
        tracing::warn!(candidate_id = %candidate.id, status = "verified", "candidate stuck past stage threshold");
    }
    report.stuck_verified_warned = stuck_verified.len();

    Ok(())
}
