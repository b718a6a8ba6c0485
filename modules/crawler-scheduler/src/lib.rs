//! Per-source cadence decisions: when is a source due again, and should
//! Discovery skip the RSS method for it right now.
//!
//! Pure over its inputs (spec §4.B) — every error a caller sees comes from
//! reading sources out of the store, never from scheduling logic itself.

use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crawler_common::{Config, Source};

/// A source the scheduler has decided is due for discovery right now.
#[derive(Debug, Clone)]
pub struct DueSource {
    pub source: Source,
    pub next_due: DateTime<Utc>,
    /// True when Discovery should skip the RSS method this round because
    /// `rss_missing` was set and the retry window hasn't elapsed.
    pub skip_rss: bool,
}

/// Cadence to apply to a single source, honoring its own override and the
/// single-domain-dataset floor (spec §4.B, §4.E).
pub fn cadence_hours(source: &Source, dataset_is_single_domain: bool, config: &Config) -> u32 {
    let base = source.meta.cadence_hours.unwrap_or(config.default_cadence_hours);
    if dataset_is_single_domain {
        base.max(config.single_domain_min_cadence_hours)
    } else {
        base
    }
}

/// Whether the RSS method should be skipped for `source` right now, per the
/// `rss_missing` + retry-window rule in spec §4.B.
pub fn should_skip_rss(source: &Source, now: DateTime<Utc>, config: &Config) -> bool {
    match source.meta.rss_missing {
        Some(missing_since) => now - missing_since < ChronoDuration::days(config.rss_retry_window_days),
        None => false,
    }
}

/// Group sources by dataset and report which datasets contain exactly one
/// distinct host — those get the single-domain cadence floor.
fn single_domain_datasets(sources: &[Source]) -> HashMap<&str, bool> {
    let mut hosts_by_dataset: HashMap<&str, std::collections::HashSet<&str>> = HashMap::new();
    for s in sources {
        hosts_by_dataset
            .entry(s.dataset.as_str())
            .or_default()
            .insert(s.host.as_str());
    }
    hosts_by_dataset
        .into_iter()
        .map(|(dataset, hosts)| (dataset, hosts.len() == 1))
        .collect()
}

/// Decide which sources are due for discovery right now, per spec §4.B.
///
/// Ordered by `next_due` ascending, tie-broken by lower `attempt_count`
/// first. With `force_all` set, every source is returned regardless of
/// `next_due` (manual re-crawl), still sorted the same way.
pub fn due_sources(sources: &[Source], now: DateTime<Utc>, config: &Config, force_all: bool) -> Vec<DueSource> {
    let single_domain = single_domain_datasets(sources);

    let mut due: Vec<DueSource> = sources
        .iter()
        .map(|source| {
            let is_single = single_domain.get(source.dataset.as_str()).copied().unwrap_or(false);
            let hours = cadence_hours(source, is_single, config);
            let next_due = source
                .meta
                .last_discovered_at
                .unwrap_or(source.created_at)
                + ChronoDuration::hours(hours as i64);
            DueSource {
                source: source.clone(),
                next_due,
                skip_rss: should_skip_rss(source, now, config),
            }
        })
        .filter(|d| force_all || d.next_due <= now)
        .collect();

    due.sort_by(|a, b| {
        a.next_due
            .cmp(&b.next_due)
            .then_with(|| a.source.attempt_count.cmp(&b.source.attempt_count))
    });

    if !due.is_empty() {
        tracing::debug!(count = due.len(), force_all, "scheduler selected sources for discovery");
    }

    due
}
