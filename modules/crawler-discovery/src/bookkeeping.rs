//! Builds the `SourceMetaPatch` that records an RSS attempt's outcome
//! against a source, per spec §4.C's failure bookkeeping rules.

use chrono::{DateTime, Utc};

use crawler_common::{Config, DiscoveryMethod, DiscoveryOutcome, Source, TransientFailure};
use crawler_store::SourceMetaPatch;

/// HTTP status code, if the outcome carried one, for transient-failure bookkeeping.
pub fn rss_attempt_patch(
    source: &Source,
    outcome: DiscoveryOutcome,
    status_code: Option<u16>,
    now: DateTime<Utc>,
    config: &Config,
) -> SourceMetaPatch {
    if outcome == DiscoveryOutcome::Success {
        return SourceMetaPatch {
            reset_rss_failure_state: true,
            last_successful_method: Some(DiscoveryMethod::RssFeed),
            last_discovered_at: Some(now),
            attempt_count_increment: true,
            ..Default::default()
        };
    }

    if outcome.is_non_network_failure() {
        let consecutive = source.meta.rss_consecutive_failures + 1;
        let rss_missing = if consecutive >= config.rss_missing_threshold {
            Some(Some(now))
        } else {
            None
        };
        return SourceMetaPatch {
            rss_consecutive_failures: Some(consecutive),
            rss_missing,
            last_discovered_at: Some(now),
            attempt_count_increment: true,
            ..Default::default()
        };
    }

    if outcome.is_transient_failure() {
        let window_start = now - chrono::Duration::days(config.rss_transient_window_days);
        let mut in_window: Vec<TransientFailure> = source
            .meta
            .rss_transient_failures
            .iter()
            .filter(|f| f.timestamp >= window_start)
            .copied()
            .collect();
        in_window.push(TransientFailure {
            timestamp: now,
            code: status_code.unwrap_or(0),
        });

        let rss_missing = if in_window.len() as u32 >= config.rss_transient_threshold {
            Some(Some(now))
        } else {
            None
        };

        return SourceMetaPatch {
            rss_transient_failures_set: Some(in_window),
            rss_missing,
            last_discovered_at: Some(now),
            attempt_count_increment: true,
            ..Default::default()
        };
    }

    if outcome.is_network_failure() {
        return SourceMetaPatch {
            rss_last_failed: Some(now),
            last_discovered_at: Some(now),
            attempt_count_increment: true,
            ..Default::default()
        };
    }

    // Skipped, or any other non-terminal outcome: still record the attempt time.
    SourceMetaPatch {
        last_discovered_at: Some(now),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawler_common::SourceMeta;
    use uuid::Uuid;

    fn source(meta: SourceMeta) -> Source {
        Source {
            id: Uuid::new_v4(),
            host: "example.com".to_string(),
            display_name: "Example".to_string(),
            dataset: "ds".to_string(),
            meta,
            attempt_count: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn success_resets_all_failure_state() {
        let config = Config::default();
        let now = Utc::now();
        let s = source(SourceMeta {
            rss_consecutive_failures: 2,
            ..SourceMeta::default()
        });
        let patch = rss_attempt_patch(&s, DiscoveryOutcome::Success, None, now, &config);
        assert!(patch.reset_rss_failure_state);
        assert_eq!(patch.last_successful_method, Some(DiscoveryMethod::RssFeed));
    }

    #[test]
    fn non_network_failure_crosses_consecutive_threshold() {
        let config = Config::default();
        let now = Utc::now();
        let s = source(SourceMeta {
            rss_consecutive_failures: config.rss_missing_threshold - 1,
            ..SourceMeta::default()
        });
        let patch = rss_attempt_patch(&s, DiscoveryOutcome::NoFeed, None, now, &config);
        assert_eq!(patch.rss_consecutive_failures, Some(config.rss_missing_threshold));
        assert_eq!(patch.rss_missing, Some(Some(now)));
    }

    #[test]
    fn non_network_failure_below_threshold_does_not_set_missing() {
        let config = Config::default();
        let now = Utc::now();
        let s = source(SourceMeta::default());
        let patch = rss_attempt_patch(&s, DiscoveryOutcome::ParseError, None, now, &config);
        assert_eq!(patch.rss_consecutive_failures, Some(1));
        assert_eq!(patch.rss_missing, None);
    }

    #[test]
    fn transient_failure_drops_entries_outside_window_before_counting() {
        let config = Config::default();
        let now = Utc::now();
        let stale = TransientFailure {
            timestamp: now - chrono::Duration::days(config.rss_transient_window_days + 1),
            code: 429,
        };
        let fresh_count = config.rss_transient_threshold - 2;
        let mut failures = vec![stale];
        for _ in 0..fresh_count {
            failures.push(TransientFailure {
                timestamp: now - chrono::Duration::hours(1),
                code: 429,
            });
        }
        let s = source(SourceMeta {
            rss_transient_failures: failures,
            ..SourceMeta::default()
        });
        let patch = rss_attempt_patch(&s, DiscoveryOutcome::Blocked, Some(429), now, &config);
        // fresh_count existing + 1 new = threshold - 1, still below threshold.
        assert_eq!(patch.rss_missing, None);
    }

    #[test]
    fn transient_failure_crossing_threshold_sets_missing() {
        let config = Config::default();
        let now = Utc::now();
        let mut failures = Vec::new();
        for _ in 0..(config.rss_transient_threshold - 1) {
            failures.push(TransientFailure {
                timestamp: now - chrono::Duration::hours(1),
                code: 503,
            });
        }
        let s = source(SourceMeta {
            rss_transient_failures: failures,
            ..SourceMeta::default()
        });
        let patch = rss_attempt_patch(&s, DiscoveryOutcome::ServerError, Some(503), now, &config);
        assert_eq!(patch.rss_missing, Some(Some(now)));
    }

    #[test]
    fn pure_network_failure_only_sets_last_failed() {
        let config = Config::default();
        let now = Utc::now();
        let s = source(SourceMeta::default());
        let patch = rss_attempt_patch(&s, DiscoveryOutcome::ConnectionError, None, now, &config);
        assert_eq!(patch.rss_last_failed, Some(now));
        assert_eq!(patch.rss_consecutive_failures, None);
        assert!(patch.rss_transient_failures_set.is_none());
    }
}
