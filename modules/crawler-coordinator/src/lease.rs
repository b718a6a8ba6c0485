//! In-memory lease table backing the work queue coordinator, spec §4.E.
//!
//! Pure, synchronous, and Store-agnostic so the assignment and pacing rules
//! can be unit-tested without a runtime or a database.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct DomainState {
    pub last_request_at: Option<DateTime<Utc>>,
    pub failure_count: u32,
    pub paused_until: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct WorkerState {
    pub domains: Vec<String>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStats {
    pub total_available: u32,
    pub total_paused: u32,
    pub domains_available: usize,
    pub domains_paused: usize,
    pub worker_assignments: BTreeMap<String, Vec<String>>,
    pub domain_cooldowns: BTreeMap<String, u64>,
}

#[derive(Debug, Default)]
pub struct LeaseTable {
    workers: HashMap<String, WorkerState>,
    domains: HashMap<String, DomainState>,
}

impl LeaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop workers that haven't called `request_work` within `timeout`;
    /// their domains return to the free pool implicitly (nobody's `domains`
    /// list references them anymore).
    pub fn reclaim_timed_out_workers(&mut self, now: DateTime<Utc>, timeout: StdDuration) {
        let timeout = ChronoDuration::from_std(timeout).unwrap_or_else(|_| ChronoDuration::zero());
        self.workers.retain(|_, w| now - w.last_seen < timeout);
    }

    fn is_leased(&self, domain: &str) -> bool {
        self.workers.values().any(|w| w.domains.iter().any(|d| d == domain))
    }

    fn is_paused(&self, domain: &str, now: DateTime<Utc>) -> bool {
        self.domains
            .get(domain)
            .and_then(|d| d.paused_until)
            .map(|p| p > now)
            .unwrap_or(false)
    }

    fn is_available(&self, domain: &str, now: DateTime<Utc>) -> bool {
        !self.is_leased(domain) && !self.is_paused(domain, now)
    }

    /// Return the worker's current leased domains, topping up (or
    /// assigning a fresh batch) from `candidate_domains` in lexicographic
    /// order. A lease below `min_domains` is never finalized until enough
    /// domains are free to reach the floor in one step; once a worker is
    /// at or above the floor, it only grows toward `max_domains` if no
    /// other known worker currently holds fewer domains than it (the
    /// fewest-domains worker gets priority over topping off one already
    /// served).
    pub fn ensure_lease(
        &mut self,
        worker_id: &str,
        now: DateTime<Utc>,
        candidate_domains: &BTreeSet<String>,
        min_domains: usize,
        max_domains: usize,
    ) -> Vec<String> {
        self.workers
            .entry(worker_id.to_string())
            .or_insert_with(|| WorkerState { domains: Vec::new(), last_seen: now });
        self.workers.get_mut(worker_id).unwrap().last_seen = now;

        let current = self.workers[worker_id].domains.len();
        if current >= max_domains {
            return self.workers[worker_id].domains.clone();
        }
        if current >= min_domains && !self.worker_has_fewest_domains(worker_id) {
            return self.workers[worker_id].domains.clone();
        }

        let available: Vec<String> = candidate_domains
            .iter()
            .filter(|d| self.is_available(d, now))
            .cloned()
            .collect();

        let below_floor = current < min_domains;
        let wanted = if below_floor { min_domains - current } else { max_domains - current };
        let take = available.len().min(wanted);

        if below_floor && current + take < min_domains {
            // Not enough free domains to reach the floor in one step; leave
            // the lease as-is (possibly still empty) until more free up.
            return self.workers[worker_id].domains.clone();
        }

        let newly_assigned: Vec<String> = available.into_iter().take(take).collect();
        let worker = self.workers.get_mut(worker_id).unwrap();
        worker.domains.extend(newly_assigned);
        worker.domains.clone()
    }

    /// Whether no other known worker currently holds fewer domains than
    /// `worker_id` (ties count as fewest too).
    fn worker_has_fewest_domains(&self, worker_id: &str) -> bool {
        let mine = self.workers.get(worker_id).map(|w| w.domains.len()).unwrap_or(0);
        self.workers.values().all(|w| w.domains.len() >= mine)
    }

    /// Whether `domain` can be served right now: not paused, not mid
    /// failure-cooldown, and past the standard per-request pacing gap.
    pub fn domain_ready(&self, domain: &str, now: DateTime<Utc>, cooldown: StdDuration) -> bool {
        let Some(state) = self.domains.get(domain) else {
            return true;
        };
        if let Some(p) = state.paused_until {
            if p > now {
                return false;
            }
        }
        if let Some(c) = state.cooldown_until {
            if c > now {
                return false;
            }
        }
        if let Some(t) = state.last_request_at {
            let cooldown = ChronoDuration::from_std(cooldown).unwrap_or_else(|_| ChronoDuration::zero());
            if now - t < cooldown {
                return false;
            }
        }
        true
    }

    pub fn record_request(&mut self, domain: &str, now: DateTime<Utc>) {
        self.domains.entry(domain.to_string()).or_default().last_request_at = Some(now);
    }

    /// Cooldown escalation schedule: 1st failure 60s, 2nd 120s, 3rd pauses
    /// the domain for `domain_pause` and resets the counter (spec §4.E).
    pub fn report_failure(&mut self, domain: &str, now: DateTime<Utc>, domain_pause: StdDuration) {
        let state = self.domains.entry(domain.to_string()).or_default();
        state.failure_count += 1;
        match state.failure_count {
            1 => state.cooldown_until = Some(now + ChronoDuration::seconds(60)),
            2 => state.cooldown_until = Some(now + ChronoDuration::seconds(120)),
            _ => {
                let pause = ChronoDuration::from_std(domain_pause).unwrap_or_else(|_| ChronoDuration::seconds(1800));
                state.paused_until = Some(now + pause);
                state.cooldown_until = None;
                state.failure_count = 0;
            }
        }
    }

    pub fn touch_worker(&mut self, worker_id: &str, now: DateTime<Utc>) {
        if let Some(w) = self.workers.get_mut(worker_id) {
            w.last_seen = now;
        }
    }

    pub fn stats(&self, now: DateTime<Utc>, pool_domains: &[String]) -> CoordinatorStats {
        let mut total_available = 0u32;
        let mut total_paused = 0u32;
        for domain in pool_domains {
            if self.is_paused(domain, now) {
                total_paused += 1;
            } else {
                total_available += 1;
            }
        }

        let distinct: BTreeSet<&String> = pool_domains.iter().collect();
        let domains_paused = distinct.iter().filter(|d| self.is_paused(d, now)).count();
        let domains_available = distinct.len() - domains_paused;

        let worker_assignments = self
            .workers
            .iter()
            .map(|(k, v)| (k.clone(), v.domains.clone()))
            .collect();

        let domain_cooldowns = self
            .domains
            .iter()
            .filter_map(|(domain, state)| {
                let until = match (state.paused_until, state.cooldown_until) {
                    (Some(p), _) if p > now => Some(p),
                    (_, Some(c)) if c > now => Some(c),
                    _ => None,
                }?;
                Some((domain.clone(), (until - now).num_seconds().max(0) as u64))
            })
            .collect();

        CoordinatorStats {
            total_available,
            total_paused,
            domains_available,
            domains_paused,
            worker_assignments,
            domain_cooldowns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn assigns_up_to_max_domains_lexicographically() {
        let mut table = LeaseTable::new();
        let now = Utc::now();
        let pool = domains(&["z.com", "a.com", "m.com", "b.com"]);
        let assigned = table.ensure_lease("w1", now, &pool, 0, 3);
        assert_eq!(assigned, vec!["a.com", "b.com", "m.com"]);
    }

    #[test]
    fn repeat_request_reuses_existing_lease() {
        let mut table = LeaseTable::new();
        let now = Utc::now();
        let pool = domains(&["a.com", "b.com"]);
        let first = table.ensure_lease("w1", now, &pool, 0, 2);
        let second = table.ensure_lease("w1", now, &pool, 0, 2);
        assert_eq!(first, second);
    }

    #[test]
    fn leased_domains_are_not_handed_to_another_worker() {
        let mut table = LeaseTable::new();
        let now = Utc::now();
        let pool = domains(&["a.com"]);
        let w1 = table.ensure_lease("w1", now, &pool, 0, 1);
        assert_eq!(w1, vec!["a.com"]);
        let w2 = table.ensure_lease("w2", now, &pool, 0, 1);
        assert!(w2.is_empty());
    }

    #[test]
    fn timed_out_worker_releases_its_domains() {
        let mut table = LeaseTable::new();
        let now = Utc::now();
        let pool = domains(&["a.com"]);
        table.ensure_lease("w1", now, &pool, 0, 1);

        let later = now + ChronoDuration::seconds(601);
        table.reclaim_timed_out_workers(later, StdDuration::from_secs(600));

        let w2 = table.ensure_lease("w2", later, &pool, 0, 1);
        assert_eq!(w2, vec!["a.com"]);
    }

    #[test]
    fn floor_is_not_finalized_until_enough_domains_free_up() {
        let mut table = LeaseTable::new();
        let now = Utc::now();
        let pool = domains(&["a.com", "b.com"]);
        // Only 2 domains available but the floor is 3: the lease must stay
        // empty rather than finalize a partial 2-domain assignment.
        let assigned = table.ensure_lease("w1", now, &pool, 3, 5);
        assert!(assigned.is_empty());
    }

    #[test]
    fn floor_is_finalized_as_soon_as_enough_domains_are_available() {
        let mut table = LeaseTable::new();
        let now = Utc::now();
        let pool = domains(&["a.com", "b.com", "c.com"]);
        let assigned = table.ensure_lease("w1", now, &pool, 3, 5);
        assert_eq!(assigned.len(), 3);
    }

    #[test]
    fn three_workers_ten_domains_each_get_the_floor() {
        let mut table = LeaseTable::new();
        let now = Utc::now();
        let pool: BTreeSet<String> = (1..=10).map(|i| format!("d{i}.com")).collect();

        let w1 = table.ensure_lease("w1", now, &pool, 3, 5);
        let w2 = table.ensure_lease("w2", now, &pool, 3, 5);
        let w3 = table.ensure_lease("w3", now, &pool, 3, 5);

        assert!((3..=5).contains(&w1.len()));
        assert!((3..=5).contains(&w2.len()));
        assert!((3..=5).contains(&w3.len()));

        let mut all: Vec<&String> = w1.iter().chain(w2.iter()).chain(w3.iter()).collect();
        let distinct: std::collections::HashSet<&String> = all.iter().copied().collect();
        all.sort();
        assert_eq!(all.len(), distinct.len(), "assignments must be pairwise disjoint");
        assert!((9..=10).contains(&distinct.len()));
    }

    #[test]
    fn worker_with_fewest_domains_gets_priority_on_top_up() {
        let mut table = LeaseTable::new();
        let now = Utc::now();

        // w1 claims 2 domains out of a 2-domain pool (floor disabled via 0
        // so the ceiling-only path is exercised directly).
        let small_pool = domains(&["a.com", "b.com"]);
        let w1 = table.ensure_lease("w1", now, &small_pool, 0, 5);
        assert_eq!(w1.len(), 2);

        // Three more domains free up. w2 (0 domains, fewest) claims them.
        let full_pool = domains(&["a.com", "b.com", "c.com", "d.com", "e.com"]);
        let w2 = table.ensure_lease("w2", now, &full_pool, 0, 5);
        assert_eq!(w2.len(), 3);

        // Now w1 (2 domains) is still behind w2 (3 domains) but no domains
        // remain free, so neither grows further this round.
        let w1_again = table.ensure_lease("w1", now, &full_pool, 0, 5);
        assert_eq!(w1_again.len(), 2);
    }

    #[test]
    fn third_failure_pauses_and_resets_counter() {
        let mut table = LeaseTable::new();
        let now = Utc::now();
        table.report_failure("a.com", now, StdDuration::from_secs(1800));
        table.report_failure("a.com", now, StdDuration::from_secs(1800));
        table.report_failure("a.com", now, StdDuration::from_secs(1800));

        assert!(!table.domain_ready("a.com", now, StdDuration::from_secs(60)));
        let past_pause = now + ChronoDuration::seconds(1801);
        assert!(table.domain_ready("a.com", past_pause, StdDuration::from_secs(60)));
    }

    #[test]
    fn first_failure_only_cools_down_for_sixty_seconds() {
        let mut table = LeaseTable::new();
        let now = Utc::now();
        table.report_failure("a.com", now, StdDuration::from_secs(1800));
        assert!(!table.domain_ready("a.com", now, StdDuration::from_secs(60)));
        assert!(table.domain_ready("a.com", now + ChronoDuration::seconds(61), StdDuration::from_secs(60)));
    }

    #[test]
    fn cooldown_blocks_back_to_back_requests() {
        let mut table = LeaseTable::new();
        let now = Utc::now();
        table.record_request("a.com", now);
        assert!(!table.domain_ready("a.com", now + ChronoDuration::seconds(10), StdDuration::from_secs(60)));
        assert!(table.domain_ready("a.com", now + ChronoDuration::seconds(61), StdDuration::from_secs(60)));
    }

    #[test]
    fn paused_domain_is_unavailable_for_leasing() {
        let mut table = LeaseTable::new();
        let now = Utc::now();
        table.report_failure("a.com", now, StdDuration::from_secs(1800));
        table.report_failure("a.com", now, StdDuration::from_secs(1800));
        table.report_failure("a.com", now, StdDuration::from_secs(1800));

        let pool = domains(&["a.com"]);
        let assigned = table.ensure_lease("w1", now, &pool, 0, 1);
        assert!(assigned.is_empty());
    }
}
