//! Core proxy pool implementation.
//!
//! The pool owns an ordered list of proxies and the round-robin cursor behind a single
//! lock. Selection only hands out active proxies; when none remain, proxies that have sat
//! idle for longer than the reactivation cooldown are brought back before giving up.

use crate::config::{ProxyPoolConfig, ProxySelectionStrategy};
use crate::error::NoProxyAvailable;
use crate::proxy::{Proxy, ProxyStatus};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of adding a proxy to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new record was appended.
    Added,
    /// A record with the same `(host, port)` existed and was refreshed.
    Updated,
}

/// Summary counts of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolStats {
    /// Number of records in the pool.
    pub total: usize,
    /// Records eligible for selection.
    pub active: usize,
    /// Records that reached the failure threshold.
    pub inactive: usize,
}

struct PoolState {
    proxies: Vec<Proxy>,
    /// Index of the next round-robin candidate.
    cursor: usize,
}

impl PoolState {
    fn active_count(&self) -> usize {
        self.proxies.iter().filter(|p| p.is_active()).count()
    }

    fn nth_active(&self, nth: usize) -> Option<usize> {
        self.proxies
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_active())
            .nth(nth)
            .map(|(index, _)| index)
    }

    /// Find the first active proxy at or after the cursor and move the cursor past it.
    fn advance_cursor(&mut self) -> Option<usize> {
        let len = self.proxies.len();
        if len == 0 {
            return None;
        }
        let start = self.cursor % len;
        let index = (0..len)
            .map(|offset| (start + offset) % len)
            .find(|&i| self.proxies[i].is_active())?;
        self.cursor = (index + 1) % len;
        Some(index)
    }

    /// Reactivate inactive proxies that were never used or have been idle past `cooldown`.
    fn reactivate_idle(&mut self, now: DateTime<Utc>, cooldown: Duration) -> usize {
        let mut reactivated = 0;
        for proxy in self.proxies.iter_mut().filter(|p| !p.is_active()) {
            let idle = match proxy.last_used {
                None => true,
                // A timestamp in the future yields an error here and counts as recent.
                Some(last_used) => (now - last_used)
                    .to_std()
                    .map(|elapsed| elapsed > cooldown)
                    .unwrap_or(false),
            };
            if idle {
                proxy.status = ProxyStatus::Active;
                proxy.failure_count = 0;
                reactivated += 1;
            }
        }
        reactivated
    }
}

/// A pool of proxies with health-aware selection.
pub struct ProxyPool {
    state: RwLock<PoolState>,
    config: ProxyPoolConfig,
}

impl ProxyPool {
    /// Create an empty proxy pool with the given configuration.
    pub fn new(config: ProxyPoolConfig) -> Self {
        Self {
            state: RwLock::new(PoolState {
                proxies: Vec::new(),
                cursor: 0,
            }),
            config,
        }
    }

    /// Configuration the pool was built with.
    pub fn config(&self) -> &ProxyPoolConfig {
        &self.config
    }

    /// Add a proxy, or refresh the existing record with the same `(host, port)`.
    ///
    /// A refreshed record takes the new credentials and becomes active with its failure
    /// count cleared; its `last_used` is kept. When `upsert_on_add` is disabled the proxy is
    /// always appended. The caller is responsible for validating host and port.
    pub fn add_proxy(&self, proxy: Proxy) -> AddOutcome {
        let mut state = self.state.write();

        if self.config.upsert_on_add {
            if let Some(existing) = state
                .proxies
                .iter_mut()
                .find(|p| p.matches(&proxy.host, proxy.port))
            {
                existing.username = proxy.username;
                existing.password = proxy.password;
                existing.status = ProxyStatus::Active;
                existing.failure_count = 0;
                info!("Proxy {} already exists, updated", existing.address());
                return AddOutcome::Updated;
            }
        }

        let address = proxy.address();
        state.proxies.push(Proxy {
            status: ProxyStatus::Active,
            last_used: None,
            failure_count: 0,
            ..proxy
        });
        info!("Added proxy {} (Total: {})", address, state.proxies.len());
        AddOutcome::Added
    }

    /// Add every proxy from `proxies`, returning how many new records were appended.
    pub fn extend(&self, proxies: impl IntoIterator<Item = Proxy>) -> usize {
        proxies
            .into_iter()
            .map(|proxy| self.add_proxy(proxy))
            .filter(|outcome| *outcome == AddOutcome::Added)
            .count()
    }

    /// Remove the proxy with the given key. Returns whether anything was removed.
    pub fn remove_proxy(&self, host: &str, port: u16) -> bool {
        let mut state = self.state.write();
        let PoolState { proxies, cursor } = &mut *state;

        let before = proxies.len();
        let mut index = 0;
        proxies.retain(|p| {
            let keep = !p.matches(host, port);
            if !keep && index < *cursor {
                *cursor -= 1;
            }
            index += 1;
            keep
        });
        if proxies.is_empty() {
            *cursor = 0;
        }

        let removed = proxies.len() != before;
        if removed {
            info!("Removed proxy {}:{} (Remaining: {})", host, port, proxies.len());
        } else {
            debug!("Proxy {}:{} not in pool, nothing removed", host, port);
        }
        removed
    }

    /// Get a proxy from the pool according to the configured selection strategy.
    ///
    /// Only active proxies are candidates. If none are active, idle inactive proxies are
    /// reactivated first; the sweep and the selection happen under one lock. The selected
    /// proxy's `last_used` is stamped and a snapshot of it is returned.
    pub fn get_proxy(&self) -> Result<Proxy, NoProxyAvailable> {
        let mut state = self.state.write();

        if state.proxies.is_empty() {
            debug!("No proxies configured in pool");
            return Err(NoProxyAvailable);
        }

        let mut active = state.active_count();
        if active == 0 {
            warn!(
                "No active proxies available (Total: {}, all inactive)",
                state.proxies.len()
            );
            active = state.reactivate_idle(Utc::now(), self.config.reactivation_cooldown);
            if active == 0 {
                return Err(NoProxyAvailable);
            }
            info!(
                "Reactivated {} proxies idle for more than {}s",
                active,
                self.config.reactivation_cooldown.as_secs()
            );
        }

        let index = match self.config.selection_strategy {
            ProxySelectionStrategy::Random => {
                let nth = rand::rng().random_range(0..active);
                state.nth_active(nth)
            }
            ProxySelectionStrategy::RoundRobin => state.advance_cursor(),
        }
        .ok_or(NoProxyAvailable)?;

        let total = state.proxies.len();
        let proxy = &mut state.proxies[index];
        proxy.last_used = Some(Utc::now());
        debug!(
            "Selected proxy {} (Active: {}/{})",
            proxy.address(),
            active,
            total
        );
        Ok(proxy.clone())
    }

    /// Report a successful request through a proxy: clears failures and reactivates it.
    /// Returns whether the proxy is in the pool; unknown keys are ignored.
    pub fn report_proxy_success(&self, host: &str, port: u16) -> bool {
        let mut state = self.state.write();
        let mut found = false;
        for proxy in state.proxies.iter_mut().filter(|p| p.matches(host, port)) {
            if !proxy.is_active() {
                info!("Proxy {} reactivated after successful check", proxy.address());
            }
            proxy.failure_count = 0;
            proxy.status = ProxyStatus::Active;
            found = true;
        }
        found
    }

    /// Manually reset a proxy's failure count. Same transition as a success report.
    pub fn reset_failure_count(&self, host: &str, port: u16) -> bool {
        self.report_proxy_success(host, port)
    }

    /// Report a failed request through a proxy.
    /// Returns whether the proxy is in the pool; unknown keys are ignored.
    pub fn report_proxy_failure(&self, host: &str, port: u16) -> bool {
        let threshold = self.config.failure_threshold;
        let mut state = self.state.write();
        let mut found = false;
        for proxy in state.proxies.iter_mut().filter(|p| p.matches(host, port)) {
            found = true;
            proxy.failure_count = proxy.failure_count.saturating_add(1);
            debug!(
                "Proxy {} failed (count: {})",
                proxy.address(),
                proxy.failure_count
            );

            if proxy.failure_count >= threshold && proxy.is_active() {
                proxy.status = ProxyStatus::Inactive;
                warn!(
                    "Proxy {} marked inactive after {} failures",
                    proxy.address(),
                    proxy.failure_count
                );
            }
        }
        found
    }

    /// Snapshot of the proxy with the given key.
    pub fn get(&self, host: &str, port: u16) -> Option<Proxy> {
        self.state
            .read()
            .proxies
            .iter()
            .find(|p| p.matches(host, port))
            .cloned()
    }

    /// Snapshot of all proxies, in insertion order.
    pub fn list_proxies(&self) -> Vec<Proxy> {
        self.state.read().proxies.clone()
    }

    /// Get statistics about the proxy pool.
    pub fn get_stats(&self) -> PoolStats {
        let state = self.state.read();
        let total = state.proxies.len();
        let active = state.active_count();
        PoolStats {
            total,
            active,
            inactive: total - active,
        }
    }
}

impl Default for ProxyPool {
    fn default() -> Self {
        Self::new(ProxyPoolConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pool_with(config: ProxyPoolConfig, hosts: &[&str]) -> ProxyPool {
        let pool = ProxyPool::new(config);
        for host in hosts {
            pool.add_proxy(Proxy::new(*host, 8080));
        }
        pool
    }

    fn fail(pool: &ProxyPool, host: &str, times: u32) {
        for _ in 0..times {
            pool.report_proxy_failure(host, 8080);
        }
    }

    fn set_last_used(pool: &ProxyPool, host: &str, at: DateTime<Utc>) {
        let mut state = pool.state.write();
        for proxy in state.proxies.iter_mut().filter(|p| p.host == host) {
            proxy.last_used = Some(at);
        }
    }

    #[test]
    fn adding_same_key_twice_upserts() {
        let pool = ProxyPool::default();
        assert_eq!(
            pool.add_proxy(Proxy::new("a", 8080).with_credentials("u1", "p1")),
            AddOutcome::Added
        );
        fail(&pool, "a", 2);

        assert_eq!(
            pool.add_proxy(Proxy::new("a", 8080).with_credentials("u2", "p2")),
            AddOutcome::Updated
        );

        let proxies = pool.list_proxies();
        assert_eq!(proxies.len(), 1);
        assert_eq!(proxies[0].username.as_deref(), Some("u2"));
        assert_eq!(proxies[0].password.as_deref(), Some("p2"));
        assert_eq!(proxies[0].failure_count, 0);
        assert!(proxies[0].is_active());
    }

    #[test]
    fn re_adding_inactive_proxy_reactivates_it() {
        let pool = pool_with(ProxyPoolConfig::default(), &["a"]);
        fail(&pool, "a", 3);
        assert_eq!(pool.get_stats().inactive, 1);

        pool.add_proxy(Proxy::new("a", 8080));
        assert_eq!(pool.get_stats().active, 1);
    }

    #[test]
    fn append_mode_keeps_duplicates() {
        let config = ProxyPoolConfig::builder().upsert_on_add(false).build();
        let pool = pool_with(config, &["a", "a"]);
        assert_eq!(pool.get_stats().total, 2);

        assert!(pool.remove_proxy("a", 8080));
        assert_eq!(pool.get_stats().total, 0);
    }

    #[test]
    fn added_proxy_ignores_incoming_health_fields() {
        let pool = ProxyPool::default();
        let mut proxy = Proxy::new("a", 8080);
        proxy.status = ProxyStatus::Inactive;
        proxy.failure_count = 7;
        proxy.last_used = Some(Utc::now());
        pool.add_proxy(proxy);

        let listed = pool.get("a", 8080).unwrap();
        assert!(listed.is_active());
        assert_eq!(listed.failure_count, 0);
        assert!(listed.last_used.is_none());
    }

    #[test]
    fn failures_deactivate_at_threshold() {
        let pool = pool_with(ProxyPoolConfig::default(), &["a"]);
        fail(&pool, "a", 2);
        let proxy = pool.get("a", 8080).unwrap();
        assert!(proxy.is_active());
        assert_eq!(proxy.failure_count, 2);

        fail(&pool, "a", 1);
        let proxy = pool.get("a", 8080).unwrap();
        assert_eq!(proxy.status, ProxyStatus::Inactive);
        assert_eq!(proxy.failure_count, 3);
    }

    #[test]
    fn custom_threshold_is_honored() {
        let config = ProxyPoolConfig::builder().failure_threshold(5).build();
        let pool = pool_with(config, &["a"]);
        fail(&pool, "a", 4);
        assert!(pool.get("a", 8080).unwrap().is_active());
        fail(&pool, "a", 1);
        assert!(!pool.get("a", 8080).unwrap().is_active());
    }

    #[test]
    fn success_resets_from_any_state() {
        let pool = pool_with(ProxyPoolConfig::default(), &["a", "b"]);
        fail(&pool, "a", 5);
        fail(&pool, "b", 1);

        pool.report_proxy_success("a", 8080);
        pool.reset_failure_count("b", 8080);

        for proxy in pool.list_proxies() {
            assert!(proxy.is_active());
            assert_eq!(proxy.failure_count, 0);
        }
    }

    #[test]
    fn reports_for_unknown_keys_are_ignored() {
        let pool = pool_with(ProxyPoolConfig::default(), &["a"]);
        assert!(!pool.report_proxy_failure("missing", 8080));
        assert!(!pool.report_proxy_failure("a", 9090));
        assert!(!pool.report_proxy_success("missing", 8080));
        assert!(pool.report_proxy_success("a", 8080));
        assert_eq!(pool.get("a", 8080).unwrap().failure_count, 0);
        assert_eq!(pool.get_stats().total, 1);
    }

    #[test]
    fn selection_never_returns_inactive_while_active_exists() {
        let pool = pool_with(ProxyPoolConfig::default(), &["a", "b", "c"]);
        fail(&pool, "b", 3);

        for _ in 0..200 {
            let proxy = pool.get_proxy().unwrap();
            assert_ne!(proxy.host, "b");
            assert!(proxy.is_active());
        }
        assert!(pool.get("b", 8080).unwrap().last_used.is_none());
    }

    #[test]
    fn selection_stamps_last_used_without_touching_health() {
        let pool = pool_with(ProxyPoolConfig::default(), &["a"]);
        fail(&pool, "a", 1);

        let before = Utc::now();
        let selected = pool.get_proxy().unwrap();
        assert!(selected.last_used.unwrap() >= before);

        let stored = pool.get("a", 8080).unwrap();
        assert_eq!(stored.last_used, selected.last_used);
        assert_eq!(stored.failure_count, 1);
        assert!(stored.is_active());
    }

    #[test]
    fn empty_pool_has_no_proxy() {
        let pool = ProxyPool::default();
        assert_eq!(pool.get_proxy(), Err(NoProxyAvailable));
        assert_eq!(pool.get_stats(), PoolStats::default());
    }

    #[test]
    fn never_used_inactive_proxy_is_reactivated_on_exhaustion() {
        let pool = pool_with(ProxyPoolConfig::default(), &["a"]);
        fail(&pool, "a", 3);
        assert_eq!(pool.get_stats().active, 0);

        let proxy = pool.get_proxy().unwrap();
        assert_eq!(proxy.host, "a");
        assert!(proxy.is_active());
        assert_eq!(proxy.failure_count, 0);
        assert!(proxy.last_used.is_some());
    }

    #[test]
    fn recently_used_inactive_proxy_waits_for_cooldown() {
        let pool = pool_with(ProxyPoolConfig::default(), &["a", "b"]);
        pool.get_proxy().unwrap();
        pool.get_proxy().unwrap();
        set_last_used(&pool, "a", Utc::now());
        set_last_used(&pool, "b", Utc::now());
        fail(&pool, "a", 3);
        fail(&pool, "b", 3);

        assert_eq!(pool.get_proxy(), Err(NoProxyAvailable));
        assert_eq!(pool.get_stats().inactive, 2);

        set_last_used(&pool, "b", Utc::now() - chrono::Duration::minutes(10));
        let proxy = pool.get_proxy().unwrap();
        assert_eq!(proxy.host, "b");

        let stats = pool.get_stats();
        assert_eq!((stats.active, stats.inactive), (1, 1));
    }

    #[test]
    fn sweep_only_runs_when_pool_is_exhausted() {
        let pool = pool_with(ProxyPoolConfig::default(), &["a", "b"]);
        fail(&pool, "a", 3);

        pool.get_proxy().unwrap();
        assert!(!pool.get("a", 8080).unwrap().is_active());
    }

    #[test]
    fn round_robin_follows_insertion_order_and_skips_inactive() {
        let config = ProxyPoolConfig::builder()
            .selection_strategy(ProxySelectionStrategy::RoundRobin)
            .build();
        let pool = pool_with(config, &["a", "b", "c"]);

        let hosts: Vec<String> = (0..4).map(|_| pool.get_proxy().unwrap().host).collect();
        assert_eq!(hosts, ["a", "b", "c", "a"]);

        fail(&pool, "c", 3);
        let hosts: Vec<String> = (0..4).map(|_| pool.get_proxy().unwrap().host).collect();
        assert_eq!(hosts, ["b", "a", "b", "a"]);
    }

    #[test]
    fn removal_keeps_round_robin_position() {
        let config = ProxyPoolConfig::builder()
            .selection_strategy(ProxySelectionStrategy::RoundRobin)
            .build();
        let pool = pool_with(config, &["a", "b", "c"]);

        assert_eq!(pool.get_proxy().unwrap().host, "a");
        assert!(pool.remove_proxy("a", 8080));
        assert_eq!(pool.get_proxy().unwrap().host, "b");
        assert_eq!(pool.get_proxy().unwrap().host, "c");
        assert_eq!(pool.get_proxy().unwrap().host, "b");
    }

    #[test]
    fn remove_is_idempotent() {
        let pool = pool_with(ProxyPoolConfig::default(), &["a", "b"]);
        assert!(pool.remove_proxy("a", 8080));
        assert!(!pool.remove_proxy("a", 8080));
        assert!(!pool.remove_proxy("b", 9090));

        let hosts: Vec<String> = pool.list_proxies().into_iter().map(|p| p.host).collect();
        assert_eq!(hosts, ["b"]);
    }

    #[test]
    fn list_is_a_detached_snapshot() {
        let pool = pool_with(ProxyPoolConfig::default(), &["a"]);
        let mut snapshot = pool.list_proxies();
        snapshot[0].status = ProxyStatus::Inactive;
        snapshot[0].failure_count = 42;

        let stored = pool.get("a", 8080).unwrap();
        assert!(stored.is_active());
        assert_eq!(stored.failure_count, 0);
    }

    #[test]
    fn extend_counts_new_records() {
        let pool = pool_with(ProxyPoolConfig::default(), &["a"]);
        let added = pool.extend(vec![
            Proxy::new("a", 8080),
            Proxy::new("b", 8080),
            Proxy::new("c", 8080),
        ]);
        assert_eq!(added, 2);
        assert_eq!(pool.get_stats().total, 3);
    }

    #[test]
    fn concurrent_adds_and_selects_keep_keys_unique() {
        const WORKERS: u16 = 8;
        const PER_WORKER: u16 = 25;
        let pool = ProxyPool::default();

        std::thread::scope(|scope| {
            for worker in 0..WORKERS {
                let pool = &pool;
                scope.spawn(move || {
                    for i in 0..PER_WORKER {
                        pool.add_proxy(Proxy::new(format!("10.0.{worker}.{i}"), 1000 + i));
                    }
                    for _ in 0..PER_WORKER {
                        pool.get_proxy().unwrap();
                    }
                });
            }
        });

        let proxies = pool.list_proxies();
        let expected = usize::from(WORKERS * PER_WORKER);
        assert_eq!(proxies.len(), expected);
        let keys: HashSet<(String, u16)> =
            proxies.into_iter().map(|p| (p.host, p.port)).collect();
        assert_eq!(keys.len(), expected);
        assert_eq!(pool.get_stats().active, expected);
    }
}
