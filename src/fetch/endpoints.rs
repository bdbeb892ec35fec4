use crate::core::config::EndpointConfig;
use crate::prelude::Duration;
use tokio::time::Instant;

/// Health bookkeeping for one upstream endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointState {
    pub url: String,
    pub consecutive_errors: u32,
    pub total_errors: u64,
    pub total_successes: u64,
    pub last_success: Option<Instant>,
    pub disabled_until: Option<Instant>,
}

impl EndpointState {
    fn new(url: String) -> Self {
        Self {
            url,
            consecutive_errors: 0,
            total_errors: 0,
            total_successes: 0,
            last_success: None,
            disabled_until: None,
        }
    }

    pub fn is_disabled(&self, now: Instant) -> bool {
        self.disabled_until.map_or(false, |until| until > now)
    }
}

/// The endpoint chosen for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointHandle {
    pub index: usize,
    pub url: String,
}

/// Ordered set of equivalent endpoints with failure-driven rotation
#[derive(Debug)]
pub struct EndpointRegistry {
    endpoints: Vec<EndpointState>,
    error_threshold: u32,
    cooldown: Duration,
    active: usize,
}

impl EndpointRegistry {
    pub fn new(urls: Vec<String>, error_threshold: u32, cooldown: Duration) -> Self {
        Self {
            endpoints: urls.into_iter().map(EndpointState::new).collect(),
            error_threshold: error_threshold.max(1),
            cooldown,
            active: 0,
        }
    }

    pub fn from_config(config: &EndpointConfig) -> Self {
        Self::new(config.urls.clone(), config.error_threshold, config.cooldown())
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Picks the endpoint for the next request.
    ///
    /// Preference: enabled endpoints that have succeeded (most recent first),
    /// then the enabled endpoint with the fewest errors. When every endpoint
    /// is disabled the least-bad one is reactivated. `None` only when the
    /// registry is empty.
    pub fn select(&mut self, now: Instant) -> Option<EndpointHandle> {
        self.reenable_expired(now);

        let proven = self
            .endpoints
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_disabled(now))
            .filter_map(|(i, e)| e.last_success.map(|at| (i, at)))
            // Later success wins; equal timestamps keep list order
            .min_by(|(ia, a), (ib, b)| b.cmp(a).then(ia.cmp(ib)))
            .map(|(i, _)| i);

        let chosen = proven
            .or_else(|| {
                self.endpoints
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| !e.is_disabled(now))
                    .min_by_key(|(i, e)| (e.consecutive_errors, *i))
                    .map(|(i, _)| i)
            })
            .or_else(|| self.force_reactivate(now))?;

        if chosen != self.active {
            log::info!(
                "switching endpoint {} -> {}",
                self.endpoints[self.active].url,
                self.endpoints[chosen].url
            );
        }
        self.active = chosen;
        Some(EndpointHandle {
            index: chosen,
            url: self.endpoints[chosen].url.clone(),
        })
    }

    pub fn record_success(&mut self, url: &str, now: Instant) {
        if let Some(endpoint) = self.find_mut(url) {
            endpoint.consecutive_errors = 0;
            endpoint.total_successes += 1;
            endpoint.last_success = Some(now);
            endpoint.disabled_until = None;
        }
    }

    /// Counts a failure; disables the endpoint once it reaches the threshold
    pub fn record_failure(&mut self, url: &str, now: Instant) {
        let threshold = self.error_threshold;
        let cooldown = self.cooldown;
        if let Some(endpoint) = self.find_mut(url) {
            endpoint.consecutive_errors += 1;
            endpoint.total_errors += 1;
            if endpoint.consecutive_errors >= threshold && !endpoint.is_disabled(now) {
                endpoint.disabled_until = Some(now + cooldown);
                log::warn!(
                    "endpoint {} disabled for {:?} after {} errors",
                    endpoint.url,
                    cooldown,
                    endpoint.consecutive_errors
                );
            }
        }
    }

    /// Takes `url` out of rotation for a cooldown and selects a replacement
    pub fn rotate_from(&mut self, url: &str, now: Instant) -> Option<EndpointHandle> {
        let cooldown = self.cooldown;
        if let Some(endpoint) = self.find_mut(url) {
            if !endpoint.is_disabled(now) {
                endpoint.disabled_until = Some(now + cooldown);
                log::warn!("rotating away from endpoint {}", endpoint.url);
            }
        }
        self.select(now)
    }

    pub fn active_url(&self) -> Option<&str> {
        self.endpoints.get(self.active).map(|e| e.url.as_str())
    }

    /// Health snapshot for diagnostics
    pub fn states(&self) -> Vec<EndpointState> {
        self.endpoints.clone()
    }

    fn find_mut(&mut self, url: &str) -> Option<&mut EndpointState> {
        let found = self.endpoints.iter_mut().find(|e| e.url == url);
        if found.is_none() {
            log::debug!("ignoring report for unknown endpoint {url}");
        }
        found
    }

    fn reenable_expired(&mut self, now: Instant) {
        for endpoint in &mut self.endpoints {
            if matches!(endpoint.disabled_until, Some(until) if until <= now) {
                endpoint.disabled_until = None;
                endpoint.consecutive_errors = 0;
                log::info!("endpoint {} re-enabled", endpoint.url);
            }
        }
    }

    fn force_reactivate(&mut self, now: Instant) -> Option<usize> {
        let index = self
            .endpoints
            .iter()
            .enumerate()
            .min_by_key(|(i, e)| (e.consecutive_errors, e.disabled_until, *i))
            .map(|(i, _)| i)?;
        let endpoint = &mut self.endpoints[index];
        endpoint.disabled_until = None;
        log::warn!(
            "all endpoints disabled at {:?}; force-reactivating {}",
            now,
            endpoint.url
        );
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> EndpointRegistry {
        EndpointRegistry::new(
            vec!["a".into(), "b".into(), "c".into()],
            3,
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_defaults_to_first_endpoint() {
        let mut registry = registry();
        let now = Instant::now();
        assert_eq!(registry.select(now).unwrap().url, "a");
        assert_eq!(registry.active_url(), Some("a"));
    }

    #[test]
    fn test_prefers_most_recent_success() {
        let mut registry = registry();
        let now = Instant::now();
        registry.record_success("a", now);
        registry.record_success("c", now + Duration::from_secs(1));
        assert_eq!(registry.select(now).unwrap().url, "c");
    }

    #[test]
    fn test_threshold_disables_until_cooldown() {
        let mut registry = registry();
        let now = Instant::now();
        for _ in 0..3 {
            registry.record_failure("a", now);
        }
        assert!(registry.states()[0].is_disabled(now));
        assert_eq!(registry.select(now).unwrap().url, "b");

        let later = now + Duration::from_secs(61);
        assert_eq!(registry.select(later).unwrap().url, "a");
        assert_eq!(registry.states()[0].consecutive_errors, 0);
    }

    #[test]
    fn test_fewest_errors_wins_without_successes() {
        let mut registry = registry();
        let now = Instant::now();
        registry.record_failure("a", now);
        registry.record_failure("a", now);
        registry.record_failure("b", now);
        assert_eq!(registry.select(now).unwrap().url, "c");
    }

    #[test]
    fn test_all_disabled_still_selects() {
        let mut registry = registry();
        let now = Instant::now();
        for url in ["a", "b", "c"] {
            for _ in 0..3 {
                registry.record_failure(url, now);
            }
        }
        registry.record_failure("a", now);
        let chosen = registry.select(now).unwrap();
        assert_ne!(chosen.url, "a");
        assert!(!registry.states()[chosen.index].is_disabled(now));
    }

    #[test]
    fn test_rotate_from_moves_on() {
        let mut registry = registry();
        let now = Instant::now();
        registry.record_success("a", now);
        let next = registry.rotate_from("a", now).unwrap();
        assert_eq!(next.url, "b");
        assert!(EndpointRegistry::new(Vec::new(), 3, Duration::ZERO)
            .select(now)
            .is_none());
    }
}
