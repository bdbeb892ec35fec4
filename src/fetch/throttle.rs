//! Request gate in front of the network.
//!
//! ```text
//! Idle --request--> Ready --too soon--> Throttled
//! Ready --failure--> Backoff --window elapsed--> Ready
//! any --rate-limit signal--> RateLimited --cooldown elapsed--> Ready
//! Backoff --disable_after_errors failures--> Disabled --timeout--> Ready
//! ```
//!
//! Every network call must first obtain [`ThrottleDecision::Proceed`] from
//! [`ThrottleController::check`]. The controller holds no clock of its own:
//! callers pass `now`, which keeps the state machine deterministic under test.

use crate::core::config::ThrottleConfig;
use crate::prelude::Duration;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::time::Instant;

/// Message patterns the upstream uses to signal rate limiting
static RATE_LIMIT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)rate[_ -]?limit|too many requests|quota").expect("valid rate-limit regex")
});

/// Detects a rate-limit signal from an HTTP status and/or message text
pub fn is_rate_limit_signal(status: Option<u16>, message: &str) -> bool {
    status == Some(429) || RATE_LIMIT_PATTERN.is_match(message)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottlePhase {
    /// No request issued yet
    Idle,
    Ready,
    /// Inside the minimum inter-request interval
    Throttled,
    Backoff,
    RateLimited,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Backoff { remaining: Duration },
    RateLimited { remaining: Duration },
    Disabled { remaining: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    Proceed,
    /// Proceed after the given delay
    Wait(Duration),
    Skip(SkipReason),
}

/// What a failure did to the throttle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    pub backoff: Duration,
    pub consecutive_errors: u32,
    /// The caller should move to another endpoint
    pub rotate_endpoint: bool,
    pub disabled: bool,
}

/// Snapshot of the throttle's bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleState {
    pub last_request: Option<Instant>,
    /// Window opened by the last failure; relaxes toward the initial value
    /// after successes. The next failure's window depends only on the
    /// consecutive-error count.
    pub backoff: Duration,
    pub backoff_until: Option<Instant>,
    pub rate_limited_until: Option<Instant>,
    pub disabled_until: Option<Instant>,
    pub consecutive_errors: u32,
    pub consecutive_successes: u32,
}

#[derive(Debug)]
pub struct ThrottleController {
    config: ThrottleConfig,
    state: ThrottleState,
}

impl ThrottleController {
    pub fn new(config: ThrottleConfig) -> Self {
        let state = ThrottleState {
            last_request: None,
            backoff: config.initial_backoff(),
            backoff_until: None,
            rate_limited_until: None,
            disabled_until: None,
            consecutive_errors: 0,
            consecutive_successes: 0,
        };
        Self { config, state }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    pub fn state(&self) -> ThrottleState {
        self.state.clone()
    }

    /// Decides whether a request may be issued at `now`
    pub fn check(&self, now: Instant) -> ThrottleDecision {
        if let Some(remaining) = remaining(self.state.disabled_until, now) {
            return ThrottleDecision::Skip(SkipReason::Disabled { remaining });
        }
        if let Some(remaining) = remaining(self.state.rate_limited_until, now) {
            return ThrottleDecision::Skip(SkipReason::RateLimited { remaining });
        }
        if let Some(remaining) = remaining(self.state.backoff_until, now) {
            return ThrottleDecision::Skip(SkipReason::Backoff { remaining });
        }
        let next_allowed = self
            .state
            .last_request
            .map(|last| last + self.config.min_interval());
        match remaining(next_allowed, now) {
            Some(wait) => ThrottleDecision::Wait(wait),
            None => ThrottleDecision::Proceed,
        }
    }

    pub fn phase(&self, now: Instant) -> ThrottlePhase {
        match self.check(now) {
            ThrottleDecision::Skip(SkipReason::Disabled { .. }) => ThrottlePhase::Disabled,
            ThrottleDecision::Skip(SkipReason::RateLimited { .. }) => ThrottlePhase::RateLimited,
            ThrottleDecision::Skip(SkipReason::Backoff { .. }) => ThrottlePhase::Backoff,
            ThrottleDecision::Wait(_) => ThrottlePhase::Throttled,
            ThrottleDecision::Proceed if self.state.last_request.is_none() => ThrottlePhase::Idle,
            ThrottleDecision::Proceed => ThrottlePhase::Ready,
        }
    }

    /// Marks the start of a network call
    pub fn begin_request(&mut self, now: Instant) {
        self.state.last_request = Some(now);
    }

    pub fn record_success(&mut self, _now: Instant) {
        let state = &mut self.state;
        state.consecutive_errors = 0;
        state.backoff_until = None;
        state.disabled_until = None;
        state.consecutive_successes = state.consecutive_successes.saturating_add(1);

        let initial = self.config.initial_backoff();
        if state.consecutive_successes >= self.config.successes_before_relax.max(1)
            && state.backoff > initial
        {
            state.backoff = (state.backoff / 2).max(initial);
            state.consecutive_successes = 0;
            log::debug!("backoff relaxed to {:?}", state.backoff);
        }
    }

    /// `min(initial × 2^errors, max)`
    pub fn backoff_for(&self, errors: u32) -> Duration {
        self.config
            .initial_backoff()
            .saturating_mul(2_u32.saturating_pow(errors.min(31)))
            .min(self.config.max_backoff())
    }

    /// Records a transient failure and opens a backoff window sized by the
    /// consecutive-error count alone
    pub fn record_failure(&mut self, now: Instant) -> FailureOutcome {
        let errors = self.state.consecutive_errors.saturating_add(1);
        let backoff = self.backoff_for(errors);
        let state = &mut self.state;
        state.consecutive_errors = errors;
        state.consecutive_successes = 0;

        state.backoff = backoff;
        state.backoff_until = Some(now + state.backoff);

        let rotate_endpoint = state.consecutive_errors >= self.config.max_consecutive_errors;
        let disabled = state.consecutive_errors >= self.config.disable_after_errors;
        if disabled {
            state.disabled_until = Some(now + self.config.disabled_timeout());
            log::warn!(
                "{} consecutive fetch failures; fetching disabled for {:?}",
                state.consecutive_errors,
                self.config.disabled_timeout()
            );
        } else {
            log::debug!(
                "fetch failure #{}; backing off for {:?}",
                state.consecutive_errors,
                state.backoff
            );
        }

        FailureOutcome {
            backoff: state.backoff,
            consecutive_errors: state.consecutive_errors,
            rotate_endpoint,
            disabled,
        }
    }

    /// Enters the rate-limit cooldown; the error counter is left alone
    pub fn record_rate_limit(&mut self, now: Instant) {
        let until = now + self.config.rate_limit_cooldown();
        self.state.rate_limited_until = Some(until);
        log::warn!(
            "rate limit detected; suspending all fetches for {:?}",
            self.config.rate_limit_cooldown()
        );
    }

    /// Clears every window and counter
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

impl Default for ThrottleController {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}

fn remaining(until: Option<Instant>, now: Instant) -> Option<Duration> {
    until
        .filter(|until| *until > now)
        .map(|until| until.duration_since(now))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ThrottleConfig {
        ThrottleConfig {
            min_interval_ms: 1_000,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            max_consecutive_errors: 3,
            rate_limit_cooldown_secs: 120,
            successes_before_relax: 2,
            disable_after_errors: 10,
            disabled_timeout_secs: 300,
        }
    }

    #[test]
    fn test_min_interval_asks_caller_to_wait() {
        let now = Instant::now();
        let mut throttle = ThrottleController::new(config());
        assert_eq!(throttle.phase(now), ThrottlePhase::Idle);
        assert_eq!(throttle.check(now), ThrottleDecision::Proceed);

        throttle.begin_request(now);
        let later = now + Duration::from_millis(400);
        assert_eq!(
            throttle.check(later),
            ThrottleDecision::Wait(Duration::from_millis(600))
        );
        assert_eq!(throttle.phase(later), ThrottlePhase::Throttled);
        assert_eq!(
            throttle.phase(now + Duration::from_secs(1)),
            ThrottlePhase::Ready
        );
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let now = Instant::now();
        let mut throttle = ThrottleController::new(config());
        for k in 1..=8u32 {
            let outcome = throttle.record_failure(now);
            let expected = Duration::from_millis((1_000 * 2u64.pow(k)).min(30_000));
            assert_eq!(outcome.backoff, expected, "after {k} failures");
            assert_eq!(outcome.rotate_endpoint, k >= 3);
        }
        assert!(matches!(
            throttle.check(now + Duration::from_secs(1)),
            ThrottleDecision::Skip(SkipReason::Backoff { .. })
        ));
        assert_eq!(throttle.phase(now), ThrottlePhase::Backoff);
    }

    #[test]
    fn test_success_resets_errors_and_relaxes_gradually() {
        let now = Instant::now();
        let mut throttle = ThrottleController::new(config());
        for _ in 0..4 {
            throttle.record_failure(now);
        }
        assert_eq!(throttle.state().backoff, Duration::from_secs(16));

        throttle.record_success(now);
        assert_eq!(throttle.state().consecutive_errors, 0);
        assert_eq!(throttle.state().backoff_until, None);
        assert_eq!(throttle.state().backoff, Duration::from_secs(16));

        throttle.record_success(now);
        assert_eq!(throttle.state().backoff, Duration::from_secs(8));

        for _ in 0..10 {
            throttle.record_success(now);
        }
        assert_eq!(throttle.state().backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_failure_after_success_starts_curve_over() {
        let now = Instant::now();
        let mut throttle = ThrottleController::new(config());
        for _ in 0..4 {
            throttle.record_failure(now);
        }
        throttle.record_success(now);

        let outcome = throttle.record_failure(now);
        assert_eq!(outcome.consecutive_errors, 1);
        assert_eq!(outcome.backoff, Duration::from_secs(2));
        assert_eq!(
            throttle.check(now + Duration::from_secs(2)),
            ThrottleDecision::Proceed
        );
    }

    #[test]
    fn test_rate_limit_skips_until_cooldown_elapses() {
        let now = Instant::now();
        let mut throttle = ThrottleController::new(config());
        throttle.record_rate_limit(now);
        assert_eq!(throttle.state().consecutive_errors, 0);

        let during = now + Duration::from_secs(119);
        assert!(matches!(
            throttle.check(during),
            ThrottleDecision::Skip(SkipReason::RateLimited { .. })
        ));
        assert_eq!(throttle.phase(during), ThrottlePhase::RateLimited);
        assert_eq!(
            throttle.check(now + Duration::from_secs(120)),
            ThrottleDecision::Proceed
        );
    }

    #[test]
    fn test_disabled_after_many_failures() {
        let now = Instant::now();
        let mut throttle = ThrottleController::new(config());
        throttle.begin_request(now);
        let mut outcome = throttle.record_failure(now);
        for _ in 1..10 {
            outcome = throttle.record_failure(now);
        }
        assert!(outcome.disabled);
        // Backoff caps at 30s, the disable window lasts longer
        let after_backoff = now + Duration::from_secs(60);
        assert_eq!(throttle.phase(after_backoff), ThrottlePhase::Disabled);
        assert_eq!(
            throttle.phase(now + Duration::from_secs(300)),
            ThrottlePhase::Ready
        );
    }

    #[test]
    fn test_rate_limit_signal_detection() {
        assert!(is_rate_limit_signal(Some(429), ""));
        assert!(is_rate_limit_signal(
            None,
            "runtime error: Dispatcher_Client::request_read_and_idx::rate_limited"
        ));
        assert!(is_rate_limit_signal(Some(200), "Too Many Requests"));
        assert!(!is_rate_limit_signal(Some(504), "Gateway Timeout"));
    }
}
