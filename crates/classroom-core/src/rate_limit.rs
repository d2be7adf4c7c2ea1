use async_trait::async_trait;
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{AppError, AppResult};

/// Rate limit parameters for a single action.
#[derive(Debug, Clone)]
pub struct ActionRateLimit {
    /// Sliding window duration.
    pub window: Duration,

    /// Maximum number of calls allowed within the window.
    pub max_requests: u32,
}

impl ActionRateLimit {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(Duration::from_secs(60), max_requests)
    }
}

/// Configuration shared by the rate limiter implementations.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Limit applied to actions without an override.
    pub default: ActionRateLimit,

    /// Per-action overrides, keyed by action name (e.g. "login").
    pub per_action: HashMap<String, ActionRateLimit>,

    /// Whether rate limiting is enabled.
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut per_action = HashMap::new();
        per_action.insert("login".to_string(), ActionRateLimit::per_minute(10));
        per_action.insert("sign-up".to_string(), ActionRateLimit::per_minute(5));
        per_action.insert("upload-file".to_string(), ActionRateLimit::per_minute(10));

        Self {
            default: ActionRateLimit::per_minute(30),
            per_action,
            enabled: true,
        }
    }
}

impl RateLimitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_limit(mut self, window: Duration, max_requests: u32) -> Self {
        self.default = ActionRateLimit::new(window, max_requests);
        self
    }

    pub fn action(
        mut self,
        name: impl Into<String>,
        window: Duration,
        max_requests: u32,
    ) -> Self {
        self.per_action
            .insert(name.into(), ActionRateLimit::new(window, max_requests));
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn limit_for(&self, action: &str) -> &ActionRateLimit {
        self.per_action.get(action).unwrap_or(&self.default)
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    /// Rejected; the caller may retry after this many seconds.
    Limited { retry_after: u64 },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Turn a rejection into [`AppError::RateLimited`].
    pub fn into_result(self) -> AppResult<()> {
        match self {
            Self::Allowed => Ok(()),
            Self::Limited { retry_after } => Err(AppError::RateLimited { retry_after }),
        }
    }
}

/// Admission control for server actions.
///
/// Each call counts against the bucket `"<action>:<caller>"`.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, action: &str, caller: &str) -> AppResult<RateLimitDecision>;
}

fn bucket_key(action: &str, caller: &str) -> String {
    format!("{}:{}", action, caller)
}

fn lock<T>(mutex: &Mutex<T>) -> AppResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| AppError::internal("rate limiter state poisoned"))
}

/// Longest configured window. Idle state older than this can be dropped.
fn longest_window(config: &RateLimitConfig) -> Duration {
    config
        .per_action
        .values()
        .map(|limit| limit.window)
        .fold(config.default.window, Duration::max)
}

struct Bucket {
    window: Duration,
    hits: Vec<Instant>,
}

impl Bucket {
    fn is_idle(&self, now: Instant) -> bool {
        self.hits
            .last()
            .is_none_or(|&t| now.duration_since(t) >= self.window)
    }
}

struct SlidingWindowState {
    buckets: HashMap<String, Bucket>,
    last_sweep: Instant,
}

impl SlidingWindowState {
    fn sweep(&mut self, now: Instant) {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_idle(now));
        self.last_sweep = now;
        tracing::debug!(
            dropped = before - self.buckets.len(),
            remaining = self.buckets.len(),
            "rate limit buckets swept"
        );
    }
}

/// In-memory sliding-window rate limiter.
///
/// Suitable for single-process deployments and testing. Idle buckets are
/// swept once per longest window, so memory follows the set of recently
/// active callers.
pub struct SlidingWindowRateLimiter {
    config: RateLimitConfig,
    sweep_interval: Duration,
    state: Mutex<SlidingWindowState>,
}

impl SlidingWindowRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            sweep_interval: longest_window(&config),
            config,
            state: Mutex::new(SlidingWindowState {
                buckets: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Drop every bucket with no hit inside its window.
    pub fn prune(&self) -> AppResult<()> {
        lock(&self.state)?.sweep(Instant::now());
        Ok(())
    }

    /// Number of `"<action>:<caller>"` buckets currently held.
    pub fn tracked_buckets(&self) -> AppResult<usize> {
        Ok(lock(&self.state)?.buckets.len())
    }
}

impl Default for SlidingWindowRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowRateLimiter {
    async fn check(&self, action: &str, caller: &str) -> AppResult<RateLimitDecision> {
        if !self.config.enabled {
            return Ok(RateLimitDecision::Allowed);
        }

        let limit = self.config.limit_for(action);
        let now = Instant::now();
        let window = limit.window;

        let mut state = lock(&self.state)?;
        if now.duration_since(state.last_sweep) >= self.sweep_interval {
            state.sweep(now);
        }

        let bucket = state
            .buckets
            .entry(bucket_key(action, caller))
            .or_insert_with(|| Bucket {
                window,
                hits: Vec::new(),
            });
        bucket.hits.retain(|&t| now.duration_since(t) < window);

        if bucket.hits.len() as u32 >= limit.max_requests {
            let retry_after = bucket
                .hits
                .first()
                .map(|&t| {
                    window
                        .as_secs()
                        .saturating_sub(now.duration_since(t).as_secs())
                })
                .unwrap_or(window.as_secs());

            tracing::info!(action, caller, retry_after, "rate limit exceeded");
            return Ok(RateLimitDecision::Limited { retry_after });
        }

        bucket.hits.push(now);
        Ok(RateLimitDecision::Allowed)
    }
}

type KeyedLimiter = DefaultKeyedRateLimiter<String>;

/// GCRA rate limiter backed by the `governor` crate.
///
/// One keyed limiter per action, keyed by caller. Callers whose state has
/// fully replenished are evicted with `retain_recent` once per longest
/// window.
pub struct GovernorRateLimiter {
    config: RateLimitConfig,
    clock: DefaultClock,
    sweep_interval: Duration,
    limiters: Mutex<HashMap<String, Arc<KeyedLimiter>>>,
    last_sweep: Mutex<Instant>,
}

impl GovernorRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            sweep_interval: longest_window(&config),
            config,
            clock: DefaultClock::default(),
            limiters: Mutex::new(HashMap::new()),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    fn quota_for(limit: &ActionRateLimit) -> Option<Quota> {
        let max = NonZeroU32::new(limit.max_requests)?;
        let period_ms = (limit.window.as_millis() as u64)
            .checked_div(u64::from(limit.max_requests))
            .unwrap_or(0);
        // Zero periods are rejected by governor.
        let period = Duration::from_millis(period_ms.max(1));
        Quota::with_period(period).map(|q| q.allow_burst(max))
    }

    /// Evict callers whose limiter state is back to fresh.
    pub fn prune(&self) -> AppResult<()> {
        let limiters: Vec<Arc<KeyedLimiter>> = lock(&self.limiters)?.values().cloned().collect();
        for limiter in &limiters {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
        *lock(&self.last_sweep)? = Instant::now();
        Ok(())
    }

    /// Number of callers tracked across all actions.
    pub fn tracked_callers(&self) -> AppResult<usize> {
        Ok(lock(&self.limiters)?.values().map(|l| l.len()).sum())
    }

    fn sweep_due(&self) -> AppResult<bool> {
        Ok(lock(&self.last_sweep)?.elapsed() >= self.sweep_interval)
    }
}

impl Default for GovernorRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[async_trait]
impl RateLimiter for GovernorRateLimiter {
    async fn check(&self, action: &str, caller: &str) -> AppResult<RateLimitDecision> {
        if !self.config.enabled {
            return Ok(RateLimitDecision::Allowed);
        }

        let limit = self.config.limit_for(action);
        let Some(quota) = Self::quota_for(limit) else {
            // A zero budget admits nothing.
            return Ok(RateLimitDecision::Limited {
                retry_after: limit.window.as_secs(),
            });
        };

        if self.sweep_due()? {
            self.prune()?;
        }

        let limiter = {
            let mut limiters = lock(&self.limiters)?;
            limiters
                .entry(action.to_string())
                .or_insert_with(|| Arc::new(governor::RateLimiter::keyed(quota)))
                .clone()
        };

        match limiter.check_key(&caller.to_string()) {
            Ok(()) => Ok(RateLimitDecision::Allowed),
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                let retry_after = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                tracing::info!(action, caller, retry_after, "rate limit exceeded");
                Ok(RateLimitDecision::Limited { retry_after })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sliding_window_allows_within_limit() {
        let limiter = SlidingWindowRateLimiter::new(
            RateLimitConfig::new().default_limit(Duration::from_secs(60), 5),
        );
        for _ in 0..5 {
            assert!(limiter.check("post-grade", "u1").await.unwrap().is_allowed());
        }
    }

    #[tokio::test]
    async fn test_sliding_window_blocks_over_limit() {
        let limiter = SlidingWindowRateLimiter::new(
            RateLimitConfig::new().default_limit(Duration::from_secs(60), 3),
        );
        for _ in 0..3 {
            assert!(limiter.check("post-grade", "u1").await.unwrap().is_allowed());
        }

        let decision = limiter.check("post-grade", "u1").await.unwrap();
        match decision {
            RateLimitDecision::Limited { retry_after } => assert!(retry_after <= 60),
            RateLimitDecision::Allowed => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn test_buckets_are_per_action_and_caller() {
        let limiter = SlidingWindowRateLimiter::new(
            RateLimitConfig::new().default_limit(Duration::from_secs(60), 1),
        );
        assert!(limiter.check("post-grade", "u1").await.unwrap().is_allowed());
        assert!(!limiter.check("post-grade", "u1").await.unwrap().is_allowed());
        assert!(limiter.check("post-grade", "u2").await.unwrap().is_allowed());
        assert!(limiter.check("create-quiz", "u1").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_default_overrides() {
        let config = RateLimitConfig::default();
        assert_eq!(config.limit_for("login").max_requests, 10);
        assert_eq!(config.limit_for("sign-up").max_requests, 5);
        assert_eq!(config.limit_for("create-assignment").max_requests, 30);
        assert_eq!(config.limit_for("create-assignment").window, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_disabled_never_limits() {
        let limiter = SlidingWindowRateLimiter::new(
            RateLimitConfig::new()
                .default_limit(Duration::from_secs(60), 1)
                .enabled(false),
        );
        for _ in 0..10 {
            assert!(limiter.check("login", "1.2.3.4").await.unwrap().is_allowed());
        }
    }

    #[tokio::test]
    async fn test_governor_enforces_burst() {
        let limiter = GovernorRateLimiter::new(
            RateLimitConfig::new().action("login", Duration::from_secs(60), 2),
        );
        assert!(limiter.check("login", "1.2.3.4").await.unwrap().is_allowed());
        assert!(limiter.check("login", "1.2.3.4").await.unwrap().is_allowed());

        let decision = limiter.check("login", "1.2.3.4").await.unwrap();
        assert!(matches!(
            decision,
            RateLimitDecision::Limited { retry_after } if retry_after >= 1
        ));
        assert!(limiter.check("login", "5.6.7.8").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_governor_zero_budget_rejects() {
        let limiter = GovernorRateLimiter::new(
            RateLimitConfig::new().action("sign-up", Duration::from_secs(60), 0),
        );
        assert!(!limiter.check("sign-up", "anonymous").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_sliding_window_sweeps_idle_buckets() {
        let limiter = SlidingWindowRateLimiter::new(RateLimitConfig {
            default: ActionRateLimit::new(Duration::from_millis(20), 5),
            per_action: HashMap::new(),
            enabled: true,
        });
        for i in 0..50 {
            let caller = format!("10.0.0.{}", i);
            assert!(limiter.check("submit-quiz", &caller).await.unwrap().is_allowed());
        }
        assert_eq!(limiter.tracked_buckets().unwrap(), 50);

        tokio::time::sleep(Duration::from_millis(40)).await;
        // The next check is past the sweep interval and drops idle buckets.
        assert!(limiter.check("submit-quiz", "10.0.1.1").await.unwrap().is_allowed());
        assert_eq!(limiter.tracked_buckets().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sliding_window_prune_keeps_active_buckets() {
        let limiter = SlidingWindowRateLimiter::new(
            RateLimitConfig::new().default_limit(Duration::from_secs(60), 5),
        );
        assert!(limiter.check("login", "1.2.3.4").await.unwrap().is_allowed());
        limiter.prune().unwrap();
        assert_eq!(limiter.tracked_buckets().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_governor_evicts_replenished_callers() {
        let limiter = GovernorRateLimiter::new(
            RateLimitConfig::new().action("login", Duration::from_millis(20), 1),
        );
        for i in 0..50 {
            let caller = format!("10.0.0.{}", i);
            assert!(limiter.check("login", &caller).await.unwrap().is_allowed());
        }
        assert_eq!(limiter.tracked_callers().unwrap(), 50);

        tokio::time::sleep(Duration::from_millis(60)).await;
        limiter.prune().unwrap();
        assert_eq!(limiter.tracked_callers().unwrap(), 0);
    }

    #[test]
    fn test_decision_into_result() {
        assert!(RateLimitDecision::Allowed.into_result().is_ok());
        let err = RateLimitDecision::Limited { retry_after: 9 }
            .into_result()
            .unwrap_err();
        assert_eq!(err.status_code(), 429);
        assert_eq!(err.to_string(), "Too many requests. Please try again later.");
    }
}
