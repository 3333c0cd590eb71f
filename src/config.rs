use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Admission-control strategy for an API limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitStrategy {
    FixedWindow,
    SlidingWindow,
    TokenBucket,
    LeakyBucket,
    Adaptive,
}

/// Advisory retry-delay schedule applied after consecutive failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Linear,
    Exponential,
    Fibonacci,
    /// Explicit per-failure delay schedule in seconds; the last entry is
    /// repeated once the failure count outruns the schedule.
    Custom(Vec<f64>),
}

/// Immutable rate limiting rule for a single API, validated at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per `time_window`.
    pub max_requests: u32,
    /// Width of the accounting window.
    #[serde(with = "humantime_serde")]
    pub time_window: Duration,
    pub strategy: RateLimitStrategy,
    pub backoff_strategy: BackoffStrategy,
    /// Base delay in seconds fed into the backoff schedule.
    pub backoff_base: f64,
    /// Upper clamp for any computed backoff delay.
    pub max_backoff_seconds: f64,
    /// Extra requests tolerated above `max_requests` in a sliding window.
    pub burst_allowance: u32,
    /// Fractional rate adjustment applied by the adaptive controller.
    pub adaptive_factor: f64,
    /// Hour of day (0-23, UTC) at which the daily quota resets. Enables the
    /// daily quota check when set.
    pub quota_reset_hour: Option<u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            time_window: Duration::from_secs(60),
            strategy: RateLimitStrategy::SlidingWindow,
            backoff_strategy: BackoffStrategy::Exponential,
            backoff_base: 2.0,
            max_backoff_seconds: 300.0,
            burst_allowance: 0,
            adaptive_factor: 0.1,
            quota_reset_hour: None,
        }
    }
}

impl RateLimitConfig {
    /// Create a rule with the given request budget; everything else takes
    /// the default (sliding window, exponential backoff).
    pub fn new(max_requests: u32, time_window: Duration) -> Self {
        Self {
            max_requests,
            time_window,
            ..Self::default()
        }
    }

    pub fn with_strategy(mut self, strategy: RateLimitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff_strategy = backoff;
        self
    }

    pub fn with_backoff_base(mut self, base: f64) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_max_backoff(mut self, seconds: f64) -> Self {
        self.max_backoff_seconds = seconds;
        self
    }

    pub fn with_burst(mut self, burst: u32) -> Self {
        self.burst_allowance = burst;
        self
    }

    pub fn with_adaptive_factor(mut self, factor: f64) -> Self {
        self.adaptive_factor = factor;
        self
    }

    pub fn with_quota_reset_hour(mut self, hour: u32) -> Self {
        self.quota_reset_hour = Some(hour);
        self
    }

    /// Window width in fractional seconds.
    pub fn window_secs(&self) -> f64 {
        self.time_window.as_secs_f64()
    }

    /// Steady-state admission rate in requests per second.
    pub fn steady_rate(&self) -> f64 {
        f64::from(self.max_requests) / self.window_secs()
    }

    /// Token bucket capacity: the window budget plus burst headroom.
    pub fn bucket_capacity(&self) -> f64 {
        f64::from(self.max_requests + self.burst_allowance)
    }

    /// Daily request budget when a quota reset hour is configured. This is a
    /// deliberate approximation of a provider's daily quota, not a mirror of
    /// any real one.
    pub fn daily_limit(&self) -> u64 {
        u64::from(self.max_requests) * 24
    }

    /// Validate rule parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_requests == 0 {
            return Err("max_requests must be greater than 0".to_string());
        }
        if self.time_window.is_zero() {
            return Err("time_window must be greater than 0".to_string());
        }
        if self.backoff_base <= 0.0 {
            return Err("backoff_base must be greater than 0".to_string());
        }
        if self.max_backoff_seconds < 0.0 {
            return Err("max_backoff_seconds must not be negative".to_string());
        }
        if !(self.adaptive_factor > 0.0 && self.adaptive_factor < 1.0) {
            return Err("adaptive_factor must be between 0 and 1".to_string());
        }
        if let Some(hour) = self.quota_reset_hour {
            if hour > 23 {
                return Err("quota_reset_hour must be between 0 and 23".to_string());
            }
        }
        if let BackoffStrategy::Custom(schedule) = &self.backoff_strategy {
            if schedule.is_empty() {
                return Err("custom backoff schedule must not be empty".to_string());
            }
            if schedule.iter().any(|delay| *delay < 0.0) {
                return Err("custom backoff delays must not be negative".to_string());
            }
        }
        Ok(())
    }

    /// Preset for polling a social feed: 60 requests per minute with a small
    /// burst allowance.
    pub fn feed_poller() -> Self {
        Self::new(60, Duration::from_secs(60)).with_burst(5)
    }

    /// Preset for a language-model summarization API: 20 requests per minute
    /// through a token bucket, with the daily quota resetting at midnight UTC.
    pub fn summarizer() -> Self {
        Self::new(20, Duration::from_secs(60))
            .with_strategy(RateLimitStrategy::TokenBucket)
            .with_quota_reset_hour(0)
    }

    /// Preset for a chat-channel webhook: 30 requests per minute with linear
    /// backoff on failures.
    pub fn notifier() -> Self {
        Self::new(30, Duration::from_secs(60)).with_backoff(BackoffStrategy::Linear)
    }
}
