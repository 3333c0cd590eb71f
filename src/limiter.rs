use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{NaiveDate, Timelike, Utc};
use tracing::{debug, warn};

use crate::adaptive::AdaptiveRateLimiter;
use crate::backoff::backoff_delay;
use crate::clock::unix_now;
use crate::config::{RateLimitConfig, RateLimitStrategy};
use crate::error::{Error, Result};
use crate::stats::{RateLimitStats, StatsSnapshot};
use crate::token_bucket::TokenBucket;
use crate::tracker::RequestTracker;

/// Floor for nonzero token-bucket waits; near-zero deficits must not turn
/// into busy-waiting.
const MIN_TOKEN_WAIT_SECS: f64 = 0.1;

/// Consecutive failures above this are reported as 10 in snapshots.
const FAILURE_DISPLAY_CAP: u32 = 10;

/// Per-API admission controller. Owns the request history, statistics,
/// failure count, and daily quota state for one upstream API, and dispatches
/// admission decisions to the configured strategy.
///
/// `acquire` is the only suspension point; every other method completes
/// without blocking. All mutable state sits behind one lock that is held for
/// short critical sections and never across the admission sleep.
pub struct ApiRateLimiter {
    name: String,
    config: RateLimitConfig,
    state: Mutex<LimiterState>,
}

struct LimiterState {
    tracker: RequestTracker,
    stats: RateLimitStats,
    token_bucket: Option<TokenBucket>,
    adaptive: Option<AdaptiveRateLimiter>,
    consecutive_failures: u32,
    daily_quota_used: u64,
    quota_reset_date: NaiveDate,
}

impl LimiterState {
    fn roll_quota_date(&mut self, today: NaiveDate) {
        if today != self.quota_reset_date {
            self.daily_quota_used = 0;
            self.quota_reset_date = today;
        }
    }
}

impl ApiRateLimiter {
    /// Build a limiter for `name`, validating the configuration.
    pub fn new(name: impl Into<String>, config: RateLimitConfig) -> Result<Self> {
        let name = name.into();
        config.validate().map_err(|reason| Error::Configuration {
            api: name.clone(),
            reason,
        })?;

        let token_bucket = match config.strategy {
            RateLimitStrategy::TokenBucket => Some(TokenBucket::new(
                config.bucket_capacity(),
                config.steady_rate(),
            )),
            _ => None,
        };
        let adaptive = match config.strategy {
            RateLimitStrategy::Adaptive => Some(AdaptiveRateLimiter::new(
                config.steady_rate(),
                config.adaptive_factor,
            )),
            _ => None,
        };

        Ok(Self {
            name,
            config,
            state: Mutex::new(LimiterState {
                tracker: RequestTracker::new(),
                stats: RateLimitStats::default(),
                token_bucket,
                adaptive,
                consecutive_failures: 0,
                daily_quota_used: 0,
                quota_reset_date: Utc::now().date_naive(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit `tokens` units of work, waiting out the strategy-computed delay
    /// if necessary.
    ///
    /// Returns `Ok(false)` without touching any counter when the computed
    /// wait exceeds a supplied `timeout`. Returns `Error::QuotaExceeded`
    /// when a configured daily quota has no room left; the caller decides
    /// whether to wait for the reset or abandon.
    pub async fn acquire(&self, tokens: u32, timeout: Option<Duration>) -> Result<bool> {
        let wait_secs = {
            let mut state = self.state();
            state.roll_quota_date(Utc::now().date_naive());

            if self.config.quota_reset_hour.is_some() {
                let daily_limit = self.config.daily_limit();
                if state.daily_quota_used + u64::from(tokens) > daily_limit {
                    let (wait_secs, retry_after) = self.next_quota_reset();
                    warn!(
                        api = %self.name,
                        used = state.daily_quota_used,
                        limit = daily_limit,
                        wait_secs,
                        "daily quota exhausted"
                    );
                    return Err(Error::QuotaExceeded {
                        api: self.name.clone(),
                        wait_secs,
                        retry_after,
                    });
                }
            }

            let wait = self.wait_time(&mut state, tokens, unix_now());
            if wait > 0.0 {
                if let Some(limit) = timeout {
                    if wait > limit.as_secs_f64() {
                        return Ok(false);
                    }
                }
            }
            wait
        };

        if wait_secs > 0.0 {
            debug!(api = %self.name, wait_secs, "throttling request");
            tokio::time::sleep(Duration::from_secs_f64(wait_secs)).await;
        }

        let now = unix_now();
        let mut state = self.state();
        if wait_secs > 0.0 {
            state.stats.rate_limited_requests += 1;
            state.stats.total_wait_time += wait_secs;
            // the pre-sleep consume attempt failed, so charge the bucket now
            if let Some(bucket) = state.token_bucket.as_mut() {
                bucket.consume_at(f64::from(tokens), now);
            }
        }
        state.tracker.add_request_at(now);
        state.stats.total_requests += 1;
        state.stats.average_wait_time =
            state.stats.total_wait_time / state.stats.total_requests as f64;
        state.stats.last_request_time = Some(now);
        state.daily_quota_used += u64::from(tokens);

        Ok(true)
    }

    /// Seconds the caller must wait before this request may proceed.
    fn wait_time(&self, state: &mut LimiterState, tokens: u32, now: f64) -> f64 {
        let window = self.config.window_secs();
        let max_requests = self.config.max_requests as usize;

        match self.config.strategy {
            RateLimitStrategy::FixedWindow => {
                // buckets of width W aligned to multiples of W since the epoch
                let bucket_start = (now / window).floor() * window;
                let in_bucket = state
                    .tracker
                    .count_requests_in_window_at(now - bucket_start, now);
                if in_bucket + tokens as usize > max_requests {
                    bucket_start + window - now
                } else {
                    0.0
                }
            }
            RateLimitStrategy::SlidingWindow => {
                let in_window = state.tracker.count_requests_in_window_at(window, now);
                let allowed = max_requests + self.config.burst_allowance as usize;
                if in_window + tokens as usize > allowed {
                    match state.tracker.oldest_in_window_at(window, now) {
                        Some(oldest) => (oldest + window - now).max(0.0),
                        None => 0.0,
                    }
                } else {
                    0.0
                }
            }
            RateLimitStrategy::TokenBucket => match state.token_bucket.as_mut() {
                Some(bucket) => {
                    if bucket.consume_at(f64::from(tokens), now) {
                        0.0
                    } else {
                        let wait = bucket.wait_time_for_tokens_at(f64::from(tokens), now);
                        if wait > 0.0 {
                            wait.max(MIN_TOKEN_WAIT_SECS)
                        } else {
                            0.0
                        }
                    }
                }
                None => 0.0,
            },
            RateLimitStrategy::LeakyBucket => {
                let in_window = state.tracker.count_requests_in_window_at(window, now);
                let total = in_window + tokens as usize;
                if total > max_requests {
                    let excess = (total - max_requests) as f64;
                    excess / (self.config.max_requests as f64 / window)
                } else {
                    0.0
                }
            }
            RateLimitStrategy::Adaptive => match state.adaptive.as_ref() {
                Some(adaptive) => match state.stats.last_request_time {
                    Some(last) => (adaptive.min_interval() - (now - last)).max(0.0),
                    None => 0.0,
                },
                None => 0.0,
            },
        }
    }

    /// Record a successful outbound call. Resets the consecutive-failure
    /// count and feeds the adaptive controller when one is configured.
    pub fn record_success(&self) {
        let mut state = self.state();
        state.stats.successful_requests += 1;
        state.consecutive_failures = 0;
        if let Some(adaptive) = state.adaptive.as_mut() {
            adaptive.record_success();
        }
    }

    /// Record a failed outbound call. `is_rate_limit` is the caller's
    /// classification of the provider error; this subsystem never inspects
    /// response payloads itself.
    pub fn record_failure(&self, is_rate_limit: bool) {
        let mut state = self.state();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        if let Some(adaptive) = state.adaptive.as_mut() {
            adaptive.record_error(is_rate_limit);
        }
        debug!(
            api = %self.name,
            consecutive = state.consecutive_failures,
            is_rate_limit,
            "recorded failure"
        );
    }

    /// Advisory delay before the caller retries a failed call. Distinct from
    /// the admission wait inside `acquire`; executing the retry stays the
    /// caller's responsibility.
    pub fn get_backoff_time(&self) -> f64 {
        let state = self.state();
        backoff_delay(
            &self.config.backoff_strategy,
            self.config.backoff_base,
            self.config.max_backoff_seconds,
            state.consecutive_failures,
        )
    }

    /// Point-in-time statistics snapshot.
    pub fn get_stats(&self) -> StatsSnapshot {
        let state = self.state();
        let stats = state.stats.clone();
        let success_rate = if stats.total_requests > 0 {
            stats.successful_requests as f64 / stats.total_requests as f64
        } else {
            0.0
        };

        StatsSnapshot {
            api: self.name.clone(),
            strategy: self.config.strategy,
            success_rate,
            requests_in_window: state
                .tracker
                .count_requests_in_window(self.config.window_secs()),
            consecutive_failures: state.consecutive_failures.min(FAILURE_DISPLAY_CAP),
            current_backoff_seconds: backoff_delay(
                &self.config.backoff_strategy,
                self.config.backoff_base,
                self.config.max_backoff_seconds,
                state.consecutive_failures,
            ),
            daily_quota_used: state.daily_quota_used,
            daily_quota_remaining: self.config.quota_reset_hour.map(|_| {
                self.config
                    .daily_limit()
                    .saturating_sub(state.daily_quota_used)
            }),
            stats,
        }
    }

    /// Drop tracker entries older than `max_age_secs`.
    pub fn clear_old_requests(&self, max_age_secs: f64) {
        self.state().tracker.clear_old_requests(max_age_secs);
    }

    fn state(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seconds until the configured reset hour next comes around, and that
    /// moment as a Unix timestamp.
    fn next_quota_reset(&self) -> (f64, f64) {
        let reset_hour = self.config.quota_reset_hour.unwrap_or(0);
        let now = Utc::now();
        let secs_into_day = i64::from(now.num_seconds_from_midnight());
        let mut wait = i64::from(reset_hour) * 3600 - secs_into_day;
        if wait <= 0 {
            wait += 86_400;
        }
        (wait as f64, now.timestamp() as f64 + wait as f64)
    }
}
