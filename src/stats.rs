use serde::{Deserialize, Serialize};

use crate::config::RateLimitStrategy;

/// Running request statistics for a single API limiter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    /// Requests that were admitted only after a forced wait.
    pub rate_limited_requests: u64,
    /// Cumulative forced-wait seconds.
    pub total_wait_time: f64,
    pub average_wait_time: f64,
    /// Unix timestamp of the most recent admitted request.
    pub last_request_time: Option<f64>,
}

/// JSON-serializable point-in-time view of a limiter: the raw counters plus
/// derived fields.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub api: String,
    pub strategy: RateLimitStrategy,
    #[serde(flatten)]
    pub stats: RateLimitStats,
    /// successful_requests / total_requests, zero before any request.
    pub success_rate: f64,
    /// Requests currently inside the configured window.
    pub requests_in_window: usize,
    /// Consecutive failure count, capped at 10 for display.
    pub consecutive_failures: u32,
    /// Advisory backoff delay a retry should observe right now.
    pub current_backoff_seconds: f64,
    pub daily_quota_used: u64,
    /// Remaining daily budget; `None` when no quota reset hour is configured.
    pub daily_quota_remaining: Option<u64>,
}
