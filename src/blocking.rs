use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RateLimitConfig;
use crate::error::Result;
use crate::manager::RateLimitManager;
use crate::stats::StatsSnapshot;

/// Synchronous facade over [`RateLimitManager`] for threaded callers.
///
/// Owns a current-thread tokio runtime and bridges `acquire` with
/// `block_on`; everything else delegates directly. Must not be used from
/// inside an async context, where blocking would stall the runtime.
pub struct BlockingManager {
    inner: Arc<RateLimitManager>,
    runtime: tokio::runtime::Runtime,
}

impl BlockingManager {
    pub fn new() -> Result<Self> {
        Self::from_manager(Arc::new(RateLimitManager::new()))
    }

    /// Wrap an existing manager, sharing its limiters with async call sites.
    pub fn from_manager(inner: Arc<RateLimitManager>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        Ok(Self { inner, runtime })
    }

    pub fn register_api(&self, name: &str, config: RateLimitConfig) -> Result<()> {
        self.inner.register_api(name, config)
    }

    pub fn replace_api(&self, name: &str, config: RateLimitConfig) -> Result<()> {
        self.inner.replace_api(name, config)
    }

    /// Blocking admission: sleeps the calling thread for the computed wait.
    pub fn acquire(&self, name: &str, tokens: u32, timeout: Option<Duration>) -> Result<bool> {
        self.runtime.block_on(self.inner.acquire(name, tokens, timeout))
    }

    pub fn record_success(&self, name: &str) {
        self.inner.record_success(name);
    }

    pub fn record_failure(&self, name: &str, is_rate_limit: bool) {
        self.inner.record_failure(name, is_rate_limit);
    }

    pub fn get_backoff_time(&self, name: &str) -> f64 {
        self.inner.get_backoff_time(name)
    }

    pub fn get_stats(&self, name: &str) -> Option<StatsSnapshot> {
        self.inner.get_stats(name)
    }

    pub fn get_all_stats(&self) -> HashMap<String, StatsSnapshot> {
        self.inner.get_all_stats()
    }

    pub fn export_stats(&self, path: impl AsRef<Path>) -> Result<()> {
        self.inner.export_stats(path)
    }

    pub fn cleanup_old_data(&self, max_age_hours: f64) {
        self.inner.cleanup_old_data(max_age_hours)
    }

    /// The shared async manager, for handing to async call sites.
    pub fn manager(&self) -> Arc<RateLimitManager> {
        Arc::clone(&self.inner)
    }
}
