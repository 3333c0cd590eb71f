use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::RateLimitConfig;
use crate::error::{Error, Result};
use crate::limiter::ApiRateLimiter;
use crate::stats::StatsSnapshot;

/// Registry mapping API name to its limiter; the single entry point used by
/// every call site. Construct one and pass it by reference into the call
/// sites that need it.
pub struct RateLimitManager {
    limiters: RwLock<HashMap<String, Arc<ApiRateLimiter>>>,
}

impl Default for RateLimitManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitManager {
    pub fn new() -> Self {
        Self {
            limiters: RwLock::new(HashMap::new()),
        }
    }

    /// Register a limiter for `name`. The configuration is validated here;
    /// invalid values are fatal and reported synchronously. Registering an
    /// already-known name is rejected so accumulated statistics are never
    /// destroyed silently; use `replace_api` for intentional resets.
    pub fn register_api(&self, name: &str, config: RateLimitConfig) -> Result<()> {
        let limiter = Arc::new(ApiRateLimiter::new(name, config)?);

        let mut limiters = self.write();
        if limiters.contains_key(name) {
            return Err(Error::AlreadyRegistered(name.to_string()));
        }
        info!(api = %name, strategy = ?limiter.config().strategy, "registered api limiter");
        limiters.insert(name.to_string(), limiter);
        Ok(())
    }

    /// Replace (or create) the limiter for `name`, discarding any
    /// accumulated statistics.
    pub fn replace_api(&self, name: &str, config: RateLimitConfig) -> Result<()> {
        let limiter = Arc::new(ApiRateLimiter::new(name, config)?);

        let mut limiters = self.write();
        if limiters.insert(name.to_string(), limiter).is_some() {
            warn!(api = %name, "replaced existing limiter, statistics reset");
        } else {
            info!(api = %name, "registered api limiter");
        }
        Ok(())
    }

    /// Admit a request against `name`'s limiter.
    ///
    /// Unregistered names fail open: the request is admitted immediately
    /// with a warning. Blocking every call to a misconfigured API would turn
    /// a registration bug into an outage.
    pub async fn acquire(
        &self,
        name: &str,
        tokens: u32,
        timeout: Option<Duration>,
    ) -> Result<bool> {
        match self.limiter(name) {
            Some(limiter) => limiter.acquire(tokens, timeout).await,
            None => {
                warn!(api = %name, "no limiter registered, admitting request");
                Ok(true)
            }
        }
    }

    /// No-op when `name` is unregistered.
    pub fn record_success(&self, name: &str) {
        if let Some(limiter) = self.limiter(name) {
            limiter.record_success();
        }
    }

    /// No-op when `name` is unregistered.
    pub fn record_failure(&self, name: &str, is_rate_limit: bool) {
        if let Some(limiter) = self.limiter(name) {
            limiter.record_failure(is_rate_limit);
        }
    }

    /// Advisory retry delay for `name`; zero when unregistered.
    pub fn get_backoff_time(&self, name: &str) -> f64 {
        self.limiter(name)
            .map(|limiter| limiter.get_backoff_time())
            .unwrap_or(0.0)
    }

    pub fn get_stats(&self, name: &str) -> Option<StatsSnapshot> {
        self.limiter(name).map(|limiter| limiter.get_stats())
    }

    pub fn get_all_stats(&self) -> HashMap<String, StatsSnapshot> {
        self.read()
            .iter()
            .map(|(name, limiter)| (name.clone(), limiter.get_stats()))
            .collect()
    }

    /// Serialize all stats snapshots to a JSON file.
    pub fn export_stats(&self, path: impl AsRef<Path>) -> Result<()> {
        let stats = self.get_all_stats();
        let json = serde_json::to_string_pretty(&stats)?;
        std::fs::write(path.as_ref(), json)?;
        info!(
            path = %path.as_ref().display(),
            apis = stats.len(),
            "exported rate limit stats"
        );
        Ok(())
    }

    /// Purge request history older than `max_age_hours` from every tracker.
    /// Intended to run on a periodic timer external to this subsystem.
    pub fn cleanup_old_data(&self, max_age_hours: f64) {
        let limiters = self.read();
        for limiter in limiters.values() {
            limiter.clear_old_requests(max_age_hours * 3600.0);
        }
        debug!(apis = limiters.len(), max_age_hours, "cleaned up request history");
    }

    fn limiter(&self, name: &str) -> Option<Arc<ApiRateLimiter>> {
        self.read().get(name).cloned()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<ApiRateLimiter>>> {
        self.limiters
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<ApiRateLimiter>>> {
        self.limiters
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
