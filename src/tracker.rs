use std::collections::VecDeque;

use crate::clock::unix_now;

const DEFAULT_MAX_HISTORY: usize = 10_000;

/// Bounded history of request timestamps (fractional Unix seconds), oldest
/// first. Answers "how many requests occurred in the last W seconds".
///
/// Exclusive access comes from `&mut self`; the owning limiter serializes
/// all callers behind its state lock.
#[derive(Debug, Clone)]
pub struct RequestTracker {
    timestamps: VecDeque<f64>,
    max_history: usize,
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::with_max_history(DEFAULT_MAX_HISTORY)
    }

    /// Cap the history length; the oldest entry is dropped on overflow.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            timestamps: VecDeque::new(),
            max_history: max_history.max(1),
        }
    }

    /// Record a request at the current wall-clock time.
    pub fn add_request(&mut self) {
        self.add_request_at(unix_now());
    }

    /// Record a request at an explicit timestamp.
    pub fn add_request_at(&mut self, timestamp: f64) {
        self.timestamps.push_back(timestamp);
        if self.timestamps.len() > self.max_history {
            self.timestamps.pop_front();
        }
    }

    /// Number of requests with timestamp >= now - window_secs.
    pub fn count_requests_in_window(&self, window_secs: f64) -> usize {
        self.count_requests_in_window_at(window_secs, unix_now())
    }

    pub fn count_requests_in_window_at(&self, window_secs: f64, now: f64) -> usize {
        let cutoff = now - window_secs;
        self.timestamps.iter().filter(|&&ts| ts >= cutoff).count()
    }

    /// Timestamps with timestamp >= now - window_secs, oldest first.
    pub fn get_requests_in_window(&self, window_secs: f64) -> Vec<f64> {
        self.get_requests_in_window_at(window_secs, unix_now())
    }

    pub fn get_requests_in_window_at(&self, window_secs: f64, now: f64) -> Vec<f64> {
        let cutoff = now - window_secs;
        self.timestamps
            .iter()
            .copied()
            .filter(|&ts| ts >= cutoff)
            .collect()
    }

    /// Oldest timestamp still inside the window, if any.
    pub fn oldest_in_window_at(&self, window_secs: f64, now: f64) -> Option<f64> {
        let cutoff = now - window_secs;
        self.timestamps.iter().copied().find(|&ts| ts >= cutoff)
    }

    /// Drop entries older than `max_age_secs`. GC hook for periodic
    /// maintenance.
    pub fn clear_old_requests(&mut self, max_age_secs: f64) {
        self.clear_old_requests_at(max_age_secs, unix_now());
    }

    pub fn clear_old_requests_at(&mut self, max_age_secs: f64, now: f64) {
        let cutoff = now - max_age_secs;
        self.timestamps.retain(|&ts| ts >= cutoff);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}
