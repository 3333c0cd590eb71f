use serde::{Deserialize, Serialize};

/// Number of combined success/error observations between rate evaluations.
const OBSERVATION_WINDOW: u32 = 100;

/// Feedback controller that nudges an allowed request rate up or down from
/// observed success/error ratios. Rate-limit errors from the provider halve
/// the rate immediately; other errors shave 10% off. Every 100 observations
/// the rate is re-evaluated against the success ratio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveRateLimiter {
    current_rate: f64, // requests per second
    min_rate: f64,
    max_rate: f64,
    adjustment_factor: f64,
    success_count: u32,
    error_count: u32,
}

impl AdaptiveRateLimiter {
    /// Bounds default to a tenth and ten times the initial rate.
    pub fn new(initial_rate: f64, adjustment_factor: f64) -> Self {
        Self::with_bounds(
            initial_rate,
            adjustment_factor,
            initial_rate / 10.0,
            initial_rate * 10.0,
        )
    }

    pub fn with_bounds(
        initial_rate: f64,
        adjustment_factor: f64,
        min_rate: f64,
        max_rate: f64,
    ) -> Self {
        Self {
            current_rate: initial_rate.clamp(min_rate, max_rate),
            min_rate,
            max_rate,
            adjustment_factor,
            success_count: 0,
            error_count: 0,
        }
    }

    pub fn record_success(&mut self) {
        self.success_count += 1;
        self.evaluate_window();
    }

    pub fn record_error(&mut self, is_rate_limit: bool) {
        self.error_count += 1;
        if is_rate_limit {
            self.current_rate = (self.current_rate * 0.5).max(self.min_rate);
        } else {
            self.current_rate = (self.current_rate * 0.9).max(self.min_rate);
        }
        self.evaluate_window();
    }

    pub fn current_rate(&self) -> f64 {
        self.current_rate
    }

    /// Minimum spacing between admitted requests at the current rate.
    pub fn min_interval(&self) -> f64 {
        if self.current_rate > 0.0 {
            1.0 / self.current_rate
        } else {
            f64::INFINITY
        }
    }

    fn evaluate_window(&mut self) {
        let total = self.success_count + self.error_count;
        if total < OBSERVATION_WINDOW {
            return;
        }

        let success_ratio = f64::from(self.success_count) / f64::from(total);
        if success_ratio >= 0.95 {
            self.current_rate =
                (self.current_rate * (1.0 + self.adjustment_factor)).min(self.max_rate);
        } else if success_ratio < 0.90 {
            self.current_rate =
                (self.current_rate * (1.0 - self.adjustment_factor)).max(self.min_rate);
        }

        self.success_count = 0;
        self.error_count = 0;
    }
}
