use serde::{Deserialize, Serialize};

use crate::clock::unix_now;

/// Token amounts closer to zero than this are treated as exactly zero, so
/// floating-point residue never admits a request it shouldn't.
pub const TOKEN_EPSILON: f64 = 1e-9;

/// Continuous-refill token pool for burstable throughput. Tokens accrue at
/// `refill_rate` per second up to `capacity`; each admitted request consumes
/// one token per unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_rate: f64, // tokens per second
    last_refill: f64, // unix seconds
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self::new_at(capacity, refill_rate, unix_now())
    }

    pub fn new_at(capacity: f64, refill_rate: f64, now: f64) -> Self {
        let capacity = capacity.max(0.0);
        Self {
            capacity,
            tokens: capacity,
            refill_rate,
            last_refill: now,
        }
    }

    /// Refill lazily, then consume `tokens` if available.
    pub fn consume(&mut self, tokens: f64) -> bool {
        self.consume_at(tokens, unix_now())
    }

    pub fn consume_at(&mut self, tokens: f64, now: f64) -> bool {
        self.refill_at(now);

        if self.tokens + TOKEN_EPSILON >= tokens {
            self.tokens = (self.tokens - tokens).max(0.0);
            true
        } else {
            false
        }
    }

    /// Seconds until `tokens` would be available, zero if they already are.
    /// A non-positive refill rate yields an infinite wait.
    pub fn wait_time_for_tokens(&mut self, tokens: f64) -> f64 {
        self.wait_time_for_tokens_at(tokens, unix_now())
    }

    pub fn wait_time_for_tokens_at(&mut self, tokens: f64, now: f64) -> f64 {
        self.refill_at(now);

        if self.tokens + TOKEN_EPSILON >= tokens {
            return 0.0;
        }
        if self.refill_rate <= 0.0 {
            return f64::INFINITY;
        }

        let missing = tokens - self.tokens;
        let seconds = missing / self.refill_rate;
        // round to millisecond precision so waits are stable across platforms
        (seconds * 1000.0).round() / 1000.0
    }

    pub fn available_tokens(&mut self) -> f64 {
        self.available_tokens_at(unix_now())
    }

    pub fn available_tokens_at(&mut self, now: f64) -> f64 {
        self.refill_at(now);
        if self.tokens < TOKEN_EPSILON {
            0.0
        } else {
            self.tokens
        }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    fn refill_at(&mut self, now: f64) {
        let elapsed = (now - self.last_refill).max(0.0);
        if elapsed > 0.0 {
            self.tokens = (self.tokens + self.refill_rate * elapsed).min(self.capacity);
            self.last_refill = now;
        }
    }
}
