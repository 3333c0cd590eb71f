use crate::config::BackoffStrategy;

/// Advisory delay in seconds before retrying after `failures` consecutive
/// failures, clamped to `max_seconds`. Zero failures means no delay.
pub fn backoff_delay(
    strategy: &BackoffStrategy,
    base: f64,
    max_seconds: f64,
    failures: u32,
) -> f64 {
    if failures == 0 {
        return 0.0;
    }

    let raw = match strategy {
        BackoffStrategy::Linear => f64::from(failures) * base,
        BackoffStrategy::Exponential => base.powi(failures as i32),
        BackoffStrategy::Fibonacci => fibonacci(failures) * base,
        BackoffStrategy::Custom(schedule) => schedule
            .get((failures - 1) as usize)
            .or_else(|| schedule.last())
            .copied()
            .unwrap_or(0.0),
    };

    raw.min(max_seconds)
}

// fib(1) = fib(2) = 1; f64 keeps large failure counts from overflowing
fn fibonacci(n: u32) -> f64 {
    let (mut a, mut b) = (0.0_f64, 1.0_f64);
    for _ in 0..n {
        let next = a + b;
        a = b;
        b = next;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_failures_no_delay() {
        for strategy in [
            BackoffStrategy::Linear,
            BackoffStrategy::Exponential,
            BackoffStrategy::Fibonacci,
            BackoffStrategy::Custom(vec![5.0]),
        ] {
            assert_eq!(backoff_delay(&strategy, 2.0, 300.0, 0), 0.0);
        }
    }

    #[test]
    fn test_exponential_growth_and_clamp() {
        let strategy = BackoffStrategy::Exponential;
        assert_eq!(backoff_delay(&strategy, 2.0, 300.0, 1), 2.0);
        assert_eq!(backoff_delay(&strategy, 2.0, 300.0, 2), 4.0);
        assert_eq!(backoff_delay(&strategy, 2.0, 300.0, 5), 32.0);
        // 2^10 = 1024, clamped
        assert_eq!(backoff_delay(&strategy, 2.0, 300.0, 10), 300.0);
    }

    #[test]
    fn test_linear_schedule() {
        let strategy = BackoffStrategy::Linear;
        assert_eq!(backoff_delay(&strategy, 1.5, 300.0, 1), 1.5);
        assert_eq!(backoff_delay(&strategy, 1.5, 300.0, 4), 6.0);
    }

    #[test]
    fn test_fibonacci_schedule() {
        let strategy = BackoffStrategy::Fibonacci;
        let delays: Vec<f64> = (1..=6)
            .map(|f| backoff_delay(&strategy, 2.0, 300.0, f))
            .collect();
        assert_eq!(delays, vec![2.0, 2.0, 4.0, 6.0, 10.0, 16.0]);
    }

    #[test]
    fn test_custom_schedule_saturates() {
        let strategy = BackoffStrategy::Custom(vec![1.0, 5.0, 30.0]);
        assert_eq!(backoff_delay(&strategy, 2.0, 300.0, 1), 1.0);
        assert_eq!(backoff_delay(&strategy, 2.0, 300.0, 3), 30.0);
        // beyond the schedule, the last entry repeats
        assert_eq!(backoff_delay(&strategy, 2.0, 300.0, 9), 30.0);
    }

    #[test]
    fn test_huge_failure_counts_stay_clamped() {
        let strategy = BackoffStrategy::Exponential;
        assert_eq!(backoff_delay(&strategy, 2.0, 300.0, 10_000), 300.0);
    }
}
