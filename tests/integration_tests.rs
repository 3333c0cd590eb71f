use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use pacer::{
    with_rate_limit, Error, RateLimitConfig, RateLimitManager, RateLimitStrategy,
};
use tokio_test::assert_ok;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pacer=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs_f64()
}

/// Sleep until shortly after the next epoch-aligned boundary of `window`,
/// so fixed-window tests start with a whole bucket ahead of them.
async fn align_to_window(window: Duration) {
    let w = window.as_secs_f64();
    let now = unix_now();
    let into_bucket = now - (now / w).floor() * w;
    let until_next = w - into_bucket;
    tokio::time::sleep(Duration::from_secs_f64(until_next + 0.05)).await;
}

#[tokio::test]
async fn test_fixed_window_cutoff() {
    init_tracing();
    let manager = RateLimitManager::new();
    let config = RateLimitConfig::new(3, Duration::from_secs(1))
        .with_strategy(RateLimitStrategy::FixedWindow);
    assert_ok!(manager.register_api("feed", config));

    align_to_window(Duration::from_secs(1)).await;

    let start = Instant::now();
    for _ in 0..3 {
        assert!(manager.acquire("feed", 1, None).await.unwrap());
    }
    assert!(start.elapsed() < Duration::from_millis(100));

    // the fourth request in the same bucket waits for the boundary
    let remaining = {
        let now = unix_now();
        (now / 1.0).floor() + 1.0 - now
    };
    let before_fourth = Instant::now();
    assert!(manager.acquire("feed", 1, None).await.unwrap());
    assert!(before_fourth.elapsed().as_secs_f64() >= remaining - 0.05);

    let stats = manager.get_stats("feed").unwrap();
    assert_eq!(stats.stats.total_requests, 4);
    assert_eq!(stats.stats.rate_limited_requests, 1);
}

#[tokio::test]
async fn test_timeout_rejection_charges_nothing() {
    init_tracing();
    let manager = RateLimitManager::new();
    assert_ok!(manager.register_api("feed", RateLimitConfig::new(2, Duration::from_secs(60))));

    assert!(manager.acquire("feed", 1, None).await.unwrap());
    assert!(manager.acquire("feed", 1, None).await.unwrap());
    let before = manager.get_stats("feed").unwrap();

    // the window is full for the next 60s; a 50ms budget cannot cover it
    let admitted = manager
        .acquire("feed", 1, Some(Duration::from_millis(50)))
        .await
        .unwrap();
    assert!(!admitted);

    let after = manager.get_stats("feed").unwrap();
    assert_eq!(after.stats.total_requests, before.stats.total_requests);
    assert_eq!(
        after.stats.rate_limited_requests,
        before.stats.rate_limited_requests
    );
    assert_eq!(after.stats.total_wait_time, before.stats.total_wait_time);
    assert_eq!(after.daily_quota_used, before.daily_quota_used);
    assert_eq!(after.requests_in_window, before.requests_in_window);
}

#[tokio::test]
async fn test_fail_open_never_raises() {
    let manager = RateLimitManager::new();
    for _ in 0..5 {
        assert!(manager.acquire("unregistered", 1, None).await.unwrap());
    }
}

#[tokio::test]
async fn test_duplicate_registration_is_explicit() {
    let manager = RateLimitManager::new();
    manager
        .register_api("summarizer", RateLimitConfig::summarizer())
        .unwrap();

    let err = manager
        .register_api("summarizer", RateLimitConfig::summarizer())
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyRegistered(_)));

    // the explicit replacement path succeeds
    manager
        .replace_api("summarizer", RateLimitConfig::summarizer())
        .unwrap();
}

#[tokio::test]
async fn test_quota_exhaustion_carries_reset_info() {
    let manager = RateLimitManager::new();
    let config = RateLimitConfig::new(1, Duration::from_secs(60)).with_quota_reset_hour(0);
    manager.register_api("summarizer", config).unwrap();

    // daily budget is 1 * 24 = 24 requests
    let err = manager.acquire("summarizer", 100, None).await.unwrap_err();
    match err {
        Error::QuotaExceeded {
            api,
            wait_secs,
            retry_after,
        } => {
            assert_eq!(api, "summarizer");
            assert!(wait_secs > 0.0 && wait_secs <= 86_400.0);
            assert!(retry_after >= unix_now());
        }
        other => panic!("expected QuotaExceeded, got {other:?}"),
    }
}

#[derive(Debug)]
enum PipelineError {
    Provider429,
    Network(&'static str),
    Limiter(Error),
}

impl From<Error> for PipelineError {
    fn from(err: Error) -> Self {
        PipelineError::Limiter(err)
    }
}

#[tokio::test]
async fn test_interceptor_applies_call_site_contract() {
    let manager = RateLimitManager::new();
    manager
        .register_api("chat", RateLimitConfig::notifier())
        .unwrap();
    let classify = |err: &PipelineError| matches!(err, PipelineError::Provider429);

    let posted: Result<&str, PipelineError> =
        with_rate_limit(&manager, "chat", classify, || async { Ok("posted") }).await;
    assert_eq!(posted.unwrap(), "posted");

    let failed: Result<&str, PipelineError> =
        with_rate_limit(&manager, "chat", classify, || async {
            Err(PipelineError::Provider429)
        })
        .await;
    assert!(matches!(failed, Err(PipelineError::Provider429)));

    let dropped: Result<&str, PipelineError> =
        with_rate_limit(&manager, "chat", classify, || async {
            Err(PipelineError::Network("reset by peer"))
        })
        .await;
    assert!(matches!(dropped, Err(PipelineError::Network(_))));

    let stats = manager.get_stats("chat").unwrap();
    assert_eq!(stats.stats.total_requests, 3);
    assert_eq!(stats.stats.successful_requests, 1);
    assert_eq!(stats.consecutive_failures, 2);
    // notifier preset uses linear backoff: 2 failures * base 2.0
    assert_eq!(manager.get_backoff_time("chat"), 4.0);
}

#[tokio::test]
async fn test_export_stats_round_trip() {
    let manager = RateLimitManager::new();
    manager
        .register_api("feed", RateLimitConfig::feed_poller())
        .unwrap();
    manager.acquire("feed", 1, None).await.unwrap();
    manager.record_success("feed");

    let path = std::env::temp_dir().join("pacer_stats_export_test.json");
    manager.export_stats(&path).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(parsed["feed"]["total_requests"], 1);
    assert_eq!(parsed["feed"]["successful_requests"], 1);
    assert_eq!(parsed["feed"]["strategy"], "sliding_window");

    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn test_pipeline_presets_register_together() {
    let manager = RateLimitManager::new();
    manager
        .register_api("feed", RateLimitConfig::feed_poller())
        .unwrap();
    manager
        .register_api("summarizer", RateLimitConfig::summarizer())
        .unwrap();
    manager
        .register_api("chat", RateLimitConfig::notifier())
        .unwrap();

    for api in ["feed", "summarizer", "chat"] {
        assert!(manager.acquire(api, 1, None).await.unwrap());
        manager.record_success(api);
    }

    let all = manager.get_all_stats();
    assert_eq!(all.len(), 3);
    assert!(all.values().all(|s| s.stats.total_requests == 1));
    assert_eq!(all["summarizer"].daily_quota_remaining, Some(479));
}
