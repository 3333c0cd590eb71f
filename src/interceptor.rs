use std::future::Future;

use crate::error::Error;
use crate::manager::RateLimitManager;

/// Wrap one outbound API call in the acquire/record contract.
///
/// Admission is awaited first, then `call` runs. A successful result is
/// recorded as a success. An error is recorded as a failure and re-raised
/// unchanged; the caller-supplied `classify` decides whether it counts as a
/// rate-limit error, since only the caller knows its provider's signals.
///
/// The caller's error type converts from [`Error`] so that quota exhaustion
/// surfaces through the same channel as the call's own failures.
pub async fn with_rate_limit<T, E, F, Fut, C>(
    manager: &RateLimitManager,
    api: &str,
    classify: C,
    call: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: FnOnce(&E) -> bool,
    E: From<Error>,
{
    manager.acquire(api, 1, None).await.map_err(E::from)?;

    match call().await {
        Ok(value) => {
            manager.record_success(api);
            Ok(value)
        }
        Err(err) => {
            manager.record_failure(api, classify(&err));
            Err(err)
        }
    }
}
