use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid limiter configuration, surfaced synchronously at registration.
    #[error("invalid configuration for api '{api}': {reason}")]
    Configuration { api: String, reason: String },

    /// Duplicate registration under an already-used API name.
    #[error("api '{0}' is already registered")]
    AlreadyRegistered(String),

    /// Daily quota exhausted. `retry_after` is the Unix timestamp of the
    /// next quota reset; `wait_secs` is the time remaining until then.
    #[error("daily quota exhausted for api '{api}', retry in {wait_secs:.0}s")]
    QuotaExceeded {
        api: String,
        wait_secs: f64,
        retry_after: f64,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stats serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
