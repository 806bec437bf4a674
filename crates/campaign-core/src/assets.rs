//! Asset fetching for exports (images and attached files)
//!
//! [`AssetFetcher`] is the seam the composition engine depends on.
//! [`HttpAssetFetcher`] is the real implementation: `reqwest` for
//! `http(s)://`, the filesystem for `file://` and bare paths. Each attempt
//! is bounded by a timeout; transient failures are retried with
//! exponential backoff. A non-2xx response is an error, never a body.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Why an asset could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("timed out after {timeout_ms} ms fetching {url}")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("transport error fetching {url}: {message}")]
    Transport { url: String, message: String },

    #[error("cannot read local file {path}: {message}")]
    Local { path: String, message: String },

    #[error("empty body for {0}")]
    Empty(String),

    #[error("unsupported asset url: {0}")]
    UnsupportedUrl(String),
}

impl AssetError {
    /// Worth another attempt: timeouts, transport errors, 5xx and 429.
    /// Local file reads are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            AssetError::Status { status, .. } => *status >= 500 || *status == 429,
            AssetError::Timeout { .. } | AssetError::Transport { .. } => true,
            AssetError::Local { .. } | AssetError::Empty(_) | AssetError::UnsupportedUrl(_) => {
                false
            }
        }
    }
}

/// Fetch bounds for a single asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Wall-clock limit for one attempt (milliseconds).
    pub timeout_ms: u64,
    /// Retries after the first attempt (0 = single attempt).
    pub max_retries: u32,
    /// Base delay for exponential backoff between attempts (milliseconds).
    pub backoff_base_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_retries: 2,
            backoff_base_ms: 250,
        }
    }
}

impl FetchConfig {
    /// Defaults overridden by `CAMPAIGN_FETCH_TIMEOUT_MS`,
    /// `CAMPAIGN_FETCH_RETRIES` and `CAMPAIGN_FETCH_BACKOFF_MS`.
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        fn var<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
        }

        let defaults = Self::default();
        Self {
            timeout_ms: var("CAMPAIGN_FETCH_TIMEOUT_MS").unwrap_or(defaults.timeout_ms),
            max_retries: var("CAMPAIGN_FETCH_RETRIES").unwrap_or(defaults.max_retries),
            backoff_base_ms: var("CAMPAIGN_FETCH_BACKOFF_MS").unwrap_or(defaults.backoff_base_ms),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff_base_ms(mut self, backoff_base_ms: u64) -> Self {
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

/// Source of binary assets.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Raw bytes at `url`, or why they could not be obtained.
    async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, AssetError>;
}

/// Run `attempt_fn` under the config's timeout, retrying transient failures
/// with exponential backoff. A timeout is reported like any other failure.
pub async fn fetch_with_retry<F, Fut>(
    config: &FetchConfig,
    url: &str,
    attempt_fn: F,
) -> Result<Vec<u8>, AssetError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Vec<u8>, AssetError>>,
{
    let max_attempts = config.max_retries + 1;
    let limit = Duration::from_millis(config.timeout_ms);

    let mut attempt = 1;
    loop {
        let err = match tokio::time::timeout(limit, attempt_fn()).await {
            Ok(Ok(bytes)) => return Ok(bytes),
            Ok(Err(err)) => err,
            Err(_elapsed) => AssetError::Timeout {
                url: url.to_string(),
                timeout_ms: config.timeout_ms,
            },
        };

        if attempt >= max_attempts || !err.is_retryable() {
            return Err(err);
        }
        let delay = config.backoff(attempt);
        debug!(url = %url, attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying asset fetch");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

// ---------------------------------------------------------------------------
// HttpAssetFetcher
// ---------------------------------------------------------------------------

/// `reqwest`-backed fetcher with filesystem fallback for local paths.
pub struct HttpAssetFetcher {
    config: FetchConfig,
    http_client: reqwest::Client,
}

impl HttpAssetFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, AssetError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("campaign-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AssetError::Transport {
                url: String::new(),
                message: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Create a fetcher from environment variables
    pub fn from_env() -> Result<Self, AssetError> {
        Self::new(FetchConfig::from_env())
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        let bytes = if url.starts_with("http://") || url.starts_with("https://") {
            let response = self
                .http_client
                .get(url)
                .send()
                .await
                .map_err(|e| AssetError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(AssetError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            response
                .bytes()
                .await
                .map_err(|e| AssetError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                })?
                .to_vec()
        } else if url.contains("://") && !url.starts_with("file://") {
            return Err(AssetError::UnsupportedUrl(url.to_string()));
        } else {
            let path = url.strip_prefix("file://").unwrap_or(url);
            tokio::fs::read(path).await.map_err(|e| AssetError::Local {
                path: path.to_string(),
                message: e.to_string(),
            })?
        };

        if bytes.is_empty() {
            return Err(AssetError::Empty(url.to_string()));
        }
        Ok(bytes)
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        let result = fetch_with_retry(&self.config, url, || self.fetch_once(url)).await;
        if let Err(err) = &result {
            warn!(url = %url, error = %err, "asset fetch failed");
        }
        result
    }
}

// ---------------------------------------------------------------------------
// MemoryAssetFetcher
// ---------------------------------------------------------------------------

/// In-memory fetcher for tests and dry runs. Unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct MemoryAssetFetcher {
    assets: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryAssetFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, bytes: Vec<u8>) {
        self.assets.lock().unwrap().insert(url.into(), bytes);
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetFetcher for MemoryAssetFetcher {
    async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.assets
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AssetError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}
