pub mod error;
pub mod provider;
pub mod ticker_resolution;

pub use error::{MLError, MLResult};
pub use provider::HttpModelResolver;
pub use ticker_resolution::TickerResolutionClient;

use std::time::Duration;

/// Configuration for the ticker resolution service
#[derive(Debug, Clone)]
pub struct ModelResolverConfig {
    pub url: String,
    pub timeout: Duration,
}

impl Default for ModelResolverConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("ML_TICKER_RESOLVER_URL")
                .unwrap_or_else(|_| "http://localhost:8005".to_string()),
            timeout: Duration::from_secs(10),
        }
    }
}

impl ModelResolverConfig {
    /// Only configured when `ML_TICKER_RESOLVER_URL` is set.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("ML_TICKER_RESOLVER_URL").ok()?;
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        Some(Self {
            url: url.trim_end_matches('/').to_string(),
            ..Self::default()
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
