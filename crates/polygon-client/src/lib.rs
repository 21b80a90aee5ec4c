use analysis_core::{AnalysisError, CanonicalTicker, CompanyProfile, Exchange, ProfileSource};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const BASE_URL: &str = "https://api.polygon.io";
const MAX_ATTEMPTS: u32 = 3;
const RETRY_WAIT: Duration = Duration::from_secs(15);

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait for the oldest request to leave the window
            let Some(&oldest) = ts.front() else {
                continue;
            };
            let sleep_dur = (oldest + self.window).duration_since(now) + Duration::from_millis(50);
            drop(ts);
            tracing::debug!(
                "Rate limiter: waiting {:.1}s for Polygon API slot",
                sleep_dur.as_secs_f64()
            );
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Polygon reference-data client used to verify ambiguous listings.
#[derive(Clone)]
pub struct PolygonClient {
    api_key: String,
    base_url: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl PolygonClient {
    pub fn new(api_key: String) -> Self {
        // Free tier users should set POLYGON_RATE_LIMIT=5.
        let rate_limit: usize = std::env::var("POLYGON_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);

        Self::with_rate_limit(api_key, rate_limit)
    }

    pub fn with_rate_limit(api_key: String, requests_per_minute: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            base_url: BASE_URL.to_string(),
            client,
            rate_limiter: RateLimiter::new(requests_per_minute, Duration::from_secs(60)),
        }
    }

    /// Client from `POLYGON_API_KEY`, or `None` when the key is unset.
    pub fn from_env() -> Option<Self> {
        std::env::var("POLYGON_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(Self::new)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AnalysisError> {
        let request = builder
            .build()
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        for attempt in 0..MAX_ATTEMPTS {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| AnalysisError::ApiError("Cannot clone request".to_string()))?;
            let response = self
                .client
                .execute(req_clone)
                .await
                .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            tracing::warn!(
                "Polygon 429 rate limited, waiting {}s before retry {}/{}",
                RETRY_WAIT.as_secs(),
                attempt + 1,
                MAX_ATTEMPTS
            );
            tokio::time::sleep(RETRY_WAIT).await;
        }

        Err(AnalysisError::ApiError(format!(
            "Rate limited by Polygon after {} retries",
            MAX_ATTEMPTS
        )))
    }

    /// Reference details for a US symbol; `None` when Polygon does not know it.
    pub async fn get_ticker_details(
        &self,
        symbol: &str,
    ) -> Result<Option<TickerDetails>, AnalysisError> {
        let url = format!("{}/v3/reference/tickers/{}", self.base_url, symbol);

        let response = self
            .send_request(self.client.get(&url).query(&[("apiKey", &self.api_key)]))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(AnalysisError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let details_response: TickerDetailsResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        Ok(details_response.results)
    }
}

#[async_trait]
impl ProfileSource for PolygonClient {
    async fn profile(
        &self,
        ticker: &CanonicalTicker,
    ) -> Result<Option<CompanyProfile>, AnalysisError> {
        // Reference data only covers US listings
        if ticker.exchange() != Exchange::Us {
            tracing::debug!("No Polygon coverage for {}", ticker);
            return Ok(None);
        }

        Ok(self
            .get_ticker_details(&ticker.symbol)
            .await?
            .map(TickerDetails::into_profile))
    }
}

#[derive(Debug, Deserialize)]
struct TickerDetailsResponse {
    #[serde(default)]
    results: Option<TickerDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerDetails {
    pub ticker: String,
    pub name: String,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub primary_exchange: Option<String>,
    #[serde(default)]
    pub currency_name: Option<String>,
    #[serde(default)]
    pub active: bool,
}

impl TickerDetails {
    pub fn into_profile(self) -> CompanyProfile {
        CompanyProfile {
            country: self.locale.as_deref().map(country_name),
            exchange: self.primary_exchange.as_deref().map(exchange_name),
            symbol: self.ticker,
            company_name: self.name,
        }
    }
}

/// Country name for a Polygon locale code
pub fn country_name(locale: &str) -> String {
    match locale.trim().to_ascii_lowercase().as_str() {
        "us" => "USA".to_string(),
        "ca" => "Canada".to_string(),
        "gb" | "uk" => "United Kingdom".to_string(),
        "fr" => "France".to_string(),
        other => other.to_ascii_uppercase(),
    }
}

/// Display exchange for an ISO 10383 MIC
pub fn exchange_name(mic: &str) -> String {
    match mic.trim().to_ascii_uppercase().as_str() {
        "XNYS" => "NYSE".to_string(),
        "XNAS" => "NASDAQ".to_string(),
        "XASE" => "NYSE American".to_string(),
        "ARCX" => "NYSE Arca".to_string(),
        "BATS" => "Cboe BZX".to_string(),
        "XTSE" => "TSX".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_become_profile() {
        let json = r#"{
            "results": {
                "ticker": "POW",
                "name": "Power REIT",
                "market": "stocks",
                "locale": "us",
                "primary_exchange": "XASE",
                "type": "REIT",
                "active": true,
                "currency_name": "usd"
            },
            "status": "OK"
        }"#;
        let response: TickerDetailsResponse = serde_json::from_str(json).unwrap();
        let profile = response.results.unwrap().into_profile();

        assert_eq!(profile.symbol, "POW");
        assert_eq!(profile.company_name, "Power REIT");
        assert_eq!(profile.country.as_deref(), Some("USA"));
        assert_eq!(profile.exchange.as_deref(), Some("NYSE American"));
    }

    #[test]
    fn missing_results_is_none() {
        let response: TickerDetailsResponse =
            serde_json::from_str(r#"{"status": "NOT_FOUND"}"#).unwrap();
        assert!(response.results.is_none());
    }

    #[test]
    fn unknown_codes_pass_through() {
        assert_eq!(country_name("CA"), "Canada");
        assert_eq!(country_name("de"), "DE");
        assert_eq!(exchange_name("xnys"), "NYSE");
        assert_eq!(exchange_name("XLON"), "XLON");
    }

    #[tokio::test]
    async fn non_us_listing_skips_request() {
        let client = PolygonClient::with_rate_limit("test".to_string(), 5)
            .with_base_url("http://127.0.0.1:9");
        let profile = client
            .profile(&CanonicalTicker::parse("POW.TO"))
            .await
            .unwrap();
        assert!(profile.is_none());
    }

    #[tokio::test]
    async fn rate_limiter_admits_up_to_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(limiter.timestamps.lock().await.len(), 3);
    }
}
