use analysis_core::{AnalysisError, ProviderPayloads};
use anyhow::Context;
use chrono::Utc;
use dashmap::DashMap;
use fundamental_analysis::{
    AggregatorConfig, AssumptionCalculator, AssumptionPolicy, FundamentalsAggregator,
};
use ml_client::{HttpModelResolver, ModelResolverConfig};
use polygon_client::PolygonClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use ticker_resolver::{
    ExchangeTables, Resolution, ResolutionSource, ResolverConfig, ScoringVerifier, TickerResolver,
};

pub mod report;
pub mod sessions;

pub use report::{SyncOutcome, SyncReport, ValuationSnapshot};
pub use sessions::SessionStore;

/// Session used for requests that do not name one
pub const BATCH_SESSION: &str = "batch";

/// One ticker to sync, with its already-fetched provider payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub ticker: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub current_price: f64,
    #[serde(default)]
    pub payloads: ProviderPayloads,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub strict: bool,
    pub required_years: usize,
    pub max_years: usize,
    pub required_return: f64,
    pub strategy_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strict: true,
            required_years: 30,
            max_years: 30,
            required_return: 10.0,
            strategy_timeout: Duration::from_millis(5000),
        }
    }
}

impl PipelineConfig {
    pub fn policy(&self) -> AssumptionPolicy {
        let mut policy = if self.strict {
            AssumptionPolicy::strict(self.required_years)
        } else {
            AssumptionPolicy::lenient()
        };
        policy.required_return = self.required_return;
        policy
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            max_years: self.max_years,
            ..AggregatorConfig::default()
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            strategy_timeout: self.strategy_timeout,
            ..ResolverConfig::default()
        }
    }
}

/// Resolve -> aggregate -> derive for batches of tickers.
pub struct ValuationPipeline {
    resolver: TickerResolver,
    aggregator: FundamentalsAggregator,
    calculator: AssumptionCalculator,
    sessions: SessionStore,
    /// Latest snapshot per qualified ticker
    snapshots: DashMap<String, ValuationSnapshot>,
    strict: bool,
}

impl ValuationPipeline {
    pub fn new(config: &PipelineConfig, resolver: TickerResolver) -> Self {
        Self {
            resolver: resolver.with_config(config.resolver_config()),
            aggregator: FundamentalsAggregator::new(config.aggregator_config()),
            calculator: AssumptionCalculator::new(config.policy()),
            sessions: SessionStore::new(),
            snapshots: DashMap::new(),
            strict: config.strict,
        }
    }

    /// Pipeline whose resolver uses Polygon verification and the model
    /// service when `POLYGON_API_KEY` / `ML_TICKER_RESOLVER_URL` are set.
    pub fn with_env_strategies(config: &PipelineConfig) -> anyhow::Result<Self> {
        let tables = Arc::new(ExchangeTables::standard());
        let mut resolver = TickerResolver::new(tables.clone());

        match PolygonClient::from_env() {
            Some(polygon) => {
                tracing::info!("Profile verification enabled (Polygon)");
                resolver = resolver.with_verifier(Arc::new(ScoringVerifier::new(polygon, tables)));
            }
            None => tracing::info!("POLYGON_API_KEY not set, profile verification disabled"),
        }

        match ModelResolverConfig::from_env() {
            Some(model_config) => {
                let model_config = model_config.with_timeout(config.strategy_timeout);
                let model = HttpModelResolver::from_config(&model_config)
                    .context("Failed to build model resolver client")?;
                tracing::info!("Model-assisted resolution enabled ({})", model_config.url);
                resolver = resolver.with_model(Arc::new(model));
            }
            None => tracing::info!("ML_TICKER_RESOLVER_URL not set, model resolution disabled"),
        }

        Ok(Self::new(config, resolver))
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn resolver(&self) -> &TickerResolver {
        &self.resolver
    }

    pub fn latest_snapshot(&self, ticker: &str) -> Option<ValuationSnapshot> {
        self.snapshots.get(ticker).map(|entry| entry.value().clone())
    }

    pub async fn sync_batch(&self, requests: &[SyncRequest]) -> SyncReport {
        let started_at = Utc::now();
        tracing::info!(
            "Starting valuation sync for {} tickers (strict: {})",
            requests.len(),
            self.strict
        );

        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            outcomes.push(self.sync_one(request).await);
        }

        let report = SyncReport::new(self.strict, started_at, outcomes);
        tracing::info!(
            "Valuation sync finished: {} synced, {} need clarification, {} skipped, {} failed",
            report.synced,
            report.needs_clarification,
            report.skipped,
            report.failed
        );
        report
    }

    pub async fn sync_one(&self, request: &SyncRequest) -> SyncOutcome {
        let session_id = request.session_id.as_deref().unwrap_or(BATCH_SESSION);
        let session = self.sessions.snapshot(session_id);

        let resolution = self
            .resolver
            .resolve(&request.ticker, &request.context, &session)
            .await;

        let (ticker, source) = match resolution {
            Resolution::Resolved { ticker, source, .. } => (ticker, source),
            Resolution::NeedsClarification(clarification) => {
                let err = AnalysisError::AmbiguityUnresolved(clarification.root.clone());
                tracing::warn!("Skipping {}: {}", request.ticker, err);
                return SyncOutcome::NeedsClarification {
                    request: clarification,
                };
            }
        };

        if !matches!(source, ResolutionSource::Auto | ResolutionSource::Session) {
            self.sessions.record(session_id, &ticker.symbol, &ticker);
        }

        let label = ticker.qualified();
        let derived = self
            .aggregator
            .aggregate_with_stats(&request.payloads)
            .and_then(|(records, stats)| {
                let revenue = self.aggregator.revenue_series(&request.payloads);
                self.calculator
                    .derive(&records, request.current_price, &revenue)
                    .map(|assumptions| (records, assumptions, stats))
            });

        let (records, assumptions, stats) = match derived {
            Ok(derived) => derived,
            Err(e) if e.is_skip() => {
                tracing::warn!("Skipping {}: {}", label, e);
                return SyncOutcome::Skipped {
                    ticker: label,
                    reason: e.to_string(),
                };
            }
            Err(e) => {
                tracing::warn!("Sync failed for {}: {}", label, e);
                return SyncOutcome::Failed {
                    ticker: label,
                    error: e.to_string(),
                };
            }
        };

        let snapshot = ValuationSnapshot {
            ticker,
            records,
            assumptions,
            strict: self.strict,
            generated_at: Utc::now(),
            is_current: true,
        };
        if let Some(previous) = self.publish(snapshot.clone()) {
            tracing::debug!(
                "Superseded snapshot for {} from {}",
                label,
                previous.generated_at
            );
        }

        tracing::info!(
            "Synced {} ({} years, source: {})",
            label,
            snapshot.records.len(),
            source.as_str()
        );

        SyncOutcome::Synced {
            snapshot,
            source,
            stats,
        }
    }

    /// Store `snapshot` as current; the one it replaces comes back flagged not current.
    pub fn publish(&self, snapshot: ValuationSnapshot) -> Option<ValuationSnapshot> {
        let key = snapshot.ticker.qualified();
        self.snapshots.insert(key, snapshot).map(|mut previous| {
            previous.is_current = false;
            previous
        })
    }
}
