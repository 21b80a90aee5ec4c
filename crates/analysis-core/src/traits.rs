use async_trait::async_trait;
use crate::{AmbiguityCandidate, AnalysisError, CanonicalTicker, CompanyProfile, ModelResolution, ScoredCandidate};

/// Source of company profiles used to verify ambiguous listings
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn profile(&self, ticker: &CanonicalTicker) -> Result<Option<CompanyProfile>, AnalysisError>;
}

/// Strategy that scores candidate listings against free-text context
#[async_trait]
pub trait VerificationStrategy: Send + Sync {
    async fn score(
        &self,
        candidates: &[AmbiguityCandidate],
        context: &str,
    ) -> Result<Option<ScoredCandidate>, AnalysisError>;
}

/// Language-model-backed resolver for ambiguous listings
#[async_trait]
pub trait ModelResolver: Send + Sync {
    async fn resolve(
        &self,
        candidates: &[AmbiguityCandidate],
        context: &str,
    ) -> Result<Option<ModelResolution>, AnalysisError>;
}
