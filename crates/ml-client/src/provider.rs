use analysis_core::{AmbiguityCandidate, AnalysisError, ModelResolution, ModelResolver};
use async_trait::async_trait;

use crate::error::MLResult;
use crate::ticker_resolution::TickerResolutionClient;
use crate::ModelResolverConfig;

/// HTTP-backed model resolver that delegates to `TickerResolutionClient`.
pub struct HttpModelResolver {
    client: TickerResolutionClient,
}

impl HttpModelResolver {
    pub fn new(client: TickerResolutionClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &ModelResolverConfig) -> MLResult<Self> {
        let client = TickerResolutionClient::new(config.url.clone(), config.timeout)?;
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &TickerResolutionClient {
        &self.client
    }
}

impl From<TickerResolutionClient> for HttpModelResolver {
    fn from(client: TickerResolutionClient) -> Self {
        Self::new(client)
    }
}

#[async_trait]
impl ModelResolver for HttpModelResolver {
    async fn resolve(
        &self,
        candidates: &[AmbiguityCandidate],
        context: &str,
    ) -> Result<Option<ModelResolution>, AnalysisError> {
        let answer = self.client.resolve_ticker(candidates, context).await?;
        if let Some(answer) = &answer {
            tracing::debug!(
                "Model resolver suggested {} ({:.2})",
                answer.symbol,
                answer.confidence
            );
        }
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn unreachable_service_is_external_error() {
        let config = ModelResolverConfig {
            url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_millis(200),
        };
        let resolver = HttpModelResolver::from_config(&config).unwrap();
        let candidates = vec![AmbiguityCandidate::new("TSX", "TELUS Corporation", "Canada", "T.TO")];

        let err = resolver.resolve(&candidates, "telus").await.unwrap_err();
        assert!(matches!(err, AnalysisError::ExternalStrategy(_)));
    }
}
