use analysis_core::{AmbiguityCandidate, ModelResolution};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MLError, MLResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CandidatePayload<'a> {
    symbol: String,
    company_name: &'a str,
    exchange: &'a str,
    country: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ResolveRequest<'a> {
    candidates: Vec<CandidatePayload<'a>>,
    context: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveResponse {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl ResolveResponse {
    /// A usable answer needs a non-empty symbol and a confidence
    pub fn into_resolution(self) -> Option<ModelResolution> {
        let symbol = self.symbol.filter(|s| !s.trim().is_empty())?;
        Some(ModelResolution {
            symbol: symbol.trim().to_string(),
            confidence: self.confidence?,
        })
    }
}

#[derive(Clone)]
pub struct TickerResolutionClient {
    client: reqwest::Client,
    base_url: String,
}

impl TickerResolutionClient {
    pub fn new(base_url: String, timeout: Duration) -> MLResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    /// Ask the service which candidate listing the context refers to
    pub async fn resolve_ticker(
        &self,
        candidates: &[AmbiguityCandidate],
        context: &str,
    ) -> MLResult<Option<ModelResolution>> {
        let request = build_request(candidates, context);

        let response = self
            .client
            .post(format!("{}/resolve-ticker", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MLError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        parse_response(&body)
    }
}

fn build_request<'a>(candidates: &'a [AmbiguityCandidate], context: &'a str) -> ResolveRequest<'a> {
    ResolveRequest {
        candidates: candidates
            .iter()
            .map(|c| CandidatePayload {
                symbol: c.normalized_symbol.qualified(),
                company_name: &c.company_name,
                exchange: &c.exchange,
                country: &c.country,
            })
            .collect(),
        context,
    }
}

/// The service answers `null` when it cannot decide
fn parse_response(body: &str) -> MLResult<Option<ModelResolution>> {
    let parsed: Option<ResolveResponse> = serde_json::from_str(body)?;
    Ok(parsed.and_then(ResolveResponse::into_resolution))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_qualified_symbols() {
        let candidates = vec![
            AmbiguityCandidate::new("TSX", "TELUS Corporation", "Canada", "T.TO"),
            AmbiguityCandidate::new("NYSE", "AT&T Inc.", "USA", "T"),
        ];
        let value = serde_json::to_value(build_request(&candidates, "telecom dividend")).unwrap();

        assert_eq!(value["context"], "telecom dividend");
        assert_eq!(value["candidates"][0]["symbol"], "T.TO");
        assert_eq!(value["candidates"][0]["companyName"], "TELUS Corporation");
        assert_eq!(value["candidates"][1]["country"], "USA");
    }

    #[test]
    fn parses_answers() {
        let answer = parse_response(r#"{"symbol": "T.TO", "confidence": 0.82}"#)
            .unwrap()
            .unwrap();
        assert_eq!(answer.symbol, "T.TO");
        assert_eq!(answer.confidence, 0.82);

        assert!(parse_response("null").unwrap().is_none());
        assert!(parse_response(r#"{"symbol": null}"#).unwrap().is_none());
        assert!(parse_response(r#"{"symbol": "T"}"#).unwrap().is_none());
        assert!(matches!(
            parse_response("not json"),
            Err(MLError::Serialization(_))
        ));
    }
}
