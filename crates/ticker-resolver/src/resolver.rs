use analysis_core::{
    AmbiguityCandidate, CanonicalTicker, ModelResolver, VerificationStrategy,
};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::canonicalizer::TickerCanonicalizer;
use crate::session::SessionMemory;
use crate::tables::ExchangeTables;
use crate::text::contains_phrase;

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Upper bound on each verification or model call
    pub strategy_timeout: Duration,
    /// Model answers below this confidence are ignored
    pub min_model_confidence: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            strategy_timeout: Duration::from_millis(5000),
            min_model_confidence: 0.0,
        }
    }
}

/// Which step of the resolution chain produced the listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionSource {
    Auto,
    Session,
    Geography,
    CompanyName,
    Verification,
    Model,
}

impl ResolutionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionSource::Auto => "auto",
            ResolutionSource::Session => "session",
            ResolutionSource::Geography => "geography",
            ResolutionSource::CompanyName => "company-name",
            ResolutionSource::Verification => "verification",
            ResolutionSource::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationRequest {
    pub root: String,
    pub candidates: Vec<AmbiguityCandidate>,
    pub question: String,
}

impl ClarificationRequest {
    /// Interpret the user's reply: a 1-based option number, a qualified
    /// symbol, or a fragment that names exactly one candidate.
    pub fn match_answer(&self, reply: &str) -> Option<&AmbiguityCandidate> {
        let reply = reply.trim();
        if reply.is_empty() {
            return None;
        }

        if let Ok(index) = reply.trim_end_matches('.').parse::<usize>() {
            return index.checked_sub(1).and_then(|i| self.candidates.get(i));
        }

        if let Some(candidate) = self
            .candidates
            .iter()
            .find(|c| c.normalized_symbol.matches(reply))
        {
            return Some(candidate);
        }

        let lowered = reply.to_lowercase();
        let mut matching = self.candidates.iter().filter(|c| {
            let name = c.company_name.to_lowercase();
            name == lowered
                || contains_phrase(&lowered, &name)
                || contains_phrase(&name, &lowered)
                || contains_phrase(&lowered, &c.country.to_lowercase())
                || contains_phrase(&lowered, &c.exchange.to_lowercase())
        });
        let first = matching.next()?;
        matching.next().is_none().then_some(first)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Resolved {
        ticker: CanonicalTicker,
        source: ResolutionSource,
        confidence: f64,
    },
    NeedsClarification(ClarificationRequest),
}

impl Resolution {
    pub fn ticker(&self) -> Option<&CanonicalTicker> {
        match self {
            Resolution::Resolved { ticker, .. } => Some(ticker),
            Resolution::NeedsClarification(_) => None,
        }
    }

    pub fn source(&self) -> Option<ResolutionSource> {
        match self {
            Resolution::Resolved { source, .. } => Some(*source),
            Resolution::NeedsClarification(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }

    fn resolved(ticker: CanonicalTicker, source: ResolutionSource, confidence: f64) -> Self {
        Resolution::Resolved {
            ticker,
            source,
            confidence,
        }
    }
}

/// Turns a raw symbol plus conversation context into a single listing,
/// or a clarification request when the listing cannot be decided.
pub struct TickerResolver {
    canonicalizer: TickerCanonicalizer,
    verifier: Option<Arc<dyn VerificationStrategy>>,
    model: Option<Arc<dyn ModelResolver>>,
    config: ResolverConfig,
}

impl Default for TickerResolver {
    fn default() -> Self {
        Self::new(Arc::new(ExchangeTables::standard()))
    }
}

impl TickerResolver {
    pub fn new(tables: Arc<ExchangeTables>) -> Self {
        Self {
            canonicalizer: TickerCanonicalizer::new(tables),
            verifier: None,
            model: None,
            config: ResolverConfig::default(),
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn VerificationStrategy>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_model(mut self, model: Arc<dyn ModelResolver>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn canonicalizer(&self) -> &TickerCanonicalizer {
        &self.canonicalizer
    }

    pub async fn resolve(&self, raw: &str, context: &str, session: &SessionMemory) -> Resolution {
        let symbol = raw.trim().to_ascii_uppercase();

        if symbol.is_empty() || symbol.contains('.') {
            return Resolution::resolved(
                self.canonicalizer.canonicalize(raw, context),
                ResolutionSource::Auto,
                1.0,
            );
        }

        let Some(candidates) = self.canonicalizer.detect_ambiguity(&symbol) else {
            return Resolution::resolved(
                self.canonicalizer.canonicalize(&symbol, context),
                ResolutionSource::Auto,
                1.0,
            );
        };

        if let Some(preferred) = session.preference(&symbol) {
            debug!("Session preference {} -> {}", symbol, preferred);
            return Resolution::resolved(preferred.clone(), ResolutionSource::Session, 1.0);
        }

        if let Some(candidate) = self.by_geography(candidates, context) {
            info!("{} resolved by geography to {}", symbol, candidate.normalized_symbol);
            return Resolution::resolved(
                candidate.normalized_symbol.clone(),
                ResolutionSource::Geography,
                0.9,
            );
        }

        if let Some(candidate) = self.by_company_name(candidates, context) {
            info!("{} resolved by company name to {}", symbol, candidate.normalized_symbol);
            return Resolution::resolved(
                candidate.normalized_symbol.clone(),
                ResolutionSource::CompanyName,
                0.9,
            );
        }

        if let Some((candidate, confidence)) = self.by_verification(candidates, context).await {
            info!("{} resolved by verification to {}", symbol, candidate.normalized_symbol);
            return Resolution::resolved(
                candidate.normalized_symbol,
                ResolutionSource::Verification,
                confidence,
            );
        }

        if let Some((candidate, confidence)) = self.by_model(candidates, context).await {
            info!("{} resolved by model to {}", symbol, candidate.normalized_symbol);
            return Resolution::resolved(
                candidate.normalized_symbol.clone(),
                ResolutionSource::Model,
                confidence,
            );
        }

        info!("{} is ambiguous, asking for clarification", symbol);
        Resolution::NeedsClarification(ClarificationRequest {
            question: clarification_question(&symbol, candidates, session.user_name()),
            root: symbol,
            candidates: candidates.to_vec(),
        })
    }

    /// Exactly one candidate trades in the geography named by the context
    fn by_geography<'a>(
        &self,
        candidates: &'a [AmbiguityCandidate],
        context: &str,
    ) -> Option<&'a AmbiguityCandidate> {
        let geography = self.canonicalizer.extract_geography(context)?;
        single(candidates.iter().filter(|c| {
            c.normalized_symbol.exchange().geography() == Some(geography)
        }))
    }

    /// First hint phrase found in the context that points at a candidate
    fn by_company_name<'a>(
        &self,
        candidates: &'a [AmbiguityCandidate],
        context: &str,
    ) -> Option<&'a AmbiguityCandidate> {
        let lowered = context.to_lowercase();
        if lowered.trim().is_empty() {
            return None;
        }
        self.canonicalizer
            .tables()
            .company_hints()
            .filter(|(phrase, _)| contains_phrase(&lowered, phrase))
            .find_map(|(_, ticker)| candidates.iter().find(|c| &c.normalized_symbol == ticker))
    }

    async fn by_verification(
        &self,
        candidates: &[AmbiguityCandidate],
        context: &str,
    ) -> Option<(AmbiguityCandidate, f64)> {
        let verifier = self.verifier.as_ref()?;
        let outcome =
            tokio::time::timeout(self.config.strategy_timeout, verifier.score(candidates, context))
                .await;

        match outcome {
            Ok(Ok(Some(scored))) => {
                let known = candidates
                    .iter()
                    .any(|c| c.normalized_symbol == scored.candidate.normalized_symbol);
                if !known || !scored.confidence.is_finite() {
                    warn!(
                        "Verification returned an unknown listing {}",
                        scored.candidate.normalized_symbol
                    );
                    return None;
                }
                Some((scored.candidate, scored.confidence.clamp(0.0, 1.0)))
            }
            Ok(Ok(None)) => {
                debug!("Verification inconclusive");
                None
            }
            Ok(Err(e)) => {
                warn!("Verification failed: {}", e);
                None
            }
            Err(_) => {
                warn!(
                    "Verification timed out after {:?}",
                    self.config.strategy_timeout
                );
                None
            }
        }
    }

    async fn by_model<'a>(
        &self,
        candidates: &'a [AmbiguityCandidate],
        context: &str,
    ) -> Option<(&'a AmbiguityCandidate, f64)> {
        let model = self.model.as_ref()?;
        let outcome =
            tokio::time::timeout(self.config.strategy_timeout, model.resolve(candidates, context))
                .await;

        let answer = match outcome {
            Ok(Ok(Some(answer))) => answer,
            Ok(Ok(None)) => {
                debug!("Model resolver had no answer");
                return None;
            }
            Ok(Err(e)) => {
                warn!("Model resolver failed: {}", e);
                return None;
            }
            Err(_) => {
                warn!(
                    "Model resolver timed out after {:?}",
                    self.config.strategy_timeout
                );
                return None;
            }
        };

        let Some(candidate) = candidates
            .iter()
            .find(|c| c.normalized_symbol.matches(&answer.symbol))
        else {
            warn!("Model resolver picked unknown listing {}", answer.symbol);
            return None;
        };

        if !answer.confidence.is_finite() || answer.confidence < self.config.min_model_confidence {
            warn!(
                "Model resolver confidence {} rejected for {}",
                answer.confidence, answer.symbol
            );
            return None;
        }

        Some((candidate, answer.confidence.clamp(0.0, 1.0)))
    }
}

fn single<'a, I>(mut iter: I) -> Option<&'a AmbiguityCandidate>
where
    I: Iterator<Item = &'a AmbiguityCandidate>,
{
    let first = iter.next()?;
    iter.next().is_none().then_some(first)
}

/// Numbered list of the candidate listings, addressed to the user when known.
pub fn clarification_question(
    root: &str,
    candidates: &[AmbiguityCandidate],
    user_name: Option<&str>,
) -> String {
    let mut question = String::new();
    if let Some(name) = user_name {
        let _ = write!(question, "{name}, ");
    }
    let _ = writeln!(
        question,
        "I found several companies trading under the ticker \"{root}\":\n"
    );

    for (i, candidate) in candidates.iter().enumerate() {
        let _ = writeln!(
            question,
            "{}. **{}** ({}) - {}",
            i + 1,
            candidate.company_name,
            candidate.country,
            candidate.exchange
        );
        let _ = writeln!(question, "   Ticker: {}\n", candidate.normalized_symbol);
    }

    question.push_str("Which one would you like to analyze?");

    let symbols: Vec<String> = candidates
        .iter()
        .map(|c| format!("\"{}\"", c.normalized_symbol))
        .collect();
    if !symbols.is_empty() {
        let _ = write!(
            question,
            "\n\nTip: type {} directly to skip this question next time.",
            symbols.join(" or ")
        );
    }

    question
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{AnalysisError, ModelResolution, ScoredCandidate};
    use approx::assert_relative_eq;
    use async_trait::async_trait;

    struct FixedModel(Option<ModelResolution>);

    #[async_trait]
    impl ModelResolver for FixedModel {
        async fn resolve(
            &self,
            _candidates: &[AmbiguityCandidate],
            _context: &str,
        ) -> Result<Option<ModelResolution>, AnalysisError> {
            Ok(self.0.clone())
        }
    }

    struct SlowVerifier;

    #[async_trait]
    impl VerificationStrategy for SlowVerifier {
        async fn score(
            &self,
            candidates: &[AmbiguityCandidate],
            _context: &str,
        ) -> Result<Option<ScoredCandidate>, AnalysisError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Some(ScoredCandidate {
                candidate: candidates[0].clone(),
                score: 100,
                confidence: 0.95,
            }))
        }
    }

    struct FixedVerifier {
        symbol: &'static str,
        confidence: f64,
    }

    #[async_trait]
    impl VerificationStrategy for FixedVerifier {
        async fn score(
            &self,
            _candidates: &[AmbiguityCandidate],
            _context: &str,
        ) -> Result<Option<ScoredCandidate>, AnalysisError> {
            Ok(Some(ScoredCandidate {
                candidate: AmbiguityCandidate::new(
                    "TSX",
                    "Power Corporation of Canada",
                    "Canada",
                    self.symbol,
                ),
                score: 60,
                confidence: self.confidence,
            }))
        }
    }

    struct BrokenVerifier;

    #[async_trait]
    impl VerificationStrategy for BrokenVerifier {
        async fn score(
            &self,
            _candidates: &[AmbiguityCandidate],
            _context: &str,
        ) -> Result<Option<ScoredCandidate>, AnalysisError> {
            Err(AnalysisError::ExternalStrategy("profile service down".to_string()))
        }
    }

    fn qualified(resolution: &Resolution) -> Option<String> {
        resolution.ticker().map(CanonicalTicker::qualified)
    }

    #[tokio::test]
    async fn company_name_picks_telus() {
        let resolver = TickerResolver::default();
        let resolution = resolver
            .resolve("T", "L'action de Telus baisse de 4%", &SessionMemory::new())
            .await;

        assert_eq!(qualified(&resolution).as_deref(), Some("T.TO"));
        assert_eq!(resolution.source(), Some(ResolutionSource::CompanyName));
    }

    #[tokio::test]
    async fn company_name_picks_att() {
        let resolver = TickerResolver::default();
        let resolution = resolver
            .resolve("T", "Analyse AT&T", &SessionMemory::new())
            .await;

        assert_eq!(qualified(&resolution).as_deref(), Some("T"));
        assert_eq!(resolution.source(), Some(ResolutionSource::CompanyName));
    }

    #[tokio::test]
    async fn geography_picks_tsx_listing() {
        let resolver = TickerResolver::default();
        let resolution = resolver
            .resolve("pow", "les actions de Montréal", &SessionMemory::new())
            .await;

        assert_eq!(qualified(&resolution).as_deref(), Some("POW.TO"));
        assert_eq!(resolution.source(), Some(ResolutionSource::Geography));
    }

    #[tokio::test]
    async fn geography_without_matching_listing_falls_through() {
        let resolver = TickerResolver::default();
        let resolution = resolver
            .resolve("POW", "bought it in London", &SessionMemory::new())
            .await;

        assert!(!resolution.is_resolved());
    }

    #[tokio::test]
    async fn empty_context_asks_for_clarification() {
        let resolver = TickerResolver::default();
        let session = SessionMemory::new().with_user_name("Sam");
        let Resolution::NeedsClarification(request) = resolver.resolve("POW", "", &session).await
        else {
            panic!("expected clarification");
        };

        assert_eq!(request.root, "POW");
        assert_eq!(request.candidates.len(), 2);
        assert!(request.question.starts_with("Sam, "));
        assert!(request.question.contains("1. **Power Corporation of Canada** (Canada) - TSX"));
        assert!(request.question.contains("Ticker: POW.TO"));
        assert!(request.question.contains("2. **Power REIT** (USA) - NYSE"));
        assert!(request.question.contains("\"POW.TO\" or \"POW\""));
    }

    #[tokio::test]
    async fn session_preference_beats_context() {
        let resolver = TickerResolver::default();
        let session = SessionMemory::new().with_preference("TD", CanonicalTicker::parse("TD"));

        let resolution = resolver.resolve("td", "Toronto", &session).await;

        assert_eq!(qualified(&resolution).as_deref(), Some("TD"));
        assert_eq!(resolution.source(), Some(ResolutionSource::Session));
    }

    #[tokio::test]
    async fn suffixed_input_is_never_ambiguous() {
        let resolver = TickerResolver::default();
        let resolution = resolver.resolve("pow.to", "", &SessionMemory::new()).await;

        assert_eq!(qualified(&resolution).as_deref(), Some("POW.TO"));
        assert_eq!(resolution.source(), Some(ResolutionSource::Auto));
    }

    #[tokio::test]
    async fn non_ambiguous_symbol_is_canonicalized() {
        let resolver = TickerResolver::default();
        let resolution = resolver.resolve("shop", "", &SessionMemory::new()).await;

        assert_eq!(qualified(&resolution).as_deref(), Some("SHOP.TO"));
        assert_eq!(resolution.source(), Some(ResolutionSource::Auto));
    }

    #[tokio::test]
    async fn model_answer_is_validated() {
        let unknown = TickerResolver::default().with_model(Arc::new(FixedModel(Some(
            ModelResolution {
                symbol: "POW.L".to_string(),
                confidence: 0.9,
            },
        ))));
        assert!(!unknown.resolve("POW", "", &SessionMemory::new()).await.is_resolved());

        let known = TickerResolver::default().with_model(Arc::new(FixedModel(Some(
            ModelResolution {
                symbol: "pow".to_string(),
                confidence: 0.8,
            },
        ))));
        let resolution = known.resolve("POW", "", &SessionMemory::new()).await;
        assert_eq!(qualified(&resolution).as_deref(), Some("POW"));
        assert_eq!(resolution.source(), Some(ResolutionSource::Model));
        if let Resolution::Resolved { confidence, .. } = resolution {
            assert_relative_eq!(confidence, 0.8);
        }
    }

    #[tokio::test]
    async fn low_confidence_model_answer_is_rejected() {
        let resolver = TickerResolver::default()
            .with_config(ResolverConfig {
                min_model_confidence: 0.5,
                ..ResolverConfig::default()
            })
            .with_model(Arc::new(FixedModel(Some(ModelResolution {
                symbol: "POW.TO".to_string(),
                confidence: 0.2,
            }))));

        assert!(!resolver.resolve("POW", "", &SessionMemory::new()).await.is_resolved());
    }

    #[tokio::test]
    async fn slow_verifier_times_out() {
        let resolver = TickerResolver::default()
            .with_config(ResolverConfig {
                strategy_timeout: Duration::from_millis(50),
                ..ResolverConfig::default()
            })
            .with_verifier(Arc::new(SlowVerifier));

        let resolution = resolver.resolve("POW", "", &SessionMemory::new()).await;
        assert!(!resolution.is_resolved());
    }

    #[tokio::test]
    async fn verifier_pick_is_used() {
        let resolver = TickerResolver::default().with_verifier(Arc::new(FixedVerifier {
            symbol: "POW.TO",
            confidence: 0.85,
        }));

        let resolution = resolver.resolve("POW", "", &SessionMemory::new()).await;
        assert_eq!(qualified(&resolution).as_deref(), Some("POW.TO"));
        assert_eq!(resolution.source(), Some(ResolutionSource::Verification));
        let Resolution::Resolved { confidence, .. } = resolution else {
            panic!("expected resolved");
        };
        assert_relative_eq!(confidence, 0.85);
    }

    #[tokio::test]
    async fn verifier_confidence_is_clamped() {
        let resolver = TickerResolver::default().with_verifier(Arc::new(FixedVerifier {
            symbol: "POW.TO",
            confidence: 1.4,
        }));

        let Resolution::Resolved { confidence, source, .. } =
            resolver.resolve("POW", "", &SessionMemory::new()).await
        else {
            panic!("expected resolved");
        };
        assert_eq!(source, ResolutionSource::Verification);
        assert_relative_eq!(confidence, 1.0);
    }

    #[tokio::test]
    async fn verifier_pick_outside_candidates_falls_through() {
        let resolver = TickerResolver::default()
            .with_verifier(Arc::new(FixedVerifier {
                symbol: "POW.L",
                confidence: 0.9,
            }))
            .with_model(Arc::new(FixedModel(Some(ModelResolution {
                symbol: "POW".to_string(),
                confidence: 0.6,
            }))));

        let resolution = resolver.resolve("POW", "", &SessionMemory::new()).await;
        assert_eq!(qualified(&resolution).as_deref(), Some("POW"));
        assert_eq!(resolution.source(), Some(ResolutionSource::Model));

        let alone = TickerResolver::default().with_verifier(Arc::new(FixedVerifier {
            symbol: "POW.L",
            confidence: 0.9,
        }));
        assert!(!alone.resolve("POW", "", &SessionMemory::new()).await.is_resolved());
    }

    #[tokio::test]
    async fn failing_verifier_falls_through_to_model() {
        let resolver = TickerResolver::default()
            .with_verifier(Arc::new(BrokenVerifier))
            .with_model(Arc::new(FixedModel(Some(ModelResolution {
                symbol: "POW.TO".to_string(),
                confidence: 0.7,
            }))));

        let resolution = resolver.resolve("POW", "", &SessionMemory::new()).await;
        assert_eq!(resolution.source(), Some(ResolutionSource::Model));
    }

    #[test]
    fn answers_match_candidates() {
        let tables = ExchangeTables::standard();
        let candidates = tables.candidates("T").unwrap().to_vec();
        let request = ClarificationRequest {
            root: "T".to_string(),
            question: clarification_question("T", &candidates, None),
            candidates,
        };

        let pick = |reply: &str| {
            request
                .match_answer(reply)
                .map(|c| c.normalized_symbol.qualified())
        };

        assert_eq!(pick("2").as_deref(), Some("T"));
        assert_eq!(pick("1.").as_deref(), Some("T.TO"));
        assert_eq!(pick("t.to").as_deref(), Some("T.TO"));
        assert_eq!(pick("telus corporation").as_deref(), Some("T.TO"));
        assert_eq!(pick("the one in Canada").as_deref(), Some("T.TO"));
        assert_eq!(pick("nyse").as_deref(), Some("T"));
        assert_eq!(pick("3"), None);
        assert_eq!(pick("0"), None);
        assert_eq!(pick("whatever"), None);
    }
}
