use analysis_core::{
    AmbiguityCandidate, AnalysisError, CompanyProfile, ProfileSource, ScoredCandidate,
    VerificationStrategy,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::tables::ExchangeTables;
use crate::text::{contains_phrase, name_words};

const FULL_NAME_POINTS: u32 = 50;
const NAME_WORD_POINTS: u32 = 10;
const COUNTRY_POINTS: u32 = 5;
const EXCHANGE_POINTS: u32 = 5;
const GEOGRAPHY_POINTS: u32 = 10;

/// Scores each candidate's company profile against the context text
pub struct ScoringVerifier<P> {
    source: P,
    tables: Arc<ExchangeTables>,
    min_score: u32,
}

impl<P: ProfileSource> ScoringVerifier<P> {
    pub fn new(source: P, tables: Arc<ExchangeTables>) -> Self {
        Self {
            source,
            tables,
            min_score: 10,
        }
    }

    pub fn with_min_score(mut self, min_score: u32) -> Self {
        self.min_score = min_score;
        self
    }
}

#[async_trait]
impl<P: ProfileSource> VerificationStrategy for ScoringVerifier<P> {
    async fn score(
        &self,
        candidates: &[AmbiguityCandidate],
        context: &str,
    ) -> Result<Option<ScoredCandidate>, AnalysisError> {
        let lowered = context.to_lowercase();
        let mut scores = Vec::with_capacity(candidates.len());
        let mut last_error = None;

        for candidate in candidates {
            let profile = match self.source.profile(&candidate.normalized_symbol).await {
                Ok(Some(profile)) => profile,
                Ok(None) => {
                    debug!(
                        "No profile for {}, scoring listing data",
                        candidate.normalized_symbol
                    );
                    listing_profile(candidate)
                }
                Err(e) => {
                    warn!(
                        "Profile lookup failed for {}: {}",
                        candidate.normalized_symbol, e
                    );
                    last_error = Some(e);
                    continue;
                }
            };

            let score = score_profile(&profile, candidate, &lowered, &self.tables);
            debug!(
                "Verification score {} for {}",
                score, candidate.normalized_symbol
            );
            scores.push((candidate, score));
        }

        if scores.is_empty() {
            return match last_error {
                Some(e) => Err(e),
                None => Ok(None),
            };
        }

        Ok(pick_best(&scores, self.min_score))
    }
}

/// Stand-in profile built from the curated candidate entry
fn listing_profile(candidate: &AmbiguityCandidate) -> CompanyProfile {
    CompanyProfile {
        symbol: candidate.normalized_symbol.qualified(),
        company_name: candidate.company_name.clone(),
        country: None,
        exchange: None,
    }
}

/// Points earned by one candidate's profile against lowercased context.
pub fn score_profile(
    profile: &CompanyProfile,
    candidate: &AmbiguityCandidate,
    lowered_context: &str,
    tables: &ExchangeTables,
) -> u32 {
    let mut score = 0;

    let name = profile.company_name.trim().to_lowercase();
    if !name.is_empty() && lowered_context.contains(&name) {
        score += FULL_NAME_POINTS;
    }

    for word in name_words(&name) {
        if contains_phrase(lowered_context, &word) {
            score += NAME_WORD_POINTS;
        }
    }

    let country = profile.country.as_deref().unwrap_or(&candidate.country);
    if contains_phrase(lowered_context, &country.trim().to_lowercase()) {
        score += COUNTRY_POINTS;
    }

    let exchange = profile.exchange.as_deref().unwrap_or(&candidate.exchange);
    if contains_phrase(lowered_context, &exchange.trim().to_lowercase()) {
        score += EXCHANGE_POINTS;
    }

    if let Some(geography) = candidate.normalized_symbol.exchange().geography() {
        if tables.mentions(lowered_context, geography) {
            score += GEOGRAPHY_POINTS;
        }
    }

    score
}

/// Highest score wins; a tie at the top or a score under `min_score` is inconclusive.
fn pick_best(scores: &[(&AmbiguityCandidate, u32)], min_score: u32) -> Option<ScoredCandidate> {
    let best = scores.iter().map(|(_, score)| *score).max()?;
    let mut leaders = scores.iter().filter(|(_, score)| *score == best);
    let (candidate, score) = leaders.next()?;
    if leaders.next().is_some() || *score < min_score {
        return None;
    }

    Some(ScoredCandidate {
        candidate: (*candidate).clone(),
        score: *score,
        confidence: (0.70 + f64::from(*score) / 100.0).min(0.95),
    })
}
