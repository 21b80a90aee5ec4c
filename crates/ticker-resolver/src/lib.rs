//! Exchange-aware ticker resolution.
//!
//! Bare symbols are qualified with a provider suffix (`POW` -> `POW.TO`) from
//! curated listings and context keywords. Roots listed on more than one
//! exchange go through a resolution chain (session memory, geography,
//! company name, profile verification, model) and fall back to a
//! clarification question.

pub mod canonicalizer;
pub mod resolver;
pub mod session;
pub mod tables;
mod text;
pub mod verification;

pub use canonicalizer::TickerCanonicalizer;
pub use resolver::{
    clarification_question, ClarificationRequest, Resolution, ResolutionSource, ResolverConfig,
    TickerResolver,
};
pub use session::{save_preference, SessionMemory};
pub use tables::ExchangeTables;
pub use verification::{score_profile, ScoringVerifier};
