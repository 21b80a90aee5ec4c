use analysis_core::{CanonicalTicker, FiscalYearRecord, ValuationAssumptions};
use chrono::{DateTime, Utc};
use fundamental_analysis::AggregationStats;
use serde::{Deserialize, Serialize};
use ticker_resolver::{ClarificationRequest, ResolutionSource};

/// Records and assumptions produced for one ticker by one sync run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationSnapshot {
    pub ticker: CanonicalTicker,
    pub records: Vec<FiscalYearRecord>,
    pub assumptions: ValuationAssumptions,
    pub strict: bool,
    pub generated_at: DateTime<Utc>,
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Synced {
        snapshot: ValuationSnapshot,
        source: ResolutionSource,
        stats: AggregationStats,
    },
    NeedsClarification {
        request: ClarificationRequest,
    },
    Skipped {
        ticker: String,
        reason: String,
    },
    Failed {
        ticker: String,
        error: String,
    },
}

impl SyncOutcome {
    pub fn ticker(&self) -> String {
        match self {
            SyncOutcome::Synced { snapshot, .. } => snapshot.ticker.qualified(),
            SyncOutcome::NeedsClarification { request } => request.root.clone(),
            SyncOutcome::Skipped { ticker, .. } | SyncOutcome::Failed { ticker, .. } => {
                ticker.clone()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub strict: bool,
    pub synced: usize,
    pub needs_clarification: usize,
    pub skipped: usize,
    pub failed: usize,
    pub outcomes: Vec<SyncOutcome>,
}

impl SyncReport {
    pub fn new(strict: bool, started_at: DateTime<Utc>, outcomes: Vec<SyncOutcome>) -> Self {
        let mut report = Self {
            started_at,
            finished_at: Utc::now(),
            strict,
            synced: 0,
            needs_clarification: 0,
            skipped: 0,
            failed: 0,
            outcomes: Vec::new(),
        };
        for outcome in &outcomes {
            match outcome {
                SyncOutcome::Synced { .. } => report.synced += 1,
                SyncOutcome::NeedsClarification { .. } => report.needs_clarification += 1,
                SyncOutcome::Skipped { .. } => report.skipped += 1,
                SyncOutcome::Failed { .. } => report.failed += 1,
            }
        }
        report.outcomes = outcomes;
        report
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// True when no ticker failed outright
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}
