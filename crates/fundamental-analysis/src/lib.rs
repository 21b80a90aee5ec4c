//! Per-year fundamentals consolidation and valuation assumption derivation.

pub mod aggregator;
pub mod assumptions;

pub use aggregator::{
    AggregationStats, AggregatorConfig, DedupPolicy, DividendPrecedence, FundamentalsAggregator,
};
pub use assumptions::{AssumptionCalculator, AssumptionPolicy, BoundsHandling};
