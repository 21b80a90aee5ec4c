use analysis_core::{
    AnalysisError, BalanceSheetRow, CashFlowRow, DividendRow, FiscalYearRecord,
    IncomeStatementRow, ProviderPayloads, RevenuePoint,
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Which observation wins when several rows describe the same year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// First row in provider order carrying a usable value
    #[default]
    FirstSeen,
    /// Row with the latest date carrying a usable value
    LatestDated,
}

/// Source of the dividend-per-share figure when both are available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DividendPrecedence {
    #[default]
    CashFlowFirst,
    HistoryFirst,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    pub max_years: usize,
    pub dedup: DedupPolicy,
    pub dividend_precedence: DividendPrecedence,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_years: 30,
            dedup: DedupPolicy::default(),
            dividend_precedence: DividendPrecedence::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationStats {
    pub rows_seen: usize,
    pub years_built: usize,
    pub years_complete: usize,
    pub years_returned: usize,
}

#[derive(Default)]
struct YearDraft {
    eps: Option<f64>,
    cfps: Option<f64>,
    bvps: Option<f64>,
    cash_flow_dps: Option<f64>,
    history_dps: Option<f64>,
    income_shares: Option<f64>,
    price_high: Option<f64>,
    price_low: Option<f64>,
}

/// Consolidates dated provider rows into one record per calendar year.
pub struct FundamentalsAggregator {
    config: AggregatorConfig,
}

impl Default for FundamentalsAggregator {
    fn default() -> Self {
        Self::new(AggregatorConfig::default())
    }
}

impl FundamentalsAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn aggregate(
        &self,
        payloads: &ProviderPayloads,
    ) -> Result<Vec<FiscalYearRecord>, AnalysisError> {
        self.aggregate_with_stats(payloads).map(|(records, _)| records)
    }

    /// Complete records, most recent first, plus counters for the run.
    pub fn aggregate_with_stats(
        &self,
        payloads: &ProviderPayloads,
    ) -> Result<(Vec<FiscalYearRecord>, AggregationStats), AnalysisError> {
        let mut years: BTreeMap<i32, YearDraft> = BTreeMap::new();

        for row in self.ordered(&payloads.income_statements, |r: &IncomeStatementRow| r.date) {
            let draft = years.entry(row.date.year()).or_default();
            fill(&mut draft.eps, row.eps_diluted.filter(|v| v.is_finite()).or(row.eps));
            fill(&mut draft.income_shares, positive(row.weighted_average_shs_out));
        }

        for row in self.ordered(&payloads.cash_flow_statements, |r: &CashFlowRow| r.date) {
            let draft = years.entry(row.date.year()).or_default();
            let Some(shares) = row.share_count() else {
                continue;
            };
            let cash_flow = row
                .free_cash_flow
                .filter(|v| v.is_finite())
                .or(row.operating_cash_flow);
            fill(&mut draft.cfps, cash_flow.map(|cf| cf / shares));
            fill(
                &mut draft.cash_flow_dps,
                row.dividends_paid.map(|paid| paid.abs() / shares),
            );
        }

        for row in self.ordered(&payloads.balance_sheets, |r: &BalanceSheetRow| r.date) {
            let draft = years.entry(row.date.year()).or_default();
            let shares = positive(row.shares_outstanding).or(draft.income_shares);
            if let (Some(equity), Some(shares)) = (row.total_stockholders_equity, shares) {
                fill(&mut draft.bvps, Some(equity / shares));
            }
        }

        // Same date and amount is one payment; a special dividend on a
        // regular payment date is a second one
        let mut payments: HashSet<(NaiveDate, u64)> = HashSet::new();
        for row in self.ordered(&payloads.dividends, |r: &DividendRow| r.date) {
            let Some(amount) = row.amount() else {
                continue;
            };
            if !payments.insert((row.date, amount.to_bits())) {
                debug!("Skipping duplicate dividend of {} dated {}", amount, row.date);
                continue;
            }
            let draft = years.entry(row.date.year()).or_default();
            draft.history_dps = Some(draft.history_dps.unwrap_or(0.0) + amount);
        }

        for row in &payloads.prices {
            let draft = years.entry(row.date.year()).or_default();
            if let Some(high) = finite(row.high.or(row.close)) {
                draft.price_high = Some(draft.price_high.map_or(high, |h| h.max(high)));
            }
            if let Some(low) = finite(row.low.or(row.close)) {
                draft.price_low = Some(draft.price_low.map_or(low, |l| l.min(low)));
            }
        }

        let years_built = years.len();
        let mut records: Vec<FiscalYearRecord> = years
            .into_iter()
            .map(|(year, draft)| self.finish(year, draft))
            .filter(FiscalYearRecord::is_complete)
            .collect();
        let years_complete = records.len();

        records.sort_by(|a, b| b.year.cmp(&a.year));
        records.truncate(self.config.max_years);

        let stats = AggregationStats {
            rows_seen: payloads.row_count(),
            years_built,
            years_complete,
            years_returned: records.len(),
        };
        debug!(
            "Aggregated {} rows into {} years ({} complete, {} kept)",
            stats.rows_seen, stats.years_built, stats.years_complete, stats.years_returned
        );

        if records.is_empty() {
            return Err(AnalysisError::InsufficientFundamentals {
                complete_years: 0,
                required_years: 1,
            });
        }

        Ok((records, stats))
    }

    /// Per-year revenue from the income statements, most recent first.
    pub fn revenue_series(&self, payloads: &ProviderPayloads) -> Vec<RevenuePoint> {
        let mut revenue: BTreeMap<i32, f64> = BTreeMap::new();
        for row in self.ordered(&payloads.income_statements, |r: &IncomeStatementRow| r.date) {
            if let Some(value) = finite(row.revenue) {
                revenue.entry(row.date.year()).or_insert(value);
            }
        }
        revenue
            .into_iter()
            .rev()
            .map(|(year, revenue)| RevenuePoint { year, revenue })
            .collect()
    }

    fn finish(&self, year: i32, draft: YearDraft) -> FiscalYearRecord {
        let dividend_per_share = match self.config.dividend_precedence {
            DividendPrecedence::CashFlowFirst => draft.cash_flow_dps.or(draft.history_dps),
            DividendPrecedence::HistoryFirst => draft.history_dps.or(draft.cash_flow_dps),
        };
        FiscalYearRecord {
            year,
            earnings_per_share: draft.eps,
            cash_flow_per_share: draft.cfps,
            book_value_per_share: draft.bvps,
            dividend_per_share,
            price_high: draft.price_high,
            price_low: draft.price_low,
        }
    }

    /// Rows in the order the dedup policy reads them
    fn ordered<'a, T, F>(&self, rows: &'a [T], date: F) -> Vec<&'a T>
    where
        F: Fn(&T) -> NaiveDate,
    {
        let mut ordered: Vec<&T> = rows.iter().collect();
        if self.config.dedup == DedupPolicy::LatestDated {
            ordered.sort_by_key(|row| std::cmp::Reverse(date(*row)));
        }
        ordered
    }
}

/// Keep the first usable value
fn fill(slot: &mut Option<f64>, value: Option<f64>) {
    if slot.is_none() {
        *slot = finite(value);
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}
