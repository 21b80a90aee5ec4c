use analysis_core::stats::{cagr_percent, mean, Bounds};
use analysis_core::{AnalysisError, FiscalYearRecord, RevenuePoint, ValuationAssumptions};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What happens to a derived value outside its bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsHandling {
    #[default]
    Clamp,
    /// Out-of-bounds values become null
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssumptionPolicy {
    pub strict: bool,
    pub required_years: usize,
    pub growth_window: usize,
    pub target_window: usize,
    pub growth_bounds: Bounds,
    pub pe_bounds: Bounds,
    pub pcf_bounds: Bounds,
    pub pbv_bounds: Bounds,
    pub yield_bounds: Bounds,
    pub bounds_handling: BoundsHandling,
    pub required_return: f64,
}

impl Default for AssumptionPolicy {
    fn default() -> Self {
        Self::lenient()
    }
}

impl AssumptionPolicy {
    pub fn lenient() -> Self {
        Self {
            strict: false,
            required_years: 1,
            growth_window: 5,
            target_window: 3,
            growth_bounds: Bounds::new(0.0, 20.0),
            pe_bounds: Bounds::new(1.0, 100.0),
            pcf_bounds: Bounds::new(1.0, 100.0),
            pbv_bounds: Bounds::new(0.5, 50.0),
            yield_bounds: Bounds::new(0.0, 20.0),
            bounds_handling: BoundsHandling::Clamp,
            required_return: 10.0,
        }
    }

    /// Full history required and every derived value present
    pub fn strict(required_years: usize) -> Self {
        Self {
            strict: true,
            required_years,
            growth_bounds: Bounds::new(-50.0, 100.0),
            ..Self::lenient()
        }
    }

    fn bound(&self, value: Option<f64>, bounds: Bounds) -> Option<f64> {
        let value = value.filter(|v| v.is_finite())?;
        match self.bounds_handling {
            BoundsHandling::Clamp => Some(bounds.clamp(value)),
            BoundsHandling::Reject => bounds.contains(value).then_some(value),
        }
    }
}

/// Derives forward valuation inputs from a fiscal-year history.
pub struct AssumptionCalculator {
    policy: AssumptionPolicy,
}

impl Default for AssumptionCalculator {
    fn default() -> Self {
        Self::new(AssumptionPolicy::default())
    }
}

impl AssumptionCalculator {
    pub fn new(policy: AssumptionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AssumptionPolicy {
        &self.policy
    }

    pub fn derive(
        &self,
        records: &[FiscalYearRecord],
        current_price: f64,
        revenue: &[RevenuePoint],
    ) -> Result<ValuationAssumptions, AnalysisError> {
        let policy = &self.policy;

        if !current_price.is_finite()
            || current_price < 0.0
            || (policy.strict && current_price <= 0.0)
        {
            return Err(AnalysisError::InvalidInput(format!(
                "current price {current_price} is not usable"
            )));
        }

        let mut history: Vec<&FiscalYearRecord> =
            records.iter().filter(|r| r.is_complete()).collect();
        history.sort_by(|a, b| b.year.cmp(&a.year));
        history.dedup_by_key(|r| r.year);

        let required_years = if policy.strict { policy.required_years.max(1) } else { 1 };
        if history.len() < required_years {
            return Err(AnalysisError::InsufficientFundamentals {
                complete_years: history.len(),
                required_years,
            });
        }

        // Most recent first; the growth window reads it oldest to newest
        let growth_window = &history[..history.len().min(policy.growth_window)];
        let target_window = &history[..history.len().min(policy.target_window)];

        let growth = |metric: fn(&FiscalYearRecord) -> Option<f64>| {
            let value = compound_growth(growth_window.iter().rev().map(|r| metric(*r)));
            policy.bound(value, policy.growth_bounds)
        };

        let mut sales: Vec<&RevenuePoint> = revenue.iter().filter(|p| p.revenue.is_finite()).collect();
        sales.sort_by(|a, b| b.year.cmp(&a.year));
        sales.dedup_by_key(|p| p.year);
        sales.truncate(policy.growth_window);
        let growth_rate_sales = policy.bound(
            compound_growth(sales.iter().rev().map(|p| Some(p.revenue))),
            policy.growth_bounds,
        );

        let target = |metric: fn(&FiscalYearRecord) -> Option<f64>, bounds: Bounds| {
            let ratios: Vec<f64> = target_window
                .iter()
                .filter_map(|r| {
                    let average = r.average_price().filter(|p| *p > 0.0)?;
                    let value = metric(*r).filter(|m| *m > 0.0)?;
                    Some(average / value)
                })
                .collect();
            policy.bound(mean(&ratios), bounds)
        };

        let yields: Vec<f64> = target_window
            .iter()
            .filter_map(|r| {
                let high = r.price_high.filter(|h| *h > 0.0)?;
                Some(r.dividend_per_share? / high * 100.0)
            })
            .collect();

        let latest = history[0];
        let base = history
            .iter()
            .copied()
            .find(|r| r.earnings_per_share.is_some_and(|eps| eps > 0.0))
            .unwrap_or(latest);
        let current_dividend = latest.dividend_per_share.unwrap_or(0.0);
        let base_eps = base.earnings_per_share.unwrap_or(0.0);
        let dividend_payout_ratio = if base_eps > 0.0 {
            current_dividend / base_eps * 100.0
        } else {
            0.0
        };

        let assumptions = ValuationAssumptions {
            current_price,
            current_dividend,
            growth_rate_eps: growth(|r| r.earnings_per_share),
            growth_rate_sales,
            growth_rate_cf: growth(|r| r.cash_flow_per_share),
            growth_rate_bv: growth(|r| r.book_value_per_share),
            growth_rate_div: growth(|r| r.dividend_per_share),
            target_pe: target(|r| r.earnings_per_share, policy.pe_bounds),
            target_pcf: target(|r| r.cash_flow_per_share, policy.pcf_bounds),
            target_pbv: target(|r| r.book_value_per_share, policy.pbv_bounds),
            target_yield: policy.bound(mean(&yields), policy.yield_bounds),
            required_return: policy.required_return,
            dividend_payout_ratio,
            base_year: base.year,
        };

        if policy.strict {
            let missing = assumptions.missing_fields();
            if !missing.is_empty() {
                return Err(AnalysisError::MissingDerivedValues(missing));
            }
        }

        debug!(
            "Derived assumptions from {} years (base year {})",
            history.len(),
            assumptions.base_year
        );

        Ok(assumptions)
    }
}

/// CAGR between the first and last value of an oldest-to-newest series
fn compound_growth<I>(values: I) -> Option<f64>
where
    I: Iterator<Item = Option<f64>>,
{
    let values: Vec<Option<f64>> = values.collect();
    if values.len() < 2 {
        return None;
    }
    cagr_percent(values[0]?, values[values.len() - 1]?, values.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(year: i32, eps: f64, dps: f64, high: f64, low: f64) -> FiscalYearRecord {
        FiscalYearRecord {
            year,
            earnings_per_share: Some(eps),
            cash_flow_per_share: Some(eps * 2.0),
            book_value_per_share: Some(eps * 10.0),
            dividend_per_share: Some(dps),
            price_high: Some(high),
            price_low: Some(low),
        }
    }

    /// EPS compounding at 10% from 2020 to 2024, priced at 15x earnings
    fn steady_history() -> Vec<FiscalYearRecord> {
        (0..5)
            .map(|k| {
                let eps = 1.1_f64.powi(k);
                record(2020 + k, eps, eps * 0.5, eps * 18.0, eps * 12.0)
            })
            .rev()
            .collect()
    }

    fn revenue_for(records: &[FiscalYearRecord]) -> Vec<RevenuePoint> {
        records
            .iter()
            .map(|r| RevenuePoint {
                year: r.year,
                revenue: r.earnings_per_share.unwrap() * 1000.0,
            })
            .collect()
    }

    #[test]
    fn derives_steady_history() {
        let records = steady_history();
        let a = AssumptionCalculator::default()
            .derive(&records, 25.0, &revenue_for(&records))
            .unwrap();

        assert_relative_eq!(a.growth_rate_eps.unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(a.growth_rate_sales.unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(a.growth_rate_cf.unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(a.growth_rate_bv.unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(a.growth_rate_div.unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(a.target_pe.unwrap(), 15.0, epsilon = 1e-9);
        assert_relative_eq!(a.target_pcf.unwrap(), 7.5, epsilon = 1e-9);
        assert_relative_eq!(a.target_pbv.unwrap(), 1.5, epsilon = 1e-9);
        assert_relative_eq!(a.target_yield.unwrap(), 50.0 / 18.0, epsilon = 1e-9);
        assert_relative_eq!(a.dividend_payout_ratio, 50.0, epsilon = 1e-9);
        assert_relative_eq!(a.current_dividend, 0.5 * 1.1_f64.powi(4), epsilon = 1e-12);
        assert_relative_eq!(a.required_return, 10.0);
        assert_eq!(a.base_year, 2024);
        assert!(a.missing_fields().is_empty());
    }

    #[test]
    fn growth_ignores_years_outside_window() {
        let mut records = steady_history();
        records.push(record(2019, 0.2, 0.1, 5.0, 2.0));
        records.push(record(2018, 7.0, 0.1, 90.0, 60.0));
        let with_old = AssumptionCalculator::default()
            .derive(&records, 25.0, &[])
            .unwrap();

        let records = steady_history();
        let without_old = AssumptionCalculator::default()
            .derive(&records, 25.0, &[])
            .unwrap();

        assert_eq!(with_old.growth_rate_eps, without_old.growth_rate_eps);
        assert_eq!(with_old.target_pe, without_old.target_pe);
        assert_eq!(with_old.growth_rate_sales, None);
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut shuffled = steady_history();
        shuffled.reverse();
        shuffled.push(FiscalYearRecord::new(2025));

        let a = AssumptionCalculator::default()
            .derive(&shuffled, 25.0, &[])
            .unwrap();
        assert_eq!(a.base_year, 2024);
        assert_relative_eq!(a.growth_rate_eps.unwrap(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn targets_stay_within_bounds() {
        let records: Vec<FiscalYearRecord> = (2020..2025)
            .map(|year| FiscalYearRecord {
                year,
                earnings_per_share: Some(0.01),
                cash_flow_per_share: Some(500.0),
                book_value_per_share: Some(0.001),
                dividend_per_share: Some(40.0),
                price_high: Some(60.0),
                price_low: Some(40.0),
            })
            .collect();

        let a = AssumptionCalculator::default()
            .derive(&records, 50.0, &[])
            .unwrap();

        let policy = AssumptionPolicy::lenient();
        assert_eq!(a.target_pe, Some(100.0));
        assert_eq!(a.target_pcf, Some(1.0));
        assert_eq!(a.target_pbv, Some(50.0));
        assert_eq!(a.target_yield, Some(20.0));
        for value in [a.target_pe, a.target_pcf].into_iter().flatten() {
            assert!(policy.pe_bounds.contains(value));
        }
        // flat history
        assert_eq!(a.growth_rate_eps, Some(0.0));
    }

    #[test]
    fn lenient_growth_is_clamped() {
        let records = vec![
            record(2024, 0.5, 0.1, 10.0, 8.0),
            record(2023, 1.0, 0.1, 10.0, 8.0),
            record(2022, 4.0, 0.1, 10.0, 8.0),
        ];
        let a = AssumptionCalculator::default()
            .derive(&records, 9.0, &[])
            .unwrap();
        assert_eq!(a.growth_rate_eps, Some(0.0));

        let strict = AssumptionCalculator::new(AssumptionPolicy::strict(3))
            .derive(&records, 9.0, &[])
            .unwrap_err();
        // revenue series is empty so sales growth cannot be derived
        assert_eq!(
            strict,
            AnalysisError::MissingDerivedValues(vec!["growthRateSales".to_string()])
        );
    }

    #[test]
    fn negative_endpoint_has_no_growth() {
        let records = vec![
            record(2024, -1.0, 0.4, 10.0, 8.0),
            record(2023, 2.0, 0.4, 10.0, 8.0),
            record(2022, 1.0, 0.4, 10.0, 8.0),
        ];
        let a = AssumptionCalculator::default()
            .derive(&records, 9.0, &[])
            .unwrap();

        assert_eq!(a.growth_rate_eps, None);
        assert_eq!(a.base_year, 2023);
        assert_relative_eq!(a.dividend_payout_ratio, 20.0, epsilon = 1e-12);
    }

    #[test]
    fn strict_mode_needs_full_window() {
        let build = |years: i32| -> Vec<FiscalYearRecord> {
            (0..years)
                .map(|k| {
                    let eps = 1.05_f64.powi(k);
                    record(1995 + k, eps, eps * 0.4, eps * 18.0, eps * 12.0)
                })
                .collect()
        };
        let calculator = AssumptionCalculator::new(AssumptionPolicy::strict(30));

        let short = build(29);
        let err = calculator
            .derive(&short, 40.0, &revenue_for(&short))
            .unwrap_err();
        assert_eq!(
            err,
            AnalysisError::InsufficientFundamentals {
                complete_years: 29,
                required_years: 30
            }
        );
        assert!(err.is_skip());

        let full = build(30);
        let a = calculator
            .derive(&full, 40.0, &revenue_for(&full))
            .unwrap();
        assert!(a.missing_fields().is_empty());
        assert_relative_eq!(a.growth_rate_eps.unwrap(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn reject_nulls_out_of_bounds_values() {
        let records: Vec<FiscalYearRecord> = (0..5)
            .map(|k| {
                let eps = 1.3_f64.powi(k);
                record(2020 + k, eps, eps * 0.5, eps * 18.0, eps * 12.0)
            })
            .collect();

        let lenient = AssumptionCalculator::new(AssumptionPolicy {
            bounds_handling: BoundsHandling::Reject,
            ..AssumptionPolicy::lenient()
        });
        let a = lenient.derive(&records, 30.0, &[]).unwrap();
        assert_eq!(a.growth_rate_eps, None);
        assert_relative_eq!(a.target_pe.unwrap(), 15.0, epsilon = 1e-9);

        let clamped = AssumptionCalculator::default()
            .derive(&records, 30.0, &[])
            .unwrap();
        assert_eq!(clamped.growth_rate_eps, Some(20.0));
    }

    #[test]
    fn unusable_price_is_invalid_input() {
        let records = steady_history();
        let lenient = AssumptionCalculator::default();
        assert!(matches!(
            lenient.derive(&records, f64::NAN, &[]),
            Err(AnalysisError::InvalidInput(_))
        ));
        assert!(lenient.derive(&records, 0.0, &[]).is_ok());

        let strict = AssumptionCalculator::new(AssumptionPolicy::strict(5));
        assert!(matches!(
            strict.derive(&records, 0.0, &revenue_for(&records)),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn empty_history_is_insufficient() {
        let err = AssumptionCalculator::default()
            .derive(&[], 10.0, &[])
            .unwrap_err();
        assert_eq!(
            err,
            AnalysisError::InsufficientFundamentals {
                complete_years: 0,
                required_years: 1
            }
        );
    }
}
