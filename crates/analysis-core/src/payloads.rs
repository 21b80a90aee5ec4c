//! Provider payload rows.
//!
//! Field names follow the Financial Modeling Prep JSON shapes; every numeric
//! field is optional because providers omit values freely.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeStatementRow {
    pub date: NaiveDate,
    #[serde(rename = "epsdiluted", default)]
    pub eps_diluted: Option<f64>,
    #[serde(default)]
    pub eps: Option<f64>,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub weighted_average_shs_out: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlowRow {
    pub date: NaiveDate,
    #[serde(default)]
    pub free_cash_flow: Option<f64>,
    #[serde(default)]
    pub operating_cash_flow: Option<f64>,
    #[serde(default)]
    pub dividends_paid: Option<f64>,
    #[serde(default)]
    pub weighted_average_shs_out: Option<f64>,
    #[serde(default)]
    pub weighted_average_shs_out_dil: Option<f64>,
    #[serde(default)]
    pub shares_outstanding: Option<f64>,
}

impl CashFlowRow {
    /// First positive, finite share count in provider preference order
    pub fn share_count(&self) -> Option<f64> {
        [
            self.weighted_average_shs_out,
            self.weighted_average_shs_out_dil,
            self.shares_outstanding,
        ]
        .into_iter()
        .flatten()
        .find(|shares| shares.is_finite() && *shares > 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSheetRow {
    pub date: NaiveDate,
    #[serde(default)]
    pub total_stockholders_equity: Option<f64>,
    #[serde(default)]
    pub shares_outstanding: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DividendRow {
    pub date: NaiveDate,
    #[serde(default)]
    pub dividend: Option<f64>,
    #[serde(default)]
    pub adj_dividend: Option<f64>,
}

impl DividendRow {
    pub fn amount(&self) -> Option<f64> {
        self.dividend
            .or(self.adj_dividend)
            .filter(|amount| amount.is_finite() && *amount >= 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub date: NaiveDate,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub close: Option<f64>,
}

/// The five independently dated provider collections for one ticker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPayloads {
    #[serde(default)]
    pub income_statements: Vec<IncomeStatementRow>,
    #[serde(default)]
    pub cash_flow_statements: Vec<CashFlowRow>,
    #[serde(default)]
    pub balance_sheets: Vec<BalanceSheetRow>,
    #[serde(default)]
    pub dividends: Vec<DividendRow>,
    #[serde(default)]
    pub prices: Vec<PriceRow>,
}

impl ProviderPayloads {
    pub fn row_count(&self) -> usize {
        self.income_statements.len()
            + self.cash_flow_statements.len()
            + self.balance_sheets.len()
            + self.dividends.len()
            + self.prices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_provider_shapes() {
        let json = r#"{
            "incomeStatements": [{"date": "2022-12-31", "epsdiluted": 2.5, "eps": 2.6, "revenue": 1000.0}],
            "cashFlowStatements": [{"date": "2022-12-31", "freeCashFlow": 300.0, "weightedAverageShsOut": 100.0}],
            "dividends": [{"date": "2022-03-15", "adjDividend": 0.5}]
        }"#;
        let payloads: ProviderPayloads = serde_json::from_str(json).unwrap();
        assert_eq!(payloads.income_statements[0].eps_diluted, Some(2.5));
        assert_eq!(payloads.cash_flow_statements[0].share_count(), Some(100.0));
        assert_eq!(payloads.dividends[0].amount(), Some(0.5));
        assert!(payloads.balance_sheets.is_empty());
        assert_eq!(payloads.row_count(), 3);
    }

    #[test]
    fn share_count_skips_unusable_values() {
        let row = CashFlowRow {
            date: NaiveDate::from_ymd_opt(2022, 12, 31).unwrap(),
            free_cash_flow: None,
            operating_cash_flow: None,
            dividends_paid: None,
            weighted_average_shs_out: Some(0.0),
            weighted_average_shs_out_dil: Some(f64::NAN),
            shares_outstanding: Some(42.0),
        };
        assert_eq!(row.share_count(), Some(42.0));
    }
}
