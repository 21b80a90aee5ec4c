use serde::{Deserialize, Serialize};
use std::fmt;

/// Listing venue identified by a provider symbol suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    Tsx,
    Lse,
    EuronextParis,
    EuronextAmsterdam,
    BorsaItaliana,
    Tokyo,
    /// NYSE/NASDAQ primary listings, which carry no suffix
    Us,
}

impl Exchange {
    pub const SUFFIXED: [Exchange; 6] = [
        Exchange::Tsx,
        Exchange::Lse,
        Exchange::EuronextParis,
        Exchange::EuronextAmsterdam,
        Exchange::BorsaItaliana,
        Exchange::Tokyo,
    ];

    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            Exchange::Tsx => Some(".TO"),
            Exchange::Lse => Some(".L"),
            Exchange::EuronextParis => Some(".PA"),
            Exchange::EuronextAmsterdam => Some(".AS"),
            Exchange::BorsaItaliana => Some(".MI"),
            Exchange::Tokyo => Some(".T"),
            Exchange::Us => None,
        }
    }

    /// Short exchange code
    pub fn code(&self) -> &'static str {
        match self {
            Exchange::Tsx => "TSX",
            Exchange::Lse => "LSE",
            Exchange::EuronextParis => "EPA",
            Exchange::EuronextAmsterdam => "AMS",
            Exchange::BorsaItaliana => "MIL",
            Exchange::Tokyo => "TYO",
            Exchange::Us => "US",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        let suffix = suffix.trim().to_ascii_uppercase();
        Self::SUFFIXED
            .into_iter()
            .find(|exchange| exchange.suffix() == Some(suffix.as_str()))
    }

    pub fn geography(&self) -> Option<Geography> {
        match self {
            Exchange::Tsx => Some(Geography::Canada),
            Exchange::Lse => Some(Geography::UnitedKingdom),
            Exchange::EuronextParis => Some(Geography::France),
            _ => None,
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Geography that can be named explicitly in free text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Geography {
    Canada,
    UnitedKingdom,
    France,
}

impl Geography {
    pub fn exchange(&self) -> Exchange {
        match self {
            Geography::Canada => Exchange::Tsx,
            Geography::UnitedKingdom => Exchange::Lse,
            Geography::France => Exchange::EuronextParis,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Geography::Canada => "canada",
            Geography::UnitedKingdom => "uk",
            Geography::France => "france",
        }
    }
}

/// Exchange-qualified ticker.
///
/// `symbol` is the root (`T`), `exchange_suffix` the provider suffix (`.TO`).
/// A dotted share class such as `RCI.B` has no exchange suffix and keeps the
/// whole string as its symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalTicker {
    pub symbol: String,
    pub exchange_suffix: Option<String>,
}

impl CanonicalTicker {
    pub fn new(symbol: &str, exchange: Exchange) -> Self {
        Self {
            symbol: symbol.trim().to_ascii_uppercase(),
            exchange_suffix: exchange.suffix().map(str::to_string),
        }
    }

    pub fn unsuffixed(symbol: &str) -> Self {
        Self::new(symbol, Exchange::Us)
    }

    /// Split an already-qualified symbol on a known exchange suffix.
    pub fn parse(input: &str) -> Self {
        let normalized = input.trim().to_ascii_uppercase();
        if let Some(idx) = normalized.rfind('.') {
            if idx > 0 && Exchange::from_suffix(&normalized[idx..]).is_some() {
                return Self {
                    symbol: normalized[..idx].to_string(),
                    exchange_suffix: Some(normalized[idx..].to_string()),
                };
            }
        }
        Self {
            symbol: normalized,
            exchange_suffix: None,
        }
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange_suffix
            .as_deref()
            .and_then(Exchange::from_suffix)
            .unwrap_or(Exchange::Us)
    }

    /// Provider query form, e.g. `POW.TO`
    pub fn qualified(&self) -> String {
        match &self.exchange_suffix {
            Some(suffix) => format!("{}{}", self.symbol, suffix),
            None => self.symbol.clone(),
        }
    }

    pub fn matches(&self, symbol: &str) -> bool {
        self.qualified().eq_ignore_ascii_case(symbol.trim())
    }
}

impl fmt::Display for CanonicalTicker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)?;
        if let Some(suffix) = &self.exchange_suffix {
            f.write_str(suffix)?;
        }
        Ok(())
    }
}

/// One listing of an ambiguous root ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbiguityCandidate {
    /// Display exchange, e.g. "TSX" or "NYSE"
    pub exchange: String,
    pub company_name: String,
    pub country: String,
    pub normalized_symbol: CanonicalTicker,
}

impl AmbiguityCandidate {
    pub fn new(exchange: &str, company_name: &str, country: &str, normalized: &str) -> Self {
        Self {
            exchange: exchange.to_string(),
            company_name: company_name.to_string(),
            country: country.to_string(),
            normalized_symbol: CanonicalTicker::parse(normalized),
        }
    }
}

/// Company profile returned by a verification data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub symbol: String,
    pub company_name: String,
    pub country: Option<String>,
    pub exchange: Option<String>,
}

/// Best candidate picked by a verification strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: AmbiguityCandidate,
    pub score: u32,
    pub confidence: f64,
}

/// Answer from a model-assisted resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResolution {
    pub symbol: String,
    pub confidence: f64,
}

/// Consolidated per-share fundamentals for one calendar year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalYearRecord {
    pub year: i32,
    pub earnings_per_share: Option<f64>,
    pub cash_flow_per_share: Option<f64>,
    pub book_value_per_share: Option<f64>,
    pub dividend_per_share: Option<f64>,
    pub price_high: Option<f64>,
    pub price_low: Option<f64>,
}

impl FiscalYearRecord {
    pub fn new(year: i32) -> Self {
        Self {
            year,
            earnings_per_share: None,
            cash_flow_per_share: None,
            book_value_per_share: None,
            dividend_per_share: None,
            price_high: None,
            price_low: None,
        }
    }

    /// All six numeric fields are present and finite
    pub fn is_complete(&self) -> bool {
        [
            self.earnings_per_share,
            self.cash_flow_per_share,
            self.book_value_per_share,
            self.dividend_per_share,
            self.price_high,
            self.price_low,
        ]
        .iter()
        .all(|v| v.is_some_and(f64::is_finite))
    }

    /// Midpoint of the year's price range
    pub fn average_price(&self) -> Option<f64> {
        match (self.price_high, self.price_low) {
            (Some(high), Some(low)) if high.is_finite() && low.is_finite() => {
                Some((high + low) / 2.0)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevenuePoint {
    pub year: i32,
    pub revenue: f64,
}

/// Forward valuation inputs derived from the fiscal-year history.
/// Growth rates, yields and payout are percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationAssumptions {
    pub current_price: f64,
    pub current_dividend: f64,
    pub growth_rate_eps: Option<f64>,
    pub growth_rate_sales: Option<f64>,
    pub growth_rate_cf: Option<f64>,
    pub growth_rate_bv: Option<f64>,
    pub growth_rate_div: Option<f64>,
    pub target_pe: Option<f64>,
    pub target_pcf: Option<f64>,
    pub target_pbv: Option<f64>,
    pub target_yield: Option<f64>,
    pub required_return: f64,
    pub dividend_payout_ratio: f64,
    pub base_year: i32,
}

impl ValuationAssumptions {
    /// Names of derived fields that could not be computed
    pub fn missing_fields(&self) -> Vec<String> {
        [
            ("growthRateEPS", self.growth_rate_eps),
            ("growthRateSales", self.growth_rate_sales),
            ("growthRateCF", self.growth_rate_cf),
            ("growthRateBV", self.growth_rate_bv),
            ("growthRateDiv", self.growth_rate_div),
            ("targetPE", self.target_pe),
            ("targetPCF", self.target_pcf),
            ("targetPBV", self.target_pbv),
            ("targetYield", self.target_yield),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_some_and(f64::is_finite))
        .map(|(name, _)| name.to_string())
        .collect()
    }
}
