use analysis_core::{AmbiguityCandidate, CanonicalTicker, Exchange, Geography};
use std::sync::Arc;
use tracing::debug;

use crate::tables::ExchangeTables;

/// Maps bare symbols to provider-qualified tickers.
#[derive(Debug, Clone)]
pub struct TickerCanonicalizer {
    tables: Arc<ExchangeTables>,
}

impl Default for TickerCanonicalizer {
    fn default() -> Self {
        Self::new(Arc::new(ExchangeTables::standard()))
    }
}

impl TickerCanonicalizer {
    pub fn new(tables: Arc<ExchangeTables>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &ExchangeTables {
        &self.tables
    }

    /// Qualify `raw` with an exchange suffix using the context text and the
    /// curated listings. Only exchange and city keywords count here; the
    /// broader geography sets are for `extract_geography`. Already-dotted
    /// input is only trimmed and uppercased, and empty input comes back as given.
    pub fn canonicalize(&self, raw: &str, context: &str) -> CanonicalTicker {
        let symbol = raw.trim().to_ascii_uppercase();
        if symbol.is_empty() {
            return CanonicalTicker {
                symbol: raw.to_string(),
                exchange_suffix: None,
            };
        }

        if symbol.contains('.') {
            return CanonicalTicker::parse(&symbol);
        }

        let geography = self.tables.listing_geography_of(context);
        let listed = |g: Geography| geography == Some(g) || self.tables.is_listed(g, &symbol);

        let exchange = if listed(Geography::Canada) {
            Exchange::Tsx
        } else if listed(Geography::UnitedKingdom) {
            Exchange::Lse
        } else if listed(Geography::France) {
            Exchange::EuronextParis
        } else {
            Exchange::Us
        };

        if exchange != Exchange::Us {
            debug!(
                "Canonicalized {} -> {}{}",
                symbol,
                symbol,
                exchange.suffix().unwrap_or_default()
            );
        }

        CanonicalTicker::new(&symbol, exchange)
    }

    pub fn canonicalize_many(&self, symbols: &[&str], context: &str) -> Vec<CanonicalTicker> {
        symbols
            .iter()
            .map(|symbol| self.canonicalize(symbol, context))
            .collect()
    }

    /// Whether the symbol, with or without `.TO`, is a curated Canadian listing
    pub fn is_canadian(&self, symbol: &str) -> bool {
        let ticker = CanonicalTicker::parse(symbol);
        match ticker.exchange() {
            Exchange::Tsx | Exchange::Us => self.tables.is_listed(Geography::Canada, &ticker.symbol),
            _ => false,
        }
    }

    pub fn exchange_of(&self, symbol: &str) -> Exchange {
        CanonicalTicker::parse(symbol).exchange()
    }

    /// Candidate listings when `symbol` is a bare ambiguous root
    pub fn detect_ambiguity(&self, symbol: &str) -> Option<&[AmbiguityCandidate]> {
        let root = symbol.trim().to_ascii_uppercase();
        if root.is_empty() || root.contains('.') {
            return None;
        }
        self.tables.candidates(&root)
    }

    pub fn extract_geography(&self, text: &str) -> Option<Geography> {
        self.tables.geography_of(text)
    }
}
