use analysis_core::{AmbiguityCandidate, CanonicalTicker, Geography};
use std::collections::{HashMap, HashSet};

use crate::text::contains_phrase;

/// Curated listings, geography keywords and ambiguous roots.
///
/// Built once and shared read-only behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ExchangeTables {
    canadian: HashSet<String>,
    uk: HashSet<String>,
    french: HashSet<String>,
    geography_keywords: Vec<(Geography, Vec<String>)>,
    listing_keywords: Vec<(Geography, Vec<String>)>,
    ambiguous: HashMap<String, Vec<AmbiguityCandidate>>,
    company_hints: Vec<(String, CanonicalTicker)>,
}

impl Default for ExchangeTables {
    fn default() -> Self {
        Self::standard()
    }
}

impl ExchangeTables {
    /// Tables with no listings, keywords or ambiguous roots
    pub fn empty() -> Self {
        Self {
            canadian: HashSet::new(),
            uk: HashSet::new(),
            french: HashSet::new(),
            geography_keywords: Vec::new(),
            listing_keywords: Vec::new(),
            ambiguous: HashMap::new(),
            company_hints: Vec::new(),
        }
    }

    pub fn standard() -> Self {
        let mut tables = Self::empty();

        // Canadian primary listings (TSX)
        tables.canadian = to_set(&[
            // Big six banks
            "RY", "TD", "BNS", "BMO", "CM", "NA",
            // Telecom
            "BCE", "T", "TCOM", "RCI.A", "RCI.B", "QBR.A", "QBR.B",
            // Energy and resources
            "CNQ", "SU", "IMO", "CVE", "TRP", "ENB", "PPL", "AQN", "FTS", "ABX", "GOLD", "K",
            "FM", "NTR", "POT", "CCL.B", "WPM", "FNV",
            // Utilities
            "EMA", "H", "CU",
            // Industrials and transport
            "CNR", "CP", "CAR", "AC", "WJA", "TFII", "GIL", "STC.A",
            // Financials and insurance
            "MFC", "SLF", "GWO", "IFC", "POW", "PWF", "FFH", "BN", "ONEX",
            // Real estate
            "REI.UN", "AP.UN", "HR.UN", "BEI.UN", "CAR.UN", "SRU.UN", "CHP.UN",
            // Technology
            "SHOP", "BB", "OTC", "LSPD", "DOO", "CGI", "CSU", "OTEX", "KXS",
            // Consumer
            "L", "ATD", "MGA", "QSR", "DOL", "EMP.A", "CTC.A", "FOOD",
            // Cannabis
            "WEED", "ACB", "TLRY", "CRON", "OGI", "HEXO",
            // Health care
            "GSY", "CXR", "MT", "WELL",
            // Materials
            "WFG", "IFP", "CFP", "WEF",
            // Other TSX Composite constituents
            "AEM", "APHA", "ATA", "AW.UN", "AX.UN", "BAM.A", "BHC", "BIP.UN", "BPY.UN", "CCO",
            "CFX", "CGX", "CJT", "CPX", "CRT.UN", "CWB", "DGC", "DSG", "EIF", "ERF", "EXE",
            "FEC", "FRU", "FSZ", "FTT", "GC", "GEI", "GSC", "HSE", "IVN", "KEY", "LIF", "LNR",
            "LUN", "MAG", "MRE", "MRU", "NFI", "NPI", "NWC", "NXE", "OSB", "PBH", "PD", "PKI",
            "PSI", "PSK", "RBA", "SGY", "SJ", "SMF", "SMU.UN", "SPB", "STN", "TCL.A", "TCN",
            "TIH", "TOY", "TVE", "VET", "VII", "WCP", "WN", "WPK", "WSP", "X",
            // Later listings and share classes
            "TECK.B", "GIB.A", "BAM", "CAE",
        ]);

        // London Stock Exchange
        tables.uk = to_set(&[
            "HSBA", "BATS", "DGE", "ULVR", "AZN", "GSK", "SHEL", "BP", "RIO", "AAL", "GLEN",
            "LSEG", "VOD", "BT.A", "BARC", "LLOY", "RBS", "PRU", "AVST", "REL", "NG", "SSE",
            "CPG", "CRH",
            // RBS renamed
            "NWG",
        ]);

        // Euronext Paris
        tables.french = to_set(&[
            "AI", "OR", "SAN", "MC", "BNP", "TTE", "ENGI", "ORA", "DG", "SU", "CAP", "SAF", "CA",
            "ACA", "CS", "BN", "DSY", "STLA", "RNO", "VIV", "VIE", "WLN", "ML", "KER", "RMS",
            "EL", "URW",
        ]);

        // Narrower sets used when qualifying a bare symbol
        tables.listing_keywords = vec![
            (
                Geography::Canada,
                to_vec(&["canada", "toronto", "tsx", "québec", "quebec", "montréal", "montreal"]),
            ),
            (Geography::UnitedKingdom, to_vec(&["uk", "london", "lse"])),
            (Geography::France, to_vec(&["france", "paris", "euronext"])),
        ];

        tables.geography_keywords = vec![
            (
                Geography::Canada,
                to_vec(&[
                    "canada", "canadian", "canadien", "canadienne", "toronto", "tsx", "montréal",
                    "montreal", "québec", "quebec", "vancouver", "calgary", "ottawa",
                    "banque du canada", "boc",
                ]),
            ),
            (
                Geography::UnitedKingdom,
                to_vec(&[
                    "uk", "united kingdom", "royaume-uni", "london", "londres", "lse", "ftse",
                    "british", "britannique", "england", "angleterre",
                ]),
            ),
            (
                Geography::France,
                to_vec(&[
                    "france", "français", "francais", "french", "paris", "euronext", "cac 40",
                    "cac40",
                ]),
            ),
        ];

        // Roots listed both on the TSX and in New York
        let dual_listed = [
            ("POW", "Power Corporation of Canada", "Power REIT"),
            ("T", "TELUS Corporation", "AT&T Inc."),
            ("RY", "Royal Bank of Canada", "Royal Bank of Canada (ADR)"),
            ("TD", "Toronto-Dominion Bank", "Toronto-Dominion Bank (ADR)"),
            (
                "CM",
                "Canadian Imperial Bank of Commerce",
                "Canadian Imperial Bank of Commerce (ADR)",
            ),
            ("BNS", "Bank of Nova Scotia", "Bank of Nova Scotia (ADR)"),
            ("BMO", "Bank of Montreal", "Bank of Montreal (ADR)"),
            (
                "MFC",
                "Manulife Financial Corporation",
                "Manulife Financial Corporation (ADR)",
            ),
            ("SLF", "Sun Life Financial Inc.", "Sun Life Financial Inc. (ADR)"),
            ("ENB", "Enbridge Inc.", "Enbridge Inc. (ADR)"),
            ("TRP", "TC Energy Corporation", "TC Energy Corporation (ADR)"),
        ];
        for (root, tsx_name, nyse_name) in dual_listed {
            tables.ambiguous.insert(
                root.to_string(),
                vec![
                    AmbiguityCandidate::new("TSX", tsx_name, "Canada", &format!("{root}.TO")),
                    AmbiguityCandidate::new("NYSE", nyse_name, "USA", root),
                ],
            );
        }

        // Company names and common aliases, checked in order
        let hints = [
            ("telus", "T.TO"),
            ("at&t", "T"),
            ("at & t", "T"),
            ("power corporation", "POW.TO"),
            ("power corp", "POW.TO"),
            ("power reit", "POW"),
            ("royal bank", "RY.TO"),
            ("banque royale", "RY.TO"),
            ("rbc", "RY.TO"),
            ("toronto-dominion", "TD.TO"),
            ("td bank", "TD.TO"),
            ("banque td", "TD.TO"),
            ("cibc", "CM.TO"),
            ("canadian imperial", "CM.TO"),
            ("scotiabank", "BNS.TO"),
            ("bank of nova scotia", "BNS.TO"),
            ("banque scotia", "BNS.TO"),
            ("bank of montreal", "BMO.TO"),
            ("banque de montréal", "BMO.TO"),
            ("manulife", "MFC.TO"),
            ("sun life", "SLF.TO"),
            ("financière sun life", "SLF.TO"),
            ("enbridge", "ENB.TO"),
            ("tc energy", "TRP.TO"),
            ("transcanada", "TRP.TO"),
        ];
        for (phrase, symbol) in hints {
            tables = tables.with_company_hint(phrase, symbol);
        }

        tables
    }

    /// Register an ambiguous root with its candidate listings
    pub fn with_ambiguous(mut self, root: &str, candidates: Vec<AmbiguityCandidate>) -> Self {
        self.ambiguous
            .insert(root.trim().to_ascii_uppercase(), candidates);
        self
    }

    /// Append a company-name phrase that points at one listing
    pub fn with_company_hint(mut self, phrase: &str, symbol: &str) -> Self {
        self.company_hints
            .push((phrase.trim().to_lowercase(), CanonicalTicker::parse(symbol)));
        self
    }

    pub fn with_geography_keyword(mut self, geography: Geography, keyword: &str) -> Self {
        push_keyword(&mut self.geography_keywords, geography, keyword);
        self
    }

    /// Keyword that also qualifies bare symbols for `geography`
    pub fn with_listing_keyword(mut self, geography: Geography, keyword: &str) -> Self {
        push_keyword(&mut self.listing_keywords, geography, keyword);
        push_keyword(&mut self.geography_keywords, geography, keyword);
        self
    }

    pub fn with_listing(mut self, geography: Geography, symbol: &str) -> Self {
        let symbol = symbol.trim().to_ascii_uppercase();
        match geography {
            Geography::Canada => self.canadian.insert(symbol),
            Geography::UnitedKingdom => self.uk.insert(symbol),
            Geography::France => self.french.insert(symbol),
        };
        self
    }

    /// Whether `symbol` (uppercase, unsuffixed) is a curated listing of `geography`
    pub fn is_listed(&self, geography: Geography, symbol: &str) -> bool {
        match geography {
            Geography::Canada => self.canadian.contains(symbol),
            Geography::UnitedKingdom => self.uk.contains(symbol),
            Geography::France => self.french.contains(symbol),
        }
    }

    /// First geography whose keywords appear in `text`, in Canada, UK, France order
    pub fn geography_of(&self, text: &str) -> Option<Geography> {
        first_mentioned(&self.geography_keywords, text)
    }

    /// Like `geography_of`, restricted to the keywords that qualify a bare
    /// symbol (exchange and city names)
    pub fn listing_geography_of(&self, text: &str) -> Option<Geography> {
        first_mentioned(&self.listing_keywords, text)
    }

    /// Whether any keyword of `geography` appears in already-lowercased text
    pub(crate) fn mentions(&self, lowered: &str, geography: Geography) -> bool {
        self.geography_keywords
            .iter()
            .filter(|(g, _)| *g == geography)
            .any(|(_, keywords)| keywords.iter().any(|kw| contains_phrase(lowered, kw)))
    }

    pub fn candidates(&self, root: &str) -> Option<&[AmbiguityCandidate]> {
        self.ambiguous.get(root).map(Vec::as_slice)
    }

    pub fn is_ambiguous(&self, root: &str) -> bool {
        self.ambiguous.contains_key(root)
    }

    pub fn company_hints(&self) -> impl Iterator<Item = (&str, &CanonicalTicker)> {
        self.company_hints
            .iter()
            .map(|(phrase, ticker)| (phrase.as_str(), ticker))
    }
}

fn push_keyword(sets: &mut Vec<(Geography, Vec<String>)>, geography: Geography, keyword: &str) {
    let keyword = keyword.trim().to_lowercase();
    match sets.iter_mut().find(|(g, _)| *g == geography) {
        Some((_, keywords)) => {
            if !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }
        None => sets.push((geography, vec![keyword])),
    }
}

fn first_mentioned(sets: &[(Geography, Vec<String>)], text: &str) -> Option<Geography> {
    let lowered = text.to_lowercase();
    if lowered.trim().is_empty() {
        return None;
    }
    sets.iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| contains_phrase(&lowered, kw)))
        .map(|(geography, _)| *geography)
}

fn to_set(symbols: &[&str]) -> HashSet<String> {
    symbols.iter().map(|s| s.to_string()).collect()
}

fn to_vec(keywords: &[&str]) -> Vec<String> {
    keywords.iter().map(|s| s.to_string()).collect()
}
