use analysis_core::CanonicalTicker;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Per-conversation memory of listings the user already chose.
///
/// Keys are uppercase root symbols without an exchange suffix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMemory {
    #[serde(default)]
    ticker_preferences: HashMap<String, CanonicalTicker>,
    #[serde(default)]
    user_name: Option<String>,
}

impl SessionMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_name(mut self, name: &str) -> Self {
        let name = name.trim();
        self.user_name = (!name.is_empty()).then(|| name.to_string());
        self
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn preference(&self, root: &str) -> Option<&CanonicalTicker> {
        self.ticker_preferences.get(&root_key(root))
    }

    pub fn record_preference(&mut self, root: &str, chosen: CanonicalTicker) {
        let key = root_key(root);
        info!("Saved listing preference {} -> {}", key, chosen);
        self.ticker_preferences.insert(key, chosen);
    }

    /// Copy of this memory with one more preference
    pub fn with_preference(mut self, root: &str, chosen: CanonicalTicker) -> Self {
        self.record_preference(root, chosen);
        self
    }

    pub fn forget(&mut self, root: &str) -> Option<CanonicalTicker> {
        self.ticker_preferences.remove(&root_key(root))
    }

    pub fn len(&self) -> usize {
        self.ticker_preferences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticker_preferences.is_empty()
    }
}

/// Record the user's chosen listing, e.g. `("pow", "pow.to")`.
pub fn save_preference(session: &mut SessionMemory, root: &str, chosen: &str) {
    session.record_preference(root, CanonicalTicker::parse(chosen));
}

fn root_key(root: &str) -> String {
    CanonicalTicker::parse(root).symbol
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferences_are_case_insensitive() {
        let mut session = SessionMemory::new();
        save_preference(&mut session, "pow", "pow.to");

        assert_eq!(session.preference("POW").unwrap().qualified(), "POW.TO");
        assert_eq!(session.preference(" pow ").unwrap().qualified(), "POW.TO");
        assert_eq!(session.len(), 1);
        assert!(session.preference("T").is_none());
    }

    #[test]
    fn with_preference_leaves_original_untouched() {
        let original = SessionMemory::new().with_user_name("Alex");
        let updated = original
            .clone()
            .with_preference("TD", CanonicalTicker::parse("TD"));

        assert!(original.is_empty());
        assert_eq!(updated.preference("td").unwrap().qualified(), "TD");
        assert_eq!(updated.user_name(), Some("Alex"));
    }

    #[test]
    fn deserializes_without_fields() {
        let session: SessionMemory = serde_json::from_str("{}").unwrap();
        assert!(session.is_empty());
        assert_eq!(session.user_name(), None);
    }

    #[test]
    fn forget_removes_preference() {
        let mut session = SessionMemory::new().with_preference("T", CanonicalTicker::parse("T.TO"));
        assert!(session.forget("t").is_some());
        assert!(session.is_empty());
    }
}
