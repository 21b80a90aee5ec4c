use analysis_core::CanonicalTicker;
use dashmap::DashMap;
use ticker_resolver::{save_preference, ClarificationRequest, SessionMemory};

/// Session memories keyed by session id.
///
/// Reads hand out a copy so no map guard outlives the call.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, SessionMemory>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, session_id: &str) -> SessionMemory {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn set_user_name(&self, session_id: &str, name: &str) {
        let mut entry = self.sessions.entry(session_id.to_string()).or_default();
        let updated = std::mem::take(entry.value_mut()).with_user_name(name);
        *entry.value_mut() = updated;
    }

    pub fn record(&self, session_id: &str, root: &str, chosen: &CanonicalTicker) {
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .record_preference(root, chosen.clone());
    }

    /// Apply the user's reply to a clarification question; the chosen
    /// listing is remembered for the rest of the session.
    pub fn answer_clarification(
        &self,
        session_id: &str,
        request: &ClarificationRequest,
        reply: &str,
    ) -> Option<CanonicalTicker> {
        let chosen = request.match_answer(reply)?.normalized_symbol.clone();
        let mut entry = self.sessions.entry(session_id.to_string()).or_default();
        save_preference(entry.value_mut(), &request.root, &chosen.qualified());
        Some(chosen)
    }

    pub fn forget_session(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
