//! Session manager for conversation sessions.
//!
//! Wraps a `ConversationSession` and applies turns to both of its records
//! (structured messages and display history) while keeping `updated_at`
//! strictly increasing.

use agentry_types::conversation::{
    ConversationMessage, ConversationSession, HistoryEntry, MessageRole,
};
use chrono::{Duration, Utc};

/// Applies turns to a single conversation session.
pub struct SessionManager {
    session: ConversationSession,
}

impl SessionManager {
    /// Create a new session manager wrapping an existing session.
    pub fn new(session: ConversationSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn into_session(self) -> ConversationSession {
        self.session
    }

    pub fn message_count(&self) -> usize {
        self.session.messages.len()
    }

    /// Structured context to hand to the engine.
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.session.messages
    }

    pub fn record_human_turn(&mut self, content: &str) {
        self.record(MessageRole::Human, content);
    }

    pub fn record_assistant_turn(&mut self, content: &str) {
        self.record(MessageRole::Assistant, content);
    }

    fn record(&mut self, role: MessageRole, content: &str) {
        let message = ConversationMessage::new(role, content);
        self.session.history.push(HistoryEntry {
            role,
            content: content.to_string(),
            timestamp: message.created_at,
        });
        self.session.messages.push(message);
        self.touch();
    }

    /// Refresh `updated_at`. If the clock has not moved past the previous
    /// value, bump it by one microsecond instead.
    pub fn touch(&mut self) {
        let now = Utc::now();
        let previous = self.session.updated_at;
        self.session.updated_at = if now > previous {
            now
        } else {
            previous + Duration::microseconds(1)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session() -> ConversationSession {
        ConversationSession::new("cfg-1", Some("s-1".to_string()))
    }

    #[test]
    fn test_new_session_manager() {
        let mgr = SessionManager::new(test_session());
        assert_eq!(mgr.message_count(), 0);
        assert_eq!(mgr.session().session_id, "s-1");
    }

    #[test]
    fn test_turns_update_both_records() {
        let mut mgr = SessionManager::new(test_session());
        mgr.record_human_turn("What is 2+2?");
        mgr.record_assistant_turn("4");

        let session = mgr.into_session();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.messages[0].role, MessageRole::Human);
        assert_eq!(session.messages[1].role, MessageRole::Assistant);
        assert_eq!(session.history[1].content, "4");
        assert_eq!(session.history[0].timestamp, session.messages[0].created_at);
    }

    #[test]
    fn test_touch_is_strictly_increasing_when_clock_lags() {
        let mut session = test_session();
        // Pretend the last write happened in the future.
        session.updated_at = Utc::now() + Duration::hours(1);
        let before = session.updated_at;

        let mut mgr = SessionManager::new(session);
        mgr.touch();
        assert_eq!(mgr.session().updated_at, before + Duration::microseconds(1));
        mgr.touch();
        assert_eq!(mgr.session().updated_at, before + Duration::microseconds(2));
    }
}
