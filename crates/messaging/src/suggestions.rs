use std::collections::HashMap;
use std::sync::Mutex;

use super::ids::ConversationId;

pub use tradelink_gateway::MAX_SUGGESTIONS;

/// View-scoped quick-reply suggestions, keyed by conversation.
///
/// A conversation's entry is superseded whenever a new message goes out,
/// the active conversation changes, or a new generation cycle starts; the
/// board only ever holds the latest published set.
#[derive(Debug, Default)]
pub struct SuggestionBoard {
    entries: Mutex<HashMap<ConversationId, Vec<String>>>,
}

impl SuggestionBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the suggestion set, trimming blanks and capping the count.
    pub fn publish(&self, conversation_id: ConversationId, suggestions: Vec<String>) {
        let suggestions: Vec<String> = suggestions
            .into_iter()
            .map(|entry| entry.trim().to_string())
            .filter(|entry| !entry.is_empty())
            .take(MAX_SUGGESTIONS)
            .collect();
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(conversation_id, suggestions);
    }

    pub fn clear(&self, conversation_id: ConversationId) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&conversation_id);
    }

    pub fn current(&self, conversation_id: ConversationId) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_caps_and_trims_entries() {
        let board = SuggestionBoard::new();
        board.publish(
            ConversationId::new(1),
            vec![
                " Thanks! ".to_string(),
                String::new(),
                "Confirm".to_string(),
                "More".to_string(),
                "Extra".to_string(),
            ],
        );
        let current = board.current(ConversationId::new(1));
        assert_eq!(current, vec!["Thanks!", "Confirm", "More"]);
    }

    #[test]
    fn clear_removes_only_the_named_conversation() {
        let board = SuggestionBoard::new();
        board.publish(ConversationId::new(1), vec!["a".to_string()]);
        board.publish(ConversationId::new(2), vec!["b".to_string()]);
        board.clear(ConversationId::new(1));
        assert!(board.current(ConversationId::new(1)).is_empty());
        assert_eq!(board.current(ConversationId::new(2)), vec!["b"]);
    }
}
