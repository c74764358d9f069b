use std::sync::{Arc, Mutex};

use super::events::{EngineEvent, EventSender};
use super::ids::ConversationId;
use super::suggestions::SuggestionBoard;

/// Tracks which conversation the local user is looking at.
///
/// Selection only moves suggestion state around; it never touches the
/// message store and never cancels an in-flight pipeline. A pipeline whose
/// conversation lost focus discards its own late suggestion result.
pub struct ConversationSelector {
    board: Arc<SuggestionBoard>,
    events: EventSender,
    active: Mutex<Option<ConversationId>>,
}

impl ConversationSelector {
    pub fn new(board: Arc<SuggestionBoard>, events: EventSender) -> Self {
        Self {
            board,
            events,
            active: Mutex::new(None),
        }
    }

    pub fn active(&self) -> Option<ConversationId> {
        *self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Switches the active conversation, clearing the displayed suggestions
    /// of both the conversation being left and the one being entered. The
    /// selection lock is held across the swap and the clears so a late
    /// suggestion publish observes either the old selection or a cleared
    /// board, never a half-switched state.
    pub fn select(&self, conversation_id: ConversationId) {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *active == Some(conversation_id) {
            return;
        }
        let previous = active.replace(conversation_id);

        if let Some(previous) = previous {
            self.board.clear(previous);
            self.events.emit(EngineEvent::SuggestionsCleared {
                conversation_id: previous,
            });
        }
        self.board.clear(conversation_id);
        self.events
            .emit(EngineEvent::SuggestionsCleared { conversation_id });
        self.events
            .emit(EngineEvent::ConversationSelected { conversation_id });
        tracing::debug!(%conversation_id, "conversation selected");
    }

    /// Publishes a suggestion set only if `conversation_id` is the active
    /// conversation, holding the selection lock across the check and the
    /// write. Returns the published set, or `None` when the conversation
    /// is not active and the set was discarded.
    pub fn publish_if_active(
        &self,
        conversation_id: ConversationId,
        suggestions: Vec<String>,
    ) -> Option<Vec<String>> {
        let active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *active != Some(conversation_id) {
            return None;
        }
        self.board.publish(conversation_id, suggestions);
        let published = self.board.current(conversation_id);
        self.events.emit(EngineEvent::SuggestionsUpdated {
            conversation_id,
            suggestions: published.clone(),
        });
        Some(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> (ConversationSelector, Arc<SuggestionBoard>) {
        let board = Arc::new(SuggestionBoard::new());
        (
            ConversationSelector::new(board.clone(), EventSender::new()),
            board,
        )
    }

    #[test]
    fn switching_clears_both_sides_of_the_move() {
        let (selector, board) = selector();
        let a = ConversationId::new(1);
        let b = ConversationId::new(2);
        selector.select(a);
        board.publish(a, vec!["stay sharp".to_string()]);
        board.publish(b, vec!["old chip".to_string()]);

        selector.select(b);

        assert_eq!(selector.active(), Some(b));
        assert!(board.current(a).is_empty());
        assert!(board.current(b).is_empty());
    }

    #[test]
    fn publish_if_active_discards_for_inactive_conversations() {
        let (selector, board) = selector();
        let a = ConversationId::new(1);
        let b = ConversationId::new(2);
        selector.select(a);

        let published = selector.publish_if_active(b, vec!["late chip".to_string()]);

        assert_eq!(published, None);
        assert!(board.current(b).is_empty());
        assert_eq!(
            selector.publish_if_active(a, vec!["on time".to_string()]),
            Some(vec!["on time".to_string()])
        );
        assert_eq!(board.current(a), vec!["on time"]);
    }

    #[test]
    fn reselecting_the_active_conversation_keeps_suggestions() {
        let (selector, board) = selector();
        let a = ConversationId::new(1);
        selector.select(a);
        board.publish(a, vec!["keep me".to_string()]);

        selector.select(a);

        assert_eq!(board.current(a), vec!["keep me"]);
    }
}
