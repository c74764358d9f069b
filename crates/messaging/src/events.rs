use tokio::sync::broadcast;

use super::ids::ConversationId;
use super::model::Message;

pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Engine-published notification for presentation bindings.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    MessageAppended {
        conversation_id: ConversationId,
        message: Message,
    },
    ReadReceiptsApplied {
        conversation_id: ConversationId,
    },
    SuggestionsUpdated {
        conversation_id: ConversationId,
        suggestions: Vec<String>,
    },
    SuggestionsCleared {
        conversation_id: ConversationId,
    },
    ConversationSelected {
        conversation_id: ConversationId,
    },
}

/// Broadcast fan-out for engine events.
///
/// Slow or dropped subscribers never stall the pipeline; send results are
/// deliberately ignored.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventSender {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventSender {
    fn default() -> Self {
        Self::new()
    }
}
