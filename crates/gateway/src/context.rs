/// Conversation identity and counterpart details handed to the gateway with
/// every call. The gateway never sees engine state beyond this snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationContext {
    pub conversation_id: u64,
    pub remote_party_name: String,
    pub remote_party_role_label: String,
    pub trade_reference: Option<String>,
}

impl ConversationContext {
    pub fn new(
        conversation_id: u64,
        remote_party_name: impl Into<String>,
        remote_party_role_label: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id,
            remote_party_name: remote_party_name.into(),
            remote_party_role_label: remote_party_role_label.into(),
            trade_reference: None,
        }
    }

    pub fn with_trade_reference(mut self, trade_reference: impl Into<String>) -> Self {
        self.trade_reference = Some(trade_reference.into());
        self
    }
}

/// Speaker role as the completion service understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryRole {
    User,
    Model,
}

/// One role-tagged text fragment of the conversation history.
///
/// Callers rebuild the full entry sequence from their message store on every
/// gateway call; entries are never cached between calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: HistoryRole,
    pub text: String,
}

impl HistoryEntry {
    pub fn new(role: HistoryRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(HistoryRole::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(HistoryRole::Model, text)
    }
}
