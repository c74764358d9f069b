use serde::Deserialize;
use snafu::ResultExt;
use tradelink_gateway::ConversationContext;

use super::error::{MessagingResult, RosterParseSnafu};
use super::ids::ConversationId;
use super::model::MessageDraft;

/// One two-party conversation as seen in the roster.
///
/// Roster records are fixed at session bootstrap and read-only to the
/// messaging engine; the preview fields are display seeds, not live caches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub contact_name: String,
    pub contact_role_label: String,
    #[serde(default)]
    pub trade_reference: Option<String>,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub last_message_preview: String,
    #[serde(default)]
    pub last_activity_label: String,
}

impl Conversation {
    /// Context snapshot handed to the completion gateway.
    pub fn context(&self) -> ConversationContext {
        let mut context = ConversationContext::new(
            self.id.0,
            self.contact_name.clone(),
            self.contact_role_label.clone(),
        );
        if let Some(trade_reference) = &self.trade_reference {
            context = context.with_trade_reference(trade_reference.clone());
        }
        context
    }
}

/// The fixed set of conversations available for a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Roster {
    conversations: Vec<Conversation>,
}

impl Roster {
    pub fn new(conversations: Vec<Conversation>) -> Self {
        Self { conversations }
    }

    /// Loads a roster from a JSON array of conversation records.
    pub fn from_json_str(raw: &str) -> MessagingResult<Self> {
        let conversations: Vec<Conversation> = serde_json::from_str(raw).context(
            RosterParseSnafu {
                stage: "roster-from-json",
            },
        )?;
        Ok(Self::new(conversations))
    }

    pub fn get(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|conversation| conversation.id == id)
    }

    pub fn contains(&self, id: ConversationId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.iter()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Demo roster used when no deployment-specific roster is supplied.
    pub fn builtin() -> Self {
        Self::new(vec![
            Conversation {
                id: ConversationId::new(1),
                contact_name: "Elena Rossi".to_string(),
                contact_role_label: "Freight Forwarder".to_string(),
                trade_reference: Some("TRD-2024-118".to_string()),
                online: true,
                last_message_preview: "The customs paperwork is ready.".to_string(),
                last_activity_label: "09:40".to_string(),
            },
            Conversation {
                id: ConversationId::new(2),
                contact_name: "Marcus Webb".to_string(),
                contact_role_label: "Buyer".to_string(),
                trade_reference: Some("ORD-5531".to_string()),
                online: false,
                last_message_preview: "Can we revisit the unit price?".to_string(),
                last_activity_label: "Yesterday".to_string(),
            },
            Conversation {
                id: ConversationId::new(3),
                contact_name: "Aiko Tanaka".to_string(),
                contact_role_label: "Customs Broker".to_string(),
                trade_reference: None,
                online: true,
                last_message_preview: "I filed the declaration this morning.".to_string(),
                last_activity_label: "Mon".to_string(),
            },
        ])
    }

    /// Starter messages matching the demo roster, keyed by conversation.
    pub fn builtin_seed_messages() -> Vec<(ConversationId, Vec<MessageDraft>)> {
        vec![
            (
                ConversationId::new(1),
                vec![
                    MessageDraft::contact_text(
                        "Good morning! The shipment cleared the origin port.",
                    ),
                    MessageDraft::user_text("Great, thanks for the update.").with_read(true),
                    MessageDraft::contact_text("The customs paperwork is ready."),
                ],
            ),
            (
                ConversationId::new(2),
                vec![MessageDraft::contact_text("Can we revisit the unit price?")],
            ),
        ]
    }
}
