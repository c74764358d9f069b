use snafu::Snafu;

use super::ids::ConversationId;

pub type MessagingResult<T> = Result<T, MessagingError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MessagingError {
    #[snafu(display("cannot send an empty message to conversation {conversation_id}"))]
    EmptyMessage {
        stage: &'static str,
        conversation_id: ConversationId,
    },
    #[snafu(display("conversation {conversation_id} already has a reply cycle in flight"))]
    ConversationBusy {
        stage: &'static str,
        conversation_id: ConversationId,
    },
    #[snafu(display("conversation {conversation_id} is not in the roster"))]
    UnknownConversation {
        stage: &'static str,
        conversation_id: ConversationId,
    },
    #[snafu(display("failed to parse roster JSON"))]
    RosterParse {
        stage: &'static str,
        source: serde_json::Error,
    },
}
