use std::sync::Arc;

use snafu::ensure;

use super::error::{MessagingResult, UnknownConversationSnafu};
use super::events::{EngineEvent, EventSender};
use super::ids::ConversationId;
use super::model::{FileAttachment, Message, MessageDraft, VoiceNote};
use super::roster::Roster;
use super::store::MessageStore;
use super::suggestions::SuggestionBoard;

/// Builds attachment messages outside the AI reply path.
///
/// Attachments are fire-and-forget: the append is synchronous, clears the
/// conversation's suggestion chips, and never invokes the completion
/// gateway, so it is not subject to the send serialization rule.
pub struct AttachmentComposer {
    store: Arc<MessageStore>,
    board: Arc<SuggestionBoard>,
    roster: Arc<Roster>,
    events: EventSender,
}

impl AttachmentComposer {
    pub fn new(
        store: Arc<MessageStore>,
        board: Arc<SuggestionBoard>,
        roster: Arc<Roster>,
        events: EventSender,
    ) -> Self {
        Self {
            store,
            board,
            roster,
            events,
        }
    }

    pub fn attach_file(
        &self,
        conversation_id: ConversationId,
        attachment: FileAttachment,
    ) -> MessagingResult<Message> {
        self.append(conversation_id, MessageDraft::file(attachment), "attach-file")
    }

    pub fn attach_voice_note(
        &self,
        conversation_id: ConversationId,
        voice_note: VoiceNote,
    ) -> MessagingResult<Message> {
        self.append(
            conversation_id,
            MessageDraft::voice_note(voice_note),
            "attach-voice-note",
        )
    }

    fn append(
        &self,
        conversation_id: ConversationId,
        draft: MessageDraft,
        stage: &'static str,
    ) -> MessagingResult<Message> {
        ensure!(
            self.roster.contains(conversation_id),
            UnknownConversationSnafu {
                stage,
                conversation_id,
            }
        );

        self.board.clear(conversation_id);
        self.events
            .emit(EngineEvent::SuggestionsCleared { conversation_id });

        let message = self.store.append(conversation_id, draft);
        tracing::debug!(%conversation_id, message_id = %message.id, stage, "attachment appended");
        self.events.emit(EngineEvent::MessageAppended {
            conversation_id,
            message: message.clone(),
        });
        Ok(message)
    }
}
