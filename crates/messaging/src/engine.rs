use std::sync::Arc;

use snafu::ensure;
use tokio::sync::broadcast;
use tradelink_gateway::{CompletionGateway, HistoryEntry};

use super::composer::AttachmentComposer;
use super::error::{MessagingResult, UnknownConversationSnafu};
use super::events::{EngineEvent, EventSender};
use super::ids::ConversationId;
use super::model::{FileAttachment, Message, PendingFlags, VoiceNote};
use super::pipeline::{EngineConfig, SendOutcome, SendPipeline};
use super::roster::Roster;
use super::selector::ConversationSelector;
use super::store::MessageStore;
use super::suggestions::SuggestionBoard;

/// One handle over the whole messaging core: store, selector, composer and
/// send pipeline wired to a shared suggestion board and event stream.
///
/// The engine is cheap to share behind an `Arc`; all methods take `&self`.
pub struct MessagingEngine {
    store: Arc<MessageStore>,
    board: Arc<SuggestionBoard>,
    selector: Arc<ConversationSelector>,
    composer: AttachmentComposer,
    pipeline: SendPipeline,
    roster: Arc<Roster>,
    events: EventSender,
}

impl MessagingEngine {
    pub fn new(
        roster: Roster,
        gateway: Arc<dyn CompletionGateway>,
        config: EngineConfig,
    ) -> Self {
        Self::with_store(Arc::new(MessageStore::new()), roster, gateway, config)
    }

    /// Engine over a caller-supplied store, for seeded fixtures and tests.
    pub fn with_store(
        store: Arc<MessageStore>,
        roster: Roster,
        gateway: Arc<dyn CompletionGateway>,
        config: EngineConfig,
    ) -> Self {
        let roster = Arc::new(roster);
        let board = Arc::new(SuggestionBoard::new());
        let events = EventSender::new();
        let selector = Arc::new(ConversationSelector::new(board.clone(), events.clone()));
        let composer = AttachmentComposer::new(
            store.clone(),
            board.clone(),
            roster.clone(),
            events.clone(),
        );
        let pipeline = SendPipeline::new(
            store.clone(),
            board.clone(),
            selector.clone(),
            roster.clone(),
            gateway,
            events.clone(),
            config,
        );

        Self {
            store,
            board,
            selector,
            composer,
            pipeline,
            roster,
            events,
        }
    }

    /// Engine over the built-in demo roster with its starter messages.
    pub fn with_builtin_roster(
        gateway: Arc<dyn CompletionGateway>,
        config: EngineConfig,
    ) -> Self {
        let store = Arc::new(MessageStore::new());
        for (conversation_id, drafts) in Roster::builtin_seed_messages() {
            store.seed(conversation_id, drafts);
        }
        Self::with_store(store, Roster::builtin(), gateway, config)
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub async fn send(
        &self,
        conversation_id: ConversationId,
        raw_text: &str,
    ) -> MessagingResult<SendOutcome> {
        self.pipeline.send(conversation_id, raw_text).await
    }

    pub fn attach_file(
        &self,
        conversation_id: ConversationId,
        attachment: FileAttachment,
    ) -> MessagingResult<Message> {
        self.composer.attach_file(conversation_id, attachment)
    }

    pub fn attach_voice_note(
        &self,
        conversation_id: ConversationId,
        voice_note: VoiceNote,
    ) -> MessagingResult<Message> {
        self.composer.attach_voice_note(conversation_id, voice_note)
    }

    pub fn select_conversation(&self, conversation_id: ConversationId) -> MessagingResult<()> {
        ensure!(
            self.roster.contains(conversation_id),
            UnknownConversationSnafu {
                stage: "select-conversation",
                conversation_id,
            }
        );
        self.selector.select(conversation_id);
        Ok(())
    }

    pub fn active_conversation(&self) -> Option<ConversationId> {
        self.selector.active()
    }

    pub fn messages(&self, conversation_id: ConversationId) -> Vec<Message> {
        self.store.messages(conversation_id)
    }

    pub fn history_for(&self, conversation_id: ConversationId) -> Vec<HistoryEntry> {
        self.store.history_for(conversation_id)
    }

    pub fn suggestions(&self, conversation_id: ConversationId) -> Vec<String> {
        self.board.current(conversation_id)
    }

    pub fn pending_flags(&self, conversation_id: ConversationId) -> PendingFlags {
        self.pipeline.pending_flags(conversation_id)
    }
}
