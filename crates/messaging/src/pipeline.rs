use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use snafu::ensure;
use tokio::time::timeout;
use tradelink_gateway::CompletionGateway;

use super::error::{
    ConversationBusySnafu, EmptyMessageSnafu, MessagingResult, UnknownConversationSnafu,
};
use super::events::{EngineEvent, EventSender};
use super::ids::ConversationId;
use super::model::{Message, MessageDraft, PendingFlags};
use super::roster::Roster;
use super::selector::ConversationSelector;
use super::state::{DeliveryState, DeliveryTransition};
use super::store::MessageStore;
use super::suggestions::SuggestionBoard;

pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SUGGESTION_TIMEOUT: Duration = Duration::from_secs(15);

/// Contact-sender text shown when reply generation fails. Kept short and
/// apologetic; it lands in the conversation like any other message.
pub const DEFAULT_REPLY_ERROR_TEXT: &str =
    "Sorry, I could not respond right now. Please try again in a moment.";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Role label of the local user, forwarded to suggestion generation.
    pub local_role: String,
    pub reply_timeout: Duration,
    pub suggestion_timeout: Duration,
    pub reply_error_text: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            local_role: "Distributor".to_string(),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            suggestion_timeout: DEFAULT_SUGGESTION_TIMEOUT,
            reply_error_text: DEFAULT_REPLY_ERROR_TEXT.to_string(),
        }
    }
}

/// What a completed `send` call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Replied {
        reply: Message,
        /// The published suggestion set; empty when generation failed or the
        /// result was discarded as stale.
        suggestions: Vec<String>,
    },
    ReplyFailed {
        error_notice: Message,
    },
}

#[derive(Debug, Default, Clone, Copy)]
struct SendSession {
    state: DeliveryState,
    /// Bumped on every accepted send so a superseded pipeline can recognize
    /// that the session moved on without it.
    cycle: u64,
}

/// Orchestrates the reply cycle for text sends.
///
/// Per conversation: optimistic append, one gateway call for the contact
/// reply, an atomic read-receipt-plus-reply commit, then a best-effort
/// suggestion call whose result is discarded if the conversation is no
/// longer the active one. Pipelines for different conversations are fully
/// independent.
pub struct SendPipeline {
    store: Arc<MessageStore>,
    board: Arc<SuggestionBoard>,
    selector: Arc<ConversationSelector>,
    roster: Arc<Roster>,
    gateway: Arc<dyn CompletionGateway>,
    events: EventSender,
    config: EngineConfig,
    sessions: Mutex<HashMap<ConversationId, SendSession>>,
}

impl SendPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<MessageStore>,
        board: Arc<SuggestionBoard>,
        selector: Arc<ConversationSelector>,
        roster: Arc<Roster>,
        gateway: Arc<dyn CompletionGateway>,
        events: EventSender,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            board,
            selector,
            roster,
            gateway,
            events,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn pending_flags(&self, conversation_id: ConversationId) -> PendingFlags {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&conversation_id)
            .map(|session| session.state.pending_flags())
            .unwrap_or_default()
    }

    pub fn delivery_state(&self, conversation_id: ConversationId) -> DeliveryState {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&conversation_id)
            .map(|session| session.state)
            .unwrap_or_default()
    }

    /// Runs the full send cycle for one text message.
    pub async fn send(
        &self,
        conversation_id: ConversationId,
        raw_text: &str,
    ) -> MessagingResult<SendOutcome> {
        let text = raw_text.trim();
        ensure!(
            self.roster.contains(conversation_id),
            UnknownConversationSnafu {
                stage: "send-precondition",
                conversation_id,
            }
        );
        ensure!(
            !text.is_empty(),
            EmptyMessageSnafu {
                stage: "send-precondition",
                conversation_id,
            }
        );

        let cycle = self.begin_cycle(conversation_id)?;

        // Chips are superseded before any network step.
        self.board.clear(conversation_id);
        self.events
            .emit(EngineEvent::SuggestionsCleared { conversation_id });

        let user_message = self
            .store
            .append(conversation_id, MessageDraft::user_text(text));
        self.events.emit(EngineEvent::MessageAppended {
            conversation_id,
            message: user_message.clone(),
        });
        tracing::info!(
            %conversation_id,
            message_id = %user_message.id,
            "user message appended, requesting reply"
        );

        // Roster membership was checked above; a bare context only appears
        // if the roster changed out from under us.
        let context = self
            .roster
            .get(conversation_id)
            .map(|conversation| conversation.context())
            .unwrap_or_else(|| {
                tradelink_gateway::ConversationContext::new(conversation_id.0, "", "")
            });

        // History is rebuilt from post-append store state, never cached.
        let history = self.store.history_for(conversation_id);

        self.transition(conversation_id, cycle, DeliveryTransition::ReplyRequested);
        let reply_result = match timeout(
            self.config.reply_timeout,
            self.gateway.generate_reply(&context, &history),
        )
        .await
        {
            Ok(Ok(reply_text)) => Ok(reply_text),
            Ok(Err(error)) => Err(error.to_string()),
            Err(_elapsed) => Err(format!(
                "reply generation timed out after {:?}",
                self.config.reply_timeout
            )),
        };

        let reply_text = match reply_result {
            Ok(reply_text) => reply_text,
            Err(details) => {
                tracing::error!(%conversation_id, details, "reply generation failed");
                // Append before the session returns to idle so a follow-up
                // send cannot slot its user message ahead of the notice.
                let error_notice = self.store.append(
                    conversation_id,
                    MessageDraft::contact_text(self.config.reply_error_text.clone()),
                );
                self.events.emit(EngineEvent::MessageAppended {
                    conversation_id,
                    message: error_notice.clone(),
                });
                self.transition(conversation_id, cycle, DeliveryTransition::ReplyFailed);
                return Ok(SendOutcome::ReplyFailed { error_notice });
            }
        };

        self.transition(conversation_id, cycle, DeliveryTransition::ReplyArrived);
        let reply = self.store.commit_contact_reply(conversation_id, reply_text);
        self.events
            .emit(EngineEvent::ReadReceiptsApplied { conversation_id });
        self.events.emit(EngineEvent::MessageAppended {
            conversation_id,
            message: reply.clone(),
        });
        tracing::info!(%conversation_id, message_id = %reply.id, "contact reply committed");

        let suggestions = self.suggestion_phase(conversation_id, cycle, &context).await;

        Ok(SendOutcome::Replied { reply, suggestions })
    }

    /// Best-effort suggestion generation. Failures degrade to an empty set;
    /// stale results (conversation no longer active, or cycle superseded)
    /// are discarded silently.
    async fn suggestion_phase(
        &self,
        conversation_id: ConversationId,
        cycle: u64,
        context: &tradelink_gateway::ConversationContext,
    ) -> Vec<String> {
        let history = self.store.history_for(conversation_id);

        let suggestions = match timeout(
            self.config.suggestion_timeout,
            self.gateway
                .generate_suggestions(context, &history, &self.config.local_role),
        )
        .await
        {
            Ok(Ok(suggestions)) => suggestions,
            Ok(Err(error)) => {
                // Not user-visible; the chips simply stay absent.
                tracing::warn!(%conversation_id, %error, "suggestion generation failed");
                Vec::new()
            }
            Err(_elapsed) => {
                tracing::warn!(%conversation_id, "suggestion generation timed out");
                Vec::new()
            }
        };

        match self.resolve_suggestions(conversation_id, cycle, suggestions) {
            Some(published) => published,
            None => Vec::new(),
        }
    }

    /// Resolves the suggestion cycle and publishes in one critical section.
    /// The cycle check and the board write must not be separable: a send or
    /// selection landing in between would clear the board and then have a
    /// stale set written over the clear.
    fn resolve_suggestions(
        &self,
        conversation_id: ConversationId,
        cycle: u64,
        suggestions: Vec<String>,
    ) -> Option<Vec<String>> {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let session = sessions.get_mut(&conversation_id)?;
        if session.cycle != cycle {
            tracing::debug!(%conversation_id, cycle, "suggestion cycle superseded, discarding");
            return None;
        }
        match session.state.apply(DeliveryTransition::SuggestionsResolved) {
            Ok(next) => session.state = next,
            Err(rejection) => {
                tracing::warn!(%conversation_id, ?rejection, "suggestion resolution rejected");
                return None;
            }
        }

        // The selector holds its own lock across the active check and the
        // publish, so a concurrent selection cannot slip between them. The
        // check is "is this the active conversation right now", not "was it
        // continuously active".
        let published = self.selector.publish_if_active(conversation_id, suggestions);
        if published.is_none() {
            tracing::debug!(%conversation_id, "conversation no longer active, discarding suggestions");
        }
        published
    }

    fn begin_cycle(&self, conversation_id: ConversationId) -> MessagingResult<u64> {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let session = sessions.entry(conversation_id).or_default();
        match session.state.apply(DeliveryTransition::BeginSend) {
            Ok(next) => {
                session.state = next;
                session.cycle += 1;
                Ok(session.cycle)
            }
            Err(rejection) => {
                tracing::warn!(%conversation_id, ?rejection, "send rejected");
                ConversationBusySnafu {
                    stage: "send-begin",
                    conversation_id,
                }
                .fail()
            }
        }
    }

    /// Applies a transition for `cycle`, returning false when the session
    /// has been superseded or the transition is out of phase.
    fn transition(
        &self,
        conversation_id: ConversationId,
        cycle: u64,
        transition: DeliveryTransition,
    ) -> bool {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(session) = sessions.get_mut(&conversation_id) else {
            return false;
        };
        if session.cycle != cycle {
            return false;
        }
        match session.state.apply(transition) {
            Ok(next) => {
                session.state = next;
                true
            }
            Err(rejection) => {
                tracing::warn!(%conversation_id, ?rejection, ?transition, "transition rejected");
                false
            }
        }
    }
}
