//! Conversational messaging core for the tradelink platform.
//!
//! Two-party conversations between the local user and one trade contact.
//! Text sends run the full reply cycle against the completion gateway:
//! optimistic append, contact reply with read-receipt propagation, then a
//! best-effort quick-reply suggestion pass. Attachments bypass the gateway
//! entirely. All state lives in process memory for the session.

pub mod composer;
pub mod engine;
pub mod error;
pub mod events;
pub mod ids;
pub mod model;
pub mod pipeline;
pub mod roster;
pub mod selector;
pub mod state;
pub mod store;
pub mod suggestions;

pub use composer::AttachmentComposer;
pub use engine::MessagingEngine;
pub use error::{MessagingError, MessagingResult};
pub use events::{EngineEvent, EventSender, EVENT_CHANNEL_CAPACITY};
pub use ids::{ConversationId, MessageId};
pub use model::{
    FileAttachment, Message, MessageBody, MessageDraft, PendingFlags, Sender, VoiceNote,
};
pub use pipeline::{
    EngineConfig, SendOutcome, SendPipeline, DEFAULT_REPLY_ERROR_TEXT, DEFAULT_REPLY_TIMEOUT,
    DEFAULT_SUGGESTION_TIMEOUT,
};
pub use roster::{Conversation, Roster};
pub use selector::ConversationSelector;
pub use state::{DeliveryRejection, DeliveryState, DeliveryTransition};
pub use store::MessageStore;
pub use suggestions::{SuggestionBoard, MAX_SUGGESTIONS};
