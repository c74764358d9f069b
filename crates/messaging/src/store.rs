use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{TimeZone, Utc};
use tradelink_gateway::{HistoryEntry, HistoryRole};

use super::ids::{ConversationId, MessageId};
use super::model::{Message, MessageDraft, Sender};

type ClockFn = Arc<dyn Fn() -> u64 + Send + Sync>;

#[derive(Default)]
struct ConversationLog {
    messages: Vec<Message>,
    next_message_id: u64,
}

/// Keyed, append-only message container shared by the pipeline and any
/// number of presentation readers.
///
/// All reads hand out cloned snapshots, so a reader can never observe a
/// partially appended message no matter when a pipeline callback lands.
pub struct MessageStore {
    conversations: RwLock<HashMap<ConversationId, ConversationLog>>,
    clock: ClockFn,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(system_clock))
    }

    /// Store with an injected clock, for deterministic timestamps in tests.
    pub fn with_clock(clock: ClockFn) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Appends a message, allocating its id and stamping the clock.
    ///
    /// Never fails; an unknown conversation id just opens a fresh log.
    pub fn append(&self, conversation_id: ConversationId, draft: MessageDraft) -> Message {
        let mut conversations = self
            .conversations
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let log = conversations.entry(conversation_id).or_default();
        let message = build_message(log, draft, &self.clock);
        log.messages.push(message.clone());
        message
    }

    /// Seeds a conversation with starter messages in draft order.
    pub fn seed(&self, conversation_id: ConversationId, drafts: Vec<MessageDraft>) {
        let mut conversations = self
            .conversations
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let log = conversations.entry(conversation_id).or_default();
        for draft in drafts {
            let message = build_message(log, draft, &self.clock);
            log.messages.push(message);
        }
    }

    /// Sets the read flag on every stored user-authored message.
    pub fn update_user_messages_read_status(&self, conversation_id: ConversationId, read: bool) {
        let mut conversations = self
            .conversations
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(log) = conversations.get_mut(&conversation_id) {
            for message in &mut log.messages {
                if message.sender == Sender::User {
                    message.is_read = read;
                }
            }
        }
    }

    /// Marks every stored user message read and appends the contact reply
    /// under one write lock, so no reader sees one mutation without the
    /// other.
    pub fn commit_contact_reply(
        &self,
        conversation_id: ConversationId,
        reply_text: impl Into<String>,
    ) -> Message {
        let mut conversations = self
            .conversations
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let log = conversations.entry(conversation_id).or_default();
        for message in &mut log.messages {
            if message.sender == Sender::User {
                message.is_read = true;
            }
        }
        let message = build_message(log, MessageDraft::contact_text(reply_text), &self.clock);
        log.messages.push(message.clone());
        message
    }

    /// Snapshot of a conversation's messages in insertion order.
    pub fn messages(&self, conversation_id: ConversationId) -> Vec<Message> {
        let conversations = self
            .conversations
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        conversations
            .get(&conversation_id)
            .map(|log| log.messages.clone())
            .unwrap_or_default()
    }

    pub fn message_count(&self, conversation_id: ConversationId) -> usize {
        let conversations = self
            .conversations
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        conversations
            .get(&conversation_id)
            .map(|log| log.messages.len())
            .unwrap_or(0)
    }

    /// Gateway history projection, recomputed from stored state on every
    /// call.
    pub fn history_for(&self, conversation_id: ConversationId) -> Vec<HistoryEntry> {
        let conversations = self
            .conversations
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        conversations
            .get(&conversation_id)
            .map(|log| {
                log.messages
                    .iter()
                    .map(|message| {
                        let role = match message.sender {
                            Sender::User => HistoryRole::User,
                            Sender::Contact => HistoryRole::Model,
                        };
                        HistoryEntry::new(role, message.body.history_text())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

fn build_message(log: &mut ConversationLog, draft: MessageDraft, clock: &ClockFn) -> Message {
    log.next_message_id += 1;
    let sent_at_unix_seconds = clock();
    Message {
        id: MessageId::new(log.next_message_id),
        sender: draft.sender,
        body: draft.body,
        is_read: draft.is_read,
        sent_at_unix_seconds,
        sent_at_display: format_display_time(sent_at_unix_seconds),
    }
}

fn system_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

fn format_display_time(unix_seconds: u64) -> String {
    Utc.timestamp_opt(unix_seconds as i64, 0)
        .single()
        .map(|timestamp| timestamp.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}
