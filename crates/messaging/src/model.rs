use super::ids::MessageId;

/// Author of one message in a two-party conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sender {
    User,
    Contact,
}

/// Metadata for a file shared in chat. The payload itself lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl FileAttachment {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes,
        }
    }
}

/// Descriptor for a recorded voice note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceNote {
    pub duration_secs: u32,
}

impl VoiceNote {
    pub const fn new(duration_secs: u32) -> Self {
        Self { duration_secs }
    }
}

/// Message payload. The enum makes the one-body-kind-per-message rule
/// structural instead of a runtime invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    File(FileAttachment),
    VoiceNote(VoiceNote),
}

impl MessageBody {
    /// Text submitted to the completion gateway for this body.
    ///
    /// Non-text bodies project to bracketed placeholders so the model still
    /// sees that something was exchanged.
    pub fn history_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::File(_) => "[file]".to_string(),
            Self::VoiceNote(_) => "[voice note]".to_string(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::File(_) | Self::VoiceNote(_) => None,
        }
    }
}

/// One stored message. Order within a conversation is append-only insertion
/// order; messages are never reordered or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    pub body: MessageBody,
    /// Whether the contact has seen this message. Meaningful only for
    /// `Sender::User`; contact messages are stored read so read scans never
    /// pick them up.
    pub is_read: bool,
    pub sent_at_unix_seconds: u64,
    pub sent_at_display: String,
}

/// Everything a caller supplies for a new message; the store allocates the
/// id and stamps the clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub sender: Sender,
    pub body: MessageBody,
    pub is_read: bool,
}

impl MessageDraft {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            body: MessageBody::Text(text.into()),
            is_read: false,
        }
    }

    pub fn contact_text(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Contact,
            body: MessageBody::Text(text.into()),
            is_read: true,
        }
    }

    pub fn file(attachment: FileAttachment) -> Self {
        Self {
            sender: Sender::User,
            body: MessageBody::File(attachment),
            is_read: false,
        }
    }

    pub fn voice_note(voice_note: VoiceNote) -> Self {
        Self {
            sender: Sender::User,
            body: MessageBody::VoiceNote(voice_note),
            is_read: false,
        }
    }

    /// Seed variant for bootstrap fixtures where the read flag is known.
    pub fn with_read(mut self, is_read: bool) -> Self {
        self.is_read = is_read;
        self
    }
}

/// In-flight indicators for one conversation, derived from its delivery
/// state. Ephemeral; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingFlags {
    pub is_replying: bool,
    pub is_generating_suggestions: bool,
}
