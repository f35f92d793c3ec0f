use serde::{Deserialize, Serialize};

/// Outbound chat traffic, as facts about messages that have already been
/// accepted for delivery. Subscribers (a platform adapter, the integration
/// tests) render these however they like; the core never formats beyond
/// plain text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChatEvent {
    /// A message was posted to a channel.
    MessagePosted {
        handle: String,
        channel_id: String,
        content: String,
    },

    /// An earlier message was replaced with new content.
    MessageEdited { handle: String, content: String },

    /// An earlier message was removed.
    MessageDeleted { handle: String },

    /// A private message to a single player.
    DirectMessage { player_id: String, content: String },
}

impl ChatEvent {
    /// Human-readable event type for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            ChatEvent::MessagePosted { .. } => "message_posted",
            ChatEvent::MessageEdited { .. } => "message_edited",
            ChatEvent::MessageDeleted { .. } => "message_deleted",
            ChatEvent::DirectMessage { .. } => "direct_message",
        }
    }
}
