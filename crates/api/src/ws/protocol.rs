//! Realtime wire format. Every frame is a JSON text frame shaped
//! `{"type": "<event>", "data": <payload>}`.

use serde::{Deserialize, Serialize};
use studyroom_services::ChatEvent;

use crate::routes::message::MessageResponse;
use crate::ws::storage::PresenceSnapshot;

/// Frames accepted from clients.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    SendMessage(SendMessagePayload),
    EditMessage(EditMessagePayload),
    DeleteMessage(MessageRef),
    AddReaction(ReactionPayload),
    Typing(TypingSignal),
    Ping,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessagePayload {
    pub message_id: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionPayload {
    pub message_id: String,
    #[serde(default)]
    pub emoji: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingSignal {
    pub is_typing: bool,
}

/// Frames pushed by the server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    OnlineUsersUpdate(PresenceSnapshot),
    NewMessage(MessageResponse),
    MessageEdited(MessageResponse),
    MessageDeleted(DeletedPayload),
    ReactionAdded(MessageResponse),
    UserTyping(TypingPayload),
    /// Ack to the sender of a realtime `sendMessage`.
    MessageSent(MessageResponse),
    Error(ErrorPayload),
    Pong,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletedPayload {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub user_id: String,
    pub name: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub error: String,
    pub message: String,
}

impl From<ChatEvent> for ServerEvent {
    fn from(event: ChatEvent) -> Self {
        match event {
            ChatEvent::MessageCreated { message } => ServerEvent::NewMessage(message.into()),
            ChatEvent::MessageEdited { message } => ServerEvent::MessageEdited(message.into()),
            ChatEvent::MessageDeleted { id } => {
                ServerEvent::MessageDeleted(DeletedPayload { id: id.to_hex() })
            }
            ChatEvent::ReactionChanged { message } => ServerEvent::ReactionAdded(message.into()),
        }
    }
}

impl ServerEvent {
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
