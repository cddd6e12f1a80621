use bson::oid::ObjectId;
use studyroom_db::models::Message;

/// Side effect of a successful chat mutation. Each one carries the full state
/// peers need to update their view without re-fetching.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// Fanned out to everyone except the author.
    MessageCreated { message: Message },
    MessageEdited { message: Message },
    MessageDeleted { id: ObjectId },
    ReactionChanged { message: Message },
}

impl ChatEvent {
    /// Identity that must not receive the event, if any.
    pub fn excluded_recipient(&self) -> Option<ObjectId> {
        match self {
            ChatEvent::MessageCreated { message } => Some(message.author.user_id),
            _ => None,
        }
    }
}

/// Receives chat events for fan-out. Implemented by the realtime layer.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: ChatEvent);
}
