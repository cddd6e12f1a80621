use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// A chat room message. Removed by the store once `created_at` falls out of
/// the retention window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub content: String,
    pub author: AuthorSnapshot,
    pub created_at: DateTime,
    #[serde(default)]
    pub is_edited: bool,
    pub edited_at: Option<DateTime>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    pub reply_to: Option<ObjectId>,
}

impl Message {
    pub const COLLECTION: &'static str = "messages";

    pub fn new(
        author: AuthorSnapshot,
        content: String,
        reply_to: Option<ObjectId>,
        created_at: DateTime,
    ) -> Self {
        Self {
            id: ObjectId::new(),
            content,
            author,
            created_at,
            is_edited: false,
            edited_at: None,
            reactions: Vec::new(),
            reply_to,
        }
    }

    /// True once the message was created before `cutoff`.
    pub fn is_expired(&self, cutoff: DateTime) -> bool {
        self.created_at < cutoff
    }

    pub fn is_authored_by(&self, user_id: &ObjectId) -> bool {
        self.author.user_id == *user_id
    }

    pub fn mark_edited(&mut self, content: String, at: DateTime) {
        self.content = content;
        self.is_edited = true;
        self.edited_at = Some(at);
    }

    /// Adds the reaction, or removes it when the user already reacted with
    /// the same emoji. Returns `true` if the reaction is now present.
    pub fn toggle_reaction(&mut self, user_id: ObjectId, emoji: &str) -> bool {
        if let Some(pos) = self
            .reactions
            .iter()
            .position(|r| r.user_id == user_id && r.emoji == emoji)
        {
            self.reactions.remove(pos);
            false
        } else {
            self.reactions.push(Reaction {
                user_id,
                emoji: emoji.to_string(),
            });
            true
        }
    }
}

/// Author details copied onto the message when it is sent. Later profile
/// changes are deliberately not reflected here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorSnapshot {
    pub user_id: ObjectId,
    pub name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub user_id: ObjectId,
    pub emoji: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    pub fn is_privileged(self) -> bool {
        matches!(self, UserRole::Admin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}
