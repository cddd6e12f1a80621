use std::cmp::Reverse;
use std::collections::HashMap;

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime};
use parking_lot::RwLock;
use studyroom_db::models::{Message, Reaction};

use super::base::DaoResult;
use super::message::MessageStore;

/// Process-local [`MessageStore`]. It has no native expiry, so it relies on
/// the sweeper to drop old rows.
#[derive(Default)]
pub struct MemoryMessageStore {
    messages: RwLock<HashMap<ObjectId, Message>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    fn modify(&self, id: ObjectId, f: impl FnOnce(&mut Message)) -> Option<Message> {
        let mut messages = self.messages.write();
        let message = messages.get_mut(&id)?;
        f(message);
        Some(message.clone())
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn insert(&self, message: &Message) -> DaoResult<()> {
        self.messages.write().insert(message.id, message.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ObjectId) -> DaoResult<Option<Message>> {
        Ok(self.messages.read().get(&id).cloned())
    }

    async fn find_created_since(
        &self,
        since: DateTime,
        skip: u64,
        limit: u64,
    ) -> DaoResult<Vec<Message>> {
        let mut live: Vec<Message> = self
            .messages
            .read()
            .values()
            .filter(|m| m.created_at >= since)
            .cloned()
            .collect();
        live.sort_by_key(|m| Reverse((m.created_at, m.id)));

        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(live.into_iter().skip(skip).take(limit).collect())
    }

    async fn count_created_since(&self, since: DateTime) -> DaoResult<u64> {
        let count = self
            .messages
            .read()
            .values()
            .filter(|m| m.created_at >= since)
            .count();
        Ok(count as u64)
    }

    async fn update_content(
        &self,
        id: ObjectId,
        content: &str,
        edited_at: DateTime,
    ) -> DaoResult<Option<Message>> {
        Ok(self.modify(id, |m| m.mark_edited(content.to_string(), edited_at)))
    }

    async fn replace_reactions(
        &self,
        id: ObjectId,
        reactions: &[Reaction],
    ) -> DaoResult<Option<Message>> {
        Ok(self.modify(id, |m| m.reactions = reactions.to_vec()))
    }

    async fn delete_by_id(&self, id: ObjectId) -> DaoResult<bool> {
        Ok(self.messages.write().remove(&id).is_some())
    }

    async fn delete_created_before(&self, cutoff: DateTime) -> DaoResult<u64> {
        let mut messages = self.messages.write();
        let before = messages.len();
        messages.retain(|_, m| !m.is_expired(cutoff));
        Ok((before - messages.len()) as u64)
    }
}
