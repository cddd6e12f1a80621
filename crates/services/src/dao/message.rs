use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;
use studyroom_db::models::{Message, Reaction};

use super::base::{BaseDao, DaoResult};

/// Persistence for chat messages.
///
/// Implementations must drop messages on their own once they fall out of the
/// retention window (a TTL index, or the [`crate::expiry::ExpirySweeper`]).
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, message: &Message) -> DaoResult<()>;

    async fn find_by_id(&self, id: ObjectId) -> DaoResult<Option<Message>>;

    /// Messages with `created_at >= since`, newest first.
    async fn find_created_since(
        &self,
        since: DateTime,
        skip: u64,
        limit: u64,
    ) -> DaoResult<Vec<Message>>;

    async fn count_created_since(&self, since: DateTime) -> DaoResult<u64>;

    async fn update_content(
        &self,
        id: ObjectId,
        content: &str,
        edited_at: DateTime,
    ) -> DaoResult<Option<Message>>;

    async fn replace_reactions(
        &self,
        id: ObjectId,
        reactions: &[Reaction],
    ) -> DaoResult<Option<Message>>;

    async fn delete_by_id(&self, id: ObjectId) -> DaoResult<bool>;

    /// Removes every message created before `cutoff`, returns how many.
    async fn delete_created_before(&self, cutoff: DateTime) -> DaoResult<u64>;
}

pub struct MessageDao {
    pub base: BaseDao<Message>,
}

impl MessageDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Message::COLLECTION),
        }
    }
}

#[async_trait]
impl MessageStore for MessageDao {
    async fn insert(&self, message: &Message) -> DaoResult<()> {
        self.base.insert_one(message).await
    }

    async fn find_by_id(&self, id: ObjectId) -> DaoResult<Option<Message>> {
        self.base.find_by_id(id).await
    }

    async fn find_created_since(
        &self,
        since: DateTime,
        skip: u64,
        limit: u64,
    ) -> DaoResult<Vec<Message>> {
        self.base
            .find_many(
                doc! { "created_at": { "$gte": since } },
                Some(doc! { "created_at": -1, "_id": -1 }),
                skip,
                Some(i64::try_from(limit).unwrap_or(i64::MAX)),
            )
            .await
    }

    async fn count_created_since(&self, since: DateTime) -> DaoResult<u64> {
        self.base
            .count(doc! { "created_at": { "$gte": since } })
            .await
    }

    async fn update_content(
        &self,
        id: ObjectId,
        content: &str,
        edited_at: DateTime,
    ) -> DaoResult<Option<Message>> {
        self.base
            .update_by_id_returning(
                id,
                doc! {
                    "$set": {
                        "content": content,
                        "is_edited": true,
                        "edited_at": edited_at,
                    }
                },
            )
            .await
    }

    async fn replace_reactions(
        &self,
        id: ObjectId,
        reactions: &[Reaction],
    ) -> DaoResult<Option<Message>> {
        self.base
            .update_by_id_returning(
                id,
                doc! { "$set": { "reactions": bson::to_bson(reactions)? } },
            )
            .await
    }

    async fn delete_by_id(&self, id: ObjectId) -> DaoResult<bool> {
        self.base.delete_by_id(id).await
    }

    async fn delete_created_before(&self, cutoff: DateTime) -> DaoResult<u64> {
        self.base
            .delete_many(doc! { "created_at": { "$lt": cutoff } })
            .await
    }
}
