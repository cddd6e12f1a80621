//! Chat room message lifecycle: send, edit, delete, react and the
//! time-windowed history query.
//!
//! Every successful mutation publishes exactly one [`ChatEvent`]; failed
//! calls publish nothing.

use std::sync::Arc;
use std::time::Duration;

use bson::{DateTime, oid::ObjectId};
use studyroom_config::ChatSettings;
use studyroom_db::models::Message;
use thiserror::Error;
use tracing::{error, info};

use crate::auth::Identity;
use crate::clock::{Clock, shift_back};
use crate::dao::MessageStore;
use crate::dao::base::{DaoError, PaginatedResult, PaginationParams};
use crate::events::{ChatEvent, EventPublisher};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Store(#[from] DaoError),
}

pub type ChatResult<T> = Result<T, ChatError>;

pub struct ChatService {
    store: Arc<dyn MessageStore>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    settings: ChatSettings,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            store,
            events,
            clock,
            settings,
        }
    }

    /// One page of the live window. The store is read newest-first and the
    /// page is flipped to oldest-first for display.
    pub async fn list_messages(
        &self,
        params: &PaginationParams,
    ) -> ChatResult<PaginatedResult<Message>> {
        let (page, per_page) =
            params.resolve(self.settings.default_page_size, self.settings.max_page_size);
        let since = self.window_start();
        let skip = (page - 1).saturating_mul(per_page);

        let total = self.store.count_created_since(since).await.map_err(log_store)?;
        if skip >= total {
            return Ok(PaginatedResult::new(Vec::new(), total, page, per_page));
        }
        let mut items = self
            .store
            .find_created_since(since, skip, per_page)
            .await
            .map_err(log_store)?;
        items.reverse();

        Ok(PaginatedResult::new(items, total, page, per_page))
    }

    pub async fn send_message(
        &self,
        author: &Identity,
        content: &str,
        reply_to: Option<&str>,
    ) -> ChatResult<Message> {
        let content = self.validate_content(content)?;

        let reply_to = match reply_to.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => {
                let parent_id = ObjectId::parse_str(raw)
                    .map_err(|_| ChatError::Validation("Invalid replyTo id".to_string()))?;
                self.find_live(parent_id)
                    .await?
                    .ok_or_else(|| ChatError::NotFound("Reply target not found".to_string()))?;
                Some(parent_id)
            }
            None => None,
        };

        let message = Message::new(author.snapshot(), content, reply_to, self.clock.now());
        self.store.insert(&message).await.map_err(log_store)?;

        info!(message_id = %message.id, author_id = %author.id, "Message sent");
        self.events.publish(ChatEvent::MessageCreated {
            message: message.clone(),
        });
        Ok(message)
    }

    pub async fn edit_message(
        &self,
        requester: &Identity,
        message_id: &str,
        content: &str,
    ) -> ChatResult<Message> {
        let message = self.require_live(message_id).await?;
        authorize_owner(requester, &message, "edit")?;

        if !requester.is_privileged() {
            let elapsed_ms = self.clock.now().timestamp_millis()
                - message.created_at.timestamp_millis();
            let window_ms = i64::try_from(self.edit_window().as_millis()).unwrap_or(i64::MAX);
            if elapsed_ms > window_ms {
                return Err(ChatError::Forbidden(format!(
                    "Messages can only be edited within {} minutes of sending",
                    self.settings.edit_window_secs / 60
                )));
            }
        }

        let content = self.validate_content(content)?;
        let updated = self
            .store
            .update_content(message.id, &content, self.clock.now())
            .await
            .map_err(log_store)?
            .ok_or_else(message_not_found)?;

        info!(message_id = %updated.id, editor_id = %requester.id, "Message edited");
        self.events.publish(ChatEvent::MessageEdited {
            message: updated.clone(),
        });
        Ok(updated)
    }

    pub async fn delete_message(
        &self,
        requester: &Identity,
        message_id: &str,
    ) -> ChatResult<ObjectId> {
        let message = self.require_live(message_id).await?;
        authorize_owner(requester, &message, "delete")?;

        if !self.store.delete_by_id(message.id).await.map_err(log_store)? {
            return Err(message_not_found());
        }

        info!(message_id = %message.id, deleted_by = %requester.id, "Message deleted");
        self.events
            .publish(ChatEvent::MessageDeleted { id: message.id });
        Ok(message.id)
    }

    /// Adds the requester's emoji, or removes it if already present.
    pub async fn toggle_reaction(
        &self,
        requester: &Identity,
        message_id: &str,
        emoji: Option<&str>,
    ) -> ChatResult<Message> {
        let emoji = emoji
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ChatError::Validation("Emoji is required".to_string()))?;

        let mut message = self.require_live(message_id).await?;
        message.toggle_reaction(requester.id, emoji);

        let updated = self
            .store
            .replace_reactions(message.id, &message.reactions)
            .await
            .map_err(log_store)?
            .ok_or_else(message_not_found)?;

        self.events.publish(ChatEvent::ReactionChanged {
            message: updated.clone(),
        });
        Ok(updated)
    }

    fn validate_content(&self, content: &str) -> ChatResult<String> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(ChatError::Validation(
                "Message content is required".to_string(),
            ));
        }
        if trimmed.chars().count() > self.settings.max_content_chars {
            return Err(ChatError::Validation(format!(
                "Message cannot exceed {} characters",
                self.settings.max_content_chars
            )));
        }
        Ok(trimmed.to_string())
    }

    async fn require_live(&self, message_id: &str) -> ChatResult<Message> {
        // An id that does not parse can never name a stored message.
        let id = ObjectId::parse_str(message_id.trim()).map_err(|_| message_not_found())?;
        self.find_live(id).await?.ok_or_else(message_not_found)
    }

    /// Looks a message up, hiding rows the sweeper has not reached yet.
    async fn find_live(&self, id: ObjectId) -> ChatResult<Option<Message>> {
        let since = self.window_start();
        Ok(self
            .store
            .find_by_id(id)
            .await
            .map_err(log_store)?
            .filter(|m| !m.is_expired(since)))
    }

    fn window_start(&self) -> DateTime {
        shift_back(
            self.clock.now(),
            Duration::from_secs(self.settings.message_ttl_secs),
        )
    }

    fn edit_window(&self) -> Duration {
        Duration::from_secs(self.settings.edit_window_secs)
    }
}

fn authorize_owner(requester: &Identity, message: &Message, action: &str) -> ChatResult<()> {
    if message.is_authored_by(&requester.id) || requester.is_privileged() {
        Ok(())
    } else {
        Err(ChatError::Forbidden(format!(
            "You can only {action} your own messages"
        )))
    }
}

fn message_not_found() -> ChatError {
    ChatError::NotFound("Message not found".to_string())
}

fn log_store(e: DaoError) -> ChatError {
    error!(%e, "Message store operation failed");
    ChatError::Store(e)
}
