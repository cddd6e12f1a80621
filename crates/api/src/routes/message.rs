use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use studyroom_db::models::Message;
use studyroom_services::dao::base::PaginationParams;

use crate::{
    error::ApiError,
    extractors::{auth::AuthUser, json::ApiJson},
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageRequest {
    #[serde(default)]
    pub content: String,
    pub reply_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMessageRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ReactionRequest {
    pub emoji: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub content: String,
    pub author: AuthorResponse,
    pub created_at: String,
    pub is_edited: bool,
    pub edited_at: Option<String>,
    pub reactions: Vec<ReactionResponse>,
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorResponse {
    pub id: String,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionResponse {
    pub user_id: String,
    pub emoji: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResponse {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_messages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<MessageResponse>,
    pub pagination: PaginationResponse,
}

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<MessageListResponse>, ApiError> {
    let result = state.chat.list_messages(&params).await?;

    let pagination = PaginationResponse {
        current_page: result.page,
        total_pages: result.total_pages,
        total_messages: result.total,
        has_next: result.has_next(),
        has_prev: result.has_prev(),
    };

    Ok(Json(MessageListResponse {
        messages: result.items.into_iter().map(MessageResponse::from).collect(),
        pagination,
    }))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<CreateMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let message = state
        .chat
        .send_message(&auth.identity, &body.content, body.reply_to.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(message.into())))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<String>,
    ApiJson(body): ApiJson<UpdateMessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = state
        .chat
        .edit_message(&auth.identity, &message_id, &body.content)
        .await?;

    Ok(Json(message.into()))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = state
        .chat
        .delete_message(&auth.identity, &message_id)
        .await?;

    Ok(Json(serde_json::json!({
        "message": "Message deleted",
        "id": id.to_hex(),
    })))
}

pub async fn toggle_reaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<String>,
    ApiJson(body): ApiJson<ReactionRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = state
        .chat
        .toggle_reaction(&auth.identity, &message_id, body.emoji.as_deref())
        .await?;

    Ok(Json(message.into()))
}

impl From<Message> for MessageResponse {
    fn from(m: Message) -> Self {
        MessageResponse {
            id: m.id.to_hex(),
            content: m.content,
            author: AuthorResponse {
                id: m.author.user_id.to_hex(),
                name: m.author.name,
                role: m.author.role.as_str().to_string(),
            },
            created_at: m.created_at.try_to_rfc3339_string().unwrap_or_default(),
            is_edited: m.is_edited,
            edited_at: m
                .edited_at
                .map(|t| t.try_to_rfc3339_string().unwrap_or_default()),
            reactions: m
                .reactions
                .into_iter()
                .map(|r| ReactionResponse {
                    user_id: r.user_id.to_hex(),
                    emoji: r.emoji,
                })
                .collect(),
            reply_to: m.reply_to.map(|r| r.to_hex()),
        }
    }
}
