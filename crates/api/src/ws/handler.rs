use axum::{
    extract::{Query, State, WebSocketUpgrade, ws::{Message, WebSocket}},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use studyroom_services::{AuthError, ChatError, Identity};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dispatcher::send_to_connection;
use super::protocol::{ClientEvent, ErrorPayload, ServerEvent, TypingPayload};
use super::storage::WsSender;
use crate::{error::ApiError, extractors::auth::bearer_token, state::AppState};

/// Frames a connection may have queued before it counts as stalled.
const OUTBOUND_QUEUE: usize = 256;
/// How long a closing connection's writer gets to flush and send Close.
const WRITER_DRAIN: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// Authenticates before upgrading. A rejected handshake never touches the
/// presence registry.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let credential = params
        .token
        .or_else(|| bearer_token(&headers).map(str::to_string));

    let identity = match credential {
        Some(token) => state.identity.resolve(&token).await,
        None => Err(AuthError::MissingCredential),
    };

    match identity {
        Ok(identity) => ws.on_upgrade(move |socket| handle_socket(socket, state, identity)),
        Err(e) => {
            warn!(%e, "WebSocket handshake rejected");
            ApiError::from(e).into_response()
        }
    }
}

struct Connection {
    id: String,
    identity: Identity,
    sender: WsSender,
}

impl Connection {
    fn reply(&self, event: &ServerEvent) {
        send_to_connection(&self.sender, &self.id, event);
    }

    fn reply_error(&self, err: ApiError) {
        let (_, kind, message) = err.into_parts();
        self.reply(&ServerEvent::Error(ErrorPayload {
            error: kind.to_string(),
            message,
        }));
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let connection_id = Uuid::new_v4().to_string();
    let user_id = identity.id;
    info!(?user_id, %connection_id, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();
    let (sender, mut outbound) = WsSender::channel(OUTBOUND_QUEUE);

    let writer = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if sink.send(Message::text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let conn = Connection {
        id: connection_id.clone(),
        identity: identity.clone(),
        sender: sender.clone(),
    };
    state
        .presence
        .connect(identity, connection_id.clone(), sender);

    loop {
        tokio::select! {
            _ = conn.sender.closed() => {
                info!(?user_id, %connection_id, "Closing WebSocket on server request");
                break;
            }
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    handle_client_message(&state, &conn, text.as_str()).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!(?user_id, %connection_id, %e, "WebSocket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    // Cleanup runs the same way for a clean close and a dropped network.
    state.presence.disconnect(&user_id, &connection_id);
    // With the last sender gone the writer drains its queue and sends Close;
    // a peer that stopped reading is cut off instead.
    drop(conn);
    let abort = writer.abort_handle();
    if tokio::time::timeout(WRITER_DRAIN, writer).await.is_err() {
        abort.abort();
    }

    info!(?user_id, %connection_id, "WebSocket disconnected");
}

async fn handle_client_message(state: &AppState, conn: &Connection, text: &str) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => {
            debug!(connection_id = %conn.id, %e, "Malformed WS frame");
            conn.reply_error(ApiError::BadRequest("Malformed event".to_string()));
            return;
        }
    };

    let user_id = conn.identity.id;
    debug!(?user_id, connection_id = %conn.id, ?event, "WS message received");

    // Mutations go through the chat service, which publishes the broadcast.
    let outcome: Result<(), ChatError> = match event {
        ClientEvent::SendMessage(payload) => state
            .chat
            .send_message(&conn.identity, &payload.content, payload.reply_to.as_deref())
            .await
            .map(|message| conn.reply(&ServerEvent::MessageSent(message.into()))),
        ClientEvent::EditMessage(payload) => state
            .chat
            .edit_message(&conn.identity, &payload.message_id, &payload.content)
            .await
            .map(drop),
        ClientEvent::DeleteMessage(payload) => state
            .chat
            .delete_message(&conn.identity, &payload.message_id)
            .await
            .map(drop),
        ClientEvent::AddReaction(payload) => state
            .chat
            .toggle_reaction(&conn.identity, &payload.message_id, payload.emoji.as_deref())
            .await
            .map(drop),
        ClientEvent::Typing(signal) => {
            let event = ServerEvent::UserTyping(TypingPayload {
                user_id: user_id.to_hex(),
                name: conn.identity.name.clone(),
                is_typing: signal.is_typing,
            });
            state.presence.broadcast(&event, Some(&user_id));
            Ok(())
        }
        ClientEvent::Ping => {
            conn.reply(&ServerEvent::Pong);
            Ok(())
        }
    };

    if let Err(e) = outcome {
        conn.reply_error(e.into());
    }
}
