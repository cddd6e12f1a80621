use axum::{Json, extract::State};

use crate::{extractors::auth::AuthUser, state::AppState, ws::storage::PresenceSnapshot};

pub async fn online_users(State(state): State<AppState>, _auth: AuthUser) -> Json<PresenceSnapshot> {
    Json(state.presence.snapshot())
}
