use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::middleware::AuthUser,
    error::AppResult,
    models::{Message, MessageBody},
    services::chat::ChatService,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub before: Option<DateTime<Utc>>,
}

pub async fn get_messages(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<Message>>> {
    let chat_service = ChatService::new(state.db, state.redis);
    let messages = chat_service
        .history(chat_id, user.id, query.limit, query.before)
        .await?;
    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: MessageBody,
    pub client_id: Uuid,
}

/// Same path as a socket `message` event, for clients without a socket.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<Json<Message>> {
    let chat_service = ChatService::new(state.db, state.redis);
    let saved = chat_service
        .send(chat_id, user.id, &req.content, req.client_id)
        .await?;
    Ok(Json(saved.message))
}
