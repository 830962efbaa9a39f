use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::middleware::AuthUser,
    error::{AppError, AppResult},
    models::{parse_room_ids, ConversationFilter, ConversationStatus, ConversationWithDetails},
    services::requests::RequestService,
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Comma separated room ids.
    pub room_ids: Option<String>,
    pub text: Option<String>,
}

impl ListQuery {
    fn into_filter(self, status: ConversationStatus) -> AppResult<ConversationFilter> {
        let room_ids = parse_room_ids(self.room_ids.as_deref())
            .map_err(|_| AppError::BadRequest("room_ids must be a list of uuids".to_string()))?;
        Ok(ConversationFilter {
            status: Some(status),
            room_ids,
            text: self.text,
        })
    }
}

async fn list(
    state: AppState,
    user: AuthUser,
    status: ConversationStatus,
    query: ListQuery,
) -> AppResult<Json<Vec<ConversationWithDetails>>> {
    let filter = query.into_filter(status)?;
    let requests = RequestService::new(state.db, state.mailer);
    Ok(Json(requests.list(user.id, &filter).await?))
}

pub async fn list_pending(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<ConversationWithDetails>>> {
    list(state, user, ConversationStatus::Pending, query).await
}

pub async fn list_approved(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<ConversationWithDetails>>> {
    list(state, user, ConversationStatus::Approved, query).await
}

pub async fn list_refused(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<ConversationWithDetails>>> {
    list(state, user, ConversationStatus::Refused, query).await
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ConversationStatus,
    /// Email of the tenant the decision is about.
    pub email: String,
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> AppResult<Json<ConversationWithDetails>> {
    let requests = RequestService::new(state.db, state.mailer);
    let chat = requests
        .transition(chat_id, user.id, req.status, &req.email)
        .await?;
    Ok(Json(chat))
}
