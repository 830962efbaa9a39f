use axum::{
    extract::{Multipart, Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::middleware::AuthUser,
    error::{AppError, AppResult},
    models::{Room, RoomCatalog, RoomInput, RoomMedia, RoomStatus, RoomWithMedia},
    services::rooms::{media_kind_for_field, MediaUpload, RoomService},
    AppState,
};

pub async fn list_rooms(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Vec<RoomWithMedia>>> {
    let room_service = RoomService::new(state.db, state.minio);
    Ok(Json(room_service.list(user.id).await?))
}

pub async fn create_room(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<RoomInput>,
) -> AppResult<Json<RoomWithMedia>> {
    let room_service = RoomService::new(state.db, state.minio);
    Ok(Json(room_service.create(user.id, req).await?))
}

pub async fn get_room(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(room_id): Path<Uuid>,
) -> AppResult<Json<RoomWithMedia>> {
    let room_service = RoomService::new(state.db, state.minio);
    Ok(Json(room_service.get(room_id, user.id).await?))
}

pub async fn update_room(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(room_id): Path<Uuid>,
    Json(req): Json<RoomInput>,
) -> AppResult<Json<RoomWithMedia>> {
    let room_service = RoomService::new(state.db, state.minio);
    Ok(Json(room_service.update(room_id, user.id, req).await?))
}

pub async fn delete_room(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(room_id): Path<Uuid>,
) -> AppResult<Json<Room>> {
    let room_service = RoomService::new(state.db, state.minio);
    Ok(Json(room_service.delete(room_id, user.id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: RoomStatus,
}

pub async fn set_room_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(room_id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> AppResult<Json<Room>> {
    let room_service = RoomService::new(state.db, state.minio);
    Ok(Json(
        room_service.set_status(room_id, user.id, req.status).await?,
    ))
}

/// Accepts any number of `images` and `videos` parts.
pub async fn upload_media(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(room_id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<Json<Vec<RoomMedia>>> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        let Some(kind) = field.name().and_then(media_kind_for_field) else {
            continue;
        };

        let file_name = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file: {}", e)))?;
        if data.is_empty() {
            continue;
        }

        uploads.push(MediaUpload {
            kind,
            file_name,
            content_type,
            data,
        });
    }

    let room_service = RoomService::new(state.db, state.minio);
    Ok(Json(room_service.add_media(room_id, user.id, uploads).await?))
}

pub async fn get_catalog() -> Json<RoomCatalog> {
    Json(RoomCatalog::load())
}
