use bytes::Bytes;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{MediaKind, Room, RoomInput, RoomMedia, RoomStatus, RoomWithMedia},
    storage::minio::MinioClient,
};

/// An uploaded file waiting to be stored.
pub struct MediaUpload {
    pub kind: MediaKind,
    pub file_name: Option<String>,
    pub content_type: String,
    pub data: Bytes,
}

/// Maps a multipart field name to the kind of media it carries.
pub fn media_kind_for_field(field: &str) -> Option<MediaKind> {
    match field {
        "images" | "image" => Some(MediaKind::Image),
        "videos" | "video" => Some(MediaKind::Video),
        _ => None,
    }
}

pub fn media_key(room_id: Uuid, upload: &MediaUpload) -> String {
    let extension = upload
        .file_name
        .as_deref()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    let folder = match upload.kind {
        MediaKind::Image => "images",
        MediaKind::Video => "videos",
    };
    match extension {
        Some(ext) => format!("{}/{}/{}.{}", room_id, folder, Uuid::new_v4(), ext),
        None => format!("{}/{}/{}", room_id, folder, Uuid::new_v4()),
    }
}

pub struct RoomService {
    db: PgPool,
    minio: MinioClient,
}

impl RoomService {
    pub fn new(db: PgPool, minio: MinioClient) -> Self {
        Self { db, minio }
    }

    pub async fn create(&self, landlord_id: Uuid, input: RoomInput) -> AppResult<RoomWithMedia> {
        let input = input.into_validated()?;

        let room: Room = sqlx::query_as(
            r#"
            INSERT INTO rooms (id, landlord_id, title, description, price, address, latitude,
                               longitude, max_people, min_time, max_time, shared, allow_pets,
                               feature_ids, rule_ids, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(landlord_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.price)
        .bind(&input.location.address)
        .bind(input.location.latitude)
        .bind(input.location.longitude)
        .bind(input.max_people)
        .bind(input.min_time)
        .bind(input.max_time)
        .bind(input.shared)
        .bind(input.allow_pets)
        .bind(&input.feature_ids)
        .bind(&input.rule_ids)
        .bind(RoomStatus::default())
        .fetch_one(&self.db)
        .await?;

        tracing::info!(room_id = %room.id, landlord_id = %landlord_id, "room created");
        Ok(RoomWithMedia {
            room,
            media: Vec::new(),
        })
    }

    pub async fn update(
        &self,
        room_id: Uuid,
        landlord_id: Uuid,
        input: RoomInput,
    ) -> AppResult<RoomWithMedia> {
        let input = input.into_validated()?;

        let room: Room = sqlx::query_as(
            r#"
            UPDATE rooms
            SET title = $1, description = $2, price = $3, address = $4, latitude = $5,
                longitude = $6, max_people = $7, min_time = $8, max_time = $9, shared = $10,
                allow_pets = $11, feature_ids = $12, rule_ids = $13, updated_at = NOW()
            WHERE id = $14 AND landlord_id = $15
            RETURNING *
            "#,
        )
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.price)
        .bind(&input.location.address)
        .bind(input.location.latitude)
        .bind(input.location.longitude)
        .bind(input.max_people)
        .bind(input.min_time)
        .bind(input.max_time)
        .bind(input.shared)
        .bind(input.allow_pets)
        .bind(&input.feature_ids)
        .bind(&input.rule_ids)
        .bind(room_id)
        .bind(landlord_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::RoomNotFound)?;

        let media = self.media(room.id).await?;
        Ok(RoomWithMedia { room, media })
    }

    async fn owned(&self, room_id: Uuid, landlord_id: Uuid) -> AppResult<Room> {
        sqlx::query_as("SELECT * FROM rooms WHERE id = $1 AND landlord_id = $2")
            .bind(room_id)
            .bind(landlord_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::RoomNotFound)
    }

    async fn media(&self, room_id: Uuid) -> AppResult<Vec<RoomMedia>> {
        let media = sqlx::query_as(
            "SELECT * FROM room_media WHERE room_id = $1 ORDER BY created_at, id",
        )
        .bind(room_id)
        .fetch_all(&self.db)
        .await?;
        Ok(media)
    }

    pub async fn get(&self, room_id: Uuid, landlord_id: Uuid) -> AppResult<RoomWithMedia> {
        let room = self.owned(room_id, landlord_id).await?;
        let media = self.media(room.id).await?;
        Ok(RoomWithMedia { room, media })
    }

    pub async fn list(&self, landlord_id: Uuid) -> AppResult<Vec<RoomWithMedia>> {
        let rooms: Vec<Room> = sqlx::query_as(
            "SELECT * FROM rooms WHERE landlord_id = $1 ORDER BY created_at DESC",
        )
        .bind(landlord_id)
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<Uuid> = rooms.iter().map(|r| r.id).collect();
        let mut media: Vec<RoomMedia> = sqlx::query_as(
            "SELECT * FROM room_media WHERE room_id = ANY($1) ORDER BY created_at, id",
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        Ok(rooms
            .into_iter()
            .map(|room| {
                let (own, rest): (Vec<_>, Vec<_>) =
                    media.drain(..).partition(|m| m.room_id == room.id);
                media = rest;
                RoomWithMedia { room, media: own }
            })
            .collect())
    }

    pub async fn set_status(
        &self,
        room_id: Uuid,
        landlord_id: Uuid,
        status: RoomStatus,
    ) -> AppResult<Room> {
        sqlx::query_as(
            r#"
            UPDATE rooms SET status = $1, updated_at = NOW()
            WHERE id = $2 AND landlord_id = $3
            RETURNING *
            "#,
        )
        .bind(status)
        .bind(room_id)
        .bind(landlord_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::RoomNotFound)
    }

    pub async fn add_media(
        &self,
        room_id: Uuid,
        landlord_id: Uuid,
        uploads: Vec<MediaUpload>,
    ) -> AppResult<Vec<RoomMedia>> {
        let room = self.owned(room_id, landlord_id).await?;
        if uploads.is_empty() {
            return Err(AppError::BadRequest("No files uploaded".to_string()));
        }

        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let key = media_key(room.id, &upload);
            let url = self
                .minio
                .upload_room_media(&key, upload.data, &upload.content_type)
                .await?;

            let media: RoomMedia = sqlx::query_as(
                r#"
                INSERT INTO room_media (id, room_id, url, kind)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(room.id)
            .bind(&url)
            .bind(upload.kind)
            .fetch_one(&self.db)
            .await?;
            stored.push(media);
        }

        tracing::info!(room_id = %room.id, count = stored.len(), "room media stored");
        Ok(stored)
    }

    pub async fn delete(&self, room_id: Uuid, landlord_id: Uuid) -> AppResult<Room> {
        let room = self.get(room_id, landlord_id).await?;

        sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(room.room.id)
            .execute(&self.db)
            .await?;

        for media in &room.media {
            let Some(key) = self.minio.key_from_url(&media.url) else {
                continue;
            };
            if let Err(e) = self.minio.delete_room_media(key).await {
                tracing::warn!(room_id = %room_id, key = %key, error = %e, "orphaned room media");
            }
        }
        Ok(room.room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(kind: MediaKind, name: Option<&str>) -> MediaUpload {
        MediaUpload {
            kind,
            file_name: name.map(str::to_string),
            content_type: "image/jpeg".to_string(),
            data: Bytes::from_static(b"jpeg"),
        }
    }

    #[test]
    fn multipart_fields_map_to_media_kinds() {
        assert_eq!(media_kind_for_field("images"), Some(MediaKind::Image));
        assert_eq!(media_kind_for_field("videos"), Some(MediaKind::Video));
        assert_eq!(media_kind_for_field("avatar"), None);
    }

    #[test]
    fn media_keys_are_grouped_by_room_and_kind() {
        let room = Uuid::new_v4();
        let key = media_key(room, &upload(MediaKind::Image, Some("Front.JPG")));
        assert!(key.starts_with(&format!("{}/images/", room)));
        assert!(key.ends_with(".jpg"));

        let key = media_key(room, &upload(MediaKind::Video, Some("clip")));
        assert!(key.starts_with(&format!("{}/videos/", room)));
        assert!(!key.contains('.'));
    }
}
