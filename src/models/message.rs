use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub nickname: String,
    pub content: String,
    /// Idempotency key chosen by the sender; unique per chat and sender.
    pub client_id: Uuid,
    pub created_at: DateTime<Utc>,
}
