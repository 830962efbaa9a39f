use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Conversation, ConversationStatus, Message, MessageBody},
    storage::redis::RedisClient,
};

const DEFAULT_HISTORY: i64 = 50;
const MAX_HISTORY: i64 = 200;

pub fn history_limit(requested: Option<i64>) -> i64 {
    requested.unwrap_or(DEFAULT_HISTORY).clamp(1, MAX_HISTORY)
}

/// A message as saved, plus whether this call created it.
#[derive(Debug, Clone)]
pub struct Saved {
    pub message: Message,
    pub created: bool,
}

/// Persists a message once per `(chat, sender, client_id)`; a replay
/// returns the stored row.
pub async fn save_message(
    db: &PgPool,
    conversation: &Conversation,
    sender_id: Uuid,
    content: &MessageBody,
    client_id: Uuid,
) -> AppResult<Saved> {
    let mut tx = db.begin().await?;

    let inserted: Option<Message> = sqlx::query_as(
        r#"
        INSERT INTO messages (id, chat_id, sender_id, nickname, content, client_id)
        SELECT $1, $2, u.id, COALESCE(u.name, u.email), $4, $5
        FROM users u WHERE u.id = $3
        ON CONFLICT (chat_id, sender_id, client_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(conversation.id)
    .bind(sender_id)
    .bind(content.as_str())
    .bind(client_id)
    .fetch_optional(&mut *tx)
    .await?;

    let saved = match inserted {
        Some(message) => {
            sqlx::query("UPDATE chats SET last_message_at = $1, updated_at = NOW() WHERE id = $2")
                .bind(message.created_at)
                .bind(conversation.id)
                .execute(&mut *tx)
                .await?;
            Saved {
                message,
                created: true,
            }
        }
        None => {
            let message = sqlx::query_as(
                "SELECT * FROM messages WHERE chat_id = $1 AND sender_id = $2 AND client_id = $3",
            )
            .bind(conversation.id)
            .bind(sender_id)
            .bind(client_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::UserNotFound)?;
            Saved {
                message,
                created: false,
            }
        }
    };

    tx.commit().await?;
    Ok(saved)
}

pub struct ChatService {
    db: PgPool,
    redis: RedisClient,
}

impl ChatService {
    pub fn new(db: PgPool, redis: RedisClient) -> Self {
        Self { db, redis }
    }

    /// Loads a conversation the user takes part in and that is open for chat.
    pub async fn open_conversation(&self, chat_id: Uuid, user_id: Uuid) -> AppResult<Conversation> {
        let conversation: Conversation = sqlx::query_as("SELECT * FROM chats WHERE id = $1")
            .bind(chat_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::ConversationNotFound)?;

        if conversation.landlord_id != user_id && conversation.tenant_id != user_id {
            return Err(AppError::NotParticipant);
        }
        if conversation.status != ConversationStatus::Approved {
            return Err(AppError::ConversationNotApproved);
        }
        Ok(conversation)
    }

    /// Messages in arrival order, oldest first, ending before `before` when
    /// given.
    pub async fn history(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
        limit: Option<i64>,
        before: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<Message>> {
        self.open_conversation(chat_id, user_id).await?;

        let mut messages: Vec<Message> = sqlx::query_as(
            r#"
            SELECT * FROM messages
            WHERE chat_id = $1 AND ($2::timestamptz IS NULL OR created_at < $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(chat_id)
        .bind(before)
        .bind(history_limit(limit))
        .fetch_all(&self.db)
        .await?;

        messages.reverse();
        Ok(messages)
    }

    /// Fans a message out to both participants. Delivery is at least once:
    /// replays are published again and receivers drop duplicates by id.
    pub async fn publish(&self, conversation: &Conversation, message: &Message) -> AppResult<()> {
        for user_id in [conversation.landlord_id, conversation.tenant_id] {
            self.redis.publish_message(user_id, message).await?;
        }
        Ok(())
    }

    pub async fn send(
        &self,
        chat_id: Uuid,
        sender_id: Uuid,
        content: &MessageBody,
        client_id: Uuid,
    ) -> AppResult<Saved> {
        let conversation = self.open_conversation(chat_id, sender_id).await?;
        let saved = save_message(&self.db, &conversation, sender_id, content, client_id).await?;
        if !saved.created {
            tracing::debug!(chat_id = %chat_id, client_id = %client_id, "message replayed");
        }
        self.publish(&conversation, &saved.message).await?;
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_db;

    #[test]
    fn history_limit_is_bounded() {
        assert_eq!(history_limit(None), DEFAULT_HISTORY);
        assert_eq!(history_limit(Some(0)), 1);
        assert_eq!(history_limit(Some(10_000)), MAX_HISTORY);
        assert_eq!(history_limit(Some(20)), 20);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn replayed_client_id_is_stored_once(pool: PgPool) {
        let seeded = test_db::seed_chat(&pool, ConversationStatus::Approved).await;
        let body = MessageBody::try_from("hola".to_string()).unwrap();
        let client_id = Uuid::new_v4();

        let first = save_message(&pool, &seeded.chat, seeded.tenant_id, &body, client_id)
            .await
            .unwrap();
        let replay = save_message(&pool, &seeded.chat, seeded.tenant_id, &body, client_id)
            .await
            .unwrap();

        assert!(first.created);
        assert!(!replay.created);
        assert_eq!(replay.message.id, first.message.id);
        assert_eq!(first.message.nickname, "Ana");

        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE chat_id = $1")
            .bind(seeded.chat.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn same_client_id_from_each_participant_is_two_messages(pool: PgPool) {
        let seeded = test_db::seed_chat(&pool, ConversationStatus::Approved).await;
        let body = MessageBody::try_from("hola".to_string()).unwrap();
        let client_id = Uuid::new_v4();

        let tenant = save_message(&pool, &seeded.chat, seeded.tenant_id, &body, client_id)
            .await
            .unwrap();
        let landlord = save_message(&pool, &seeded.chat, seeded.landlord_id, &body, client_id)
            .await
            .unwrap();

        assert!(tenant.created && landlord.created);
        assert_ne!(tenant.message.id, landlord.message.id);
    }
}
