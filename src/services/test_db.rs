//! Rows for tests that run against a migrated database.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Conversation, ConversationStatus};

pub const TENANT_EMAIL: &str = "ana@mail.com";

pub struct SeededChat {
    pub landlord_id: Uuid,
    pub tenant_id: Uuid,
    pub chat: Conversation,
}

async fn insert_user(pool: &PgPool, name: &str, email: &str, role: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, name, email, role) VALUES ($1, $2, $3, $4::user_role)")
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(role)
        .execute(pool)
        .await
        .unwrap();
    id
}

/// A landlord, a tenant named Ana, one room and a chat in `status`.
pub async fn seed_chat(pool: &PgPool, status: ConversationStatus) -> SeededChat {
    let landlord_id = insert_user(pool, "Luis", "luis@uniroom.app", "landlord").await;
    let tenant_id = insert_user(pool, "Ana", TENANT_EMAIL, "tenant").await;

    let room_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO rooms (id, landlord_id, title, price, address, latitude, longitude,
                           max_people, min_time, max_time)
        VALUES ($1, $2, 'Room A', 350, 'Calle Mayor 1', 40.41, -3.70, 1, 1, 12)
        "#,
    )
    .bind(room_id)
    .bind(landlord_id)
    .execute(pool)
    .await
    .unwrap();

    let chat: Conversation = sqlx::query_as(
        r#"
        INSERT INTO chats (id, room_id, landlord_id, tenant_id, status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(room_id)
    .bind(landlord_id)
    .bind(tenant_id)
    .bind(status)
    .fetch_one(pool)
    .await
    .unwrap();

    SeededChat {
        landlord_id,
        tenant_id,
        chat,
    }
}
