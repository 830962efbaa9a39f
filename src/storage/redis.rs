use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::time::Duration;
use uuid::Uuid;

use crate::{error::AppResult, models::Message};

/// Channel carrying the chat messages addressed to one user.
pub fn message_channel(user_id: Uuid) -> String {
    format!("messages:{}", user_id)
}

fn presence_key(user_id: Uuid) -> String {
    format!("presence:{}", user_id)
}

#[derive(Clone)]
pub struct RedisClient {
    client: Client,
    conn: MultiplexedConnection,
}

impl RedisClient {
    pub async fn new(url: &str) -> AppResult<Self> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { client, conn })
    }

    // Presence of landlords with an open socket
    pub async fn mark_online(&self, user_id: Uuid, ttl: Duration) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.set_ex(presence_key(user_id), "online", ttl.as_secs())
            .await?;
        Ok(())
    }

    pub async fn mark_offline(&self, user_id: Uuid) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.del(presence_key(user_id)).await?;
        Ok(())
    }

    // Chat bus
    pub async fn publish_message(&self, user_id: Uuid, message: &Message) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(message)?;
        conn.publish(message_channel(user_id), payload).await?;
        Ok(())
    }

    pub async fn subscribe_messages(&self, user_id: Uuid) -> AppResult<redis::aio::PubSub> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(message_channel(user_id)).await?;
        Ok(pubsub)
    }
}
