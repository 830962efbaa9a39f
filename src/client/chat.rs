//! Client side of a chat connection.
//!
//! [`ChatView`] owns the local message buffer for the selected conversation.
//! It only talks to the network through a [`ChatChannel`], so the caller's
//! task is the single writer and every transition is a plain `&mut self`
//! method. History is fetched by the caller and handed back with the
//! [`HistoryTicket`] it was started with; results for an older selection
//! are discarded.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::ClientError;
use crate::models::{ClientEvent, Message, MessageBody, ServerEvent};

/// Outbound half of a chat socket.
#[async_trait]
pub trait ChatChannel: Send {
    async fn emit(&mut self, event: &ClientEvent) -> Result<(), ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connected { selection: Option<Uuid> },
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    Delivered,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub message: Message,
    pub own: bool,
    pub delivery: DeliveryState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryTicket {
    chat_id: Uuid,
    generation: u64,
}

impl HistoryTicket {
    pub fn chat_id(&self) -> Uuid {
        self.chat_id
    }
}

pub struct ChatView<C> {
    user_id: Uuid,
    nickname: String,
    channel: Option<C>,
    state: ConnectionState,
    generation: u64,
    entries: Vec<ChatEntry>,
    /// Chat the buffered entries belong to; outlives a disconnect.
    buffer_chat: Option<Uuid>,
    history_error: Option<String>,
    last_error: Option<String>,
}

impl<C: ChatChannel> ChatView<C> {
    pub fn new(user_id: Uuid, nickname: impl Into<String>) -> Self {
        Self {
            user_id,
            nickname: nickname.into(),
            channel: None,
            state: ConnectionState::Idle,
            generation: 0,
            entries: Vec::new(),
            buffer_chat: None,
            history_error: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn selection(&self) -> Option<Uuid> {
        match self.state {
            ConnectionState::Connected { selection } => selection,
            _ => None,
        }
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn history_error(&self) -> Option<&str> {
        self.history_error.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Attaches a fresh channel. Own messages that failed before are kept
    /// so they can be retried once their chat is selected again.
    pub fn connect(&mut self, channel: C) {
        self.channel = Some(channel);
        self.state = ConnectionState::Connected { selection: None };
        self.entries.retain(is_failed_own);
        self.history_error = None;
        self.last_error = None;
    }

    /// Drops the channel and the selection. Messages still waiting for an
    /// ack are marked failed so they can be retried after reconnecting.
    pub fn disconnect(&mut self) {
        self.channel = None;
        self.state = ConnectionState::Disconnected;
        self.generation += 1;
        for entry in &mut self.entries {
            if entry.delivery == DeliveryState::Pending {
                entry.delivery = DeliveryState::Failed;
            }
        }
    }

    async fn emit(&mut self, event: &ClientEvent) -> Result<(), ClientError> {
        match self.channel.as_mut() {
            Some(channel) => channel.emit(event).await,
            None => Err(ClientError::NotConnected),
        }
    }

    /// Switches to `chat_id`. Any history still in flight becomes stale. The
    /// buffer is dropped, except failed own messages when `chat_id` is the
    /// chat they were sent to.
    pub async fn select(&mut self, chat_id: Uuid) -> Result<HistoryTicket, ClientError> {
        if !matches!(self.state, ConnectionState::Connected { .. }) {
            return Err(ClientError::NotConnected);
        }
        self.emit(&ClientEvent::JoinChat { chat_id }).await?;

        self.state = ConnectionState::Connected {
            selection: Some(chat_id),
        };
        self.generation += 1;
        if self.buffer_chat == Some(chat_id) {
            self.entries.retain(is_failed_own);
        } else {
            self.entries.clear();
        }
        self.buffer_chat = Some(chat_id);
        self.history_error = None;
        Ok(HistoryTicket {
            chat_id,
            generation: self.generation,
        })
    }

    pub async fn leave(&mut self) -> Result<(), ClientError> {
        if self.selection().is_none() {
            return Ok(());
        }
        self.emit(&ClientEvent::LeaveChat).await?;
        self.state = ConnectionState::Connected { selection: None };
        self.generation += 1;
        self.entries.clear();
        self.buffer_chat = None;
        self.history_error = None;
        Ok(())
    }

    fn is_current(&self, ticket: &HistoryTicket) -> bool {
        ticket.generation == self.generation && self.selection() == Some(ticket.chat_id)
    }

    /// Applies a history fetch. Returns `false` when the ticket is stale and
    /// the result was ignored.
    pub fn apply_history(
        &mut self,
        ticket: HistoryTicket,
        result: Result<Vec<Message>, ClientError>,
    ) -> bool {
        if !self.is_current(&ticket) {
            tracing::debug!(chat_id = %ticket.chat_id, "discarding stale history");
            return false;
        }

        match result {
            Ok(history) => {
                let live = std::mem::take(&mut self.entries);
                let user_id = self.user_id;
                self.entries = history
                    .into_iter()
                    .map(|message| ChatEntry {
                        own: message.sender_id == user_id,
                        message,
                        delivery: DeliveryState::Delivered,
                    })
                    .collect();
                // Keep whatever arrived or was sent while the fetch ran.
                for entry in live {
                    let known = self.entries.iter().any(|e| {
                        e.message.id == entry.message.id
                            || (e.own && entry.own && e.message.client_id == entry.message.client_id)
                    });
                    if !known {
                        self.entries.push(entry);
                    }
                }
                self.history_error = None;
            }
            Err(e) => {
                tracing::warn!(chat_id = %ticket.chat_id, error = %e, "history fetch failed");
                self.history_error = Some(e.to_string());
            }
        }
        true
    }

    /// Appends `text` as an own message and emits it once. The returned
    /// client id identifies the message for [`ChatView::retry`].
    pub async fn send(&mut self, text: &str) -> Result<Uuid, ClientError> {
        let chat_id = self.selection().ok_or(ClientError::NoSelection)?;
        let content = MessageBody::try_from(text.to_string())?;
        let client_id = Uuid::new_v4();

        self.entries.push(ChatEntry {
            message: Message {
                // Replaced by the stored id once the server acks.
                id: client_id,
                chat_id,
                sender_id: self.user_id,
                nickname: self.nickname.clone(),
                content: content.as_str().to_string(),
                client_id,
                created_at: Utc::now(),
            },
            own: true,
            delivery: DeliveryState::Pending,
        });

        let event = ClientEvent::Message {
            chat_id,
            content,
            client_id,
        };
        if let Err(e) = self.emit(&event).await {
            tracing::warn!(chat_id = %chat_id, error = %e, "message not sent");
            self.set_delivery(client_id, DeliveryState::Failed);
        }
        Ok(client_id)
    }

    /// Re-emits a failed message under the same client id, so the server
    /// stores it at most once.
    pub async fn retry(&mut self, client_id: Uuid) -> Result<(), ClientError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.own && e.message.client_id == client_id)
            .ok_or(ClientError::UnknownMessage)?;
        if entry.delivery != DeliveryState::Failed {
            return Ok(());
        }
        if self.selection() != Some(entry.message.chat_id) {
            return Err(ClientError::NoSelection);
        }
        let content = MessageBody::try_from(entry.message.content.clone())?;
        let event = ClientEvent::Message {
            chat_id: entry.message.chat_id,
            content,
            client_id,
        };

        self.set_delivery(client_id, DeliveryState::Pending);
        if let Err(e) = self.emit(&event).await {
            self.set_delivery(client_id, DeliveryState::Failed);
            return Err(e);
        }
        Ok(())
    }

    fn set_delivery(&mut self, client_id: Uuid, delivery: DeliveryState) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.own && e.message.client_id == client_id)
        {
            entry.delivery = delivery;
        }
    }

    /// Folds a server event into the buffer.
    pub fn handle(&mut self, event: ServerEvent) {
        let ConnectionState::Connected { selection } = self.state else {
            return;
        };

        match event {
            ServerEvent::Joined { chat_id } => {
                tracing::debug!(chat_id = %chat_id, "joined chat");
            }
            ServerEvent::Message(message) => {
                if message.sender_id == self.user_id
                    || selection != Some(message.chat_id)
                    || self.entries.iter().any(|e| e.message.id == message.id)
                {
                    return;
                }
                self.entries.push(ChatEntry {
                    message,
                    own: false,
                    delivery: DeliveryState::Delivered,
                });
            }
            ServerEvent::Ack {
                client_id,
                message_id,
            } => {
                if let Some(entry) = self
                    .entries
                    .iter_mut()
                    .find(|e| e.own && e.message.client_id == client_id)
                {
                    entry.message.id = message_id;
                    entry.delivery = DeliveryState::Delivered;
                }
            }
            ServerEvent::Error { message } => {
                tracing::warn!(error = %message, "chat server error");
                self.last_error = Some(message);
            }
            ServerEvent::Pong => {}
        }
    }
}

fn is_failed_own(entry: &ChatEntry) -> bool {
    entry.own && entry.delivery == DeliveryState::Failed
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;

    #[derive(Default)]
    pub struct FakeChannel {
        pub sent: Vec<ClientEvent>,
        pub fail: bool,
    }

    #[async_trait]
    impl ChatChannel for FakeChannel {
        async fn emit(&mut self, event: &ClientEvent) -> Result<(), ClientError> {
            if self.fail {
                return Err(ClientError::Socket("connection reset".to_string()));
            }
            self.sent.push(event.clone());
            Ok(())
        }
    }
}
