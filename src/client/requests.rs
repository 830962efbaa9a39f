//! Request board: the dashboard's list of conversation requests with
//! optimistic status changes.
//!
//! Each change goes `Pending → Committed | RolledBack`. The item leaves the
//! list as soon as the change begins; a failed call puts it back where it
//! was.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use super::{ApiClient, ClientError};
use crate::models::{ConversationStatus, ConversationWithDetails};

/// The single server call the board needs.
#[async_trait]
pub trait RequestApi: Sync {
    async fn transition(
        &self,
        chat_id: Uuid,
        status: ConversationStatus,
        email: &str,
    ) -> Result<ConversationWithDetails, ClientError>;
}

#[async_trait]
impl RequestApi for ApiClient {
    async fn transition(
        &self,
        chat_id: Uuid,
        status: ConversationStatus,
        email: &str,
    ) -> Result<ConversationWithDetails, ClientError> {
        ApiClient::transition(self, chat_id, status, email).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Pending,
    Committed,
    RolledBack,
}

#[derive(Debug)]
struct Mutation {
    item: ConversationWithDetails,
    index: usize,
    target: ConversationStatus,
    state: MutationState,
}

#[derive(Debug, Default)]
pub struct RequestBoard {
    items: Vec<ConversationWithDetails>,
    mutations: HashMap<Uuid, Mutation>,
}

impl RequestBoard {
    pub fn new(items: Vec<ConversationWithDetails>) -> Self {
        Self {
            items,
            mutations: HashMap::new(),
        }
    }

    pub fn items(&self) -> &[ConversationWithDetails] {
        &self.items
    }

    pub fn state(&self, chat_id: Uuid) -> Option<MutationState> {
        self.mutations.get(&chat_id).map(|m| m.state)
    }

    /// Replaces the list with a fresh server listing. Items with a change
    /// still in flight stay hidden.
    pub fn refresh(&mut self, items: Vec<ConversationWithDetails>) {
        self.items = items
            .into_iter()
            .filter(|item| self.state(item.conversation.id) != Some(MutationState::Pending))
            .collect();
    }

    /// Takes the item off the list. A second change for the same chat while
    /// the first is pending is refused.
    pub fn begin(&mut self, chat_id: Uuid, target: ConversationStatus) -> Result<(), ClientError> {
        if self.state(chat_id) == Some(MutationState::Pending) {
            return Err(ClientError::AlreadyInFlight);
        }
        let index = self
            .items
            .iter()
            .position(|item| item.conversation.id == chat_id)
            .ok_or(ClientError::UnknownRequest)?;

        let item = self.items.remove(index);
        self.mutations.insert(
            chat_id,
            Mutation {
                item,
                index,
                target,
                state: MutationState::Pending,
            },
        );
        Ok(())
    }

    pub fn commit(&mut self, chat_id: Uuid) -> Result<(), ClientError> {
        let mutation = self.pending_mut(chat_id)?;
        mutation.state = MutationState::Committed;
        tracing::debug!(chat_id = %chat_id, status = mutation.target.as_str(), "request change committed");
        Ok(())
    }

    /// Puts the item back at the position it was taken from.
    pub fn rollback(&mut self, chat_id: Uuid) -> Result<(), ClientError> {
        let mutation = self.pending_mut(chat_id)?;
        mutation.state = MutationState::RolledBack;
        let index = mutation.index;
        let item = mutation.item.clone();

        let index = index.min(self.items.len());
        self.items.insert(index, item);
        Ok(())
    }

    fn pending_mut(&mut self, chat_id: Uuid) -> Result<&mut Mutation, ClientError> {
        self.mutations
            .get_mut(&chat_id)
            .filter(|m| m.state == MutationState::Pending)
            .ok_or(ClientError::UnknownRequest)
    }

    /// Runs a full optimistic change against the server.
    pub async fn transition<A: RequestApi>(
        &mut self,
        api: &A,
        chat_id: Uuid,
        target: ConversationStatus,
    ) -> Result<ConversationWithDetails, ClientError> {
        let email = self
            .items
            .iter()
            .find(|item| item.conversation.id == chat_id)
            .and_then(|item| item.tenant())
            .map(|tenant| tenant.email.clone());
        self.begin(chat_id, target)?;
        let Some(email) = email else {
            self.rollback(chat_id)?;
            return Err(ClientError::UnknownRequest);
        };

        match api.transition(chat_id, target, &email).await {
            Ok(updated) => {
                self.commit(chat_id)?;
                Ok(updated)
            }
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "request change rolled back");
                self.rollback(chat_id)?;
                Err(e)
            }
        }
    }
}
