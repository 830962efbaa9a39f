//! Dashboard-side SDK: typed HTTP client, chat connection manager and the
//! request board with optimistic status changes.

pub mod api;
pub mod chat;
pub mod requests;
pub mod retry;
pub mod ws;

use serde::Deserialize;
use thiserror::Error;

use crate::models::MessageBodyError;

pub use api::{ApiClient, LoginReply};
pub use chat::{ChatChannel, ChatEntry, ChatView, DeliveryState, HistoryTicket};
pub use requests::{MutationState, RequestBoard};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("socket error: {0}")]
    Socket(String),

    #[error("not connected")]
    NotConnected,

    #[error("no chat selected")]
    NoSelection,

    #[error(transparent)]
    InvalidMessage(#[from] MessageBodyError),

    #[error("message not found")]
    UnknownMessage,

    #[error("a change for this request is already in flight")]
    AlreadyInFlight,

    #[error("request not found")]
    UnknownRequest,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl ClientError {
    /// Builds a server error from a response body, preferring the
    /// `{"error": ...}` message the backend renders.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.error)
            .unwrap_or_else(|_| body.to_string());
        ClientError::Server { status, message }
    }

    /// Transport failures and 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network(e) => !e.is_decode() && !e.is_builder(),
            ClientError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
