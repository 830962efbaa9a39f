use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use super::{retry::with_backoff, ClientError};
use crate::models::{ConversationStatus, ConversationWithDetails, Message, User};

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// The three shapes a sign-in attempt can answer with.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LoginReply {
    Session {
        token: String,
        expires_at: DateTime<Utc>,
        user: User,
    },
    TwoFactor {
        two_factor: bool,
    },
    Success {
        success: String,
    },
}

#[derive(Debug, Serialize)]
struct StatusChange<'a> {
    status: ConversationStatus,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct NewMessage<'a> {
    content: &'a str,
    client_id: Uuid,
}

/// HTTP client for the `/api/v1` surface.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Socket endpoint derived from the HTTP base (`http` → `ws`).
    pub fn ws_url(&self) -> String {
        let base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };
        format!("{}/ws", base)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn parse<R: DeserializeOwned>(resp: reqwest::Response) -> Result<R, ClientError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::from_response(status.as_u16(), &body));
        }
        resp.json::<R>()
            .await
            .map_err(|e| ClientError::Decode(format!("response body: {}", e)))
    }

    async fn get_with_retry<R: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<R, ClientError> {
        let this = self;
        with_backoff(move || async move {
            let resp = this.authed(this.http.get(url).query(query)).send().await?;
            Self::parse(resp).await
        })
        .await
    }

    /// Signs in; a session reply also authenticates this client.
    pub async fn login(&mut self, request: &LoginRequest) -> Result<LoginReply, ClientError> {
        let resp = self
            .http
            .post(self.url("/auth/login"))
            .json(request)
            .send()
            .await?;
        let reply: LoginReply = Self::parse(resp).await?;
        if let LoginReply::Session { token, .. } = &reply {
            self.token = Some(token.clone());
        }
        Ok(reply)
    }

    pub async fn logout(&mut self) -> Result<(), ClientError> {
        let resp = self
            .authed(self.http.post(self.url("/auth/logout")))
            .send()
            .await?;
        let _: serde_json::Value = Self::parse(resp).await?;
        self.token = None;
        Ok(())
    }

    pub async fn list_requests(
        &self,
        status: ConversationStatus,
        room_ids: &[Uuid],
        text: Option<&str>,
    ) -> Result<Vec<ConversationWithDetails>, ClientError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if !room_ids.is_empty() {
            let ids: Vec<String> = room_ids.iter().map(Uuid::to_string).collect();
            query.push(("room_ids", ids.join(",")));
        }
        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
            query.push(("text", text.to_string()));
        }
        let url = self.url(&format!("/chats/{}", status.as_str()));
        self.get_with_retry(&url, &query).await
    }

    /// Moves a pending request. Not retried: a replay of the same target is
    /// answered idempotently by the server, so callers can resubmit safely.
    pub async fn transition(
        &self,
        chat_id: Uuid,
        status: ConversationStatus,
        email: &str,
    ) -> Result<ConversationWithDetails, ClientError> {
        let resp = self
            .authed(self.http.post(self.url(&format!("/chats/{}/status", chat_id))))
            .json(&StatusChange { status, email })
            .send()
            .await?;
        Self::parse(resp).await
    }

    pub async fn history(
        &self,
        chat_id: Uuid,
        limit: Option<i64>,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, ClientError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(before) = before {
            query.push(("before", before.to_rfc3339()));
        }
        let url = self.url(&format!("/chats/{}/messages", chat_id));
        self.get_with_retry(&url, &query).await
    }

    /// Stores a message over HTTP. `client_id` makes a resend harmless.
    pub async fn send_message(
        &self,
        chat_id: Uuid,
        content: &str,
        client_id: Uuid,
    ) -> Result<Message, ClientError> {
        let resp = self
            .authed(self.http.post(self.url(&format!("/chats/{}/messages", chat_id))))
            .json(&NewMessage { content, client_id })
            .send()
            .await?;
        Self::parse(resp).await
    }
}
