//! In-memory `AuthStore` used by the service tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::AuthStore;
use crate::{
    error::{AppError, AppResult},
    models::{NewUser, SessionToken, TwoFactorToken, User, VerificationToken},
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    verification: Vec<VerificationToken>,
    two_factor: Vec<TwoFactorToken>,
    confirmations: HashMap<Uuid, Uuid>,
    sessions: Vec<SessionToken>,
}

#[derive(Default)]
pub struct MemoryAuthStore {
    tables: Mutex<Tables>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.tables.lock().await.users.insert(user.id, user);
    }

    pub async fn has_confirmation(&self, user_id: Uuid) -> bool {
        self.tables.lock().await.confirmations.contains_key(&user_id)
    }

    pub async fn expire_two_factor_token(&self, email: &str) {
        let mut tables = self.tables.lock().await;
        for token in tables.two_factor.iter_mut().filter(|t| t.email == email) {
            token.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
    }

    pub async fn expire_verification_token(&self, token: &str) {
        let mut tables = self.tables.lock().await;
        for record in tables.verification.iter_mut().filter(|t| t.token == token) {
            record.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
    }

    pub async fn verification_for(&self, email: &str) -> Option<VerificationToken> {
        let tables = self.tables.lock().await;
        tables.verification.iter().find(|t| t.email == email).cloned()
    }
}

#[async_trait]
impl AuthStore for MemoryAuthStore {
    async fn user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: Some(user.name),
            email: user.email,
            password_hash: Some(user.password_hash),
            role: user.role,
            is_two_factor_enabled: false,
            email_verified: None,
            image_url: None,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        two_factor: Option<bool>,
    ) -> AppResult<User> {
        let mut tables = self.tables.lock().await;
        let user = tables.users.get_mut(&id).ok_or(AppError::UserNotFound)?;
        if let Some(name) = name {
            user.name = Some(name.to_string());
        }
        if let Some(enabled) = two_factor {
            user.is_two_factor_enabled = enabled;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn mark_email_verified(&self, id: Uuid, email: &str) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        let user = tables.users.get_mut(&id).ok_or(AppError::UserNotFound)?;
        user.email_verified = Some(Utc::now());
        user.email = email.to_string();
        Ok(())
    }

    async fn replace_verification_token(
        &self,
        email: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<VerificationToken> {
        let mut tables = self.tables.lock().await;
        tables.verification.retain(|t| t.email != email);
        let record = VerificationToken {
            id: Uuid::new_v4(),
            email: email.to_string(),
            token: token.to_string(),
            expires_at,
        };
        tables.verification.push(record.clone());
        Ok(record)
    }

    async fn verification_token(&self, token: &str) -> AppResult<Option<VerificationToken>> {
        let tables = self.tables.lock().await;
        Ok(tables.verification.iter().find(|t| t.token == token).cloned())
    }

    async fn delete_verification_token(&self, id: Uuid) -> AppResult<()> {
        self.tables.lock().await.verification.retain(|t| t.id != id);
        Ok(())
    }

    async fn replace_two_factor_token(
        &self,
        email: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<TwoFactorToken> {
        let mut tables = self.tables.lock().await;
        tables.two_factor.retain(|t| t.email != email);
        let record = TwoFactorToken {
            id: Uuid::new_v4(),
            email: email.to_string(),
            token: token.to_string(),
            expires_at,
        };
        tables.two_factor.push(record.clone());
        Ok(record)
    }

    async fn two_factor_token_by_email(&self, email: &str) -> AppResult<Option<TwoFactorToken>> {
        let tables = self.tables.lock().await;
        Ok(tables.two_factor.iter().find(|t| t.email == email).cloned())
    }

    async fn delete_two_factor_token(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.two_factor.len();
        tables.two_factor.retain(|t| t.id != id);
        Ok(tables.two_factor.len() < before)
    }

    async fn replace_two_factor_confirmation(&self, user_id: Uuid) -> AppResult<()> {
        self.tables
            .lock()
            .await
            .confirmations
            .insert(user_id, Uuid::new_v4());
        Ok(())
    }

    async fn take_two_factor_confirmation(&self, user_id: Uuid) -> AppResult<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .confirmations
            .remove(&user_id)
            .is_some())
    }

    async fn replace_session_token(
        &self,
        user_id: Uuid,
        token_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> AppResult<SessionToken> {
        let mut tables = self.tables.lock().await;
        tables.sessions.retain(|s| s.user_id != user_id);
        let record = SessionToken {
            id: token_id,
            user_id,
            expires_at,
            created_at: Utc::now(),
        };
        tables.sessions.push(record.clone());
        Ok(record)
    }

    async fn session_token(
        &self,
        user_id: Uuid,
        token_id: Uuid,
    ) -> AppResult<Option<SessionToken>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .iter()
            .find(|s| s.id == token_id && s.user_id == user_id)
            .cloned())
    }

    async fn delete_session_tokens(&self, user_id: Uuid) -> AppResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.user_id != user_id);
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn count_session_tokens(&self, user_id: Uuid) -> AppResult<i64> {
        let tables = self.tables.lock().await;
        Ok(tables.sessions.iter().filter(|s| s.user_id == user_id).count() as i64)
    }
}
