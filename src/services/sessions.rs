use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::JwtConfig,
    error::{AppError, AppResult},
    models::{User, UserRole},
    storage::AuthStore,
};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,    // user_id
    pub role: UserRole, // role at issue time
    pub jti: String,    // session_tokens.id
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
}

/// The signed-in user, resolved from a bearer token and carried in request
/// extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
    pub token_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionService {
    store: Arc<dyn AuthStore>,
    jwt: JwtConfig,
}

impl SessionService {
    pub fn new(store: Arc<dyn AuthStore>, jwt: JwtConfig) -> Self {
        Self { store, jwt }
    }

    /// Replaces every session of `user` with a fresh one.
    pub async fn issue(&self, user: &User) -> AppResult<IssuedSession> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.jwt.session_ttl.as_secs() as i64);
        let token_id = Uuid::new_v4();

        self.store
            .replace_session_token(user.id, token_id, expires_at)
            .await?;

        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            jti: token_id.to_string(),
            iss: self.jwt.issuer.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };
        let key = EncodingKey::from_secret(self.jwt.secret.as_bytes());
        let token = encode(&Header::new(Algorithm::HS256), &claims, &key)?;

        tracing::debug!(user_id = %user.id, "session issued");
        Ok(IssuedSession { token, expires_at })
    }

    pub async fn invalidate(&self, user_id: Uuid) -> AppResult<()> {
        let removed = self.store.delete_session_tokens(user_id).await?;
        tracing::debug!(user_id = %user_id, removed, "sessions invalidated");
        Ok(())
    }

    /// Verifies the signature, expiry and issuer, then requires the token to
    /// still be the user's live session.
    pub async fn authenticate(&self, token: &str) -> AppResult<AuthUser> {
        let claims = self.decode(token)?;
        let id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;
        let token_id = Uuid::parse_str(&claims.jti).map_err(|_| AppError::InvalidToken)?;

        let session = self
            .store
            .session_token(id, token_id)
            .await?
            .ok_or(AppError::InvalidToken)?;
        if session.expires_at < Utc::now() {
            return Err(AppError::InvalidToken);
        }

        Ok(AuthUser {
            id,
            role: claims.role,
            token_id,
        })
    }

    fn decode(&self, token: &str) -> AppResult<Claims> {
        let key = DecodingKey::from_secret(self.jwt.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.jwt.issuer.as_str()]);

        let token_data = decode::<Claims>(token, &key, &validation)?;
        Ok(token_data.claims)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, storage::memory::MemoryAuthStore};

    fn service() -> (Arc<MemoryAuthStore>, SessionService) {
        let store = Arc::new(MemoryAuthStore::new());
        let service = SessionService::new(store.clone(), Config::for_tests().jwt);
        (store, service)
    }

    #[tokio::test]
    async fn issue_leaves_exactly_one_token() {
        let (store, sessions) = service();
        let user = fixtures::user("a@b.com", "secret");

        sessions.issue(&user).await.unwrap();
        sessions.issue(&user).await.unwrap();
        sessions.issue(&user).await.unwrap();

        assert_eq!(store.count_session_tokens(user.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn superseded_token_is_rejected() {
        let (_store, sessions) = service();
        let user = fixtures::user("a@b.com", "secret");

        let first = sessions.issue(&user).await.unwrap();
        let second = sessions.issue(&user).await.unwrap();

        assert!(matches!(
            sessions.authenticate(&first.token).await,
            Err(AppError::InvalidToken)
        ));
        let auth = sessions.authenticate(&second.token).await.unwrap();
        assert_eq!(auth.id, user.id);
        assert_eq!(auth.role, UserRole::Landlord);
    }

    #[tokio::test]
    async fn logout_revokes_the_live_token() {
        let (store, sessions) = service();
        let user = fixtures::user("a@b.com", "secret");
        let issued = sessions.issue(&user).await.unwrap();

        sessions.invalidate(user.id).await.unwrap();

        assert_eq!(store.count_session_tokens(user.id).await.unwrap(), 0);
        assert!(sessions.authenticate(&issued.token).await.is_err());
    }

    #[tokio::test]
    async fn token_signed_with_another_secret_is_rejected() {
        let (store, sessions) = service();
        let user = fixtures::user("a@b.com", "secret");

        let mut other = Config::for_tests().jwt;
        other.secret = "another-secret-that-is-long-enough-too".to_string();
        let forged = SessionService::new(store, other).issue(&user).await.unwrap();

        assert!(sessions.authenticate(&forged.token).await.is_err());
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        let (_store, sessions) = service();
        assert!(sessions.authenticate("not-a-jwt").await.is_err());
    }
}
