use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{NewUser, SessionToken, TwoFactorToken, User, VerificationToken},
};

/// Persistence used by the sign-in flow. Every `replace_*` operation removes
/// the previous records of the same owner before inserting, atomically.
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn create_user(&self, user: NewUser) -> AppResult<User>;
    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        two_factor: Option<bool>,
    ) -> AppResult<User>;
    async fn mark_email_verified(&self, id: Uuid, email: &str) -> AppResult<()>;

    async fn replace_verification_token(
        &self,
        email: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<VerificationToken>;
    async fn verification_token(&self, token: &str) -> AppResult<Option<VerificationToken>>;
    async fn delete_verification_token(&self, id: Uuid) -> AppResult<()>;

    async fn replace_two_factor_token(
        &self,
        email: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<TwoFactorToken>;
    async fn two_factor_token_by_email(&self, email: &str) -> AppResult<Option<TwoFactorToken>>;
    async fn delete_two_factor_token(&self, id: Uuid) -> AppResult<bool>;

    async fn replace_two_factor_confirmation(&self, user_id: Uuid) -> AppResult<()>;
    /// Deletes the user's confirmation and reports whether one existed.
    async fn take_two_factor_confirmation(&self, user_id: Uuid) -> AppResult<bool>;

    async fn replace_session_token(
        &self,
        user_id: Uuid,
        token_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> AppResult<SessionToken>;
    async fn session_token(&self, user_id: Uuid, token_id: Uuid)
        -> AppResult<Option<SessionToken>>;
    async fn delete_session_tokens(&self, user_id: Uuid) -> AppResult<u64>;
    async fn count_session_tokens(&self, user_id: Uuid) -> AppResult<i64>;
}

#[derive(Clone)]
pub struct PgAuthStore {
    db: PgPool,
}

impl PgAuthStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuthStore for PgAuthStore {
    async fn user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let user = sqlx::query_as(
            r#"
            INSERT INTO users (id, name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        two_factor: Option<bool>,
    ) -> AppResult<User> {
        let user = sqlx::query_as(
            r#"
            UPDATE users
            SET name = COALESCE($1, name),
                is_two_factor_enabled = COALESCE($2, is_two_factor_enabled),
                updated_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(two_factor)
        .bind(id)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn mark_email_verified(&self, id: Uuid, email: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE users SET email_verified = NOW(), email = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(email)
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn replace_verification_token(
        &self,
        email: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<VerificationToken> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM verification_tokens WHERE email = $1")
            .bind(email)
            .execute(&mut *tx)
            .await?;

        let record = sqlx::query_as(
            r#"
            INSERT INTO verification_tokens (id, email, token, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(token)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn verification_token(&self, token: &str) -> AppResult<Option<VerificationToken>> {
        let record = sqlx::query_as("SELECT * FROM verification_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.db)
            .await?;
        Ok(record)
    }

    async fn delete_verification_token(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM verification_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn replace_two_factor_token(
        &self,
        email: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<TwoFactorToken> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM two_factor_tokens WHERE email = $1")
            .bind(email)
            .execute(&mut *tx)
            .await?;

        let record = sqlx::query_as(
            r#"
            INSERT INTO two_factor_tokens (id, email, token, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(token)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn two_factor_token_by_email(&self, email: &str) -> AppResult<Option<TwoFactorToken>> {
        let record = sqlx::query_as("SELECT * FROM two_factor_tokens WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(record)
    }

    async fn delete_two_factor_token(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM two_factor_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn replace_two_factor_confirmation(&self, user_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM two_factor_confirmations WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO two_factor_confirmations (id, user_id) VALUES ($1, $2)")
            .bind(Uuid::new_v4())
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn take_two_factor_confirmation(&self, user_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM two_factor_confirmations WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn replace_session_token(
        &self,
        user_id: Uuid,
        token_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> AppResult<SessionToken> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM session_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let record = sqlx::query_as(
            r#"
            INSERT INTO session_tokens (id, user_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(token_id)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn session_token(
        &self,
        user_id: Uuid,
        token_id: Uuid,
    ) -> AppResult<Option<SessionToken>> {
        let record = sqlx::query_as("SELECT * FROM session_tokens WHERE id = $1 AND user_id = $2")
            .bind(token_id)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(record)
    }

    async fn delete_session_tokens(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM session_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_session_tokens(&self, user_id: Uuid) -> AppResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM session_tokens WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count.0)
    }
}
