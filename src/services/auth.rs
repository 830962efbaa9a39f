use std::sync::Arc;

use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{
    mailer::{Mail, Mailer},
    sessions::{IssuedSession, SessionService},
};
use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{NewUser, User, UserRole},
    storage::AuthStore,
};

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

pub const VERIFICATION_SENT: &str = "¡Correo de confirmación enviado!";
pub const EMAIL_VERIFIED: &str = "¡Correo verificado!";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[serde(default)]
    #[validate(custom(function = "six_digits"))]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 1, message = "El nombre es obligatorio"))]
    pub name: String,
    #[validate(email(message = "Correo inválido"))]
    pub email: String,
    #[validate(length(min = 6, message = "La contraseña debe tener al menos 6 caracteres"))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsInput {
    pub name: Option<String>,
    pub is_two_factor_enabled: Option<bool>,
}

/// Result of a sign-in attempt that did not fail.
#[derive(Debug)]
pub enum LoginOutcome {
    Session { session: IssuedSession, user: User },
    VerificationSent,
    TwoFactorRequired,
}

pub struct AuthService {
    store: Arc<dyn AuthStore>,
    mailer: Arc<dyn Mailer>,
    config: Arc<Config>,
}

impl AuthService {
    pub fn new(store: Arc<dyn AuthStore>, mailer: Arc<dyn Mailer>, config: Arc<Config>) -> Self {
        Self {
            store,
            mailer,
            config,
        }
    }

    fn sessions(&self) -> SessionService {
        SessionService::new(self.store.clone(), self.config.jwt.clone())
    }

    pub async fn login(&self, input: LoginInput) -> AppResult<LoginOutcome> {
        let input = validate_login(input)?;

        let user = self
            .store
            .user_by_email(&input.email)
            .await?
            .ok_or(AppError::NonexistentCredentials)?;
        let password_hash = user
            .password_hash
            .as_deref()
            .ok_or(AppError::NonexistentCredentials)?;

        if !user.role.may_use_dashboard() {
            return Err(AppError::RoleNotAllowed);
        }

        let matches = verify(&input.password, password_hash)
            .map_err(|e| anyhow::anyhow!("Verify error: {}", e))?;
        if !matches {
            tracing::debug!(user_id = %user.id, "wrong password");
            return Err(AppError::InvalidCredentials);
        }

        if !user.is_verified() {
            self.send_verification(&user.email).await?;
            return Ok(LoginOutcome::VerificationSent);
        }

        if user.is_two_factor_enabled {
            match input.code.as_deref() {
                None => {
                    self.send_two_factor_code(&user.email).await?;
                    return Ok(LoginOutcome::TwoFactorRequired);
                }
                Some(code) => self.confirm_two_factor(&user, code).await?,
            }
        }

        let session = self.establish_session(&user).await?;
        Ok(LoginOutcome::Session { session, user })
    }

    /// Checks the emailed code, consumes it and records a confirmation for
    /// the session gate.
    async fn confirm_two_factor(&self, user: &User, code: &str) -> AppResult<()> {
        let token = self
            .store
            .two_factor_token_by_email(&user.email)
            .await?
            .filter(|t| t.token == code)
            .ok_or(AppError::InvalidTwoFactorCode)?;

        if token.is_expired_at(Utc::now()) {
            return Err(AppError::TwoFactorCodeExpired);
        }

        // A concurrent attempt may have consumed it first.
        if !self.store.delete_two_factor_token(token.id).await? {
            return Err(AppError::InvalidTwoFactorCode);
        }
        self.store.replace_two_factor_confirmation(user.id).await?;
        Ok(())
    }

    /// The only place a two-factor sign-in is let through: the confirmation
    /// is consumed before the session is issued.
    async fn establish_session(&self, user: &User) -> AppResult<IssuedSession> {
        if user.is_two_factor_enabled && !self.store.take_two_factor_confirmation(user.id).await? {
            return Err(AppError::TwoFactorNotConfirmed);
        }
        self.sessions().issue(user).await
    }

    pub async fn logout(&self, user_id: Uuid) -> AppResult<()> {
        self.sessions().invalidate(user_id).await
    }

    pub async fn register(&self, input: RegisterInput) -> AppResult<&'static str> {
        let input = validate_register(input)?;

        if self.store.user_by_email(&input.email).await?.is_some() {
            return Err(AppError::EmailInUse);
        }

        let password_hash = hash(&input.password, HASH_COST)
            .map_err(|e| anyhow::anyhow!("Hash error: {}", e))?;

        let user = self
            .store
            .create_user(NewUser {
                name: input.name,
                email: input.email,
                password_hash,
                role: UserRole::Landlord,
            })
            .await?;
        tracing::info!(user_id = %user.id, "landlord registered");

        self.send_verification(&user.email).await?;
        Ok(VERIFICATION_SENT)
    }

    pub async fn new_verification(&self, token: &str) -> AppResult<&'static str> {
        let record = self
            .store
            .verification_token(token.trim())
            .await?
            .ok_or(AppError::VerificationTokenNotFound)?;

        if record.expires_at < Utc::now() {
            return Err(AppError::VerificationTokenExpired);
        }

        let user = self
            .store
            .user_by_email(&record.email)
            .await?
            .ok_or(AppError::EmailNotFound)?;

        self.store.mark_email_verified(user.id, &record.email).await?;
        self.store.delete_verification_token(record.id).await?;
        Ok(EMAIL_VERIFIED)
    }

    pub async fn current_user(&self, user_id: Uuid) -> AppResult<User> {
        self.store
            .user_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    pub async fn update_settings(&self, user_id: Uuid, input: SettingsInput) -> AppResult<User> {
        let name = match input.name.as_deref().map(str::trim) {
            Some("") => {
                return Err(AppError::Validation("El nombre es obligatorio".to_string()));
            }
            other => other,
        };
        self.store
            .update_profile(user_id, name, input.is_two_factor_enabled)
            .await
    }

    async fn send_verification(&self, email: &str) -> AppResult<()> {
        let token = Uuid::new_v4().to_string();
        let expires_at =
            Utc::now() + Duration::seconds(self.config.tokens.verification_ttl.as_secs() as i64);
        self.store
            .replace_verification_token(email, &token, expires_at)
            .await?;

        let link = format!(
            "{}/auth/new-verification?token={}",
            self.config.server.public_url.trim_end_matches('/'),
            token
        );
        self.mailer
            .send(Mail::Verification {
                to: email.to_string(),
                link,
            })
            .await
    }

    async fn send_two_factor_code(&self, email: &str) -> AppResult<()> {
        let code = generate_code(self.config.tokens.two_factor_length);
        let expires_at =
            Utc::now() + Duration::seconds(self.config.tokens.two_factor_ttl.as_secs() as i64);
        self.store
            .replace_two_factor_token(email, &code, expires_at)
            .await?;

        self.mailer
            .send(Mail::TwoFactorCode {
                to: email.to_string(),
                code,
            })
            .await
    }
}

fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    let max = 10_u32.pow(length as u32);
    let code: u32 = rng.gen_range(0..max);
    format!("{:0>width$}", code, width = length)
}

fn six_digits(code: &str) -> Result<(), ValidationError> {
    if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("code"))
    }
}

/// Normalises the sign-in form. Any rule failure is reported as invalid
/// credentials so the form does not hint at which field was wrong.
fn validate_login(mut input: LoginInput) -> AppResult<LoginInput> {
    input.email = input.email.trim().to_lowercase();
    input.code = input
        .code
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    input.validate().map_err(|_| AppError::InvalidCredentials)?;
    Ok(input)
}

fn validate_register(mut input: RegisterInput) -> AppResult<RegisterInput> {
    input.email = input.email.trim().to_lowercase();
    input.name = input.name.trim().to_string();

    input.validate()?;
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::{mailer::recording::RecordingMailer, sessions::fixtures},
        storage::memory::MemoryAuthStore,
    };

    struct Harness {
        store: Arc<MemoryAuthStore>,
        mailer: Arc<RecordingMailer>,
        auth: AuthService,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryAuthStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let auth = AuthService::new(
            store.clone(),
            mailer.clone(),
            Arc::new(Config::for_tests()),
        );
        Harness {
            store,
            mailer,
            auth,
        }
    }

    fn login(email: &str, password: &str, code: Option<&str>) -> LoginInput {
        LoginInput {
            email: email.to_string(),
            password: password.to_string(),
            code: code.map(str::to_string),
        }
    }

    async fn emailed_code(mailer: &RecordingMailer) -> String {
        mailer
            .sent()
            .await
            .into_iter()
            .rev()
            .find_map(|m| match m {
                Mail::TwoFactorCode { code, .. } => Some(code),
                _ => None,
            })
            .expect("a two-factor mail")
    }

    #[tokio::test]
    async fn unverified_email_only_sends_verification() {
        let h = harness();
        let mut user = fixtures::user("a@b.com", "secret");
        user.email_verified = None;
        user.is_two_factor_enabled = true;
        h.store.insert_user(user.clone()).await;

        let outcome = h.auth.login(login("a@b.com", "secret", None)).await.unwrap();

        assert!(matches!(outcome, LoginOutcome::VerificationSent));
        assert_eq!(h.store.count_session_tokens(user.id).await.unwrap(), 0);
        assert!(h.store.verification_for("a@b.com").await.is_some());
        assert!(matches!(h.mailer.sent().await[..], [Mail::Verification { .. }]));
    }

    #[tokio::test]
    async fn two_factor_without_code_issues_no_session() {
        let h = harness();
        let mut user = fixtures::user("a@b.com", "secret");
        user.is_two_factor_enabled = true;
        h.store.insert_user(user.clone()).await;

        let outcome = h.auth.login(login("a@b.com", "secret", None)).await.unwrap();

        assert!(matches!(outcome, LoginOutcome::TwoFactorRequired));
        assert_eq!(h.store.count_session_tokens(user.id).await.unwrap(), 0);
        let code = emailed_code(&h.mailer).await;
        assert_eq!(code.len(), 6);
    }

    #[tokio::test]
    async fn consumed_code_cannot_be_replayed() {
        let h = harness();
        let mut user = fixtures::user("a@b.com", "secret");
        user.is_two_factor_enabled = true;
        h.store.insert_user(user.clone()).await;

        h.auth.login(login("a@b.com", "secret", None)).await.unwrap();
        let code = emailed_code(&h.mailer).await;

        let first = h.auth.login(login("a@b.com", "secret", Some(&code))).await;
        assert!(matches!(first, Ok(LoginOutcome::Session { .. })));
        assert!(!h.store.has_confirmation(user.id).await);

        let replay = h.auth.login(login("a@b.com", "secret", Some(&code))).await;
        assert!(matches!(replay, Err(AppError::InvalidTwoFactorCode)));
        assert_eq!(h.store.count_session_tokens(user.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn wrong_or_expired_code_is_rejected() {
        let h = harness();
        let mut user = fixtures::user("a@b.com", "secret");
        user.is_two_factor_enabled = true;
        h.store.insert_user(user.clone()).await;

        h.auth.login(login("a@b.com", "secret", None)).await.unwrap();
        let code = emailed_code(&h.mailer).await;
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let err = h
            .auth
            .login(login("a@b.com", "secret", Some(wrong)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Código inválido");

        h.store.expire_two_factor_token("a@b.com").await;
        let err = h
            .auth
            .login(login("a@b.com", "secret", Some(&code)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "El código ha expirado");
        assert_eq!(h.store.count_session_tokens(user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn wrong_password_creates_nothing() {
        let h = harness();
        let user = fixtures::user("a@b.com", "secret");
        h.store.insert_user(user.clone()).await;

        let err = h
            .auth
            .login(login("a@b.com", "wrong", None))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Credenciales inválidas");
        assert_eq!(h.store.count_session_tokens(user.id).await.unwrap(), 0);
        assert!(h.mailer.sent().await.is_empty());
    }

    #[tokio::test]
    async fn successful_login_replaces_prior_token() {
        let h = harness();
        let user = fixtures::user("a@b.com", "secret");
        h.store.insert_user(user.clone()).await;

        let first = match h.auth.login(login("a@b.com", "secret", None)).await.unwrap() {
            LoginOutcome::Session { session, .. } => session,
            other => panic!("unexpected outcome {:?}", other),
        };
        let second = match h.auth.login(login("A@B.com ", "secret", None)).await.unwrap() {
            LoginOutcome::Session { session, .. } => session,
            other => panic!("unexpected outcome {:?}", other),
        };

        assert_eq!(h.store.count_session_tokens(user.id).await.unwrap(), 1);
        let sessions = SessionService::new(h.store.clone(), Config::for_tests().jwt);
        assert!(sessions.authenticate(&first.token).await.is_err());
        assert!(sessions.authenticate(&second.token).await.is_ok());
    }

    #[tokio::test]
    async fn tenants_and_unknown_users_are_turned_away() {
        let h = harness();
        let mut tenant = fixtures::user("t@x.com", "secret");
        tenant.role = UserRole::Tenant;
        h.store.insert_user(tenant).await;

        let err = h.auth.login(login("t@x.com", "secret", None)).await.unwrap_err();
        assert_eq!(err.to_string(), "Su rol no pertenece a esta plataforma");

        let err = h.auth.login(login("nobody@x.com", "secret", None)).await.unwrap_err();
        assert_eq!(err.to_string(), "Credenciales inexistentes");
    }

    #[tokio::test]
    async fn malformed_input_is_rejected_before_lookup() {
        let h = harness();
        for input in [
            login("not-an-email", "secret", None),
            login("a@b.com", "", None),
            login("a@b.com", "secret", Some("12ab56")),
            login("a@b.com", "secret", Some("1234567")),
            login("a@b..com", "secret", None),
            login("a@-b.com", "secret", None),
            login("a@b-.com", "secret", None),
        ] {
            assert!(matches!(
                h.auth.login(input).await,
                Err(AppError::InvalidCredentials)
            ));
        }
    }

    #[tokio::test]
    async fn session_gate_requires_a_confirmation() {
        let h = harness();
        let mut user = fixtures::user("a@b.com", "secret");
        user.is_two_factor_enabled = true;
        h.store.insert_user(user.clone()).await;

        assert!(matches!(
            h.auth.establish_session(&user).await,
            Err(AppError::TwoFactorNotConfirmed)
        ));

        h.store.replace_two_factor_confirmation(user.id).await.unwrap();
        assert!(h.auth.establish_session(&user).await.is_ok());
        assert!(matches!(
            h.auth.establish_session(&user).await,
            Err(AppError::TwoFactorNotConfirmed)
        ));
    }

    #[tokio::test]
    async fn register_reports_the_failing_rule() {
        let h = harness();
        let register = |name: &str, email: &str, password: &str| RegisterInput {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };

        let err = h.auth.register(register("Laura", "laura@mail..com", "secret1")).await.unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Correo inválido");

        let err = h.auth.register(register("Laura", "laura@mail.com", "abc")).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: La contraseña debe tener al menos 6 caracteres"
        );

        let err = h.auth.register(register("   ", "laura@mail.com", "secret1")).await.unwrap_err();
        assert_eq!(err.to_string(), "Validation error: El nombre es obligatorio");
        assert!(h.mailer.sent().await.is_empty());
    }

    #[tokio::test]
    async fn register_then_verify_email() {
        let h = harness();
        let input = RegisterInput {
            name: " Laura ".to_string(),
            email: "Laura@Mail.com".to_string(),
            password: "secret1".to_string(),
        };

        assert_eq!(h.auth.register(input.clone()).await.unwrap(), VERIFICATION_SENT);
        assert!(matches!(h.auth.register(input).await, Err(AppError::EmailInUse)));

        let token = h.store.verification_for("laura@mail.com").await.unwrap();
        assert_eq!(h.auth.new_verification(&token.token).await.unwrap(), EMAIL_VERIFIED);

        let user = h.store.user_by_email("laura@mail.com").await.unwrap().unwrap();
        assert!(user.is_verified());
        assert_eq!(user.name.as_deref(), Some("Laura"));
        assert!(matches!(
            h.auth.new_verification(&token.token).await,
            Err(AppError::VerificationTokenNotFound)
        ));
    }

    #[tokio::test]
    async fn expired_verification_token_is_rejected() {
        let h = harness();
        let mut user = fixtures::user("a@b.com", "secret");
        user.email_verified = None;
        h.store.insert_user(user).await;
        h.auth.login(login("a@b.com", "secret", None)).await.unwrap();

        let token = h.store.verification_for("a@b.com").await.unwrap();
        h.store.expire_verification_token(&token.token).await;

        let err = h.auth.new_verification(&token.token).await.unwrap_err();
        assert_eq!(err.to_string(), "El token ha expirado");
    }

    #[tokio::test]
    async fn settings_toggle_two_factor() {
        let h = harness();
        let user = fixtures::user("a@b.com", "secret");
        h.store.insert_user(user.clone()).await;

        let updated = h
            .auth
            .update_settings(
                user.id,
                SettingsInput {
                    name: None,
                    is_two_factor_enabled: Some(true),
                },
            )
            .await
            .unwrap();
        assert!(updated.is_two_factor_enabled);

        let blank = SettingsInput {
            name: Some("  ".to_string()),
            is_two_factor_enabled: None,
        };
        assert!(h.auth.update_settings(user.id, blank).await.is_err());
    }

    #[test]
    fn codes_are_zero_padded() {
        for _ in 0..50 {
            let code = generate_code(6);
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }
}
