use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

/// Every failure a handler can surface. User-facing sign-in messages are in
/// Spanish because the dashboard renders them verbatim.
#[derive(Debug, Error)]
pub enum AppError {
    // Sign-in errors
    #[error("Credenciales inválidas")]
    InvalidCredentials,
    #[error("Credenciales inexistentes")]
    NonexistentCredentials,
    #[error("Su rol no pertenece a esta plataforma")]
    RoleNotAllowed,
    #[error("Código inválido")]
    InvalidTwoFactorCode,
    #[error("El código ha expirado")]
    TwoFactorCodeExpired,
    #[error("Confirmación de dos factores requerida")]
    TwoFactorNotConfirmed,

    // Registration / verification errors
    #[error("El correo ya está en uso!")]
    EmailInUse,
    #[error("El token no existe")]
    VerificationTokenNotFound,
    #[error("El token ha expirado")]
    VerificationTokenExpired,
    #[error("El correo no existe")]
    EmailNotFound,

    // Session errors
    #[error("Invalid token")]
    InvalidToken,
    #[error("Unauthorized")]
    Unauthorized,

    // User errors
    #[error("User not found")]
    UserNotFound,

    // Conversation errors
    #[error("Conversation not found")]
    ConversationNotFound,
    #[error("Not a participant")]
    NotParticipant,
    #[error("Conversation is not approved")]
    ConversationNotApproved,
    #[error("Cannot move conversation from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    // Room errors
    #[error("Room not found")]
    RoomNotFound,

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Bad request: {0}")]
    BadRequest(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Redis errors
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    // JWT errors
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Internal errors
    #[error("Ha ocurrido un error en el servidor")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation(_)
            | AppError::BadRequest(_)
            | AppError::InvalidTwoFactorCode
            | AppError::TwoFactorCodeExpired
            | AppError::VerificationTokenNotFound
            | AppError::VerificationTokenExpired => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::InvalidCredentials
            | AppError::NonexistentCredentials
            | AppError::InvalidToken
            | AppError::Unauthorized
            | AppError::TwoFactorNotConfirmed
            | AppError::Jwt(_) => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            AppError::RoleNotAllowed
            | AppError::NotParticipant
            | AppError::ConversationNotApproved => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::UserNotFound
            | AppError::EmailNotFound
            | AppError::ConversationNotFound
            | AppError::RoomNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::EmailInUse | AppError::InvalidTransition { .. } => StatusCode::CONFLICT,

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::Redis(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// First failing rule, in field order, so the same input always reports
/// the same message.
fn first_message(errors: &ValidationErrors) -> Option<String> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));
    fields.into_iter().find_map(|(field, kind)| match kind {
        ValidationErrorsKind::Field(list) => list.first().map(|e| {
            e.message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("{} no es válido", field))
        }),
        ValidationErrorsKind::Struct(nested) => first_message(nested),
        ValidationErrorsKind::List(items) => items.values().find_map(|nested| first_message(nested)),
    })
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(
            first_message(&errors).unwrap_or_else(|| "Datos inválidos".to_string()),
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Validation(msg) | AppError::BadRequest(msg) => msg.clone(),
            AppError::Jwt(_) => "Invalid token".to_string(),
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                AppError::Internal(anyhow::anyhow!("database")).to_string()
            }
            AppError::Redis(e) => {
                tracing::error!(error = %e, "redis error");
                AppError::Internal(anyhow::anyhow!("redis")).to_string()
            }
            AppError::Serialization(e) => {
                tracing::error!(error = %e, "serialization error");
                AppError::Internal(anyhow::anyhow!("serialization")).to_string()
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
