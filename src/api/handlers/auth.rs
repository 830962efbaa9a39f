use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    api::middleware::AuthUser,
    error::AppResult,
    models::User,
    services::auth::{AuthService, LoginInput, LoginOutcome, RegisterInput, VERIFICATION_SENT},
    AppState,
};

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.auth_store.clone(),
        state.mailer.clone(),
        state.config.clone(),
    )
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LoginResponse {
    Session {
        token: String,
        expires_at: DateTime<Utc>,
        user: User,
    },
    Success(SuccessResponse),
    TwoFactor {
        two_factor: bool,
    },
}

impl From<LoginOutcome> for LoginResponse {
    fn from(outcome: LoginOutcome) -> Self {
        match outcome {
            LoginOutcome::Session { session, user } => LoginResponse::Session {
                token: session.token,
                expires_at: session.expires_at,
                user,
            },
            LoginOutcome::VerificationSent => LoginResponse::Success(SuccessResponse {
                success: VERIFICATION_SENT,
            }),
            LoginOutcome::TwoFactorRequired => LoginResponse::TwoFactor { two_factor: true },
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginInput>,
) -> AppResult<Json<LoginResponse>> {
    let outcome = auth_service(&state).login(req).await?;
    Ok(Json(outcome.into()))
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterInput>,
) -> AppResult<Json<SuccessResponse>> {
    let success = auth_service(&state).register(req).await?;
    Ok(Json(SuccessResponse { success }))
}

#[derive(Debug, Deserialize)]
pub struct NewVerificationRequest {
    pub token: String,
}

pub async fn new_verification(
    State(state): State<AppState>,
    Json(req): Json<NewVerificationRequest>,
) -> AppResult<Json<SuccessResponse>> {
    let success = auth_service(&state).new_verification(&req.token).await?;
    Ok(Json(SuccessResponse { success }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<MessageResponse>> {
    auth_service(&state).logout(user.id).await?;
    Ok(Json(MessageResponse {
        message: "Sesión cerrada".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_session_outcomes_render_like_the_dashboard_expects() {
        let two_factor = serde_json::to_value(LoginResponse::from(LoginOutcome::TwoFactorRequired))
            .unwrap();
        assert_eq!(two_factor, json!({"two_factor": true}));

        let sent = serde_json::to_value(LoginResponse::from(LoginOutcome::VerificationSent))
            .unwrap();
        assert_eq!(sent, json!({"success": "¡Correo de confirmación enviado!"}));
    }
}
