use axum::{extract::State, Extension, Json};

use crate::{
    api::middleware::AuthUser,
    error::{AppError, AppResult},
    models::User,
    services::auth::{AuthService, SettingsInput},
    AppState,
};

pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<User>> {
    let auth_service = AuthService::new(state.auth_store, state.mailer, state.config);
    Ok(Json(auth_service.current_user(user.id).await?))
}

pub async fn update_current_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SettingsInput>,
) -> AppResult<Json<User>> {
    if req.name.is_none() && req.is_two_factor_enabled.is_none() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }

    let auth_service = AuthService::new(state.auth_store, state.mailer, state.config);
    Ok(Json(auth_service.update_settings(user.id, req).await?))
}
