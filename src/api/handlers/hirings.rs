use axum::{
    extract::{Query, State},
    Extension, Json,
};

use crate::{
    api::middleware::AuthUser,
    error::AppResult,
    models::HiringPage,
    services::hirings::{HiringService, PageQuery},
    AppState,
};

pub async fn list_hirings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<HiringPage>> {
    let hiring_service = HiringService::new(state.db);
    Ok(Json(hiring_service.list(user.id, page).await?))
}
