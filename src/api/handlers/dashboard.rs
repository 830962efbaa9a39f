use axum::{extract::State, Extension, Json};

use crate::{
    api::middleware::AuthUser,
    error::AppResult,
    services::dashboard::{DashboardService, DashboardStats, DayActivity, MonthSummary},
    AppState,
};

pub async fn get_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<DashboardStats>> {
    Ok(Json(DashboardService::new(state.db).stats(user.id).await?))
}

pub async fn get_month_summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<MonthSummary>> {
    Ok(Json(
        DashboardService::new(state.db).month_summary(user.id).await?,
    ))
}

pub async fn get_week_summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Vec<DayActivity>>> {
    Ok(Json(
        DashboardService::new(state.db).week_summary(user.id).await?,
    ))
}
