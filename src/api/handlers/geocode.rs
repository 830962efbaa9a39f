use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{error::AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ReverseQuery {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize)]
pub struct AddressResponse {
    pub address: String,
}

pub async fn reverse(
    State(state): State<AppState>,
    Query(query): Query<ReverseQuery>,
) -> AppResult<Json<AddressResponse>> {
    let address = state.geocoder.reverse(query.lat, query.lng).await?;
    Ok(Json(AddressResponse { address }))
}
