use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Hiring {
    pub id: Uuid,
    pub room_id: Uuid,
    pub tenant_id: Uuid,
    pub landlord_id: Uuid,
    pub habitants: i32,
    pub status: String,
    pub deposit: f64,
    pub monthly_price: f64,
    pub months_count: i32,
    pub total_amount: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiringPage {
    pub hirings: Vec<Hiring>,
    pub total_hirings: i64,
}
