use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{ConversationStatus, RoomStatus},
};

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusCounts {
    pub published: i64,
    pub paused: i64,
    pub occupied: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestCounts {
    pub pending: i64,
    pub approved: i64,
    pub refused: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub rooms: StatusCounts,
    pub requests: RequestCounts,
    pub hirings: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: &'static str,
    pub data: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthSummary {
    pub categories: Vec<String>,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayActivity {
    pub date: NaiveDate,
    pub requests: i64,
    pub reservations: i64,
}

/// The `count` most recent months ending with the month of `today`, oldest
/// first, as `YYYY-MM`.
pub fn last_months(today: NaiveDate, count: usize) -> Vec<String> {
    let mut year = today.year();
    let mut month = today.month();
    let mut months = Vec::with_capacity(count);
    for _ in 0..count {
        months.push(format!("{:04}-{:02}", year, month));
        if month == 1 {
            month = 12;
            year -= 1;
        } else {
            month -= 1;
        }
    }
    months.reverse();
    months
}

/// Monday through Sunday of the ISO week containing `today`.
pub fn week_of(today: NaiveDate) -> Vec<NaiveDate> {
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    (0..7).map(|offset| monday + Duration::days(offset)).collect()
}

fn align<K: std::hash::Hash + Eq>(keys: &[K], counts: &HashMap<K, i64>) -> Vec<i64> {
    keys.iter()
        .map(|k| counts.get(k).copied().unwrap_or(0))
        .collect()
}

pub struct DashboardService {
    db: PgPool,
}

impl DashboardService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn stats(&self, landlord_id: Uuid) -> AppResult<DashboardStats> {
        let rooms: Vec<(RoomStatus, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM rooms WHERE landlord_id = $1 GROUP BY status",
        )
        .bind(landlord_id)
        .fetch_all(&self.db)
        .await?;

        let requests: Vec<(ConversationStatus, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM chats WHERE landlord_id = $1 GROUP BY status",
        )
        .bind(landlord_id)
        .fetch_all(&self.db)
        .await?;

        let hirings: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM hirings WHERE landlord_id = $1")
                .bind(landlord_id)
                .fetch_one(&self.db)
                .await?;

        let mut room_counts = StatusCounts::default();
        for (status, count) in rooms {
            match status {
                RoomStatus::Published => room_counts.published = count,
                RoomStatus::Paused => room_counts.paused = count,
                RoomStatus::Occupied => room_counts.occupied = count,
            }
        }

        let mut request_counts = RequestCounts::default();
        for (status, count) in requests {
            match status {
                ConversationStatus::Pending => request_counts.pending = count,
                ConversationStatus::Approved => request_counts.approved = count,
                ConversationStatus::Refused => request_counts.refused = count,
            }
        }

        Ok(DashboardStats {
            rooms: room_counts,
            requests: request_counts,
            hirings,
        })
    }

    pub async fn month_summary(&self, landlord_id: Uuid) -> AppResult<MonthSummary> {
        let categories = last_months(Utc::now().date_naive(), 12);
        let since = format!("{}-01", categories[0]);

        let published: HashMap<String, i64> = sqlx::query_as(
            r#"
            SELECT to_char(created_at, 'YYYY-MM'), COUNT(*) FROM rooms
            WHERE landlord_id = $1 AND created_at >= $2::date
            GROUP BY 1
            "#,
        )
        .bind(landlord_id)
        .bind(&since)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .collect();

        let requests: HashMap<String, i64> = sqlx::query_as(
            r#"
            SELECT to_char(created_at, 'YYYY-MM'), COUNT(*) FROM chats
            WHERE landlord_id = $1 AND created_at >= $2::date
            GROUP BY 1
            "#,
        )
        .bind(landlord_id)
        .bind(&since)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .collect();

        Ok(MonthSummary {
            series: vec![
                Series {
                    name: "Publicadas",
                    data: align(&categories, &published),
                },
                Series {
                    name: "Solicitudes",
                    data: align(&categories, &requests),
                },
            ],
            categories,
        })
    }

    pub async fn week_summary(&self, landlord_id: Uuid) -> AppResult<Vec<DayActivity>> {
        let days = week_of(Utc::now().date_naive());
        let (first, last) = (days[0], days[6]);

        let requests: HashMap<NaiveDate, i64> = sqlx::query_as(
            r#"
            SELECT created_at::date, COUNT(*) FROM chats
            WHERE landlord_id = $1 AND created_at::date BETWEEN $2 AND $3
            GROUP BY 1
            "#,
        )
        .bind(landlord_id)
        .bind(first)
        .bind(last)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .collect();

        let reservations: HashMap<NaiveDate, i64> = sqlx::query_as(
            r#"
            SELECT created_at::date, COUNT(*) FROM hirings
            WHERE landlord_id = $1 AND created_at::date BETWEEN $2 AND $3
            GROUP BY 1
            "#,
        )
        .bind(landlord_id)
        .bind(first)
        .bind(last)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .collect();

        let requests = align(&days, &requests);
        let reservations = align(&days, &reservations);
        Ok(days
            .into_iter()
            .zip(requests.into_iter().zip(reservations))
            .map(|(date, (requests, reservations))| DayActivity {
                date,
                requests,
                reservations,
            })
            .collect())
    }
}
