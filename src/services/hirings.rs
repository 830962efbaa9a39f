use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Hiring, HiringPage},
};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page_number: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageQuery {
    /// `(limit, offset)` with the page number starting at 1.
    pub fn bounds(self) -> (i64, i64) {
        let size = self
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let page = self.page_number.unwrap_or(1).max(1);
        (size, (page - 1) * size)
    }
}

pub struct HiringService {
    db: PgPool,
}

impl HiringService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, landlord_id: Uuid, page: PageQuery) -> AppResult<HiringPage> {
        let (limit, offset) = page.bounds();

        let hirings: Vec<Hiring> = sqlx::query_as(
            r#"
            SELECT * FROM hirings
            WHERE landlord_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(landlord_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let total_hirings: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM hirings WHERE landlord_id = $1")
                .bind(landlord_id)
                .fetch_one(&self.db)
                .await?;

        Ok(HiringPage {
            hirings,
            total_hirings,
        })
    }
}
