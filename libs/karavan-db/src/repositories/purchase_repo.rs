use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::billing::{Purchase, PurchaseWithPlan};

#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: PgPool,
}

impl PurchaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Records a provisioned purchase. The unique constraint on `uuid` backs
    /// the global credential-uniqueness invariant.
    pub async fn create(
        &self,
        user_id: i64,
        plan_id: i64,
        uuid: &str,
        sub_id: &str,
        sub_link: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Purchase> {
        sqlx::query_as::<_, Purchase>(
            r#"
            INSERT INTO purchases (user_id, plan_id, uuid, sub_id, sub_link, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(plan_id)
        .bind(uuid)
        .bind(sub_id)
        .bind(sub_link)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create purchase")
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Purchase>> {
        sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch purchase by id")
    }

    pub async fn get_by_user(&self, user_id: i64) -> Result<Vec<PurchaseWithPlan>> {
        sqlx::query_as::<_, PurchaseWithPlan>(
            r#"
            SELECT pu.id, pl.name AS plan_name, pu.uuid, pu.sub_link,
                   pu.expires_at, pu.is_active, pu.created_at
            FROM purchases pu
            JOIN plans pl ON pl.id = pu.plan_id
            WHERE pu.user_id = $1
            ORDER BY pu.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch purchases for user")
    }
}
