use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::plan::{NewPlan, Plan};
use crate::models::server::Inbound;

#[derive(Debug, Clone)]
pub struct PlanRepository {
    pool: PgPool,
}

impl PlanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the plan and links it to the given inbounds in one transaction.
    pub async fn create(&self, plan: &NewPlan, inbound_ids: &[i64]) -> Result<Plan> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Plan>(
            r#"
            INSERT INTO plans (name, price, volume_gb, duration_days, limit_ip)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&plan.name)
        .bind(plan.price)
        .bind(plan.volume_gb)
        .bind(plan.duration_days)
        .bind(plan.limit_ip)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to create plan")?;

        for inbound_id in inbound_ids {
            sqlx::query(
                "INSERT INTO plan_inbounds (plan_id, inbound_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(created.id)
            .bind(inbound_id)
            .execute(&mut *tx)
            .await
            .context("Failed to link inbound to plan")?;
        }

        tx.commit().await?;
        Ok(created)
    }

    pub async fn get_active(&self) -> Result<Vec<Plan>> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE is_active = TRUE ORDER BY price ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch active plans")
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Plan>> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch plan by id")
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM plans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete plan")?;
        Ok(())
    }

    /// Active inbounds this plan may provision on.
    pub async fn get_plan_inbounds(&self, plan_id: i64) -> Result<Vec<Inbound>> {
        sqlx::query_as::<_, Inbound>(
            r#"
            SELECT i.* FROM inbounds i
            JOIN plan_inbounds pi ON pi.inbound_id = i.id
            WHERE pi.plan_id = $1 AND i.is_active = TRUE
            ORDER BY i.server_id ASC, i.remote_id ASC
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch inbounds for plan")
    }
}
