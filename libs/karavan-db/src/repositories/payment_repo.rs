use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::billing::{Payment, PaymentStatus};

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: i64,
        plan_id: i64,
        amount: i64,
        method: &str,
        receipt_file_id: Option<&str>,
    ) -> Result<Payment> {
        sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (user_id, plan_id, amount, method, receipt_file_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(plan_id)
        .bind(amount)
        .bind(method)
        .bind(receipt_file_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create payment")
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Payment>> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch payment by id")
    }

    /// Transitions a pending payment to its final status. The `WHERE status =
    /// 'pending'` guard makes the decision a single test-and-set: a concurrent
    /// second decision matches zero rows and gets `None` back.
    pub async fn decide(
        &self,
        id: i64,
        status: PaymentStatus,
        admin_note: Option<&str>,
    ) -> Result<Option<Payment>> {
        sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = $2,
                admin_note = $3,
                decided_at = CURRENT_TIMESTAMP
            WHERE id = $1
              AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(admin_note)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to decide payment")
    }
}
