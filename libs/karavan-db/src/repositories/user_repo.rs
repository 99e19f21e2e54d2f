use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::user::User;

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates or refreshes the chat identity keyed by its Telegram id.
    pub async fn upsert(
        &self,
        tg_id: i64,
        first_name: Option<&str>,
        username: Option<&str>,
        is_admin: bool,
    ) -> Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (tg_id, first_name, username, is_admin)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tg_id) DO UPDATE SET
                first_name = EXCLUDED.first_name,
                username = EXCLUDED.username,
                is_admin = EXCLUDED.is_admin
            RETURNING *
            "#,
        )
        .bind(tg_id)
        .bind(first_name)
        .bind(username)
        .bind(is_admin)
        .fetch_one(&self.pool)
        .await
        .context("Failed to upsert user")
    }

    pub async fn get_by_tg_id(&self, tg_id: i64) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE tg_id = $1")
            .bind(tg_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by tg_id")
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by id")
    }
}
