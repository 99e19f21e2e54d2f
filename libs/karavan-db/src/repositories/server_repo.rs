use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::server::{Inbound, InboundUpsert, Server};

#[derive(Debug, Clone)]
pub struct ServerRepository {
    pool: PgPool,
}

impl ServerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        name: &str,
        panel_url: &str,
        username: &str,
        password: &str,
        subscription_url: &str,
        config_template: Option<&str>,
    ) -> Result<Server> {
        sqlx::query_as::<_, Server>(
            r#"
            INSERT INTO servers (name, panel_url, username, password, subscription_url, config_template)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(panel_url)
        .bind(username)
        .bind(password)
        .bind(subscription_url)
        .bind(config_template)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create server")
    }

    pub async fn get_all(&self) -> Result<Vec<Server>> {
        sqlx::query_as::<_, Server>("SELECT * FROM servers ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch servers")
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Server>> {
        sqlx::query_as::<_, Server>("SELECT * FROM servers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch server by id")
    }

    /// Deletes the server; its inbounds go with it via the FK cascade.
    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM servers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete server")?;
        Ok(())
    }

    // ==================== INBOUNDS ====================

    pub async fn get_inbounds(&self, server_id: i64) -> Result<Vec<Inbound>> {
        sqlx::query_as::<_, Inbound>(
            "SELECT * FROM inbounds WHERE server_id = $1 ORDER BY remote_id ASC",
        )
        .bind(server_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch inbounds for server")
    }

    pub async fn get_inbound_by_id(&self, id: i64) -> Result<Option<Inbound>> {
        sqlx::query_as::<_, Inbound>("SELECT * FROM inbounds WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch inbound by id")
    }

    pub async fn count_inbounds(&self, server_id: i64) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM inbounds WHERE server_id = $1")
            .bind(server_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count inbounds")
    }

    /// Applies one sync pass in a single transaction: new remote inbounds are
    /// inserted, known ones get their display fields overwritten. Plan links
    /// are never touched here.
    pub async fn apply_inbound_sync(
        &self,
        server_id: i64,
        creates: &[InboundUpsert],
        updates: &[(i64, InboundUpsert)],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for item in creates {
            sqlx::query(
                r#"
                INSERT INTO inbounds (server_id, remote_id, remark, port, protocol)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(server_id)
            .bind(item.remote_id)
            .bind(&item.remark)
            .bind(item.port)
            .bind(&item.protocol)
            .execute(&mut *tx)
            .await
            .context("Failed to insert synced inbound")?;
        }

        for (local_id, item) in updates {
            sqlx::query("UPDATE inbounds SET remark = $1, port = $2, protocol = $3 WHERE id = $4")
                .bind(&item.remark)
                .bind(item.port)
                .bind(&item.protocol)
                .bind(local_id)
                .execute(&mut *tx)
                .await
                .context("Failed to update synced inbound")?;
        }

        tx.commit().await?;
        Ok(())
    }
}
