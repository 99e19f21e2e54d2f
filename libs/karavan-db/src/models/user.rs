use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub tg_id: i64,
    pub first_name: Option<String>,
    pub username: Option<String>,
    pub balance: i64,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}
