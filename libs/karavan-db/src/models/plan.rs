use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A sellable tariff. `volume_gb == 0` means unlimited traffic and
/// `duration_days == 0` means no expiry; prices are whole currency units.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    pub price: i64,
    pub volume_gb: f64,
    pub duration_days: i32,
    pub limit_ip: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewPlan {
    pub name: String,
    pub price: i64,
    pub volume_gb: f64,
    pub duration_days: i32,
    pub limit_ip: i32,
}
