use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A remote panel endpoint plus the credentials used to drive it.
///
/// `config_template` is an optional connection-URI string carrying the literal
/// placeholders `UUID` and `EMAIL`, substituted when a single config is built
/// for a purchase.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Server {
    pub id: i64,
    pub name: String,
    pub panel_url: String,
    pub username: String,
    pub password: String,
    pub subscription_url: String,
    pub config_template: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A listening configuration mirrored from the remote panel. `remote_id` is
/// the panel's own numeric id, unique within one server.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Inbound {
    pub id: i64,
    pub server_id: i64,
    pub remote_id: i64,
    pub remark: String,
    pub port: i32,
    pub protocol: String,
    pub is_active: bool,
}

/// Display fields of a remote inbound, as consumed by the sync path.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundUpsert {
    pub remote_id: i64,
    pub remark: String,
    pub port: i32,
    pub protocol: String,
}
