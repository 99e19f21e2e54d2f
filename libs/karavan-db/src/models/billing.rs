use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Funds tendered by a user for a plan, awaiting an admin decision.
/// `status` holds one of [`PaymentStatus`]'s wire values; a payment leaves
/// `pending` exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: i64,
    pub amount: i64,
    pub status: String,
    pub method: String,
    pub receipt_file_id: Option<String>,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
        }
    }

    pub fn is_decided(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl From<String> for PaymentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "approved" => PaymentStatus::Approved,
            "rejected" => PaymentStatus::Rejected,
            _ => PaymentStatus::Pending,
        }
    }
}

/// The provisioned result of an approved purchase. Never mutated after
/// creation apart from the active flag.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Purchase {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: i64,
    pub uuid: String,
    pub sub_id: String,
    pub sub_link: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Purchase row joined with the plan name, for user-facing listings.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseWithPlan {
    pub id: i64,
    pub plan_name: String,
    pub uuid: String,
    pub sub_link: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_wire_values() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Approved,
            PaymentStatus::Rejected,
        ] {
            assert_eq!(PaymentStatus::from(status.as_str().to_string()), status);
        }
    }

    #[test]
    fn unknown_status_falls_back_to_pending() {
        assert_eq!(
            PaymentStatus::from("garbage".to_string()),
            PaymentStatus::Pending
        );
    }

    #[test]
    fn only_pending_is_undecided() {
        assert!(!PaymentStatus::Pending.is_decided());
        assert!(PaymentStatus::Approved.is_decided());
        assert!(PaymentStatus::Rejected.is_decided());
    }
}
