//! Manual card payments: receipt intake and the admin decision.
//!
//! A decision is at-most-once effective. The repository's test-and-set update
//! claims the pending row in a single statement, so a double-tap on the
//! approve button surfaces `AlreadyDecided` on the second press instead of
//! provisioning twice.

use tracing::{error, info};

use karavan_db::models::billing::{Payment, PaymentStatus};
use karavan_db::models::plan::Plan;
use karavan_db::repositories::payment_repo::PaymentRepository;
use karavan_db::repositories::plan_repo::PlanRepository;

use crate::error::{Error, Result};
use crate::services::provision_service::{ProvisionService, Provisioned};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

pub enum DecisionOutcome {
    /// Payment approved and the service provisioned.
    Approved {
        payment: Payment,
        provisioned: Provisioned,
    },
    Rejected(Payment),
}

#[derive(Clone)]
pub struct PaymentService {
    payments: PaymentRepository,
    plans: PlanRepository,
    provision: ProvisionService,
}

impl PaymentService {
    pub fn new(
        payments: PaymentRepository,
        plans: PlanRepository,
        provision: ProvisionService,
    ) -> Self {
        Self {
            payments,
            plans,
            provision,
        }
    }

    /// Records a submitted proof of payment as a pending card payment.
    pub async fn submit_receipt(
        &self,
        user_id: i64,
        plan_id: i64,
        receipt_file_id: &str,
    ) -> Result<(Payment, Plan)> {
        let plan = self
            .plans
            .get_by_id(plan_id)
            .await?
            .ok_or(Error::NotFound("plan"))?;
        let payment = self
            .payments
            .create(user_id, plan.id, plan.price, "card", Some(receipt_file_id))
            .await?;
        info!(
            "payment {} queued for user {} on plan {}",
            payment.id, user_id, plan.id
        );
        Ok((payment, plan))
    }

    pub async fn get(&self, payment_id: i64) -> Result<Payment> {
        self.payments
            .get_by_id(payment_id)
            .await?
            .ok_or(Error::NotFound("payment"))
    }

    /// Applies an admin decision. The pending row is claimed first; only then
    /// does an approval provision the service. A provisioning failure leaves
    /// the payment approved with no purchase and is reported distinctly.
    pub async fn decide(
        &self,
        payment_id: i64,
        decision: Decision,
        admin_note: Option<&str>,
    ) -> Result<DecisionOutcome> {
        let status = match decision {
            Decision::Approve => PaymentStatus::Approved,
            Decision::Reject => PaymentStatus::Rejected,
        };

        let payment = match self.payments.decide(payment_id, status, admin_note).await? {
            Some(p) => p,
            None => {
                // Zero rows matched: either the payment never existed or it
                // was already decided by an earlier (possibly racing) press.
                return match self.payments.get_by_id(payment_id).await? {
                    Some(_) => Err(Error::AlreadyDecided),
                    None => Err(Error::NotFound("payment")),
                };
            }
        };

        match decision {
            Decision::Reject => {
                info!("payment {} rejected", payment.id);
                Ok(DecisionOutcome::Rejected(payment))
            }
            Decision::Approve => {
                let plan = self
                    .plans
                    .get_by_id(payment.plan_id)
                    .await?
                    .ok_or(Error::NotFound("plan"))?;
                match self.provision.provision(payment.user_id, &plan).await {
                    Ok(provisioned) => Ok(DecisionOutcome::Approved {
                        payment,
                        provisioned,
                    }),
                    Err(e) => {
                        error!(
                            "payment {} approved but provisioning failed: {}",
                            payment.id, e
                        );
                        Err(e)
                    }
                }
            }
        }
    }
}
