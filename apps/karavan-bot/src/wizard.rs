//! Per-user wizard state.
//!
//! One wizard per user at a time; starting a new one replaces any unfinished
//! one, and cancel unconditionally drops whatever is stored. Transitions are
//! pure (`Wizard::feed`), the chat layer only renders prompts and persists
//! completed drafts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==================== DRAFTS & STEPS ====================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerDraft {
    pub name: String,
    pub panel_url: String,
    pub username: String,
    pub password: String,
    pub subscription_url: String,
    pub config_template: Option<String>,
}

/// Linear add-server wizard: name → url → username → password →
/// subscription url → optional template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStep {
    Name,
    Url,
    Username,
    Password,
    SubscriptionUrl,
    Template,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanDraft {
    pub name: String,
    pub volume_gb: f64,
    pub duration_days: i32,
    pub limit_ip: i32,
    pub price: i64,
    pub inbound_ids: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStep {
    Name,
    VolumeGb,
    DurationDays,
    LimitIp,
    Price,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Wizard {
    AddServer { step: ServerStep, draft: ServerDraft },
    AddPlan { step: PlanStep, draft: PlanDraft },
    /// Button-driven inbound multi-select after the plan's text steps.
    SelectPlanInbounds { draft: PlanDraft },
    /// Buyer owes a receipt photo for this plan.
    AwaitReceipt { plan_id: i64 },
}

/// Result of feeding one free-text reply into a wizard.
#[derive(Debug, Clone, PartialEq)]
pub enum Feed {
    /// Keep going; `invalid` marks a rejected input (same step re-prompted).
    Continue { wizard: Wizard, invalid: bool },
    /// Add-server wizard finished; persist this draft.
    ServerReady(ServerDraft),
    /// Plan text steps finished; continue with inbound selection.
    PlanFieldsDone(PlanDraft),
    /// This wizard does not consume free text; hand it back unchanged.
    NotConsumed(Wizard),
}

impl Wizard {
    pub fn add_server() -> Self {
        Wizard::AddServer {
            step: ServerStep::Name,
            draft: ServerDraft::default(),
        }
    }

    pub fn add_plan() -> Self {
        Wizard::AddPlan {
            step: PlanStep::Name,
            draft: PlanDraft::default(),
        }
    }

    pub fn feed(self, input: &str) -> Feed {
        let text = input.trim();
        match self {
            Wizard::AddServer { step, draft } => feed_server(step, draft, text),
            Wizard::AddPlan { step, draft } => feed_plan(step, draft, text),
            other @ (Wizard::SelectPlanInbounds { .. } | Wizard::AwaitReceipt { .. }) => {
                Feed::NotConsumed(other)
            }
        }
    }
}

fn stay(step: ServerStep, draft: ServerDraft) -> Feed {
    Feed::Continue {
        wizard: Wizard::AddServer { step, draft },
        invalid: true,
    }
}

fn feed_server(step: ServerStep, mut draft: ServerDraft, text: &str) -> Feed {
    if text.is_empty() {
        return stay(step, draft);
    }
    let next = match step {
        ServerStep::Name => {
            draft.name = text.to_string();
            ServerStep::Url
        }
        ServerStep::Url => {
            draft.panel_url = text.trim_end_matches('/').to_string();
            ServerStep::Username
        }
        ServerStep::Username => {
            draft.username = text.to_string();
            ServerStep::Password
        }
        ServerStep::Password => {
            draft.password = text.to_string();
            ServerStep::SubscriptionUrl
        }
        ServerStep::SubscriptionUrl => {
            draft.subscription_url = text.trim_end_matches('/').to_string();
            ServerStep::Template
        }
        ServerStep::Template => {
            draft.config_template = if text.eq_ignore_ascii_case("skip") {
                None
            } else {
                Some(text.to_string())
            };
            return Feed::ServerReady(draft);
        }
    };
    Feed::Continue {
        wizard: Wizard::AddServer { step: next, draft },
        invalid: false,
    }
}

/// Non-negative number or bust; rejected input re-prompts the same step.
fn parse_number<T: std::str::FromStr + PartialOrd + Default>(text: &str) -> Option<T> {
    text.parse::<T>().ok().filter(|v| *v >= T::default())
}

fn feed_plan(step: PlanStep, mut draft: PlanDraft, text: &str) -> Feed {
    let invalid = |step: PlanStep, draft: PlanDraft| Feed::Continue {
        wizard: Wizard::AddPlan { step, draft },
        invalid: true,
    };

    let next = match step {
        PlanStep::Name => {
            if text.is_empty() {
                return invalid(step, draft);
            }
            draft.name = text.to_string();
            PlanStep::VolumeGb
        }
        PlanStep::VolumeGb => match parse_number::<f64>(text) {
            Some(v) => {
                draft.volume_gb = v;
                PlanStep::DurationDays
            }
            None => return invalid(step, draft),
        },
        PlanStep::DurationDays => match parse_number::<i32>(text) {
            Some(v) => {
                draft.duration_days = v;
                PlanStep::LimitIp
            }
            None => return invalid(step, draft),
        },
        PlanStep::LimitIp => match parse_number::<i32>(text) {
            Some(v) => {
                draft.limit_ip = v;
                PlanStep::Price
            }
            None => return invalid(step, draft),
        },
        PlanStep::Price => match parse_number::<i64>(text) {
            Some(v) => {
                draft.price = v;
                return Feed::PlanFieldsDone(draft);
            }
            None => return invalid(step, draft),
        },
    };
    Feed::Continue {
        wizard: Wizard::AddPlan { step: next, draft },
        invalid: false,
    }
}

// ==================== STORE ====================

/// In-memory per-user session store behind get/set/clear. Events for one user
/// arrive serially in practice; the lock covers the double-tap case where
/// they do not.
#[derive(Clone, Default)]
pub struct WizardStore {
    inner: Arc<Mutex<HashMap<i64, Wizard>>>,
}

impl WizardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user: i64) -> Option<Wizard> {
        self.inner.lock().unwrap().get(&user).cloned()
    }

    /// Stores a wizard, discarding any previous one for this user.
    pub fn set(&self, user: i64, wizard: Wizard) {
        self.inner.lock().unwrap().insert(user, wizard);
    }

    pub fn take(&self, user: i64) -> Option<Wizard> {
        self.inner.lock().unwrap().remove(&user)
    }

    /// Always safe to call; returns whether anything was active.
    pub fn clear(&self, user: i64) -> bool {
        self.inner.lock().unwrap().remove(&user).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advance(wizard: Wizard, input: &str) -> Wizard {
        match wizard.feed(input) {
            Feed::Continue { wizard, invalid } => {
                assert!(!invalid, "unexpected invalid input: {input}");
                wizard
            }
            other => panic!("expected Continue, got {other:?}"),
        }
    }

    #[test]
    fn add_server_walks_every_step_and_strips_slashes() {
        let mut w = Wizard::add_server();
        w = advance(w, "Germany-1");
        w = advance(w, "https://1.2.3.4:2053/");
        w = advance(w, "admin");
        w = advance(w, "hunter2");
        w = advance(w, "https://sub.example.com/sub/");

        let draft = match w.feed("vless://UUID@x:443#EMAIL") {
            Feed::ServerReady(d) => d,
            other => panic!("expected ServerReady, got {other:?}"),
        };

        assert_eq!(draft.name, "Germany-1");
        assert_eq!(draft.panel_url, "https://1.2.3.4:2053");
        assert_eq!(draft.subscription_url, "https://sub.example.com/sub");
        assert_eq!(draft.config_template.as_deref(), Some("vless://UUID@x:443#EMAIL"));
    }

    #[test]
    fn skip_leaves_the_template_unset() {
        let mut w = Wizard::add_server();
        for input in ["s1", "http://x", "u", "p", "http://sub"] {
            w = advance(w, input);
        }
        match w.feed("SKIP") {
            Feed::ServerReady(d) => assert_eq!(d.config_template, None),
            other => panic!("expected ServerReady, got {other:?}"),
        }
    }

    #[test]
    fn empty_input_reprompts_without_advancing() {
        let w = Wizard::add_server();
        match w.feed("   ") {
            Feed::Continue { wizard, invalid } => {
                assert!(invalid);
                assert_eq!(
                    wizard,
                    Wizard::AddServer {
                        step: ServerStep::Name,
                        draft: ServerDraft::default()
                    }
                );
            }
            other => panic!("expected Continue, got {other:?}"),
        }
    }

    #[test]
    fn plan_numeric_steps_reject_non_numeric_input() {
        let w = advance(Wizard::add_plan(), "Gold");
        // Now at VolumeGb.
        let w = match w.feed("ten gigs") {
            Feed::Continue { wizard, invalid } => {
                assert!(invalid);
                wizard
            }
            other => panic!("expected Continue, got {other:?}"),
        };
        // Still at VolumeGb: a valid number moves on to DurationDays.
        let w = advance(w, "50");
        match w.feed("-3") {
            Feed::Continue { invalid, .. } => assert!(invalid),
            other => panic!("expected Continue, got {other:?}"),
        }
    }

    #[test]
    fn plan_completes_with_unlimited_fields() {
        let mut w = Wizard::add_plan();
        w = advance(w, "Lifetime");
        w = advance(w, "0");
        w = advance(w, "0");
        w = advance(w, "1");
        match w.feed("150000") {
            Feed::PlanFieldsDone(d) => {
                assert_eq!(d.volume_gb, 0.0);
                assert_eq!(d.duration_days, 0);
                assert_eq!(d.limit_ip, 1);
                assert_eq!(d.price, 150_000);
            }
            other => panic!("expected PlanFieldsDone, got {other:?}"),
        }
    }

    #[test]
    fn receipt_wizard_does_not_eat_text() {
        let w = Wizard::AwaitReceipt { plan_id: 3 };
        assert_eq!(
            w.clone().feed("hello"),
            Feed::NotConsumed(Wizard::AwaitReceipt { plan_id: 3 })
        );
    }

    #[test]
    fn store_replaces_and_cancels_idempotently() {
        let store = WizardStore::new();
        store.set(1, Wizard::add_server());
        store.set(1, Wizard::add_plan());

        // The older wizard is gone, not merged.
        assert_eq!(store.get(1), Some(Wizard::add_plan()));

        assert!(store.clear(1));
        assert!(!store.clear(1));
        assert_eq!(store.get(1), None);
    }
}
