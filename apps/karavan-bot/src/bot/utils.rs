use karavan_db::models::server::Inbound;

use crate::state::AppState;
use crate::wizard::{PlanStep, ServerStep, Wizard};

/// Minimal escaping for text interpolated into HTML-mode messages.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Prompt for the wizard's current step; `invalid` marks a rejected reply.
pub fn prompt_for(wizard: &Wizard, invalid: bool) -> String {
    let base = match wizard {
        Wizard::AddServer { step, .. } => match step {
            ServerStep::Name => "📝 Server name:\n(e.g. Germany-1)",
            ServerStep::Url => "🔗 Panel URL:\n(e.g. http://1.1.1.1:2053)",
            ServerStep::Username => "👤 Panel username:",
            ServerStep::Password => "🔑 Panel password:",
            ServerStep::SubscriptionUrl => {
                "🌐 Subscription base URL:\n(e.g. https://sub.example.com/sub)"
            }
            ServerStep::Template => {
                "📄 Optional config template with UUID and EMAIL placeholders,\nor send `skip`:\n(e.g. vless://UUID@host:443?security=reality#EMAIL)"
            }
        },
        Wizard::AddPlan { step, .. } => match step {
            PlanStep::Name => "📝 Plan name:",
            PlanStep::VolumeGb => "📦 Volume in GB:\n(0 means unlimited)",
            PlanStep::DurationDays => "⏳ Duration in days:\n(0 means lifetime)",
            PlanStep::LimitIp => "👥 Connection limit (limit IP):\n(0 means unlimited)",
            PlanStep::Price => "💰 Price:",
        },
        Wizard::SelectPlanInbounds { .. } => "🔌 Pick the inbounds for this plan.",
        Wizard::AwaitReceipt { .. } => "📎 Send a photo of your payment receipt.",
    };

    if invalid {
        format!("❌ That input is not valid here.\n\n{base}")
    } else {
        base.to_string()
    }
}

/// Every synced inbound together with its server's name, for the plan
/// binding keyboard.
pub async fn inbound_catalog(state: &AppState) -> anyhow::Result<Vec<(String, Inbound)>> {
    let mut catalog = Vec::new();
    for server in state.servers.get_all().await? {
        for inbound in state.servers.get_inbounds(server.id).await? {
            catalog.push((server.name.clone(), inbound));
        }
    }
    Ok(catalog)
}
