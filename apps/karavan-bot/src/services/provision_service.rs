//! Turns an approved purchase into live panel clients plus a local record.
//!
//! One credential set (UUID + subId) is shared across every inbound the plan
//! targets, so a multi-port plan yields several remote clients reachable
//! through a single subscription link. Fan-out is best-effort: a server whose
//! login fails only loses its own inbounds. Remote clients created on servers
//! that later failed are not rolled back; they are logged and orphaned.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use karavan_db::models::billing::Purchase;
use karavan_db::models::plan::Plan;
use karavan_db::models::server::Server;
use karavan_db::repositories::plan_repo::PlanRepository;
use karavan_db::repositories::purchase_repo::PurchaseRepository;
use karavan_db::repositories::server_repo::ServerRepository;

use crate::error::{Error, Result};
use crate::panel::types::NewClient;
use crate::panel::PanelClient;

/// Flow tag for reality-style transports; other protocols get none.
pub fn flow_for(protocol: &str) -> &'static str {
    if protocol.to_lowercase().contains("reality") {
        "xtls-rprx-vision"
    } else {
        ""
    }
}

/// Display label derived from the credential: `u` plus its first 8 hex chars.
pub fn client_label(uuid: &str) -> String {
    format!("u{}", &uuid[..uuid.len().min(8)])
}

/// Fresh subscription identifier: 16 hex characters.
pub fn new_sub_id() -> String {
    Uuid::new_v4().simple().to_string()[..16].to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirySpec {
    /// Epoch milliseconds for the panel; 0 means no expiry.
    pub remote_ms: i64,
    /// Absolute timestamp for local storage; `None` means no expiry.
    pub local: Option<DateTime<Utc>>,
}

/// `duration_days <= 0` means unlimited on both sides.
pub fn compute_expiry(duration_days: i32, now: DateTime<Utc>) -> ExpirySpec {
    if duration_days > 0 {
        let at = now + Duration::days(duration_days as i64);
        ExpirySpec {
            remote_ms: at.timestamp_millis(),
            local: Some(at),
        }
    } else {
        ExpirySpec {
            remote_ms: 0,
            local: None,
        }
    }
}

pub fn sub_link(subscription_url: &str, sub_id: &str) -> String {
    format!("{}/{}", subscription_url.trim_end_matches('/'), sub_id)
}

/// Substitutes the purchase credential into a server's config template. The
/// `UUID` and `EMAIL` tokens are literal; a template that still carries either
/// token after substitution is refused rather than handed to a user.
pub fn render_single_config(template: &str, uuid: &str) -> Result<String> {
    let rendered = template
        .replace("UUID", uuid)
        .replace("EMAIL", &client_label(uuid));
    if rendered.contains("UUID") || rendered.contains("EMAIL") {
        return Err(Error::RemoteUnavailable(
            "config template left unresolved tokens".to_string(),
        ));
    }
    Ok(rendered)
}

#[derive(Debug, Clone)]
pub struct Provisioned {
    pub purchase: Purchase,
    pub link: String,
    /// How many of the plan's inbounds accepted the client.
    pub created: usize,
    pub attempted: usize,
}

#[derive(Clone)]
pub struct ProvisionService {
    servers: ServerRepository,
    plans: PlanRepository,
    purchases: PurchaseRepository,
}

impl ProvisionService {
    pub fn new(
        servers: ServerRepository,
        plans: PlanRepository,
        purchases: PurchaseRepository,
    ) -> Self {
        Self {
            servers,
            plans,
            purchases,
        }
    }

    /// Provisions `plan` for `user_id`: creates a client on every inbound the
    /// plan targets, then persists one Purchase pointing at the first server
    /// that accepted. Fails with `NoServerAssigned` when the plan has no
    /// inbounds and `ProvisioningFailed` when no server accepted.
    pub async fn provision(&self, user_id: i64, plan: &Plan) -> Result<Provisioned> {
        let inbounds = self.plans.get_plan_inbounds(plan.id).await?;
        if inbounds.is_empty() {
            return Err(Error::NoServerAssigned);
        }

        let mut servers: HashMap<i64, Server> = HashMap::new();
        for inbound in &inbounds {
            if !servers.contains_key(&inbound.server_id) {
                if let Some(server) = self.servers.get_by_id(inbound.server_id).await? {
                    servers.insert(server.id, server);
                }
            }
        }

        let new_uuid = Uuid::new_v4().to_string();
        let sub_id = new_sub_id();
        let email = client_label(&new_uuid);
        let expiry = compute_expiry(plan.duration_days, Utc::now());

        let mut panels: HashMap<i64, PanelClient> = HashMap::new();
        let mut failed_servers: HashSet<i64> = HashSet::new();
        let mut first_ok: Option<i64> = None;
        let mut created = 0usize;

        for inbound in &inbounds {
            if failed_servers.contains(&inbound.server_id) {
                continue;
            }
            let server = match servers.get(&inbound.server_id) {
                Some(s) => s,
                None => {
                    warn!("inbound {} points at a missing server, skipped", inbound.id);
                    continue;
                }
            };

            if !panels.contains_key(&server.id) {
                let panel = match PanelClient::for_server(server) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!("cannot build panel client for {}: {}", server.name, e);
                        failed_servers.insert(server.id);
                        continue;
                    }
                };
                match panel.login().await {
                    Ok(true) => {
                        panels.insert(server.id, panel);
                    }
                    Ok(false) => {
                        warn!("login refused by server {}, skipping its inbounds", server.name);
                        failed_servers.insert(server.id);
                        continue;
                    }
                    Err(e) => {
                        warn!("server {} unreachable: {}, skipping its inbounds", server.name, e);
                        failed_servers.insert(server.id);
                        continue;
                    }
                }
            }
            let panel = &panels[&server.id];

            let spec = NewClient {
                inbound_remote_id: inbound.remote_id,
                email: email.clone(),
                uuid: new_uuid.clone(),
                sub_id: sub_id.clone(),
                total_gb: plan.volume_gb,
                expiry_ms: expiry.remote_ms,
                enable: true,
                limit_ip: plan.limit_ip,
                flow: flow_for(&inbound.protocol).to_string(),
            };

            match panel.add_client(&spec).await {
                Ok(true) => {
                    created += 1;
                    first_ok.get_or_insert(server.id);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        "add client failed on {} inbound {}: {}",
                        server.name, inbound.remote_id, e
                    );
                }
            }
        }

        if created == 0 {
            return Err(Error::ProvisioningFailed);
        }
        if created < inbounds.len() {
            // Known gap: clients already created on servers that failed the
            // link are left in place, there is no compensation pass.
            warn!(
                "partial provisioning for plan {}: {}/{} inbounds",
                plan.id,
                created,
                inbounds.len()
            );
        }

        let link_server_id = match first_ok {
            Some(id) => id,
            None => return Err(Error::ProvisioningFailed),
        };
        let link_server = &servers[&link_server_id];

        // Degenerate single-inbound plan: trust the subId the panel actually
        // stored on the created client; legacy panels drop it, in which case
        // the credential itself addresses the subscription.
        let link_sub_id = if inbounds.len() == 1 {
            let inbound = &inbounds[0];
            match panels[&link_server_id]
                .get_client_info(inbound.remote_id, &new_uuid)
                .await
            {
                Ok(Some(client)) if !client.sub_id.is_empty() => client.sub_id,
                _ => new_uuid.clone(),
            }
        } else {
            sub_id.clone()
        };

        let link = sub_link(&link_server.subscription_url, &link_sub_id);
        let purchase = self
            .purchases
            .create(user_id, plan.id, &new_uuid, &sub_id, &link, expiry.local)
            .await?;

        info!(
            "provisioned purchase {} for user {} ({}/{} inbounds)",
            purchase.id,
            user_id,
            created,
            inbounds.len()
        );

        Ok(Provisioned {
            purchase,
            link,
            created,
            attempted: inbounds.len(),
        })
    }

    /// Renders the single-config string for a purchase from its server's
    /// template. `Ok(None)` means no template is set and the caller should
    /// point the user at the subscription link instead.
    pub async fn single_config(&self, purchase: &Purchase) -> Result<Option<String>> {
        let inbounds = self.plans.get_plan_inbounds(purchase.plan_id).await?;
        let first = inbounds.first().ok_or(Error::NoServerAssigned)?;
        let server = self
            .servers
            .get_by_id(first.server_id)
            .await?
            .ok_or(Error::NotFound("server"))?;

        match server.config_template.as_deref() {
            Some(template) => render_single_config(template, &purchase.uuid).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn positive_duration_computes_epoch_millis_and_local_expiry() {
        let now = Utc::now();
        let spec = compute_expiry(30, now);

        let expected = now + Duration::days(30);
        assert_eq!(spec.local, Some(expected));
        assert_eq!(spec.remote_ms, expected.timestamp_millis());
    }

    #[test]
    fn zero_or_negative_duration_is_unlimited() {
        let now = Utc::now();
        assert_eq!(compute_expiry(0, now), ExpirySpec { remote_ms: 0, local: None });
        assert_eq!(compute_expiry(-7, now), ExpirySpec { remote_ms: 0, local: None });
    }

    #[test]
    fn flow_tag_only_for_reality_transports() {
        assert_eq!(flow_for("vless-reality"), "xtls-rprx-vision");
        assert_eq!(flow_for("VLESS Reality TCP"), "xtls-rprx-vision");
        assert_eq!(flow_for("vless"), "");
        assert_eq!(flow_for("trojan"), "");
        assert_eq!(flow_for(""), "");
    }

    #[test]
    fn sub_link_strips_trailing_slash_once() {
        assert_eq!(sub_link("https://sub.example.com/sub/", "abc"), "https://sub.example.com/sub/abc");
        assert_eq!(sub_link("https://sub.example.com/sub", "abc"), "https://sub.example.com/sub/abc");
    }

    #[test]
    fn label_is_u_plus_first_eight_hex_chars() {
        assert_eq!(client_label("abcdefgh-1234-5678-9abc-def012345678"), "uabcdefgh");
        assert_eq!(client_label("ab"), "uab");
    }

    #[test]
    fn sub_ids_are_sixteen_hex_chars() {
        let id = new_sub_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn template_rendering_substitutes_both_tokens() {
        let rendered =
            render_single_config("vless://UUID@x:443#EMAIL", "abcdefgh-1234-5678-9abc-def012345678")
                .unwrap();
        assert_eq!(
            rendered,
            "vless://abcdefgh-1234-5678-9abc-def012345678@x:443#uabcdefgh"
        );
    }

    #[test]
    fn template_rendering_replaces_repeated_tokens() {
        let rendered = render_single_config("UUID|UUID|EMAIL|EMAIL", "deadbeef-0000").unwrap();
        assert_eq!(rendered, "deadbeef-0000|deadbeef-0000|udeadbeef|udeadbeef");
    }

    #[test]
    fn generated_credentials_do_not_collide() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(Uuid::new_v4().to_string()));
        }
    }

    #[test]
    fn generated_sub_ids_do_not_collide() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(new_sub_id()));
        }
    }
}
