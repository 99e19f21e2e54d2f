//! Reconciliation of local inbound records against the panel's list.
//!
//! The remote list is authoritative for display fields (remark, port,
//! protocol); local ownership (plan links) is never touched. The create/update
//! split is computed as a pure plan over the two lists and applied in one
//! transaction, so a failed call writes nothing.

use tracing::info;

use karavan_db::models::server::{Inbound, InboundUpsert, Server};
use karavan_db::repositories::server_repo::ServerRepository;

use crate::error::{Error, Result};
use crate::panel::types::InboundDto;
use crate::panel::PanelClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub added: u32,
    pub updated: u32,
}

#[derive(Debug, Default)]
pub struct SyncPlan {
    pub creates: Vec<InboundUpsert>,
    pub updates: Vec<(i64, InboundUpsert)>,
}

/// Matches remote inbounds against local rows by remote numeric id. Every
/// remote inbound lands in exactly one bucket, so re-running against unchanged
/// remote data turns all first-run creates into second-run updates.
pub fn plan_sync(remote: &[InboundDto], local: &[Inbound]) -> SyncPlan {
    let mut plan = SyncPlan::default();

    for item in remote {
        let fields = InboundUpsert {
            remote_id: item.id,
            remark: item.remark.clone(),
            port: item.port,
            protocol: item.protocol.clone(),
        };
        match local.iter().find(|l| l.remote_id == item.id) {
            Some(existing) => plan.updates.push((existing.id, fields)),
            None => plan.creates.push(fields),
        }
    }

    plan
}

#[derive(Clone)]
pub struct SyncService {
    servers: ServerRepository,
}

impl SyncService {
    pub fn new(servers: ServerRepository) -> Self {
        Self { servers }
    }

    /// Pulls the server's remote inbound list and upserts it locally,
    /// returning how many rows were added and how many refreshed. Aborts
    /// before any write when the panel cannot be reached or refuses the
    /// credentials.
    pub async fn sync_server(&self, server: &Server) -> Result<SyncReport> {
        let panel = PanelClient::for_server(server)?;
        if !panel.login().await? {
            return Err(Error::AuthFailed);
        }

        let remote = panel.list_inbounds().await?;
        let local = self.servers.get_inbounds(server.id).await?;

        let plan = plan_sync(&remote, &local);
        let report = SyncReport {
            added: plan.creates.len() as u32,
            updated: plan.updates.len() as u32,
        };

        self.servers
            .apply_inbound_sync(server.id, &plan.creates, &plan.updates)
            .await?;

        info!(
            "synced inbounds for server {}: {} added, {} updated",
            server.name, report.added, report.updated
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(id: i64, remark: &str, port: i32, protocol: &str) -> InboundDto {
        InboundDto {
            id,
            remark: remark.to_string(),
            port,
            protocol: protocol.to_string(),
            settings: String::new(),
        }
    }

    fn local(id: i64, server_id: i64, upsert: &InboundUpsert) -> Inbound {
        Inbound {
            id,
            server_id,
            remote_id: upsert.remote_id,
            remark: upsert.remark.clone(),
            port: upsert.port,
            protocol: upsert.protocol.clone(),
            is_active: true,
        }
    }

    #[test]
    fn first_sync_creates_everything() {
        let remote = vec![remote(5, "de-1", 443, "vless"), remote(7, "de-2", 8443, "trojan")];

        let plan = plan_sync(&remote, &[]);

        assert_eq!(plan.creates.len(), 2);
        assert!(plan.updates.is_empty());
        assert_eq!(plan.creates[0].remote_id, 5);
        assert_eq!(plan.creates[1].port, 8443);
    }

    #[test]
    fn second_sync_with_unchanged_remote_only_updates() {
        let remote_list = vec![remote(5, "de-1", 443, "vless"), remote(7, "de-2", 8443, "trojan")];

        let first = plan_sync(&remote_list, &[]);
        assert_eq!((first.creates.len(), first.updates.len()), (2, 0));

        // Apply the first pass locally, then plan again with the same remote
        // data: everything must flip from create to update.
        let local_rows: Vec<Inbound> = first
            .creates
            .iter()
            .enumerate()
            .map(|(i, u)| local(i as i64 + 1, 1, u))
            .collect();

        let second = plan_sync(&remote_list, &local_rows);
        assert_eq!((second.creates.len(), second.updates.len()), (0, 2));
    }

    #[test]
    fn changed_display_fields_are_carried_into_the_update() {
        let existing = local(
            10,
            1,
            &InboundUpsert {
                remote_id: 5,
                remark: "old".to_string(),
                port: 443,
                protocol: "vless".to_string(),
            },
        );
        let remote_list = vec![remote(5, "renamed", 2096, "vless")];

        let plan = plan_sync(&remote_list, &[existing]);

        assert_eq!(plan.updates.len(), 1);
        let (local_id, fields) = &plan.updates[0];
        assert_eq!(*local_id, 10);
        assert_eq!(fields.remark, "renamed");
        assert_eq!(fields.port, 2096);
    }

    #[test]
    fn remote_ids_match_within_server_only_by_remote_id() {
        // A local row for a different remote id must not swallow the new one.
        let existing = local(
            10,
            1,
            &InboundUpsert {
                remote_id: 99,
                remark: "other".to_string(),
                port: 1,
                protocol: "vmess".to_string(),
            },
        );
        let plan = plan_sync(&[remote(5, "de-1", 443, "vless")], &[existing]);

        assert_eq!(plan.creates.len(), 1);
        assert!(plan.updates.is_empty());
    }
}
