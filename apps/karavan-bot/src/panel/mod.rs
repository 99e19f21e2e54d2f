//! Session client for one remote x-ui style panel.
//!
//! The panel authenticates with a session cookie that expires server-side at
//! unpredictable times, so every call goes through a guarded wrapper: an
//! implicit login when unauthenticated, and exactly one re-login plus retry
//! when an authenticated call comes back 401/403. A second auth failure is
//! surfaced, never retried again.

pub mod types;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use self::types::{
    clients_from_settings, normalize_expiry_ms, normalize_total_bytes, single_object, ClientDto,
    ClientPatch, Envelope, InboundDto, NewClient, TrafficDto,
};

const CALL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PanelClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    authenticated: AtomicBool,
}

impl PanelClient {
    pub fn new(panel_url: &str, username: &str, password: &str) -> Result<Self> {
        // Panels in this deployment context run on self-signed certificates
        // and are only reachable over operator-controlled networks.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .cookie_store(true)
            .timeout(CALL_TIMEOUT)
            .build()
            .map_err(Error::transport)?;

        Ok(Self {
            http,
            base_url: panel_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            authenticated: AtomicBool::new(false),
        })
    }

    pub fn for_server(server: &karavan_db::models::server::Server) -> Result<Self> {
        Self::new(&server.panel_url, &server.username, &server.password)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchanges credentials for a session cookie. Bad credentials come back
    /// as `Ok(false)`; only transport problems raise.
    pub async fn login(&self) -> Result<bool> {
        let payload = json!({"username": self.username, "password": self.password});
        let resp = self
            .http
            .post(self.url("/login"))
            .json(&payload)
            .send()
            .await
            .map_err(Error::transport)?;

        if !resp.status().is_success() {
            self.authenticated.store(false, Ordering::SeqCst);
            return Ok(false);
        }

        let body: Envelope = resp.json().await.map_err(Error::transport)?;
        self.authenticated.store(body.success, Ordering::SeqCst);
        Ok(body.success)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let mut req = self.http.request(method, self.url(path));
        if let Some(body) = body {
            req = req.json(body);
        }
        req.send().await.map_err(Error::transport)
    }

    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Envelope> {
        if !self.authenticated.load(Ordering::SeqCst) && !self.login().await? {
            return Err(Error::AuthFailed);
        }

        let mut resp = self.send(method.clone(), path, body).await?;

        if matches!(resp.status().as_u16(), 401 | 403) {
            debug!("panel session expired on {}, re-logging in once", path);
            self.authenticated.store(false, Ordering::SeqCst);
            if !self.login().await? {
                return Err(Error::AuthFailed);
            }
            resp = self.send(method, path, body).await?;
            if matches!(resp.status().as_u16(), 401 | 403) {
                return Err(Error::AuthFailed);
            }
        }

        resp.json::<Envelope>().await.map_err(Error::transport)
    }

    // ==================== INBOUNDS ====================

    /// Normalized inbound list; an unsuccessful-but-well-formed reply is an
    /// empty list, not an error.
    pub async fn list_inbounds(&self) -> Result<Vec<InboundDto>> {
        let env = self
            .request(Method::GET, "/panel/api/inbounds/list", None)
            .await?;
        if !env.success {
            return Ok(Vec::new());
        }
        serde_json::from_value(env.obj)
            .map_err(|e| Error::RemoteUnavailable(format!("malformed inbound list: {e}")))
    }

    pub async fn get_inbound(&self, remote_id: i64) -> Result<Option<InboundDto>> {
        let env = self
            .request(
                Method::GET,
                &format!("/panel/api/inbounds/get/{remote_id}"),
                None,
            )
            .await?;
        if !env.success {
            return Ok(None);
        }
        serde_json::from_value(env.obj)
            .map(Some)
            .map_err(|e| Error::RemoteUnavailable(format!("malformed inbound: {e}")))
    }

    pub async fn add_inbound(
        &self,
        remark: &str,
        port: i32,
        protocol: &str,
        settings: &Value,
        stream_settings: &Value,
    ) -> Result<bool> {
        // settings/streamSettings/sniffing travel as JSON-encoded strings
        // nested in the body; that is the panel's wire format.
        let payload = json!({
            "up": 0,
            "down": 0,
            "total": 0,
            "remark": remark,
            "enable": true,
            "expiryTime": 0,
            "listen": "",
            "port": port,
            "protocol": protocol,
            "settings": settings.to_string(),
            "streamSettings": stream_settings.to_string(),
            "sniffing": json!({"enabled": true, "destOverride": ["http", "tls"]}).to_string(),
        });
        let env = self
            .request(Method::POST, "/panel/api/inbounds/add", Some(&payload))
            .await?;
        Ok(env.success)
    }

    // ==================== CLIENTS ====================

    /// Creates one client entry. A remote-reported failure is `Ok(false)`;
    /// only transport/auth problems raise.
    pub async fn add_client(&self, c: &NewClient) -> Result<bool> {
        let client = json!({
            "id": c.uuid,
            "email": c.email,
            "limitIp": c.limit_ip,
            "totalGB": normalize_total_bytes(c.total_gb),
            "expiryTime": normalize_expiry_ms(c.expiry_ms),
            "enable": c.enable,
            "tgId": "",
            "subId": c.sub_id,
            "flow": c.flow,
        });
        let payload = json!({
            "id": c.inbound_remote_id,
            "settings": json!({"clients": [client]}).to_string(),
        });

        let env = self
            .request(Method::POST, "/panel/api/inbounds/addClient", Some(&payload))
            .await?;
        if !env.success {
            warn!(
                "panel refused client {} on inbound {}: {}",
                c.email, c.inbound_remote_id, env.msg
            );
        }
        Ok(env.success)
    }

    /// Read-merge-write update. The panel wants the full client object, so
    /// the current record is resolved first and the patch merged over it;
    /// fields absent from the patch survive untouched.
    pub async fn update_client(&self, uuid: &str, patch: &ClientPatch) -> Result<bool> {
        let db_id = self
            .resolve_client_db_id(uuid)
            .await?
            .ok_or(Error::NotFound("remote client"))?;

        let mut current = match self.find_client(uuid).await? {
            Some(client) => client,
            // The traffic row proved the client exists even though its full
            // record could not be read back; start from a safe skeleton.
            None => ClientDto {
                id: uuid.to_string(),
                email: format!("user_{db_id}"),
                limit_ip: 0,
                total_gb: 0,
                expiry_time: 0,
                enable: true,
                tg_id: Value::String(String::new()),
                sub_id: String::new(),
                flow: String::new(),
            },
        };
        patch.apply_to(&mut current);

        let payload = serde_json::to_value(&current)
            .map_err(|e| Error::RemoteUnavailable(format!("unencodable client: {e}")))?;
        let env = self
            .request(
                Method::POST,
                &format!("/panel/api/inbounds/updateClient/{db_id}"),
                Some(&payload),
            )
            .await?;
        Ok(env.success)
    }

    pub async fn delete_client(&self, inbound_remote_id: i64, uuid: &str) -> Result<bool> {
        let db_id = self
            .resolve_client_db_id(uuid)
            .await?
            .ok_or(Error::NotFound("remote client"))?;

        let env = self
            .request(
                Method::POST,
                &format!("/panel/api/inbounds/{inbound_remote_id}/delClient/{db_id}"),
                None,
            )
            .await?;
        Ok(env.success)
    }

    /// Looks a client up by credential or display name within one inbound.
    pub async fn get_client_info(
        &self,
        inbound_remote_id: i64,
        needle: &str,
    ) -> Result<Option<ClientDto>> {
        let inbound = match self.get_inbound(inbound_remote_id).await? {
            Some(i) => i,
            None => return Ok(None),
        };
        Ok(clients_from_settings(&inbound.settings)
            .into_iter()
            .find(|c| c.id == needle || c.email == needle))
    }

    pub async fn get_client_traffic(&self, uuid: &str) -> Result<Option<TrafficDto>> {
        let env = self
            .request(
                Method::GET,
                &format!("/panel/api/inbounds/getClientTrafficsById/{uuid}"),
                None,
            )
            .await?;
        if !env.success {
            return Ok(None);
        }
        match single_object(env.obj) {
            Some(obj) => serde_json::from_value(obj)
                .map(Some)
                .map_err(|e| Error::RemoteUnavailable(format!("malformed traffic payload: {e}"))),
            None => Ok(None),
        }
    }

    pub async fn reset_client_traffic(&self, inbound_remote_id: i64, email: &str) -> Result<bool> {
        let env = self
            .request(
                Method::POST,
                &format!("/panel/api/inbounds/{inbound_remote_id}/resetClientTraffic/{email}"),
                None,
            )
            .await?;
        Ok(env.success)
    }

    /// Live session count, used by the admin connectivity test.
    pub async fn online_clients(&self) -> Result<u64> {
        let env = self
            .request(Method::POST, "/panel/api/inbounds/onlines", None)
            .await?;
        if !env.success {
            return Ok(0);
        }
        Ok(env.obj.as_array().map(|a| a.len() as u64).unwrap_or(0))
    }

    /// The client's numeric identifier on the panel, resolved through the
    /// traffic endpoint.
    async fn resolve_client_db_id(&self, uuid: &str) -> Result<Option<i64>> {
        Ok(self.get_client_traffic(uuid).await?.map(|t| t.id))
    }

    /// Full current record for a credential, scanned out of the inbound
    /// settings blobs.
    async fn find_client(&self, uuid: &str) -> Result<Option<ClientDto>> {
        for inbound in self.list_inbounds().await? {
            if let Some(client) = clients_from_settings(&inbound.settings)
                .into_iter()
                .find(|c| c.id == uuid)
            {
                return Ok(Some(client));
            }
        }
        Ok(None)
    }
}
