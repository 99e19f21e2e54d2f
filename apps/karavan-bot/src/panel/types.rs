use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every panel endpoint wraps its payload in this envelope.
#[derive(Debug, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub obj: Value,
}

/// Normalized inbound descriptor. `settings` stays a raw JSON string because
/// that is how the panel ships it; [`clients_from_settings`] decodes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundDto {
    pub id: i64,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub port: i32,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub settings: String,
}

fn default_true() -> bool {
    true
}

/// One credentialed client entry inside an inbound's settings blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientDto {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, rename = "limitIp")]
    pub limit_ip: i32,
    #[serde(default, rename = "totalGB")]
    pub total_gb: i64,
    #[serde(default, rename = "expiryTime")]
    pub expiry_time: i64,
    #[serde(default = "default_true")]
    pub enable: bool,
    // Some panel builds send a number here, others a string.
    #[serde(default, rename = "tgId")]
    pub tg_id: Value,
    #[serde(default, rename = "subId")]
    pub sub_id: String,
    #[serde(default)]
    pub flow: String,
}

/// Partial client update. Present fields overwrite, absent fields keep the
/// current value; the panel requires the full object on write, so the merged
/// result is what goes over the wire.
#[derive(Debug, Clone, Default)]
pub struct ClientPatch {
    pub email: Option<String>,
    pub limit_ip: Option<i32>,
    pub total_gb: Option<i64>,
    pub expiry_time: Option<i64>,
    pub enable: Option<bool>,
    pub sub_id: Option<String>,
    pub flow: Option<String>,
}

impl ClientPatch {
    pub fn apply_to(&self, current: &mut ClientDto) {
        if let Some(v) = &self.email {
            current.email = v.clone();
        }
        if let Some(v) = self.limit_ip {
            current.limit_ip = v;
        }
        if let Some(v) = self.total_gb {
            current.total_gb = v;
        }
        if let Some(v) = self.expiry_time {
            current.expiry_time = v;
        }
        if let Some(v) = self.enable {
            current.enable = v;
        }
        if let Some(v) = &self.sub_id {
            current.sub_id = v.clone();
        }
        if let Some(v) = &self.flow {
            current.flow = v.clone();
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrafficDto {
    pub id: i64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub up: i64,
    #[serde(default)]
    pub down: i64,
    #[serde(default)]
    pub total: i64,
    #[serde(default, rename = "expiryTime")]
    pub expiry_time: i64,
    #[serde(default)]
    pub enable: bool,
}

/// Arguments for one remote add-client call.
#[derive(Debug, Clone)]
pub struct NewClient {
    pub inbound_remote_id: i64,
    pub email: String,
    pub uuid: String,
    pub sub_id: String,
    pub total_gb: f64,
    pub expiry_ms: i64,
    pub enable: bool,
    pub limit_ip: i32,
    pub flow: String,
}

/// Volume cap in bytes for the wire: anything at or below zero means
/// unlimited and is encoded as 0.
pub fn normalize_total_bytes(total_gb: f64) -> i64 {
    if total_gb > 0.0 {
        (total_gb * 1024f64 * 1024.0 * 1024.0) as i64
    } else {
        0
    }
}

/// Expiry for the wire: anything at or below zero means unlimited (0).
pub fn normalize_expiry_ms(expiry_ms: i64) -> i64 {
    if expiry_ms > 0 {
        expiry_ms
    } else {
        0
    }
}

/// The traffic endpoint returns either a single object or a single-element
/// list depending on the panel build; both collapse to one object.
pub fn single_object(obj: Value) -> Option<Value> {
    match obj {
        Value::Array(mut items) => {
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            }
        }
        Value::Object(_) => Some(obj),
        _ => None,
    }
}

/// Decodes the clients embedded in an inbound's settings JSON string.
pub fn clients_from_settings(settings: &str) -> Vec<ClientDto> {
    let parsed: Value = match serde_json::from_str(settings) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };
    match parsed.get("clients") {
        Some(clients) => serde_json::from_value(clients.clone()).unwrap_or_default(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_client() -> ClientDto {
        ClientDto {
            id: "11111111-2222-3333-4444-555555555555".to_string(),
            email: "u11111111".to_string(),
            limit_ip: 1,
            total_gb: 42,
            expiry_time: 1_700_000_000_000,
            enable: true,
            tg_id: Value::String(String::new()),
            sub_id: "aabbccddeeff0011".to_string(),
            flow: String::new(),
        }
    }

    #[test]
    fn non_positive_volume_encodes_as_unlimited() {
        assert_eq!(normalize_total_bytes(0.0), 0);
        assert_eq!(normalize_total_bytes(-3.5), 0);
        assert_eq!(normalize_total_bytes(-1000.0), 0);
        assert_eq!(normalize_total_bytes(1.0), 1024 * 1024 * 1024);
        assert_eq!(normalize_total_bytes(2.5), (2.5 * 1024.0 * 1024.0 * 1024.0) as i64);
    }

    #[test]
    fn non_positive_expiry_encodes_as_unlimited() {
        assert_eq!(normalize_expiry_ms(0), 0);
        assert_eq!(normalize_expiry_ms(-1), 0);
        assert_eq!(normalize_expiry_ms(i64::MIN), 0);
        assert_eq!(normalize_expiry_ms(1_700_000_000_000), 1_700_000_000_000);
    }

    #[test]
    fn traffic_payload_normalizes_object_or_list() {
        let as_object = json!({"id": 7, "email": "u1"});
        let as_list = json!([{"id": 7, "email": "u1"}]);

        assert_eq!(single_object(as_object.clone()), Some(as_object.clone()));
        assert_eq!(single_object(as_list), Some(as_object));
        assert_eq!(single_object(json!([])), None);
        assert_eq!(single_object(Value::Null), None);
    }

    #[test]
    fn patch_merge_keeps_omitted_fields() {
        let mut current = sample_client();
        let patch = ClientPatch {
            limit_ip: Some(99),
            ..Default::default()
        };

        patch.apply_to(&mut current);

        assert_eq!(current.limit_ip, 99);
        assert_eq!(current.total_gb, 42);
        assert_eq!(current.expiry_time, 1_700_000_000_000);
        assert_eq!(current.email, "u11111111");
        assert_eq!(current.sub_id, "aabbccddeeff0011");
        assert!(current.enable);
    }

    #[test]
    fn patch_merge_overwrites_present_fields() {
        let mut current = sample_client();
        let patch = ClientPatch {
            enable: Some(false),
            total_gb: Some(0),
            flow: Some("xtls-rprx-vision".to_string()),
            ..Default::default()
        };

        patch.apply_to(&mut current);

        assert!(!current.enable);
        assert_eq!(current.total_gb, 0);
        assert_eq!(current.flow, "xtls-rprx-vision");
        assert_eq!(current.limit_ip, 1);
    }

    #[test]
    fn settings_blob_decodes_clients() {
        let settings = json!({
            "clients": [
                {"id": "abc", "email": "u1", "subId": "deadbeef00000000"},
                {"id": "def", "email": "u2", "tgId": 12345}
            ]
        })
        .to_string();

        let clients = clients_from_settings(&settings);
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].sub_id, "deadbeef00000000");
        assert_eq!(clients[1].email, "u2");
    }

    #[test]
    fn malformed_settings_blob_yields_no_clients() {
        assert!(clients_from_settings("not json").is_empty());
        assert!(clients_from_settings("{}").is_empty());
    }
}
