use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Identifying part of a key that is safe to persist: a preview and the hash.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default)]
    pub hash: String,
}

/// A key record as returned to callers. Never carries the plaintext key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRecord {
    #[serde(default)]
    pub key_info: KeyInfo,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<String>,
}

fn default_active() -> bool {
    true
}

/// Everything a backend needs to persist a freshly issued key.
#[derive(Debug, Clone)]
pub struct NewKey {
    pub hash: String,
    pub preview: String,
    pub owner: Option<String>,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

/// The one response that carries a plaintext key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedKey {
    pub api_key: String,
    pub expires_in_minutes: i64,
    pub owner: Option<String>,
}
