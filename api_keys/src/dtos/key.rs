use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::key::KeyRecord;

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateKeyRequest {
    pub owner: Option<String>,
    /// Validity window. Anything that is not a whole number falls back to the default.
    pub minutes: Option<Value>,
    pub length: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListKeysQuery {
    pub owner: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListKeysResponse {
    pub keys: Vec<KeyRecord>,
}

/// Body of `/validate` and `/revoke`. `api_key` may also be a key hash for `/revoke`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiKeyRequest {
    pub api_key: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateKeyResponse {
    pub valid: bool,
    pub info: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RevokeKeyResponse {
    pub revoked: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PresentedKeyResponse {
    pub info: Option<KeyRecord>,
    pub expires_in_seconds: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub backend: String,
}

/// Whole numbers, given either as JSON numbers or numeric strings.
pub fn as_integer(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

impl ApiKeyRequest {
    /// The key as a non-empty string, if one was sent.
    pub fn key(&self) -> Option<&str> {
        match &self.api_key {
            Some(Value::String(key)) if !key.is_empty() => Some(key.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn integers_from_numbers_and_strings() {
        assert_eq!(as_integer(Some(&json!(30))), Some(30));
        assert_eq!(as_integer(Some(&json!("45"))), Some(45));
        assert_eq!(as_integer(Some(&json!(1.5))), None);
        assert_eq!(as_integer(Some(&json!("soon"))), None);
        assert_eq!(as_integer(Some(&json!(null))), None);
        assert_eq!(as_integer(None), None);
    }

    #[test]
    fn api_key_must_be_non_empty_string() {
        let request: ApiKeyRequest = serde_json::from_value(json!({ "api_key": "LUNAR_x" })).unwrap();
        assert_eq!(request.key(), Some("LUNAR_x"));

        for body in [json!({}), json!({ "api_key": "" }), json!({ "api_key": 12 })] {
            let request: ApiKeyRequest = serde_json::from_value(body).unwrap();
            assert_eq!(request.key(), None);
        }
    }
}
