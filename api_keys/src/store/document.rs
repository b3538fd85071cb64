use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use common::error::{AppError, Res};
use db::document::{DocumentStore, Fields};
use futures::TryStreamExt;
use serde_json::{Value, json};

use super::backend::KeyStore;
use crate::{
    models::key::{KeyRecord, NewKey},
    service::{
        expiration::{format_timestamp, parse_timestamp},
        generator::short_hash,
    },
};

pub const API_KEYS_COLLECTION: &str = "api_keys";

/// Key records kept as documents at `api_keys/<hash>`.
///
/// Revocation only flips `active`, so revoked and expired records stay around.
pub struct DocumentKeyStore {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl DocumentKeyStore {
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn is_available(&self) -> bool {
        tokio::time::timeout(self.timeout, self.store.is_available())
            .await
            .unwrap_or(false)
    }

    async fn bounded<T>(&self, operation: &str, call: impl Future<Output = Res<T>>) -> Res<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "document store {} exceeded {:?}",
                    operation, self.timeout
                ))
            })?
    }

    fn project(id: &str, fields: Fields) -> Res<KeyRecord> {
        let mut record: KeyRecord = serde_json::from_value(Value::Object(fields))?;
        if record.key_info.hash.is_empty() {
            record.key_info.hash = id.to_string();
        }
        Ok(record)
    }
}

#[async_trait]
impl KeyStore for DocumentKeyStore {
    fn name(&self) -> &'static str {
        "document"
    }

    async fn save(&self, key: NewKey) -> Res<bool> {
        let mut fields = Fields::new();
        fields.insert("owner".to_string(), json!(key.owner));
        fields.insert("created_at".to_string(), json!(format_timestamp(key.created_at)));
        fields.insert("expires_at".to_string(), json!(format_timestamp(key.expires_at)));
        fields.insert("active".to_string(), json!(true));
        fields.insert(
            "key_info".to_string(),
            json!({ "prefix": key.preview, "hash": key.hash }),
        );

        let created = self
            .bounded(
                "create",
                self.store.create(API_KEYS_COLLECTION, &key.hash, fields),
            )
            .await?;
        if !created {
            log::warn!("Key {} already exists in document store", short_hash(&key.hash));
        }
        Ok(created)
    }

    async fn get(&self, hash: &str) -> Res<Option<KeyRecord>> {
        let fields = self
            .bounded("get", self.store.get(API_KEYS_COLLECTION, hash))
            .await?;
        fields.map(|fields| Self::project(hash, fields)).transpose()
    }

    async fn list(&self, owner: Option<&str>) -> Res<Vec<KeyRecord>> {
        let owner_value = owner.map(|owner| Value::String(owner.to_string()));
        let documents = match &owner_value {
            Some(owner) => self.store.query(API_KEYS_COLLECTION, "owner", owner),
            None => self.store.stream_all(API_KEYS_COLLECTION),
        };
        let documents: Vec<_> = self.bounded("list", documents.try_collect()).await?;

        let mut records = Vec::with_capacity(documents.len());
        for document in documents {
            match Self::project(&document.id, document.fields) {
                Ok(record) => records.push(record),
                Err(error) => {
                    log::warn!("Skipping malformed key document {}: {}", short_hash(&document.id), error)
                }
            }
        }
        Ok(records)
    }

    async fn revoke(&self, hash: &str, at: NaiveDateTime) -> Res<bool> {
        let mut fields = Fields::new();
        fields.insert("active".to_string(), json!(false));
        fields.insert("revoked_at".to_string(), json!(format_timestamp(at)));

        // Only a live document transitions; a concurrent revoke sees it already inactive.
        let revoked = self
            .bounded(
                "update",
                self.store
                    .update_if(API_KEYS_COLLECTION, hash, "active", &json!(true), fields),
            )
            .await?;
        if !revoked {
            log::info!("Key {} is unknown or already revoked", short_hash(hash));
        }
        Ok(revoked)
    }

    async fn validate(&self, hash: &str, now: NaiveDateTime) -> Res<bool> {
        let Some(fields) = self
            .bounded("get", self.store.get(API_KEYS_COLLECTION, hash))
            .await?
        else {
            log::warn!("Key {} not found", short_hash(hash));
            return Ok(false);
        };

        match fields.get("active") {
            None | Some(Value::Bool(true)) => {}
            Some(Value::Bool(false)) => {
                log::warn!("Key {} is revoked", short_hash(hash));
                return Ok(false);
            }
            Some(other) => {
                log::error!("Key {} has malformed active flag {}", short_hash(hash), other);
                return Ok(false);
            }
        }

        match fields.get("expires_at") {
            None | Some(Value::Null) => Ok(true),
            Some(Value::String(expires_at)) => match parse_timestamp(expires_at) {
                Some(expires_at) if now < expires_at => Ok(true),
                Some(_) => {
                    log::warn!("Key {} has expired", short_hash(hash));
                    Ok(false)
                }
                None => {
                    log::error!(
                        "Key {} has malformed expires_at {:?}",
                        short_hash(hash),
                        expires_at
                    );
                    Ok(false)
                }
            },
            Some(other) => {
                log::error!("Key {} has malformed expires_at {}", short_hash(hash), other);
                Ok(false)
            }
        }
    }
}
