use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use common::error::Res;
use db::document::DocumentStore;

use super::{document::DocumentKeyStore, memory::MemoryKeyStore};
use crate::models::key::{KeyRecord, NewKey};

/// Persistence for key records, addressed by key hash.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Short label used in logs and status output.
    fn name(&self) -> &'static str;

    /// Stores a new record. `Ok(false)` when the hash is already taken.
    async fn save(&self, key: NewKey) -> Res<bool>;

    async fn get(&self, hash: &str) -> Res<Option<KeyRecord>>;

    /// All records, or only those whose owner equals `owner`.
    async fn list(&self, owner: Option<&str>) -> Res<Vec<KeyRecord>>;

    /// `Ok(true)` iff a live record existed and was revoked.
    async fn revoke(&self, hash: &str, at: NaiveDateTime) -> Res<bool>;

    async fn validate(&self, hash: &str, now: NaiveDateTime) -> Res<bool>;
}

/// The durable store when one is configured and reachable, the in-memory
/// index otherwise. Exactly one of them serves any single operation.
pub struct BackendHandle {
    durable: Option<DocumentKeyStore>,
    fallback: MemoryKeyStore,
}

impl BackendHandle {
    pub fn memory_only() -> Self {
        Self {
            durable: None,
            fallback: MemoryKeyStore::new(),
        }
    }

    pub fn with_document_store(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self {
            durable: Some(DocumentKeyStore::new(store, timeout)),
            fallback: MemoryKeyStore::new(),
        }
    }

    /// Probes the durable store once and returns the backend for this operation.
    pub async fn select(&self) -> &dyn KeyStore {
        if let Some(durable) = &self.durable {
            if durable.is_available().await {
                return durable;
            }
            log::warn!("Document store unreachable, serving from in-memory key index");
        }
        &self.fallback
    }
}
