use async_trait::async_trait;
use chrono::NaiveDateTime;
use common::error::Res;
use dashmap::{DashMap, mapref::entry::Entry};

use super::backend::KeyStore;
use crate::{
    models::key::{KeyInfo, KeyRecord, NewKey},
    service::{expiration::format_timestamp, generator::short_hash},
};

/// Process-local index from key hash to expiration time.
///
/// It tracks nothing else: listed records report no owner and are always
/// active, and revoking removes the entry outright.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    index: DashMap<String, NaiveDateTime>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(hash: &str, expires_at: NaiveDateTime) -> KeyRecord {
        KeyRecord {
            key_info: KeyInfo {
                prefix: None,
                hash: hash.to_string(),
            },
            owner: None,
            expires_at: Some(format_timestamp(expires_at)),
            active: true,
            created_at: None,
            revoked_at: None,
        }
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn save(&self, key: NewKey) -> Res<bool> {
        match self.index.entry(key.hash) {
            Entry::Occupied(entry) => {
                log::warn!("Key {} already exists in memory index", short_hash(entry.key()));
                Ok(false)
            }
            Entry::Vacant(entry) => {
                entry.insert(key.expires_at);
                Ok(true)
            }
        }
    }

    async fn get(&self, hash: &str) -> Res<Option<KeyRecord>> {
        Ok(self
            .index
            .get(hash)
            .map(|entry| Self::record(entry.key(), *entry.value())))
    }

    async fn list(&self, owner: Option<&str>) -> Res<Vec<KeyRecord>> {
        // No owner is tracked here, so a filtered listing matches nothing.
        if owner.is_some() {
            return Ok(Vec::new());
        }

        let mut records: Vec<KeyRecord> = self
            .index
            .iter()
            .map(|entry| Self::record(entry.key(), *entry.value()))
            .collect();
        records.sort_by(|a, b| a.key_info.hash.cmp(&b.key_info.hash));
        Ok(records)
    }

    async fn revoke(&self, hash: &str, _at: NaiveDateTime) -> Res<bool> {
        Ok(self.index.remove(hash).is_some())
    }

    async fn validate(&self, hash: &str, now: NaiveDateTime) -> Res<bool> {
        let expires_at = match self.index.get(hash) {
            Some(entry) => *entry.value(),
            None => {
                log::warn!("Key {} not found", short_hash(hash));
                return Ok(false);
            }
        };

        if now < expires_at {
            return Ok(true);
        }

        // Evict unless a concurrent save replaced it with a later expiration.
        self.index.remove_if(hash, |_, expires_at| now >= *expires_at);
        log::warn!("Key {} has expired and was evicted", short_hash(hash));
        Ok(false)
    }
}
