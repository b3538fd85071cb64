use std::sync::Arc;

use chrono::Duration;
use common::{
    clock::{Clock, SystemClock},
    error::{AppError, Res},
};

use crate::{
    models::key::{CreatedKey, KeyRecord, NewKey},
    service::{
        expiration::{generate_expiration_time, normalize_minutes, parse_timestamp},
        generator::{KeyGenerator, is_key_hash, key_to_hash, short_hash},
    },
    store::backend::BackendHandle,
};

/// Issues, stores, validates and revokes API keys.
///
/// Every public operation picks its backend once through the [`BackendHandle`]
/// and never switches mid-operation. Backend failures stop here: they are
/// logged and reported as `false`/`None` (or an `AppError` for the operations
/// that return `Res`), never retried on the other backend.
pub struct KeyManager {
    backend: BackendHandle,
    generator: KeyGenerator,
    clock: Arc<dyn Clock>,
}

impl KeyManager {
    pub fn new(backend: BackendHandle, generator: KeyGenerator) -> Self {
        Self {
            backend,
            generator,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn generator(&self) -> &KeyGenerator {
        &self.generator
    }

    /// Name of the backend the next operation would be served by.
    pub async fn backend_name(&self) -> &'static str {
        self.backend.select().await.name()
    }

    pub fn generate_key(&self, length: Option<i64>) -> String {
        self.generator.generate(length)
    }

    /// Stores `key` (hashed) with a validity window of `minutes`.
    ///
    /// Returns `false` when the hash is already present or the backend failed.
    pub async fn save(&self, key: &str, minutes: Option<i64>, owner: Option<String>) -> bool {
        match self.try_save(key, minutes, owner).await {
            Ok(saved) => saved,
            Err(error) => {
                log::error!("Failed to save key {}: {}", self.generator.preview(key), error);
                false
            }
        }
    }

    /// Like [`save`](Self::save), but answers with the creation response or the reason it failed.
    pub async fn create(
        &self,
        key: String,
        minutes: Option<i64>,
        owner: Option<String>,
    ) -> Res<CreatedKey> {
        if key.is_empty() {
            return Err(AppError::BadRequest("API key must not be empty".to_string()));
        }

        match self.try_save(&key, minutes, owner.clone()).await {
            Ok(true) => {
                log::info!(
                    "Key {} created for owner={:?}",
                    self.generator.preview(&key),
                    owner
                );
                Ok(CreatedKey {
                    api_key: key,
                    expires_in_minutes: normalize_minutes(minutes),
                    owner,
                })
            }
            Ok(false) => Err(AppError::Conflict("API key already exists".to_string())),
            Err(error) => {
                log::error!("Failed to save key {}: {}", self.generator.preview(&key), error);
                Err(AppError::Internal("Failed to save API key".to_string()))
            }
        }
    }

    /// Generates a fresh key and creates it.
    pub async fn issue(
        &self,
        minutes: Option<i64>,
        owner: Option<String>,
        length: Option<i64>,
    ) -> Res<CreatedKey> {
        let key = self.generate_key(length);
        self.create(key, minutes, owner).await
    }

    pub async fn list(&self, owner: Option<&str>) -> Res<Vec<KeyRecord>> {
        let backend = self.backend.select().await;
        backend.list(owner).await.map_err(|error| {
            log::error!("Failed to list keys from {}: {}", backend.name(), error);
            AppError::Internal("Failed to list API keys".to_string())
        })
    }

    pub async fn get_info(&self, key: &str) -> Option<KeyRecord> {
        let hash = key_to_hash(key);
        let backend = self.backend.select().await;
        match backend.get(&hash).await {
            Ok(record) => record,
            Err(error) => {
                log::error!(
                    "Failed to read key {} from {}: {}",
                    short_hash(&hash),
                    backend.name(),
                    error
                );
                None
            }
        }
    }

    pub async fn validate(&self, key: &str) -> bool {
        let hash = key_to_hash(key);
        let backend = self.backend.select().await;
        match backend.validate(&hash, self.clock.now()).await {
            Ok(valid) => {
                if valid {
                    log::debug!("Key {} is valid", self.generator.preview(key));
                }
                valid
            }
            Err(error) => {
                log::error!(
                    "Failed to validate key {} against {}: {}",
                    self.generator.preview(key),
                    backend.name(),
                    error
                );
                false
            }
        }
    }

    /// Revokes by plaintext key or by its hash (any 64 hex characters is taken as a hash).
    pub async fn revoke(&self, key_or_hash: &str) -> bool {
        let hash = if is_key_hash(key_or_hash) {
            key_or_hash.to_ascii_lowercase()
        } else {
            key_to_hash(key_or_hash)
        };

        let backend = self.backend.select().await;
        match backend.revoke(&hash, self.clock.now()).await {
            Ok(revoked) => {
                if revoked {
                    log::info!("Key {} revoked in {}", short_hash(&hash), backend.name());
                } else {
                    log::warn!("Key {} not found for revocation", short_hash(&hash));
                }
                revoked
            }
            Err(error) => {
                log::error!(
                    "Failed to revoke key {} in {}: {}",
                    short_hash(&hash),
                    backend.name(),
                    error
                );
                false
            }
        }
    }

    /// Time left before `key` expires; negative once it has. `None` when the
    /// key is unknown or has no recorded expiration.
    pub async fn expires_in(&self, key: &str) -> Option<Duration> {
        let record = self.get_info(key).await?;
        let expires_at = parse_timestamp(record.expires_at.as_deref()?)?;
        Some(expires_at - self.clock.now())
    }

    async fn try_save(&self, key: &str, minutes: Option<i64>, owner: Option<String>) -> Res<bool> {
        let now = self.clock.now();
        let new_key = NewKey {
            hash: key_to_hash(key),
            preview: self.generator.preview(key),
            owner,
            created_at: now,
            expires_at: generate_expiration_time(now, minutes),
        };

        let backend = self.backend.select().await;
        let saved = backend.save(new_key).await?;
        if saved {
            log::info!(
                "Key {} saved to {} backend",
                self.generator.preview(key),
                backend.name()
            );
        }
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::{Local, NaiveDateTime};
    use common::clock::ManualClock;

    use super::*;
    use crate::{store::document::API_KEYS_COLLECTION, testing::FakeDocumentStore};

    fn start() -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn memory_manager() -> (ManualClock, KeyManager) {
        let clock = ManualClock::new(start());
        let manager = KeyManager::new(BackendHandle::memory_only(), KeyGenerator::default())
            .with_clock(Arc::new(clock.clone()));
        (clock, manager)
    }

    fn document_manager() -> (ManualClock, Arc<FakeDocumentStore>, KeyManager) {
        let clock = ManualClock::new(start());
        let store = Arc::new(FakeDocumentStore::new());
        let backend = BackendHandle::with_document_store(store.clone(), StdDuration::from_secs(1));
        let manager = KeyManager::new(backend, KeyGenerator::default())
            .with_clock(Arc::new(clock.clone()));
        (clock, store, manager)
    }

    #[tokio::test]
    async fn round_trip_on_document_backend() {
        let (_, _, manager) = document_manager();
        let key = manager.generate_key(None);

        assert!(manager.save(&key, Some(60), Some("alice".to_string())).await);
        assert!(manager.validate(&key).await);

        let info = manager.get_info(&key).await.unwrap();
        assert_eq!(info.owner.as_deref(), Some("alice"));
        assert_eq!(info.key_info.hash, key_to_hash(&key));
        assert!(info.active);
    }

    #[tokio::test]
    async fn round_trip_on_memory_backend() {
        let (_, manager) = memory_manager();
        let key = manager.generate_key(None);

        assert!(manager.save(&key, Some(60), Some("alice".to_string())).await);
        assert!(manager.validate(&key).await);
        // The fallback index does not keep owners.
        assert_eq!(manager.get_info(&key).await.unwrap().owner, None);
    }

    #[tokio::test]
    async fn zero_minutes_means_one_hour() {
        let (clock, manager) = memory_manager();
        let key = manager.generate_key(None);
        assert!(manager.save(&key, Some(0), None).await);

        clock.advance(Duration::minutes(59));
        assert!(manager.validate(&key).await);
        clock.advance(Duration::minutes(1));
        assert!(!manager.validate(&key).await);
    }

    #[tokio::test]
    async fn expired_key_is_evicted_from_memory_backend() {
        let (clock, manager) = memory_manager();
        let key = manager.generate_key(None);
        assert!(manager.save(&key, Some(1), None).await);

        clock.advance(Duration::seconds(61));
        assert!(!manager.validate(&key).await);
        assert!(manager.get_info(&key).await.is_none());
    }

    #[tokio::test]
    async fn expired_key_stays_in_document_backend() {
        let (clock, _, manager) = document_manager();
        let key = manager.generate_key(None);
        assert!(manager.save(&key, Some(1), None).await);

        clock.advance(Duration::seconds(61));
        assert!(!manager.validate(&key).await);
        assert!(manager.get_info(&key).await.is_some());
    }

    #[tokio::test]
    async fn revocation_is_final_on_both_backends() {
        let (_, memory) = memory_manager();
        let (_, _, document) = document_manager();

        for manager in [&memory, &document] {
            let key = manager.generate_key(None);
            assert!(manager.save(&key, None, None).await);

            assert!(manager.revoke(&key).await);
            assert!(!manager.validate(&key).await);
            assert!(!manager.revoke(&key).await);
        }
    }

    #[tokio::test]
    async fn revoke_soft_deletes_in_document_and_hard_deletes_in_memory() {
        let (_, memory) = memory_manager();
        let key = memory.generate_key(None);
        memory.save(&key, None, None).await;
        memory.revoke(&key).await;
        assert!(memory.get_info(&key).await.is_none());

        let (_, _, document) = document_manager();
        let key = document.generate_key(None);
        document.save(&key, None, None).await;
        document.revoke(&key).await;
        let info = document.get_info(&key).await.unwrap();
        assert!(!info.active);
        assert!(info.revoked_at.is_some());
    }

    #[tokio::test]
    async fn revoke_accepts_precomputed_hash() {
        let (_, _, manager) = document_manager();
        let key = manager.generate_key(None);
        manager.save(&key, None, None).await;

        assert!(manager.revoke(&key_to_hash(&key)).await);
        assert!(!manager.validate(&key).await);
        assert!(!manager.revoke(&key).await);

        let (_, manager) = memory_manager();
        let key = manager.generate_key(None);
        manager.save(&key, None, None).await;
        assert!(manager.revoke(&key_to_hash(&key).to_uppercase()).await);
        assert!(!manager.validate(&key).await);
    }

    #[tokio::test]
    async fn saving_same_key_twice_conflicts() {
        let (_, memory) = memory_manager();
        let (_, _, document) = document_manager();

        for manager in [&memory, &document] {
            let key = manager.generate_key(None);
            assert!(manager.save(&key, None, None).await);
            assert!(!manager.save(&key, None, None).await);
            assert!(matches!(
                manager.create(key, None, None).await,
                Err(AppError::Conflict(_))
            ));
        }
    }

    #[tokio::test]
    async fn listing_filters_by_owner() {
        let (_, _, manager) = document_manager();
        for owner in ["alice", "alice", "bob"] {
            manager.issue(None, Some(owner.to_string()), None).await.unwrap();
        }
        manager.issue(None, None, None).await.unwrap();

        let alice = manager.list(Some("alice")).await.unwrap();
        assert_eq!(alice.len(), 2);
        assert!(alice.iter().all(|r| r.owner.as_deref() == Some("alice")));
        assert_eq!(manager.list(None).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn document_write_failure_does_not_fall_back() {
        let (_, store, manager) = document_manager();
        store.set_failing(true);
        let key = manager.generate_key(None);

        assert!(!manager.save(&key, None, None).await);
        assert!(matches!(
            manager.create(key.clone(), None, None).await,
            Err(AppError::Internal(_))
        ));

        store.set_failing(false);
        assert!(manager.get_info(&key).await.is_none());
        assert!(!manager.validate(&key).await);
    }

    #[tokio::test]
    async fn unreachable_store_routes_to_memory() {
        let (_, store, manager) = document_manager();
        store.set_available(false);
        assert_eq!(manager.backend_name().await, "memory");

        let key = manager.generate_key(None);
        assert!(manager.save(&key, None, Some("alice".to_string())).await);
        assert!(manager.validate(&key).await);
        assert!(store.document(API_KEYS_COLLECTION, &key_to_hash(&key)).is_none());

        // Once the store is back it is authoritative again and knows nothing of the key.
        store.set_available(true);
        assert!(!manager.validate(&key).await);
    }

    #[tokio::test]
    async fn backend_errors_fail_closed() {
        let (_, store, manager) = document_manager();
        let key = manager.generate_key(None);
        manager.save(&key, None, None).await;

        store.set_failing(true);
        assert!(!manager.validate(&key).await);
        assert!(manager.get_info(&key).await.is_none());
        assert!(!manager.revoke(&key).await);
        assert!(manager.list(None).await.is_err());
    }

    #[tokio::test]
    async fn create_echoes_effective_minutes() {
        let (_, manager) = memory_manager();

        let created = manager
            .issue(Some(-3), Some("alice".to_string()), Some(20))
            .await
            .unwrap();
        assert_eq!(created.expires_in_minutes, 60);
        assert_eq!(created.owner.as_deref(), Some("alice"));
        assert_eq!(created.api_key.len(), "LUNAR_".len() + 20);

        assert!(matches!(
            manager.create(String::new(), None, None).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn expires_in_counts_down() {
        let (clock, manager) = memory_manager();
        let key = manager.generate_key(None);
        manager.save(&key, Some(10), None).await;

        assert_eq!(manager.expires_in(&key).await, Some(Duration::minutes(10)));
        clock.advance(Duration::minutes(4));
        assert_eq!(manager.expires_in(&key).await, Some(Duration::minutes(6)));
        assert_eq!(manager.expires_in("LUNAR_unknown").await, None);
    }
}
