//! In-process `DocumentStore` for exercising the durable code paths.

use std::{
    collections::BTreeMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use common::error::{AppError, Res};
use db::document::{Document, DocumentStore, Fields};
use futures::{StreamExt, stream::BoxStream};
use serde_json::Value;

#[derive(Default)]
pub struct FakeDocumentStore {
    documents: Mutex<BTreeMap<(String, String), Fields>>,
    unavailable: AtomicBool,
    failing: AtomicBool,
    delay_ms: AtomicU64,
}

impl FakeDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Makes every data operation fail while the liveness probe still succeeds.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn insert(&self, collection: &str, id: &str, fields: Value) {
        let Value::Object(fields) = fields else {
            panic!("documents must be JSON objects");
        };
        self.documents
            .lock()
            .unwrap()
            .insert((collection.to_string(), id.to_string()), fields);
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<Fields> {
        self.documents
            .lock()
            .unwrap()
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    async fn enter(&self) -> Res<()> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Internal("document store write failed".to_string()));
        }
        Ok(())
    }

    fn matching(&self, collection: &str, filter: impl Fn(&Fields) -> bool) -> Vec<Document> {
        self.documents
            .lock()
            .unwrap()
            .iter()
            .filter(|((c, _), fields)| c == collection && filter(fields))
            .map(|((_, id), fields)| Document {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect()
    }

    fn stream<'a>(&'a self, documents: Vec<Document>) -> BoxStream<'a, Res<Document>> {
        futures::stream::once(async move { self.enter().await })
            .map(move |entered| match entered {
                Ok(()) => futures::stream::iter(documents.clone().into_iter().map(Ok)).boxed(),
                Err(error) => futures::stream::iter(vec![Err(error)]).boxed(),
            })
            .flatten()
            .boxed()
    }
}

#[async_trait]
impl DocumentStore for FakeDocumentStore {
    async fn is_available(&self) -> bool {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        !self.unavailable.load(Ordering::SeqCst)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Res<()> {
        self.enter().await?;
        self.documents
            .lock()
            .unwrap()
            .insert((collection.to_string(), id.to_string()), fields);
        Ok(())
    }

    async fn create(&self, collection: &str, id: &str, fields: Fields) -> Res<bool> {
        self.enter().await?;
        let mut documents = self.documents.lock().unwrap();
        let key = (collection.to_string(), id.to_string());
        if documents.contains_key(&key) {
            return Ok(false);
        }
        documents.insert(key, fields);
        Ok(true)
    }

    async fn get(&self, collection: &str, id: &str) -> Res<Option<Fields>> {
        self.enter().await?;
        Ok(self.document(collection, id))
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Res<()> {
        self.enter().await?;
        let mut documents = self.documents.lock().unwrap();
        let existing = documents
            .get_mut(&(collection.to_string(), id.to_string()))
            .ok_or_else(|| AppError::NotFound(format!("{}/{}", collection, id)))?;
        existing.extend(fields);
        Ok(())
    }

    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        expected: &Value,
        fields: Fields,
    ) -> Res<bool> {
        self.enter().await?;
        let mut documents = self.documents.lock().unwrap();
        let Some(existing) = documents.get_mut(&(collection.to_string(), id.to_string())) else {
            return Ok(false);
        };
        if existing.get(field).is_some_and(|current| current != expected) {
            return Ok(false);
        }
        existing.extend(fields);
        Ok(true)
    }

    fn query<'a>(
        &'a self,
        collection: &'a str,
        field: &'a str,
        value: &'a Value,
    ) -> BoxStream<'a, Res<Document>> {
        let documents = self.matching(collection, |fields| fields.get(field) == Some(value));
        self.stream(documents)
    }

    fn stream_all<'a>(&'a self, collection: &'a str) -> BoxStream<'a, Res<Document>> {
        let documents = self.matching(collection, |_| true);
        self.stream(documents)
    }
}
