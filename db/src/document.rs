use async_trait::async_trait;
use common::error::Res;
use futures::stream::BoxStream;
use serde_json::{Map, Value};

/// Top-level fields of a stored document.
pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

/// Key-value document backend addressed by `(collection, id)`.
///
/// Every operation is atomic at the single-document level; nothing spans documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Liveness probe, checked before routing an operation to this store.
    async fn is_available(&self) -> bool;

    /// Writes the document, replacing any previous fields.
    ///
    /// Part of the general store contract; key issuing goes through [`create`](Self::create)
    /// so an existing key is never overwritten.
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Res<()>;

    /// Writes the document only if `id` is free. Returns whether it was written.
    async fn create(&self, collection: &str, id: &str, fields: Fields) -> Res<bool>;

    async fn get(&self, collection: &str, id: &str) -> Res<Option<Fields>>;

    /// Merges `fields` into an existing document. Fails with `NotFound` when absent.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Res<()>;

    /// Merges `fields` into the document only while its top-level `field` equals
    /// `expected`; a document without `field` counts as matching. Check and write
    /// are one atomic step. Returns whether the document was updated.
    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        expected: &Value,
        fields: Fields,
    ) -> Res<bool>;

    /// Documents whose top-level `field` equals `value`.
    fn query<'a>(
        &'a self,
        collection: &'a str,
        field: &'a str,
        value: &'a Value,
    ) -> BoxStream<'a, Res<Document>>;

    fn stream_all<'a>(&'a self, collection: &'a str) -> BoxStream<'a, Res<Document>>;
}
