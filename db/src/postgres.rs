use std::time::Duration;

use async_trait::async_trait;
use common::error::{AppError, Res};
use futures::{StreamExt, stream::BoxStream};
use serde_json::Value;
use sqlx::{PgPool, types::Json};

use crate::document::{Document, DocumentStore, Fields};

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    fields: Json<Fields>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document {
            id: row.id,
            fields: row.fields.0,
        }
    }
}

/// `DocumentStore` over a single PostgreSQL table with one JSONB column per document.
pub struct PgDocumentStore {
    pool: PgPool,
    probe_timeout: Duration,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool, probe_timeout: Duration) -> Self {
        Self {
            pool,
            probe_timeout,
        }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn is_available(&self) -> bool {
        if self.pool.is_closed() {
            return false;
        }
        let probe = sqlx::query("SELECT 1").execute(&self.pool);
        match tokio::time::timeout(self.probe_timeout, probe).await {
            Ok(Ok(_)) => true,
            Ok(Err(error)) => {
                log::warn!("Document store probe failed: {}", error);
                false
            }
            Err(_) => {
                log::warn!("Document store probe timed out after {:?}", self.probe_timeout);
                false
            }
        }
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Res<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, fields)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id)
            DO UPDATE SET fields = EXCLUDED.fields, updated_at = NOW()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(fields))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create(&self, collection: &str, id: &str, fields: Fields) -> Res<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, fields)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO NOTHING
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(fields))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, collection: &str, id: &str) -> Res<Option<Fields>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, fields FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.fields.0))
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Res<()> {
        let result = sqlx::query(
            r#"
            UPDATE documents SET fields = fields || $3, updated_at = NOW()
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(fields))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{}/{}", collection, id)));
        }
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
        let result = sqlx::query(
            r#"
            UPDATE documents SET fields = fields || $5, updated_at = NOW()
            WHERE collection = $1 AND id = $2 AND COALESCE(fields -> $3, $4) = $4
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(field)
        .bind(Json(expected.clone()))
        .bind(Json(fields))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    fn query<'a>(
        &'a self,
        collection: &'a str,
        field: &'a str,
        value: &'a Value,
    ) -> BoxStream<'a, Res<Document>> {
        sqlx::query_as::<_, DocumentRow>(
            "SELECT id, fields FROM documents WHERE collection = $1 AND fields -> $2 = $3 ORDER BY id",
        )
        .bind(collection)
        .bind(field)
        .bind(Json(value.clone()))
        .fetch(&self.pool)
        .map(|row| row.map(Document::from).map_err(AppError::from))
        .boxed()
    }

    fn stream_all<'a>(&'a self, collection: &'a str) -> BoxStream<'a, Res<Document>> {
        sqlx::query_as::<_, DocumentRow>(
            "SELECT id, fields FROM documents WHERE collection = $1 ORDER BY id",
        )
        .bind(collection)
        .fetch(&self.pool)
        .map(|row| row.map(Document::from).map_err(AppError::from))
        .boxed()
    }
}
