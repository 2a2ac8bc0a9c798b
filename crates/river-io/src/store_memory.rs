use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use river_core::Result;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::sink_document::{key_filter, DocumentStore};

#[derive(Debug, Default)]
struct Collection {
    documents: Vec<Document>,
    geo_indexes: Vec<String>,
}

/// Document store kept in process memory.
///
/// Follows MongoDB's upsert semantics closely enough for dry runs and tests:
/// `$set` overwrites the listed fields and keeps the others, and an upsert that
/// matches nothing inserts the filter fields plus the set fields. Clones share
/// the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored documents in insertion order.
    pub async fn documents(&self) -> Vec<Document> {
        self.inner.lock().await.documents.clone()
    }

    pub async fn geo_indexes(&self) -> Vec<String> {
        self.inner.lock().await.geo_indexes.clone()
    }
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(field, value)| document.get(field).unwrap_or(&Bson::Null) == value)
}

fn apply_upsert(collection: &mut Collection, filter: Document, set: Document) {
    match collection
        .documents
        .iter_mut()
        .find(|doc| matches(doc, &filter))
    {
        Some(existing) => {
            for (field, value) in set {
                existing.insert(field, value);
            }
        }
        None => {
            let mut inserted = filter;
            for (field, value) in set {
                inserted.insert(field, value);
            }
            collection.documents.push(inserted);
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn ensure_geo_index(&mut self, field: &str) -> Result<()> {
        let mut collection = self.inner.lock().await;
        if !collection.geo_indexes.iter().any(|f| f == field) {
            collection.geo_indexes.push(field.to_string());
        }
        Ok(())
    }

    async fn upsert_one(&mut self, key: &str, document: Document) -> Result<()> {
        let filter = key_filter(key, &document);
        apply_upsert(&mut *self.inner.lock().await, filter, document);
        Ok(())
    }

    async fn bulk_upsert(&mut self, key: &str, documents: Vec<Document>) -> Result<()> {
        let mut collection = self.inner.lock().await;
        for document in documents {
            let filter = key_filter(key, &document);
            apply_upsert(&mut collection, filter, document);
        }
        Ok(())
    }
}
