use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use river_core::{Frame, MongoSinkSpec, Operator, PipelineError, Result, Sink, WriteMode};
use tracing::{debug, info, warn};

use crate::document::frame_to_documents;

/// A collection that can be upserted into by natural key.
///
/// `connect` is called once, after the frame has been produced, so that input
/// errors are reported before any connection attempt.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Establish the connection. Calling it again is a no-op.
    async fn connect(&mut self) -> Result<()>;

    /// Create a `2dsphere` index on `field` unless one already exists.
    async fn ensure_geo_index(&mut self, field: &str) -> Result<()>;

    /// `$set` every field of `document` on the record whose `key` matches, inserting if none does.
    async fn upsert_one(&mut self, key: &str, document: Document) -> Result<()>;

    /// The same upsert for every document, submitted as one ordered bulk request.
    ///
    /// Succeeds only if every statement was applied and acknowledged.
    async fn bulk_upsert(&mut self, key: &str, documents: Vec<Document>) -> Result<()>;
}

/// Filter selecting the document that shares `document`'s natural key.
///
/// A record without the key field matches documents whose key is null.
pub fn key_filter(key: &str, document: &Document) -> Document {
    let mut filter = Document::new();
    filter.insert(key, document.get(key).cloned().unwrap_or(Bson::Null));
    filter
}

/// Upserts every row of a frame into a [`DocumentStore`].
pub struct DocumentSink<S> {
    id: String,
    key: String,
    geo_index: Option<String>,
    write_mode: WriteMode,
    store: S,
}

impl<S: DocumentStore> DocumentSink<S> {
    pub fn new(spec: &MongoSinkSpec, store: S) -> Self {
        Self {
            id: spec.id.clone(),
            key: spec.key.clone(),
            geo_index: spec.geo_index.clone(),
            write_mode: spec.write_mode,
            store,
        }
    }

    async fn write_each(&mut self, documents: Vec<Document>) -> Result<usize> {
        let total = documents.len();
        for (written, document) in documents.into_iter().enumerate() {
            if let Err(e) = self.store.upsert_one(&self.key, document).await {
                if written > 0 {
                    warn!(sink = %self.id, written, total, "upsert loop stopped part-way");
                }
                return Err(PipelineError::DatabaseWrite(format!(
                    "{e} ({written} of {total} records were written before the failure)"
                )));
            }
        }
        Ok(total)
    }
}

impl<S: DocumentStore> Operator for DocumentSink<S> {
    fn name(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl<S: DocumentStore> Sink for DocumentSink<S> {
    async fn write(&mut self, frame: Frame) -> Result<usize> {
        let documents = frame_to_documents(&frame)?;
        debug!(sink = %self.id, documents = documents.len(), "converted frame");

        self.store.connect().await?;

        if let Some(field) = &self.geo_index {
            self.store.ensure_geo_index(field).await?;
            info!(sink = %self.id, field = %field, "2dsphere index ensured");
        }

        match self.write_mode {
            WriteMode::PerRecord => self.write_each(documents).await,
            WriteMode::Bulk => {
                let total = documents.len();
                self.store.bulk_upsert(&self.key, documents).await?;
                Ok(total)
            }
        }
    }
}
