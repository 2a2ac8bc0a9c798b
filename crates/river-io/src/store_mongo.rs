use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::{Client, Collection, Database, IndexModel};
use river_core::{MongoSinkSpec, PipelineError, Result};
use tracing::{debug, info};

use crate::sink_document::{key_filter, DocumentStore};

struct Handle {
    database: Database,
    collection: Collection<Document>,
}

/// MongoDB collection addressed by a [`MongoSinkSpec`].
///
/// The client is created lazily by [`DocumentStore::connect`] and lives as long as the store.
pub struct MongoStore {
    uri: String,
    database: String,
    collection: String,
    handle: Option<Handle>,
}

impl MongoStore {
    pub fn new(spec: &MongoSinkSpec) -> Self {
        Self {
            uri: spec.uri.clone(),
            database: spec.database.clone(),
            collection: spec.collection.clone(),
            handle: None,
        }
    }

    fn handle(&self) -> Result<&Handle> {
        self.handle.as_ref().ok_or_else(|| {
            PipelineError::DatabaseConnection(format!(
                "not connected to {}.{}",
                self.database, self.collection
            ))
        })
    }
}

fn write_error(e: mongodb::error::Error) -> PipelineError {
    PipelineError::DatabaseWrite(e.to_string())
}

/// A raw `update` reply reports per-statement and write concern failures in its
/// body while still answering `ok: 1`.
fn check_write_reply(reply: &Document) -> Result<()> {
    if let Ok(errors) = reply.get_array("writeErrors") {
        if let Some(Bson::Document(first)) = errors.first() {
            let message = first.get_str("errmsg").unwrap_or("unknown write error");
            return Err(PipelineError::DatabaseWrite(format!(
                "bulk upsert rejected {} operation(s): {message}",
                errors.len()
            )));
        }
    }
    if let Ok(concern) = reply.get_document("writeConcernError") {
        let message = concern.get_str("errmsg").unwrap_or("unknown write concern error");
        return Err(PipelineError::DatabaseWrite(format!(
            "bulk upsert not acknowledged by the write concern: {message}"
        )));
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn connect(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        if self.uri.trim().is_empty() {
            return Err(PipelineError::DatabaseConnection(
                "no database URI configured (set MONGO_URI)".to_string(),
            ));
        }

        let client = Client::with_uri_str(&self.uri)
            .await
            .map_err(|e| PipelineError::DatabaseConnection(e.to_string()))?;
        let database = client.database(&self.database);

        // The driver connects lazily; ping so an unreachable server surfaces here.
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| PipelineError::DatabaseConnection(e.to_string()))?;

        info!(database = %self.database, collection = %self.collection, "connected to MongoDB");
        let collection = database.collection::<Document>(&self.collection);
        self.handle = Some(Handle {
            database,
            collection,
        });
        Ok(())
    }

    async fn ensure_geo_index(&mut self, field: &str) -> Result<()> {
        let mut keys = Document::new();
        keys.insert(field, "2dsphere");
        let index = IndexModel::builder().keys(keys).build();
        let created = self
            .handle()?
            .collection
            .create_index(index)
            .await
            .map_err(write_error)?;
        debug!(index = %created.index_name, "create_index acknowledged");
        Ok(())
    }

    async fn upsert_one(&mut self, key: &str, document: Document) -> Result<()> {
        let filter = key_filter(key, &document);
        self.handle()?
            .collection
            .update_one(filter, doc! { "$set": document })
            .upsert(true)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    async fn bulk_upsert(&mut self, key: &str, documents: Vec<Document>) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let handle = self.handle()?;
        let updates: Vec<Document> = documents
            .into_iter()
            .map(|document| {
                doc! {
                    "q": key_filter(key, &document),
                    "u": { "$set": document },
                    "upsert": true,
                }
            })
            .collect();
        let command = doc! {
            "update": handle.collection.name(),
            "updates": updates,
            "ordered": true,
        };

        let response = handle
            .database
            .run_command(command)
            .await
            .map_err(write_error)?;
        check_write_reply(&response)?;
        debug!(matched = response.get_i32("n").unwrap_or_default(), "bulk upsert acknowledged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_reply_is_accepted() {
        assert!(check_write_reply(&doc! { "ok": 1, "n": 2, "nModified": 1 }).is_ok());
    }

    #[test]
    fn write_errors_fail_the_bulk_upsert() {
        let reply = doc! {
            "ok": 1,
            "n": 1,
            "writeErrors": [{ "index": 1, "code": 11000, "errmsg": "E11000 duplicate key" }],
        };
        let err = check_write_reply(&reply).unwrap_err();
        assert!(matches!(err, PipelineError::DatabaseWrite(msg) if msg.contains("E11000")));
    }

    #[test]
    fn write_concern_error_fails_the_bulk_upsert() {
        let reply = doc! {
            "ok": 1,
            "n": 2,
            "writeConcernError": { "code": 64, "errmsg": "waiting for replication timed out" },
        };
        let err = check_write_reply(&reply).unwrap_err();
        assert!(
            matches!(err, PipelineError::DatabaseWrite(msg) if msg.contains("replication timed out"))
        );
    }

    #[tokio::test]
    async fn empty_bulk_upsert_needs_no_connection() {
        let spec = river_core::MongoSinkSpec {
            id: "mongo".into(),
            uri: String::new(),
            database: "river_db".into(),
            collection: "gov_schemes".into(),
            key: "Scheme Name".into(),
            geo_index: None,
            write_mode: river_core::WriteMode::Bulk,
        };
        let mut store = MongoStore::new(&spec);
        assert!(store.bulk_upsert("Scheme Name", Vec::new()).await.is_ok());
    }
}
