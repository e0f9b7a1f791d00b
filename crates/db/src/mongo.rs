//! MongoDB backend.

use std::sync::Arc;

use async_trait::async_trait;
use bookshelf_kernel::settings::DatabaseSettings;
use futures_util::TryStreamExt;
use mongodb::bson::{self, doc, Bson};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Database, IndexModel};
use serde_json::Value;

use crate::{Collection, Document, DocumentStore, Filter, RecordId, StoreError, UpdateOutcome, ID_FIELD};

/// Server error code for a unique index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Store backed by one MongoDB database.
#[derive(Clone)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    /// Create a client for `settings.uri`. The driver connects lazily; call
    /// [`DocumentStore::ping`] to verify the server is reachable.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        tracing::info!(target: "bookshelf-db", database = %settings.database, "connecting to MongoDB");
        let client = Client::with_uri_str(&settings.uri).await?;
        Ok(Self {
            database: client.database(&settings.database),
        })
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        Arc::new(MongoCollection {
            inner: self.database.collection::<bson::Document>(name),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

/// A MongoDB collection of untyped documents.
pub struct MongoCollection {
    inner: mongodb::Collection<bson::Document>,
}

fn filter_to_bson(filter: &Filter) -> Result<bson::Document, StoreError> {
    let mut out = bson::Document::new();
    match filter {
        Filter::Id(id) => {
            out.insert(ID_FIELD, id.object_id());
        }
        Filter::Eq { field, value } => {
            let value = bson::to_bson(value).map_err(|e| StoreError::InvalidDocument(e.to_string()))?;
            out.insert(field.clone(), value);
        }
    }
    Ok(out)
}

fn document_to_bson(document: &Document) -> Result<bson::Document, StoreError> {
    bson::to_document(document).map_err(|e| StoreError::InvalidDocument(e.to_string()))
}

/// Convert a stored document to JSON, rendering `_id` in its string form.
pub(crate) fn document_from_bson(mut raw: bson::Document) -> Result<Document, StoreError> {
    let id = match raw.remove(ID_FIELD) {
        Some(Bson::ObjectId(oid)) => RecordId::from(oid),
        Some(other) => {
            return Err(StoreError::Decode(format!(
                "unexpected {} type {:?}",
                ID_FIELD,
                other.element_type()
            )))
        }
        None => return Err(StoreError::Decode(format!("missing {}", ID_FIELD))),
    };

    let Value::Object(mut document) = Bson::Document(raw).into_relaxed_extjson() else {
        return Err(StoreError::Decode("document is not an object".to_string()));
    };
    document.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    Ok(document)
}

/// Surface unique index violations as [`StoreError::DuplicateKey`].
fn classify_write_error(err: mongodb::error::Error) -> StoreError {
    if let ErrorKind::Write(WriteFailure::WriteError(write_error)) = err.kind.as_ref() {
        if write_error.code == DUPLICATE_KEY_CODE {
            return StoreError::DuplicateKey(write_error.message.clone());
        }
    }
    StoreError::Backend(err)
}

#[async_trait]
impl Collection for MongoCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, StoreError> {
        self.inner
            .find_one(filter_to_bson(filter)?)
            .await?
            .map(document_from_bson)
            .transpose()
    }

    async fn find(&self, limit: usize) -> Result<Vec<Document>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let cursor = self.inner.find(doc! {}).limit(limit).await?;
        let raw: Vec<bson::Document> = cursor.try_collect().await?;
        raw.into_iter().map(document_from_bson).collect()
    }

    async fn insert_one(&self, document: Document) -> Result<RecordId, StoreError> {
        if document.contains_key(ID_FIELD) {
            return Err(StoreError::InvalidDocument(format!(
                "'{}' is assigned by the store",
                ID_FIELD
            )));
        }

        let result = self
            .inner
            .insert_one(document_to_bson(&document)?)
            .await
            .map_err(classify_write_error)?;

        match result.inserted_id {
            Bson::ObjectId(oid) => Ok(oid.into()),
            other => Err(StoreError::Decode(format!(
                "unexpected inserted id type {:?}",
                other.element_type()
            ))),
        }
    }

    async fn update_one(
        &self,
        filter: &Filter,
        changes: Document,
    ) -> Result<UpdateOutcome, StoreError> {
        if changes.contains_key(ID_FIELD) {
            return Err(StoreError::InvalidDocument(format!(
                "'{}' is immutable",
                ID_FIELD
            )));
        }

        let set = document_to_bson(&changes)?;
        let result = self
            .inner
            .update_one(filter_to_bson(filter)?, doc! { "$set": set })
            .await
            .map_err(classify_write_error)?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_one(&self, filter: &Filter) -> Result<u64, StoreError> {
        let result = self.inner.delete_one(filter_to_bson(filter)?).await?;
        Ok(result.deleted_count)
    }

    async fn ensure_unique(&self, field: &str) -> Result<(), StoreError> {
        let mut keys = bson::Document::new();
        keys.insert(field, 1);

        let index = IndexModel::builder()
            .keys(keys)
            .options(
                IndexOptions::builder()
                    .name(format!("{}_unique", field))
                    .unique(true)
                    .build(),
            )
            .build();

        self.inner
            .create_index(index)
            .await
            .map_err(classify_write_error)?;
        tracing::info!(
            target: "bookshelf-db",
            collection = self.inner.name(),
            field,
            "unique index ensured"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;
    use serde_json::json;

    #[test]
    fn stored_document_exposes_string_id() {
        let oid = ObjectId::new();
        let raw = doc! { "_id": oid, "title": "Dune", "author": "Herbert" };

        let document = document_from_bson(raw).unwrap();
        assert_eq!(document["_id"], json!(oid.to_hex()));
        assert_eq!(document["title"], json!("Dune"));
        assert_eq!(document["author"], json!("Herbert"));
    }

    #[test]
    fn stored_document_without_object_id_is_rejected() {
        assert!(matches!(
            document_from_bson(doc! { "title": "Dune" }),
            Err(StoreError::Decode(_))
        ));
        assert!(matches!(
            document_from_bson(doc! { "_id": "plain", "title": "Dune" }),
            Err(StoreError::Decode(_))
        ));
    }

    #[test]
    fn filters_translate_to_queries() {
        let id: RecordId = "65f0c0ffee65f0c0ffee65f0".parse().unwrap();
        assert_eq!(
            filter_to_bson(&Filter::id(id)).unwrap(),
            doc! { "_id": ObjectId::parse_str("65f0c0ffee65f0c0ffee65f0").unwrap() }
        );
        assert_eq!(
            filter_to_bson(&Filter::eq("title", "Dune")).unwrap(),
            doc! { "title": "Dune" }
        );
    }
}
