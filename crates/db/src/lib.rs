//! Document store plumbing for bookshelf.
//!
//! Collections hold schema-flexible JSON documents addressed by filters.
//! Every stored document carries its identifier under [`ID_FIELD`] in
//! string form; callers never choose it.

use std::sync::Arc;

use async_trait::async_trait;
use bookshelf_kernel::settings::{DatabaseSettings, StoreBackend};
use serde_json::Value;

pub mod error;
pub mod id;
pub mod memory;
pub mod mongo;

pub use error::StoreError;
pub use id::{IdError, RecordId};
pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Field holding the store-assigned identifier.
pub const ID_FIELD: &str = "_id";

/// A schema-flexible record.
pub type Document = serde_json::Map<String, Value>;

/// Selects the documents an operation applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Match the document with this identifier.
    Id(RecordId),
    /// Match documents whose `field` equals `value`.
    Eq { field: String, value: Value },
}

impl Filter {
    pub fn id(id: RecordId) -> Self {
        Filter::Id(id)
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether the document stored under `id` satisfies this filter.
    pub fn matches(&self, id: &RecordId, document: &Document) -> bool {
        match self {
            Filter::Id(wanted) => wanted == id,
            Filter::Eq { field, value } => document.get(field) == Some(value),
        }
    }
}

/// Result of an `update_one` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    /// Documents that satisfied the filter (0 or 1).
    pub matched: u64,
    /// Documents whose stored values actually changed.
    pub modified: u64,
}

/// A named collection of documents.
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// First document matching `filter`, with [`ID_FIELD`] populated.
    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, StoreError>;

    /// Up to `limit` documents in store order.
    async fn find(&self, limit: usize) -> Result<Vec<Document>, StoreError>;

    /// Insert a document and return the identifier assigned to it.
    async fn insert_one(&self, document: Document) -> Result<RecordId, StoreError>;

    /// Set the fields of `changes` on the first document matching `filter`.
    async fn update_one(
        &self,
        filter: &Filter,
        changes: Document,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Remove the first document matching `filter`, returning how many were removed.
    async fn delete_one(&self, filter: &Filter) -> Result<u64, StoreError>;

    /// Reject future writes that would give two documents the same `field` value.
    async fn ensure_unique(&self, field: &str) -> Result<(), StoreError>;
}

/// Entry point to a database holding several collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Handle to the named collection; collections are created lazily.
    fn collection(&self, name: &str) -> Arc<dyn Collection>;

    /// Round-trip to the backend to confirm it is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Build the store selected in the database settings.
pub async fn connect(settings: &DatabaseSettings) -> Result<Arc<dyn DocumentStore>, StoreError> {
    let store: Arc<dyn DocumentStore> = match settings.backend {
        StoreBackend::Memory => {
            tracing::warn!(target: "bookshelf-db", "using in-memory store; data is not persisted");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Mongo => Arc::new(MongoStore::connect(settings).await?),
    };

    store.ping().await?;
    tracing::info!(
        target: "bookshelf-db",
        backend = ?settings.backend,
        database = %settings.database,
        "document store ready"
    );

    Ok(store)
}
