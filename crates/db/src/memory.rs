//! Process-local document store.
//!
//! Mirrors the MongoDB semantics the service depends on: insertion order is
//! store order, `update_one` distinguishes matched from modified, and
//! unique fields are enforced on insert and update.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{Collection, Document, DocumentStore, Filter, RecordId, StoreError, UpdateOutcome, ID_FIELD};

#[derive(Default)]
struct Records {
    rows: Vec<(RecordId, Document)>,
    unique: BTreeSet<String>,
}

impl Records {
    /// First unique field on which `candidate` collides with a row other than `skip`.
    fn conflicting_field(&self, candidate: &Document, skip: Option<&RecordId>) -> Option<&str> {
        self.unique.iter().map(String::as_str).find(|field| {
            let Some(value) = candidate.get(*field) else {
                return false;
            };
            self.rows
                .iter()
                .filter(|(id, _)| Some(id) != skip)
                .any(|(_, row)| row.get(*field) == Some(value))
        })
    }
}

fn with_id(id: &RecordId, document: &Document) -> Document {
    let mut out = document.clone();
    out.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    out
}

fn duplicate(field: &str, document: &Document) -> StoreError {
    let value = document.get(field).cloned().unwrap_or(Value::Null);
    StoreError::DuplicateKey(format!("{} already holds {}", field, value))
}

/// A collection kept in memory behind an async lock.
pub struct MemoryCollection {
    name: String,
    records: RwLock<Records>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: RwLock::new(Records::default()),
        }
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .rows
            .iter()
            .find(|(id, row)| filter.matches(id, row))
            .map(|(id, row)| with_id(id, row)))
    }

    async fn find(&self, limit: usize) -> Result<Vec<Document>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .rows
            .iter()
            .take(limit)
            .map(|(id, row)| with_id(id, row))
            .collect())
    }

    async fn insert_one(&self, document: Document) -> Result<RecordId, StoreError> {
        if document.contains_key(ID_FIELD) {
            return Err(StoreError::InvalidDocument(format!(
                "'{}' is assigned by the store",
                ID_FIELD
            )));
        }

        let mut records = self.records.write().await;
        if let Some(field) = records.conflicting_field(&document, None) {
            return Err(duplicate(field, &document));
        }

        let id = RecordId::generate();
        records.rows.push((id, document));
        Ok(id)
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

        let mut records = self.records.write().await;
        let Some(index) = records.rows.iter().position(|(id, row)| filter.matches(id, row)) else {
            return Ok(UpdateOutcome::default());
        };

        let (id, current) = &records.rows[index];
        let mut updated = current.clone();
        updated.extend(changes);

        if updated == *current {
            return Ok(UpdateOutcome {
                matched: 1,
                modified: 0,
            });
        }

        if let Some(field) = records.conflicting_field(&updated, Some(id)) {
            return Err(duplicate(field, &updated));
        }

        records.rows[index].1 = updated;
        Ok(UpdateOutcome {
            matched: 1,
            modified: 1,
        })
    }

    async fn delete_one(&self, filter: &Filter) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        match records.rows.iter().position(|(id, row)| filter.matches(id, row)) {
            Some(index) => {
                records.rows.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn ensure_unique(&self, field: &str) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.unique.contains(field) {
            return Ok(());
        }

        let mut seen = Vec::new();
        for (_, row) in &records.rows {
            if let Some(value) = row.get(field) {
                if seen.contains(&value) {
                    return Err(duplicate(field, row));
                }
                seen.push(value);
            }
        }

        records.unique.insert(field.to_string());
        Ok(())
    }
}

/// Store handing out [`MemoryCollection`]s by name.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Arc<MemoryCollection>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        let mut collections = self
            .collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new(name)))
            .clone()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
