//! In-memory document store
//!
//! Keeps documents per collection in insertion order and records every
//! write, which is what the reporting tests assert against.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{matches, Document, DocumentId, DocumentStore, Filter, StoreError};

/// Kind of write applied to the store
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpKind {
    Insert,
    Replace,
}

/// One recorded write
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreOp {
    pub kind: OpKind,
    pub collection: String,
    pub id: DocumentId,
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<String, Vec<Document>>,
    operations: Vec<StoreOp>,
    unavailable: bool,
}

/// Document store held entirely in process memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with [`StoreError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.unavailable = unavailable;
        }
    }

    /// Writes applied so far, in order
    pub fn operations(&self) -> Vec<StoreOp> {
        self.state
            .lock()
            .map(|state| state.operations.clone())
            .unwrap_or_default()
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> usize {
        self.state
            .lock()
            .map(|state| state.collections.get(collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Bodies of every document in a collection, in insertion order
    pub fn documents(&self, collection: &str) -> Vec<Value> {
        self.state
            .lock()
            .map(|state| {
                state
                    .collections
                    .get(collection)
                    .map(|docs| docs.iter().map(|d| d.body.clone()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }

    fn writable(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        let state = self.lock()?;
        if state.unavailable {
            return Err(StoreError::Unavailable(
                "in-memory store refuses writes".to_string(),
            ));
        }
        Ok(state)
    }
}

impl DocumentStore for InMemoryStore {
    fn insert(&self, collection: &str, document: Value) -> Result<DocumentId, StoreError> {
        let mut state = self.writable()?;
        let id = DocumentId::generate();
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(Document {
                id: id.clone(),
                body: document,
            });
        state.operations.push(StoreOp {
            kind: OpKind::Insert,
            collection: collection.to_string(),
            id: id.clone(),
        });
        Ok(id)
    }

    fn replace(
        &self,
        collection: &str,
        id: &DocumentId,
        document: Value,
    ) -> Result<(), StoreError> {
        let mut state = self.writable()?;
        let slot = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| &d.id == id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.clone(),
            })?;
        slot.body = document;
        state.operations.push(StoreOp {
            kind: OpKind::Replace,
            collection: collection.to_string(),
            id: id.clone(),
        });
        Ok(())
    }

    fn find_one(&self, collection: &str, id: &DocumentId) -> Result<Option<Value>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| &d.id == id))
            .map(|d| d.body.clone()))
    }

    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| matches(filter, &d.body))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
