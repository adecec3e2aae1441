//! Store used when reporting is disabled

use serde_json::Value;
use tracing::warn;

use super::{Document, DocumentId, DocumentStore, Filter, StoreError};

/// Accepts every write and keeps nothing
#[derive(Debug)]
pub struct DiscardStore;

impl DiscardStore {
    pub fn new() -> Self {
        warn!("No document store configured, test results will not be saved");
        Self
    }
}

impl Default for DiscardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for DiscardStore {
    fn insert(&self, _collection: &str, _document: Value) -> Result<DocumentId, StoreError> {
        Ok(DocumentId::generate())
    }

    fn replace(
        &self,
        _collection: &str,
        _id: &DocumentId,
        _document: Value,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    fn find_one(&self, _collection: &str, _id: &DocumentId) -> Result<Option<Value>, StoreError> {
        Ok(None)
    }

    fn find(&self, _collection: &str, _filter: &Filter) -> Result<Vec<Document>, StoreError> {
        Ok(Vec::new())
    }

    fn keeps_documents(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_discard_store_accepts_writes() {
        let store = DiscardStore::new();
        let id = store.insert("test_run", json!({"a": 1})).unwrap();
        store.replace("test_run", &id, json!({"a": 2})).unwrap();
        assert_eq!(store.find_one("test_run", &id).unwrap(), None);
        assert!(store.find("test_run", &Filter::new()).unwrap().is_empty());
        assert!(!store.keeps_documents());
    }
}
