//! Document store adapters
//!
//! The reporting core only needs insert-returns-id and replace-by-id
//! semantics from its store; any document database can sit behind
//! [`DocumentStore`].

mod file;
mod memory;
mod null;

pub use file::JsonFileStore;
pub use memory::{InMemoryStore, OpKind, StoreOp};
pub use null::DiscardStore;

use chrono::Utc;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};

/// Collection holding run documents
pub const RUN_COLLECTION: &str = "test_run";

/// Collection holding per-test result documents
pub const RESULT_COLLECTION: &str = "test_result";

/// Store-assigned document identity
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new id: 8 hex digits of epoch seconds, 10 of a random
    /// per-process value, then 6 of a per-process counter.
    ///
    /// Ids generated by one process sort in creation order.
    pub fn generate() -> Self {
        static PROCESS: OnceLock<u64> = OnceLock::new();
        static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

        let process = *PROCESS.get_or_init(|| rand::random::<u64>() & 0xff_ffff_ffff);
        let counter = COUNTER
            .get_or_init(|| AtomicU32::new(rand::random::<u32>() & 0x7f_ffff))
            .fetch_add(1, Ordering::Relaxed)
            & 0xff_ffff;
        let seconds = Utc::now().timestamp().max(0) as u32;
        Self(format!("{seconds:08x}{process:010x}{counter:06x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode document for {collection}: {source}")]
    Encode {
        collection: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed document {id} in {collection}: {source}")]
    Malformed {
        collection: String,
        id: DocumentId,
        #[source]
        source: serde_json::Error,
    },

    #[error("Document {id} not found in collection {collection}")]
    NotFound { collection: String, id: DocumentId },

    #[error("Document store unavailable: {0}")]
    Unavailable(String),
}

/// Top-level field equality filter
pub type Filter = serde_json::Map<String, Value>;

/// Whether every field in `filter` equals the same field in `document`
pub fn matches(filter: &Filter, document: &Value) -> bool {
    filter
        .iter()
        .all(|(key, expected)| document.get(key) == Some(expected))
}

/// A stored document with its identity
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub body: Value,
}

/// Minimal key-by-id collection store
pub trait DocumentStore: Send + Sync {
    /// Insert a new document and return its assigned id
    fn insert(&self, collection: &str, document: Value) -> Result<DocumentId, StoreError>;

    /// Replace the whole document stored under `id`
    fn replace(&self, collection: &str, id: &DocumentId, document: Value)
        -> Result<(), StoreError>;

    fn find_one(&self, collection: &str, id: &DocumentId) -> Result<Option<Value>, StoreError>;

    /// All documents matching `filter` in id order. Documents inserted by one
    /// process come oldest first; across processes only the second is ordered.
    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    /// Whether written documents can be read back.
    ///
    /// A store that keeps nothing can not confirm that an external run exists.
    fn keeps_documents(&self) -> bool {
        true
    }
}

impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn insert(&self, collection: &str, document: Value) -> Result<DocumentId, StoreError> {
        (**self).insert(collection, document)
    }

    fn replace(
        &self,
        collection: &str,
        id: &DocumentId,
        document: Value,
    ) -> Result<(), StoreError> {
        (**self).replace(collection, id, document)
    }

    fn find_one(&self, collection: &str, id: &DocumentId) -> Result<Option<Value>, StoreError> {
        (**self).find_one(collection, id)
    }

    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        (**self).find(collection, filter)
    }

    fn keeps_documents(&self) -> bool {
        (**self).keeps_documents()
    }
}

/// Persistence state of a locally held document
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Persisted {
    #[default]
    Unsaved,
    Saved(DocumentId),
}

impl Persisted {
    pub fn id(&self) -> Option<&DocumentId> {
        match self {
            Persisted::Unsaved => None,
            Persisted::Saved(id) => Some(id),
        }
    }

    /// Insert on first write, replace by id afterwards
    pub fn upsert<S: DocumentStore + ?Sized>(
        &mut self,
        store: &S,
        collection: &str,
        document: Value,
    ) -> Result<DocumentId, StoreError> {
        match self {
            Persisted::Unsaved => {
                let id = store.insert(collection, document)?;
                *self = Persisted::Saved(id.clone());
                Ok(id)
            }
            Persisted::Saved(id) => {
                store.replace(collection, id, document)?;
                Ok(id.clone())
            }
        }
    }
}

/// Serialize a record into a store document
pub fn to_document<T: Serialize>(collection: &str, record: &T) -> Result<Value, StoreError> {
    serde_json::to_value(record).map_err(|source| StoreError::Encode {
        collection: collection.to_string(),
        source,
    })
}

/// Deserialize a stored document into a record
pub fn from_document<T: DeserializeOwned>(
    collection: &str,
    document: Document,
) -> Result<(DocumentId, T), StoreError> {
    let Document { id, body } = document;
    match serde_json::from_value(body) {
        Ok(record) => Ok((id, record)),
        Err(source) => Err(StoreError::Malformed {
            collection: collection.to_string(),
            id,
            source,
        }),
    }
}

/// Open the store described by `config`
pub fn open(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    let store: Arc<dyn DocumentStore> = match config.backend {
        StoreBackend::File => Arc::new(JsonFileStore::open(config.resolved_path())?),
        StoreBackend::Memory => Arc::new(InMemoryStore::new()),
        StoreBackend::Disabled => Arc::new(DiscardStore::new()),
    };
    Ok(store)
}
