//! JSON file document store
//!
//! One pretty-printed JSON file per document, laid out as
//! `<base_dir>/<collection>/<id>.json`.

use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{matches, Document, DocumentId, DocumentStore, Filter, StoreError};

/// Document store backed by a directory tree
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    base_dir: PathBuf,
}

impl JsonFileStore {
    /// Open (and create if needed) a store rooted at `base_dir`
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(|source| StoreError::Io {
            path: base_dir.clone(),
            source,
        })?;
        debug!("Opened file store at {}", base_dir.display());
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.base_dir.join(collection)
    }

    fn document_path(&self, collection: &str, id: &DocumentId) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{}.json", id.as_str()))
    }

    /// Write via a temp file so readers never see a half-written document
    fn write(&self, collection: &str, id: &DocumentId, document: &Value) -> Result<(), StoreError> {
        let dir = self.collection_dir(collection);
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let path = self.document_path(collection, id);
        let tmp = dir.join(format!(".{}.json.tmp", id.as_str()));
        let file = File::create(&tmp).map_err(io_error(&tmp))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, document).map_err(|source| {
            StoreError::Encode {
                collection: collection.to_string(),
                source,
            }
        })?;
        writer.flush().map_err(io_error(&tmp))?;
        drop(writer);
        fs::rename(&tmp, &path).map_err(io_error(&path))?;

        debug!("Wrote {}", path.display());
        Ok(())
    }

    fn read(&self, collection: &str, id: &DocumentId) -> Result<Option<Value>, StoreError> {
        let path = self.document_path(collection, id);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        let value = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            StoreError::Malformed {
                collection: collection.to_string(),
                id: id.clone(),
                source,
            }
        })?;
        Ok(Some(value))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError {
    let path = path.to_path_buf();
    move |source| StoreError::Io { path, source }
}

impl DocumentStore for JsonFileStore {
    fn insert(&self, collection: &str, document: Value) -> Result<DocumentId, StoreError> {
        let id = DocumentId::generate();
        self.write(collection, &id, &document)?;
        Ok(id)
    }

    fn replace(
        &self,
        collection: &str,
        id: &DocumentId,
        document: Value,
    ) -> Result<(), StoreError> {
        if !self.document_path(collection, id).exists() {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.clone(),
            });
        }
        self.write(collection, id, &document)
    }

    fn find_one(&self, collection: &str, id: &DocumentId) -> Result<Option<Value>, StoreError> {
        self.read(collection, id)
    }

    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let dir = self.collection_dir(collection);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path: dir, source }),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    ids.push(DocumentId::new(stem));
                }
            }
        }
        // ids from one process sort in creation order
        ids.sort();

        let mut documents = Vec::new();
        for id in ids {
            if let Some(body) = self.read(collection, &id)? {
                if matches(filter, &body) {
                    documents.push(Document { id, body });
                }
            }
        }
        Ok(documents)
    }
}
