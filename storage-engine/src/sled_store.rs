use bytes::Bytes;
use results_cache::{BlobReader, BlobStore, BlobWriter};
use shared::BlobStoreError;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

const DEFAULT_TREE: &[u8] = b"__sled__default";

fn backend(context: &'static str) -> impl Fn(sled::Error) -> BlobStoreError {
    move |e| BlobStoreError::Backend(format!("{}: {}", context, e))
}

fn id_from_key(key: &[u8]) -> Result<String, BlobStoreError> {
    String::from_utf8(key.to_vec())
        .map_err(|e| BlobStoreError::Backend(format!("Stored id is not utf-8: {}", e)))
}

/// Sled-based blob store, one tree per attribute.
///
/// Writes land in the trees immediately; `commit` flushes them to disk.
pub struct SledBlobStore {
    db: sled::Db,
}

impl SledBlobStore {
    /// Open (or create) a store at `path`, creating the parent directory if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BlobStoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = sled::open(path).map_err(backend("Failed to open Sled database"))?;
        Ok(Self { db })
    }

    /// A store that lives only as long as the handle
    pub fn temporary() -> Result<Self, BlobStoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(backend("Failed to open temporary Sled database"))?;
        Ok(Self { db })
    }

    fn tree(&self, attr: &str) -> Result<sled::Tree, BlobStoreError> {
        self.db
            .open_tree(attr)
            .map_err(backend("Failed to open attribute tree"))
    }

    // Reads must not create trees, so an attribute never written has no tree
    fn existing_tree(&self, attr: &str) -> Result<Option<sled::Tree>, BlobStoreError> {
        let exists = self
            .db
            .tree_names()
            .iter()
            .any(|name| &name[..] == attr.as_bytes());

        if exists { self.tree(attr).map(Some) } else { Ok(None) }
    }

    fn attribute_trees(&self) -> Result<Vec<sled::Tree>, BlobStoreError> {
        self.db
            .tree_names()
            .into_iter()
            .filter(|name| &name[..] != DEFAULT_TREE)
            .map(|name| {
                self.db
                    .open_tree(name)
                    .map_err(backend("Failed to open attribute tree"))
            })
            .collect()
    }
}

impl BlobReader for SledBlobStore {
    fn get(&self, id: &str, attr: &str) -> Result<Option<Bytes>, BlobStoreError> {
        let Some(tree) = self.existing_tree(attr)? else {
            return Ok(None);
        };
        let value = tree
            .get(id.as_bytes())
            .map_err(backend("Failed to read attribute"))?;

        Ok(value.map(|v| Bytes::copy_from_slice(&v)))
    }

    fn get_all(&self, attr: &str) -> Result<HashMap<String, Bytes>, BlobStoreError> {
        let mut values = HashMap::new();
        let Some(tree) = self.existing_tree(attr)? else {
            return Ok(values);
        };

        for item in tree.iter() {
            let (key, value) = item.map_err(backend("Failed to iterate attribute tree"))?;
            values.insert(id_from_key(&key)?, Bytes::copy_from_slice(&value));
        }

        Ok(values)
    }

    fn ids(&self, attr: &str) -> Result<HashSet<String>, BlobStoreError> {
        let mut ids = HashSet::new();
        let Some(tree) = self.existing_tree(attr)? else {
            return Ok(ids);
        };

        for key in tree.iter().keys() {
            let key = key.map_err(backend("Failed to iterate attribute tree"))?;
            ids.insert(id_from_key(&key)?);
        }

        Ok(ids)
    }
}

impl BlobWriter for SledBlobStore {
    fn write(&self, id: &str, attr: &str, blob: &[u8]) -> Result<bool, BlobStoreError> {
        let swapped = self
            .tree(attr)?
            .compare_and_swap(id.as_bytes(), None::<&[u8]>, Some(blob))
            .map_err(backend("Failed to write attribute"))?;

        Ok(swapped.is_ok())
    }

    fn update(&self, id: &str, attr: &str, blob: &[u8]) -> Result<bool, BlobStoreError> {
        self.tree(attr)?
            .insert(id.as_bytes(), blob)
            .map_err(backend("Failed to update attribute"))?;

        Ok(true)
    }

    fn delete(&self, id: &str) -> Result<bool, BlobStoreError> {
        let mut removed = false;

        for tree in self.attribute_trees()? {
            removed |= tree
                .remove(id.as_bytes())
                .map_err(backend("Failed to delete attribute"))?
                .is_some();
        }

        Ok(removed)
    }

    fn commit(&self) -> Result<(), BlobStoreError> {
        let flushed = self
            .db
            .flush()
            .map_err(backend("Failed to flush database"))?;

        debug!("Flushed {} bytes", flushed);
        Ok(())
    }
}

impl BlobStore for SledBlobStore {
    type Reader = Self;
    type Writer = Self;

    fn reader(&self) -> &Self {
        self
    }

    fn writer(&self) -> &Self {
        self
    }

    fn close(self) -> Result<(), BlobStoreError> {
        self.commit()
    }
}

impl std::fmt::Debug for SledBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledBlobStore")
            .field("db", &"<sled::Db>")
            .finish()
    }
}
