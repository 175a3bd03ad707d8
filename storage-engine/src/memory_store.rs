use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use results_cache::{BlobReader, BlobStore, BlobWriter};
use shared::BlobStoreError;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use tracing::{debug, warn};

#[derive(Debug)]
enum Staged {
    Put { id: String, attr: String, blob: Bytes },
    Delete { id: String },
}

/// In-memory blob store.
/// Writes are staged and only become visible to readers on commit.
#[derive(Default)]
pub struct MemoryBlobStore {
    committed: DashMap<String, HashMap<String, Bytes>>,
    staged: Mutex<Vec<Staged>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of staged writes waiting for a commit
    pub fn pending(&self) -> usize {
        self.staged.lock().len()
    }

    // Attributes `id` would hold if the staged batch were committed now
    fn visible_attrs(&self, staged: &[Staged], id: &str) -> HashSet<String> {
        let mut attrs: HashSet<String> = self
            .committed
            .get(id)
            .map(|entry| entry.keys().cloned().collect())
            .unwrap_or_default();

        for op in staged {
            match op {
                Staged::Put { id: held, attr, .. } if held == id => {
                    attrs.insert(attr.clone());
                }
                Staged::Delete { id: held } if held == id => attrs.clear(),
                _ => {}
            }
        }
        attrs
    }
}

impl BlobReader for MemoryBlobStore {
    fn get(&self, id: &str, attr: &str) -> Result<Option<Bytes>, BlobStoreError> {
        Ok(self
            .committed
            .get(id)
            .and_then(|entry| entry.get(attr).cloned()))
    }

    fn get_all(&self, attr: &str) -> Result<HashMap<String, Bytes>, BlobStoreError> {
        Ok(self
            .committed
            .iter()
            .filter_map(|entry| {
                entry
                    .value()
                    .get(attr)
                    .map(|blob| (entry.key().clone(), blob.clone()))
            })
            .collect())
    }

    fn ids(&self, attr: &str) -> Result<HashSet<String>, BlobStoreError> {
        Ok(self
            .committed
            .iter()
            .filter(|entry| entry.value().contains_key(attr))
            .map(|entry| entry.key().clone())
            .collect())
    }
}

impl BlobWriter for MemoryBlobStore {
    fn write(&self, id: &str, attr: &str, blob: &[u8]) -> Result<bool, BlobStoreError> {
        let mut staged = self.staged.lock();
        if self.visible_attrs(&staged, id).contains(attr) {
            return Ok(false);
        }

        staged.push(Staged::Put {
            id: id.to_string(),
            attr: attr.to_string(),
            blob: Bytes::copy_from_slice(blob),
        });
        Ok(true)
    }

    fn update(&self, id: &str, attr: &str, blob: &[u8]) -> Result<bool, BlobStoreError> {
        self.staged.lock().push(Staged::Put {
            id: id.to_string(),
            attr: attr.to_string(),
            blob: Bytes::copy_from_slice(blob),
        });
        Ok(true)
    }

    fn delete(&self, id: &str) -> Result<bool, BlobStoreError> {
        let mut staged = self.staged.lock();
        let existed = !self.visible_attrs(&staged, id).is_empty();

        staged.push(Staged::Delete { id: id.to_string() });
        Ok(existed)
    }

    fn commit(&self) -> Result<(), BlobStoreError> {
        // Hold the stage lock while applying so writers queue behind the commit
        let mut staged = self.staged.lock();
        let batch = std::mem::take(&mut *staged);
        let count = batch.len();

        for op in batch {
            match op {
                Staged::Put { id, attr, blob } => {
                    self.committed.entry(id).or_default().insert(attr, blob);
                }
                Staged::Delete { id } => {
                    self.committed.remove(&id);
                }
            }
        }

        debug!("Committed {} staged writes", count);
        Ok(())
    }
}

impl BlobStore for MemoryBlobStore {
    type Reader = Self;
    type Writer = Self;

    fn reader(&self) -> &Self {
        self
    }

    fn writer(&self) -> &Self {
        self
    }

    fn close(self) -> Result<(), BlobStoreError> {
        let pending = self.pending();
        if pending > 0 {
            warn!("Discarding {} uncommitted writes on close", pending);
        }
        Ok(())
    }
}

impl Debug for MemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBlobStore")
            .field("ids", &self.committed.len())
            .field("pending", &self.pending())
            .finish()
    }
}
