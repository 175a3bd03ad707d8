#![deny(clippy::all)]

use bytes::Bytes;
use shared::BlobStoreError;
use std::collections::{HashMap, HashSet};

// Ports are the pluggable extension points for the underlying blob store

/// Read side of a key/attribute blob store
pub trait BlobReader: Send + Sync {
    /// Point lookup of one attribute for an id
    fn get(&self, id: &str, attr: &str) -> Result<Option<Bytes>, BlobStoreError>;

    /// Every id holding `attr`, with its value
    fn get_all(&self, attr: &str) -> Result<HashMap<String, Bytes>, BlobStoreError>;

    /// Every id holding `attr`
    fn ids(&self, attr: &str) -> Result<HashSet<String>, BlobStoreError>;
}

/// Write side of a key/attribute blob store.
///
/// Mutations are only guaranteed durable once [`BlobWriter::commit`] returns.
pub trait BlobWriter: Send + Sync {
    /// Create an attribute. Returns `false` if it is already present.
    fn write(&self, id: &str, attr: &str, blob: &[u8]) -> Result<bool, BlobStoreError>;

    /// Replace an attribute, creating it if absent.
    fn update(&self, id: &str, attr: &str, blob: &[u8]) -> Result<bool, BlobStoreError>;

    /// Remove every attribute held by `id`. Returns `true` if anything was removed.
    fn delete(&self, id: &str) -> Result<bool, BlobStoreError>;

    fn commit(&self) -> Result<(), BlobStoreError>;
}

/// A blob store handle exposing role-scoped reader and writer views
pub trait BlobStore: Send + Sync + 'static {
    type Reader: BlobReader;
    type Writer: BlobWriter;

    fn reader(&self) -> &Self::Reader;
    fn writer(&self) -> &Self::Writer;

    /// Release the store. Consumes the handle so it cannot be used afterwards.
    fn close(self) -> Result<(), BlobStoreError>
    where
        Self: Sized;
}
