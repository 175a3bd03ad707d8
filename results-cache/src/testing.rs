use crate::ports::{BlobReader, BlobStore, BlobWriter};
use bytes::Bytes;
use parking_lot::Mutex;
use shared::BlobStoreError;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::keys::KeySource;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Get(String, String),
    GetAll(String),
    Ids(String),
    Write(String, String, Vec<u8>),
    Update(String, String, Vec<u8>),
    Delete(String),
    Commit,
    Close,
}

/// Shared state behind a [`RecordingBlobStore`], inspected by tests after the cache owns the store
#[derive(Debug, Default)]
pub struct Recorder {
    pub calls: Vec<Call>,
    pub attrs: HashMap<(String, String), Vec<u8>>,
    pub reject_writes: bool,
    pub fail_reads: bool,
    pub fail_delete_of: Option<String>,
    pub fail_close: bool,
}

impl Recorder {
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn commits(&self) -> usize {
        self.count(|c| matches!(c, Call::Commit))
    }

    pub fn deleted(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Delete(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn seed(&mut self, id: &str, attr: &str, value: &[u8]) {
        self.attrs
            .insert((id.to_string(), attr.to_string()), value.to_vec());
    }
}

fn boom() -> BlobStoreError {
    BlobStoreError::Backend("disk on fire".to_string())
}

/// Blob store that applies writes immediately and records every call
pub struct RecordingBlobStore {
    state: Arc<Mutex<Recorder>>,
}

impl RecordingBlobStore {
    pub fn new() -> (Self, Arc<Mutex<Recorder>>) {
        let state = Arc::new(Mutex::new(Recorder::default()));
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }
}

impl BlobReader for RecordingBlobStore {
    fn get(&self, id: &str, attr: &str) -> Result<Option<Bytes>, BlobStoreError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Get(id.to_string(), attr.to_string()));
        if state.fail_reads {
            return Err(boom());
        }
        Ok(state
            .attrs
            .get(&(id.to_string(), attr.to_string()))
            .map(|v| Bytes::copy_from_slice(v)))
    }

    fn get_all(&self, attr: &str) -> Result<HashMap<String, Bytes>, BlobStoreError> {
        let mut state = self.state.lock();
        state.calls.push(Call::GetAll(attr.to_string()));
        if state.fail_reads {
            return Err(boom());
        }
        Ok(state
            .attrs
            .iter()
            .filter(|((_, a), _)| a == attr)
            .map(|((id, _), v)| (id.clone(), Bytes::copy_from_slice(v)))
            .collect())
    }

    fn ids(&self, attr: &str) -> Result<HashSet<String>, BlobStoreError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Ids(attr.to_string()));
        if state.fail_reads {
            return Err(boom());
        }
        Ok(state
            .attrs
            .keys()
            .filter(|(_, a)| a == attr)
            .map(|(id, _)| id.clone())
            .collect())
    }
}

impl BlobWriter for RecordingBlobStore {
    fn write(&self, id: &str, attr: &str, blob: &[u8]) -> Result<bool, BlobStoreError> {
        let mut state = self.state.lock();
        state
            .calls
            .push(Call::Write(id.to_string(), attr.to_string(), blob.to_vec()));
        let slot = (id.to_string(), attr.to_string());
        if state.reject_writes || state.attrs.contains_key(&slot) {
            return Ok(false);
        }
        state.attrs.insert(slot, blob.to_vec());
        Ok(true)
    }

    fn update(&self, id: &str, attr: &str, blob: &[u8]) -> Result<bool, BlobStoreError> {
        let mut state = self.state.lock();
        state
            .calls
            .push(Call::Update(id.to_string(), attr.to_string(), blob.to_vec()));
        state
            .attrs
            .insert((id.to_string(), attr.to_string()), blob.to_vec());
        Ok(true)
    }

    fn delete(&self, id: &str) -> Result<bool, BlobStoreError> {
        let mut state = self.state.lock();
        if state.fail_delete_of.as_deref() == Some(id) {
            return Err(boom());
        }
        state.calls.push(Call::Delete(id.to_string()));
        let before = state.attrs.len();
        state.attrs.retain(|(held, _), _| held != id);
        Ok(state.attrs.len() != before)
    }

    fn commit(&self) -> Result<(), BlobStoreError> {
        self.state.lock().calls.push(Call::Commit);
        Ok(())
    }
}

impl BlobStore for RecordingBlobStore {
    type Reader = Self;
    type Writer = Self;

    fn reader(&self) -> &Self {
        self
    }

    fn writer(&self) -> &Self {
        self
    }

    fn close(self) -> Result<(), BlobStoreError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Close);
        if state.fail_close {
            return Err(boom());
        }
        Ok(())
    }
}

/// Hands out a fixed sequence of keys, repeating the last one when exhausted
pub struct ScriptedKeys(Mutex<VecDeque<String>>);

impl ScriptedKeys {
    pub fn new(keys: &[&str]) -> Self {
        Self(Mutex::new(keys.iter().map(|k| k.to_string()).collect()))
    }
}

impl KeySource for ScriptedKeys {
    fn next_key(&self) -> String {
        let mut keys = self.0.lock();
        if keys.len() > 1 {
            keys.pop_front().unwrap_or_default()
        } else {
            keys.front().cloned().unwrap_or_default()
        }
    }
}
