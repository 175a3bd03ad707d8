use crate::domain::{RESULTS_ATTR, SweepReport, TTL_ATTR};
use crate::keys::{KeySource, RandomKeySource};
use crate::ports::{BlobReader, BlobStore, BlobWriter};
use crate::ttl;
use bytes::Bytes;
use chrono::Utc;
use shared::{Config, Error, Result};
use std::collections::HashSet;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A cache of opaque results addressed by generated keys
pub trait ResultsCache {
    /// Retrieve a previously stored result, `None` if the key holds nothing.
    fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store a result and return the key to retrieve it with.
    ///
    /// Returns an empty key if the store refused the write.
    fn put(&self, result: &[u8]) -> Result<String>;

    /// Stamp the first liveness marker on a key.
    fn add_time_to_live(&self, key: &str) -> Result<()>;

    /// Replace the liveness marker on a key with a fresh one.
    fn update_time_to_live(&self, key: &str) -> Result<()>;

    /// Remove every entry whose liveness marker is older than `duration`.
    ///
    /// Each removal is committed on its own, so deletions made before a
    /// failure are kept.
    fn process_time_to_live(&self, duration: Duration) -> Result<SweepReport>;

    /// Release the underlying store. Calling this again is a no-op.
    fn close(&mut self) -> Result<()>;
}

enum State<S> {
    Open(S),
    Closed,
}

/// Results cache backed by a blob store
pub struct BlobStoreResultsCache<S, K = RandomKeySource>
where
    S: BlobStore,
    K: KeySource,
{
    state: State<S>,
    keys: K,
    max_key_attempts: usize,
}

impl<S: BlobStore> BlobStoreResultsCache<S> {
    pub fn new(store: S) -> Self {
        Self::with_key_source(store, RandomKeySource)
    }

    /// Create a cache tuned from the environment config
    pub fn from_config(store: S, config: &Config) -> Self {
        Self::new(store).max_key_attempts(config.max_key_attempts)
    }
}

impl<S, K> BlobStoreResultsCache<S, K>
where
    S: BlobStore,
    K: KeySource,
{
    pub fn with_key_source(store: S, keys: K) -> Self {
        Self {
            state: State::Open(store),
            keys,
            max_key_attempts: Config::DEFAULT_MAX_KEY_ATTEMPTS,
        }
    }

    /// Bound on consecutive key collisions before `put` gives up (at least 1)
    pub fn max_key_attempts(mut self, attempts: usize) -> Self {
        self.max_key_attempts = attempts.max(1);
        self
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    fn store(&self) -> Result<&S> {
        match &self.state {
            State::Open(store) => Ok(store),
            State::Closed => Err(Error::Closed),
        }
    }

    fn free_key(&self, taken: &HashSet<String>) -> Result<String> {
        for attempt in 1..=self.max_key_attempts {
            let key = self.keys.next_key();
            if !taken.contains(&key) {
                return Ok(key);
            }
            warn!(attempt, "Generated key {} is already in use", key);
        }

        Err(Error::KeyExhausted {
            attempts: self.max_key_attempts,
        })
    }
}

impl<S, K> ResultsCache for BlobStoreResultsCache<S, K>
where
    S: BlobStore,
    K: KeySource,
{
    fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let store = self.store()?;
        Ok(store.reader().get(key, RESULTS_ATTR)?)
    }

    fn put(&self, result: &[u8]) -> Result<String> {
        let store = self.store()?;

        let taken = store.reader().ids(RESULTS_ATTR)?;
        let key = self.free_key(&taken)?;

        if store.writer().write(&key, RESULTS_ATTR, result)? {
            store.writer().commit()?;
            debug!(bytes = result.len(), "Stored result under {}", key);
            Ok(key)
        } else {
            warn!("Store refused result for key {}", key);
            Ok(String::new())
        }
    }

    fn add_time_to_live(&self, key: &str) -> Result<()> {
        let store = self.store()?;

        // The create may be refused if a ttl exists; the commit still finalizes the batch
        if !store
            .writer()
            .write(key, TTL_ATTR, &ttl::encode(Utc::now()))?
        {
            warn!("Time to live already present for {}", key);
        }
        store.writer().commit()?;
        Ok(())
    }

    fn update_time_to_live(&self, key: &str) -> Result<()> {
        let store = self.store()?;

        store
            .writer()
            .update(key, TTL_ATTR, &ttl::encode(Utc::now()))?;
        store.writer().commit()?;
        Ok(())
    }

    fn process_time_to_live(&self, duration: Duration) -> Result<SweepReport> {
        let store = self.store()?;

        let now = Utc::now();
        let grace = ttl::grace(duration);
        let mut report = SweepReport::default();

        for (id, value) in store.reader().get_all(TTL_ATTR)? {
            if value.is_empty() {
                continue;
            }
            report.examined += 1;

            let stamped = match ttl::decode(&value) {
                Ok(stamped) => stamped,
                Err(e) => {
                    warn!("Skipping time to live for {}: {}", id, e);
                    report.skipped += 1;
                    continue;
                }
            };

            if ttl::is_expired(stamped, grace, now) {
                store.writer().delete(&id)?;
                store.writer().commit()?;
                debug!("Expired {} (stamped {})", id, stamped);
                report.deleted += 1;
            }
        }

        if report.deleted > 0 {
            info!(
                examined = report.examined,
                deleted = report.deleted,
                skipped = report.skipped,
                "Time to live sweep removed expired results"
            );
        }
        Ok(report)
    }

    fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Open(store) => {
                debug!("Closing results cache");
                Ok(store.close()?)
            }
            State::Closed => Ok(()),
        }
    }
}

impl<S, K> Drop for BlobStoreResultsCache<S, K>
where
    S: BlobStore,
    K: KeySource,
{
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close results cache store: {}", e);
        }
    }
}

impl<S, K> Debug for BlobStoreResultsCache<S, K>
where
    S: BlobStore,
    K: KeySource,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStoreResultsCache")
            .field("closed", &self.is_closed())
            .field("max_key_attempts", &self.max_key_attempts)
            .finish()
    }
}
