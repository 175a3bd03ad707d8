pub mod cache;
pub mod domain;
pub mod keys;
pub mod ports;
pub mod ttl;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{BlobStoreResultsCache, ResultsCache};
pub use domain::{REQUIRED_ATTRS, RESULTS_ATTR, SweepReport, TTL_ATTR};
pub use keys::{KeySource, RandomKeySource, generate_key};
pub use ports::{BlobReader, BlobStore, BlobWriter};
