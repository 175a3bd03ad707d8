// shared/src/lib.rs

/// Failure reported by a blob store collaborator.
#[derive(thiserror::Error, Debug)]
pub enum BlobStoreError {
    #[error("{0}")]
    Backend(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Results cache has been closed")]
    Closed,
    #[error("{message}")]
    Store {
        message: String,
        #[source]
        source: BlobStoreError,
    },
    #[error("no free key after {attempts} attempts")]
    KeyExhausted { attempts: usize },
}

impl From<BlobStoreError> for Error {
    fn from(err: BlobStoreError) -> Self {
        Error::Store {
            message: err.to_string(),
            source: err,
        }
    }
}

pub type CacheError = Error;
pub type Result<T> = std::result::Result<T, Error>;

pub mod config;

pub use config::Config;
