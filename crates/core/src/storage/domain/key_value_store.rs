use thiserror::Error;

/// Local storage is unavailable for this operation.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is corrupt: {0}")]
    Corrupt(String),
    #[error("storage quota exceeded ({needed} bytes needed, {quota} allowed)")]
    QuotaExceeded { needed: usize, quota: usize },
    #[error("could not determine data directory")]
    NoDataDir,
}

/// Durable string map with single-key atomic overwrites.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replaces the value under `key`. On error the previous value is kept.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}
