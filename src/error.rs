//! Error types for range indexer operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Insufficient space: no contiguous free range of {requested} (largest free range: {largest_free})")]
    InsufficientSpace { requested: u64, largest_free: u64 },

    #[error("No allocated range starts at {0}")]
    NotFound(u64),

    #[error("Out of memory: unable to grow block arena")]
    OutOfMemory,

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IndexerError {
    /// Whether the caller can simply carry on after this error
    ///
    /// Argument, lookup and space failures leave the allocator untouched.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, IndexerError::InvariantViolation(_))
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;
