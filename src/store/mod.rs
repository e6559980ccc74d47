//! Document stores
//!
//! A [`DocumentStore`] persists a batch of [`WriteUnit`]s. From the caller's
//! point of view a batch is all-or-nothing: an `Err` means the chunk failed.

pub mod filesystem;
pub mod memory;

pub use filesystem::FileSystemStore;
pub use memory::MemoryStore;

use crate::writer::WriteUnit;
use thiserror::Error;

/// Errors raised by a document store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid content address '{0}'")]
    InvalidUri(String),

    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Persists batches of serialized documents
pub trait DocumentStore: Send + Sync {
    /// Write every unit of the batch, applying each unit's transform if present
    fn write_batch(&self, units: &[WriteUnit]) -> Result<(), StoreError>;

    /// Store name for logs
    fn name(&self) -> &str;
}
