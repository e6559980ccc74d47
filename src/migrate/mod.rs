//! Row-to-document migration
//!
//! Drives a [`RowSource`](crate::source::RowSource) through the
//! [`PathAwareProcessor`](crate::columnmap::PathAwareProcessor) and writes the
//! completed records chunk by chunk through a
//! [`BatchWriter`](crate::writer::BatchWriter).

mod job;
mod progress;

pub use job::{MigrationJob, MigrationJobBuilder, DEFAULT_CHUNK_SIZE};
pub use progress::MigrationProgress;

use crate::source::SourceError;
use crate::writer::WriteError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort a migration
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("write error: {0}")]
    Write(#[from] WriteError),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Statistics for a finished migration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationStats {
    pub rows_read: usize,
    pub records_written: usize,
    pub batches_written: usize,
    pub bytes_written: u64,
    /// Merge conflicts resolved by overwrite
    pub conflicts: usize,
    pub elapsed_seconds: f64,
    pub records_per_second: f64,
}

impl MigrationStats {
    pub fn update_rate(&mut self) {
        if self.elapsed_seconds > 0.0 {
            self.records_per_second = self.records_written as f64 / self.elapsed_seconds;
        }
    }
}
