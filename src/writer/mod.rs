//! Batch writer
//!
//! Serializes completed records, assigns each a content address and hands the
//! whole chunk to the document store in a single call.

pub mod unit;

pub use unit::{DocumentMetadata, ServerTransform, TransformError, WriteUnit};

use crate::serialize::{DocumentSerializer, OutputFormat, SerializeError};
use crate::store::{DocumentStore, StoreError};
use crate::types::CompletedRecord;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Default root element / URI prefix
pub const DEFAULT_ROOT_NAME: &str = "item";

/// Errors that abort a chunk
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to serialize record {identifier:?}: {source}")]
    Serialize {
        identifier: Option<String>,
        #[source]
        source: SerializeError,
    },

    #[error("store rejected batch of {documents} documents: {source}")]
    Store {
        documents: usize,
        #[source]
        source: StoreError,
    },
}

/// Outcome of one batched write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Documents written
    pub documents: usize,
    /// Total bytes of serialized content
    pub bytes: u64,
    /// Content addresses, in record order
    pub uris: Vec<String>,
}

/// Build a content address: `/<root>/<uuid>` plus a suffix sniffed from the content
pub fn generate_uri(root_name: &str, content: &str) -> String {
    let uri = format!("/{}/{}", root_name, Uuid::new_v4());
    match OutputFormat::sniff(content) {
        Some(format) => format!("{}.{}", uri, format.extension()),
        None => uri,
    }
}

/// Serializes records and writes them to a store, one store call per chunk
pub struct BatchWriter {
    serializer: Box<dyn DocumentSerializer>,
    store: Arc<dyn DocumentStore>,
    root_name: String,
    metadata: DocumentMetadata,
    transform: Option<ServerTransform>,
}

impl BatchWriter {
    /// Create a writer with the root name as the only collection and no transform
    pub fn new(
        serializer: Box<dyn DocumentSerializer>,
        store: Arc<dyn DocumentStore>,
        root_name: impl Into<String>,
    ) -> Self {
        let root_name = root_name.into();
        let metadata = DocumentMetadata::for_root(&root_name, &[], serializer.format());
        Self {
            serializer,
            store,
            root_name,
            metadata,
            transform: None,
        }
    }

    /// Set collections; an empty list falls back to the root name
    pub fn with_collections(mut self, collections: &[String]) -> Self {
        self.metadata = DocumentMetadata::for_root(&self.root_name, collections, self.serializer.format());
        debug!("Setting collections to: {}", self.metadata.collections.join(","));
        self
    }

    /// Attach a server-side transform to every write
    pub fn with_transform(mut self, transform: Option<ServerTransform>) -> Self {
        if let Some(ref t) = transform {
            debug!(
                "Setting transform to {} with parameters {:?}",
                t.name, t.parameters
            );
        }
        self.transform = transform;
        self
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub fn transform(&self) -> Option<&ServerTransform> {
        self.transform.as_ref()
    }

    /// Serialize one record into a write unit
    pub fn prepare(&self, record: &CompletedRecord) -> Result<WriteUnit, WriteError> {
        let content = self
            .serializer
            .serialize(&record.record, &self.root_name)
            .map_err(|source| WriteError::Serialize {
                identifier: record.identifier.clone(),
                source,
            })?;
        let uri = generate_uri(&self.root_name, &content);
        debug!("Writing URI: {}; content: {}", uri, content);

        Ok(WriteUnit {
            uri,
            content,
            metadata: self.metadata.clone(),
            transform: self.transform.clone(),
        })
    }

    /// Serialize every record of a chunk and submit them in one batch.
    ///
    /// A serialization failure aborts the chunk before anything is written.
    pub fn write(&self, records: &[CompletedRecord]) -> Result<BatchReport, WriteError> {
        if records.is_empty() {
            return Ok(BatchReport::default());
        }

        let units = records
            .iter()
            .map(|record| self.prepare(record))
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Writing set of {} documents", units.len());
        self.store
            .write_batch(&units)
            .map_err(|source| WriteError::Store {
                documents: units.len(),
                source,
            })?;
        debug!("Finished writing set of documents");

        Ok(BatchReport {
            documents: units.len(),
            bytes: units.iter().map(|u| u.content.len() as u64).sum(),
            uris: units.into_iter().map(|u| u.uri).collect(),
        })
    }
}
