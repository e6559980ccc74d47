//! rowdoc: relational rows to hierarchical documents
//!
//! Reads rows from a relational query whose column labels are slash-delimited
//! paths, folds consecutive rows sharing an identifier into one nested record,
//! and writes each record as an XML or JSON document:
//! - Path-aware merging of rows into nested records (`columnmap`)
//! - XML and JSON serializers (`serialize`)
//! - Batched writes with content addresses, collections and transforms (`writer`)
//! - In-memory and directory-backed document stores (`store`)
//! - SQLite row source (`source`)
//! - Chunked migration job with progress reporting (`migrate`)

pub mod columnmap;
pub mod config;
pub mod migrate;
pub mod serialize;
pub mod source;
pub mod store;
pub mod types;
pub mod writer;

pub use config::Config;
pub use types::*;
