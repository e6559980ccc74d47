//! Row sources
//!
//! A [`RowSource`] yields rows lazily and in order. Rows for one identifier must
//! be contiguous (typically arranged with `ORDER BY` on the identifier column).

pub mod sqlite;

pub use sqlite::SqliteRowSource;

use crate::types::Row;
use thiserror::Error;

/// Errors raised while reading rows
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Query error: {0}")]
    Query(String),

    #[error("row source '{0}' was already consumed")]
    Exhausted(String),
}

/// Trait for row sources that can be iterated over once
pub trait RowSource: Send {
    /// Iterate over the rows of the source
    fn rows(&mut self) -> Box<dyn Iterator<Item = Result<Row, SourceError>> + '_>;

    /// Source name for display
    fn source_name(&self) -> &str;
}

/// Row source over an in-memory list of rows
#[derive(Debug, Clone, Default)]
pub struct VecRowSource {
    name: String,
    rows: Vec<Row>,
}

impl VecRowSource {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            name: "memory".to_string(),
            rows,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl RowSource for VecRowSource {
    fn rows(&mut self) -> Box<dyn Iterator<Item = Result<Row, SourceError>> + '_> {
        Box::new(std::mem::take(&mut self.rows).into_iter().map(Ok))
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_source_yields_rows_once() {
        let mut source = VecRowSource::new(vec![
            Row::new().with("id", 1),
            Row::new().with("id", 2),
        ])
        .with_name("fixture");

        assert_eq!(source.source_name(), "fixture");
        let rows: Vec<Row> = source.rows().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(source.rows().count(), 0);
    }
}
