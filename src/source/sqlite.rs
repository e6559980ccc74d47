//! SQLite row source
//!
//! The query runs on a dedicated reader thread and rows are handed over through
//! a bounded channel, so reading stays lazy and memory is capped by the
//! channel size rather than the result set.

use super::{RowSource, SourceError};
use crate::types::{Row, ScalarValue};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::mpsc::{sync_channel, SyncSender};
use tracing::{debug, info};

/// Default number of rows buffered between the reader thread and the consumer
pub const DEFAULT_ROW_BUFFER: usize = 256;

/// Runs one SQL query against an SQLite database and yields its rows
#[derive(Debug)]
pub struct SqliteRowSource {
    name: String,
    sql: String,
    connection: Option<Connection>,
    buffer: usize,
}

impl SqliteRowSource {
    /// Open `database` read-only and check that `sql` prepares
    pub fn open(database: impl AsRef<Path>, sql: impl Into<String>) -> Result<Self, SourceError> {
        let path = database.as_ref().to_path_buf();
        let sql = sql.into();
        let connection = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::from_connection(connection, sql, &path)
    }

    /// Wrap an existing connection
    pub fn from_connection(
        connection: Connection,
        sql: impl Into<String>,
        path: &Path,
    ) -> Result<Self, SourceError> {
        let sql = sql.into();
        if sql.trim().is_empty() {
            return Err(SourceError::Query("SQL statement is empty".to_string()));
        }
        connection.prepare(&sql)?;

        Ok(Self {
            name: path.display().to_string(),
            sql,
            connection: Some(connection),
            buffer: DEFAULT_ROW_BUFFER,
        })
    }

    /// Set the number of rows buffered ahead of the consumer
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

impl RowSource for SqliteRowSource {
    fn rows(&mut self) -> Box<dyn Iterator<Item = Result<Row, SourceError>> + '_> {
        let Some(connection) = self.connection.take() else {
            return Box::new(std::iter::once(Err(SourceError::Exhausted(self.name.clone()))));
        };

        info!("Running query against {}", self.name);
        let (tx, rx) = sync_channel(self.buffer);
        let sql = self.sql.clone();
        let spawned = std::thread::Builder::new()
            .name("rowdoc-sqlite-reader".to_string())
            .spawn(move || {
                if let Err(e) = read_rows(&connection, &sql, &tx) {
                    let _ = tx.send(Err(e));
                }
            });

        match spawned {
            Ok(_) => Box::new(rx.into_iter()),
            Err(e) => Box::new(std::iter::once(Err(SourceError::Io(e)))),
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

fn read_rows(
    connection: &Connection,
    sql: &str,
    tx: &SyncSender<Result<Row, SourceError>>,
) -> Result<(), SourceError> {
    let mut statement = connection.prepare(sql)?;
    let labels: Vec<String> = statement
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    debug!("Query columns: {}", labels.join(", "));

    let mut rows = statement.query([])?;
    let mut count = 0usize;
    while let Some(sql_row) = rows.next()? {
        let mut row = Row::new();
        for (index, label) in labels.iter().enumerate() {
            row.insert(label.clone(), scalar_from_sql(sql_row.get_ref(index)?));
        }
        if tx.send(Ok(row)).is_err() {
            debug!("Row consumer went away after {} rows", count);
            return Ok(());
        }
        count += 1;
    }

    debug!("Query returned {} rows", count);
    Ok(())
}

fn scalar_from_sql(value: ValueRef<'_>) -> ScalarValue {
    match value {
        ValueRef::Null => ScalarValue::Null,
        ValueRef::Integer(i) => ScalarValue::Integer(i),
        ValueRef::Real(f) => ScalarValue::Float(f),
        ValueRef::Text(bytes) => ScalarValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => ScalarValue::Blob(bytes.to_vec()),
    }
}
