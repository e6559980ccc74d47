//! Core types for the row-to-document pipeline

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column label as delivered by the row source (may contain `/` path separators)
pub type ColumnLabel = String;

/// Insertion-ordered mapping from field name to node
pub type NestedRecord = IndexMap<String, Node>;

// ============================================================================
// Scalar values
// ============================================================================

/// A single column value from a relational row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl ScalarValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    pub fn is_blob(&self) -> bool {
        matches!(self, ScalarValue::Blob(_))
    }

    /// Textual form used for markup content and identifiers.
    ///
    /// Returns `None` for nulls and blobs, which have no text representation.
    pub fn as_text(&self) -> Option<String> {
        match self {
            ScalarValue::Null | ScalarValue::Blob(_) => None,
            ScalarValue::Bool(b) => Some(b.to_string()),
            ScalarValue::Integer(i) => Some(i.to_string()),
            ScalarValue::Float(f) => Some(f.to_string()),
            ScalarValue::Text(s) => Some(s.clone()),
        }
    }

    /// True when the value would render as empty or whitespace-only text
    pub fn is_blank(&self) -> bool {
        match self {
            ScalarValue::Text(s) => s.trim().is_empty(),
            ScalarValue::Null => true,
            _ => false,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => f.write_str("null"),
            ScalarValue::Blob(bytes) => write!(f, "<blob {} bytes>", bytes.len()),
            other => f.write_str(&other.as_text().unwrap_or_default()),
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Text(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Text(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Integer(value)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Integer(value.into())
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Float(value)
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Bool(value)
    }
}

impl From<Vec<u8>> for ScalarValue {
    fn from(value: Vec<u8>) -> Self {
        ScalarValue::Blob(value)
    }
}

// ============================================================================
// Nested structure
// ============================================================================

/// A field value inside a nested record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Scalar(ScalarValue),
    Record(NestedRecord),
    List(Vec<Node>),
}

impl Node {
    /// Short name of the node's shape, used in merge-conflict logs
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Scalar(_) => "scalar",
            Node::Record(_) => "record",
            Node::List(_) => "list",
        }
    }
}

impl From<ScalarValue> for Node {
    fn from(value: ScalarValue) -> Self {
        Node::Scalar(value)
    }
}

// ============================================================================
// Rows
// ============================================================================

/// One flat row from the relational source, with column order preserved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: IndexMap<ColumnLabel, ScalarValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column insertion
    pub fn with(mut self, label: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.insert(label, value);
        self
    }

    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<ScalarValue>) {
        self.columns.insert(label.into(), value.into());
    }

    pub fn get(&self, label: &str) -> Option<&ScalarValue> {
        self.columns.get(label)
    }

    /// The first column, which is the default identifier column
    pub fn first(&self) -> Option<(&str, &ScalarValue)> {
        self.columns
            .get_index(0)
            .map(|(label, value)| (label.as_str(), value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<ScalarValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (label, value) in iter {
            row.insert(label, value);
        }
        row
    }
}

// ============================================================================
// Group identity
// ============================================================================

/// Identity of a group of rows.
///
/// `Anonymous` is used for rows without a usable identifier value and never
/// compares equal to anything, including another anonymous identifier.
#[derive(Debug, Clone)]
pub enum Identifier {
    Value(String),
    Anonymous,
}

impl Identifier {
    /// Whether a row carrying `other` belongs to the same group
    pub fn same_group(&self, other: &Identifier) -> bool {
        match (self, other) {
            (Identifier::Value(a), Identifier::Value(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Value(v) => f.write_str(v),
            Identifier::Anonymous => f.write_str("<anonymous>"),
        }
    }
}

/// A fully merged record, emitted once per distinct identifier
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRecord {
    /// Identifier value shared by the merged rows (`None` for anonymous groups)
    pub identifier: Option<String>,
    /// Number of source rows merged into this record
    pub row_count: usize,
    /// Number of shape conflicts resolved while merging
    pub conflicts: usize,
    /// The merged nested structure
    pub record: NestedRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_detection() {
        assert!(ScalarValue::from("   ").is_blank());
        assert!(ScalarValue::from("").is_blank());
        assert!(ScalarValue::Null.is_blank());
        assert!(!ScalarValue::from("x").is_blank());
        assert!(!ScalarValue::Integer(0).is_blank());
    }

    #[test]
    fn test_row_preserves_column_order() {
        let row = Row::new().with("id", 1).with("name", "A").with("addr/city", "X");
        let labels: Vec<&str> = row.iter().map(|(k, _)| k).collect();
        assert_eq!(labels, vec!["id", "name", "addr/city"]);
        assert_eq!(row.first(), Some(("id", &ScalarValue::Integer(1))));
    }

    #[test]
    fn test_anonymous_identifier_never_matches() {
        let a = Identifier::Anonymous;
        assert!(!a.same_group(&Identifier::Anonymous));
        assert!(!a.same_group(&Identifier::Value("1".into())));
        assert!(Identifier::Value("1".into()).same_group(&Identifier::Value("1".into())));
    }
}
