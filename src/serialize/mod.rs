//! Document serializers
//!
//! A [`DocumentSerializer`] renders a [`NestedRecord`] into document text. Two
//! implementations exist, selected by [`OutputFormat`]:
//!
//! - [`XmlSerializer`]: one root element named after the root name, one child
//!   element per field, repeated for list items
//! - [`JsonSerializer`]: the record as a JSON object, lists as arrays
//!
//! Both skip blobs and empty/blank scalars, drop nested records left empty by
//! that skipping, and preserve field insertion order.

pub mod json;
pub mod xml;

pub use json::JsonSerializer;
pub use xml::XmlSerializer;

use crate::types::{NestedRecord, Node};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Output document format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    #[serde(alias = "markup")]
    Xml,
    #[serde(alias = "structured")]
    Json,
}

impl OutputFormat {
    /// File suffix for content addresses
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Xml => "xml",
            OutputFormat::Json => "json",
        }
    }

    /// Guess the format from the first character of serialized text
    pub fn sniff(content: &str) -> Option<Self> {
        match content.chars().next() {
            Some('{') => Some(OutputFormat::Json),
            Some('<') => Some(OutputFormat::Xml),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "xml" | "markup" => Ok(OutputFormat::Xml),
            "json" | "structured" => Ok(OutputFormat::Json),
            other => Err(format!(
                "unknown output format '{}', expected xml or json",
                other
            )),
        }
    }
}

/// Errors raised while rendering a document
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("'{0}' is not a valid element name")]
    InvalidElementName(String),

    #[error("element '{element}' contains character U+{codepoint:04X}, which is not allowed in XML")]
    InvalidCharacter { element: String, codepoint: u32 },

    #[error("XML write error: {0}")]
    Xml(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("UTF-8 encode error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Renders a nested record into document text
pub trait DocumentSerializer: Send + Sync {
    /// Serialize `record` with the given root name
    fn serialize(&self, record: &NestedRecord, root_name: &str) -> Result<String, SerializeError>;

    /// Format produced by this serializer
    fn format(&self) -> OutputFormat;
}

/// Whether a node renders anything once blobs and blank scalars are skipped
pub(crate) fn has_content(node: &Node) -> bool {
    match node {
        Node::Scalar(value) => !value.is_blob() && !value.is_blank(),
        Node::Record(inner) => inner.values().any(has_content),
        Node::List(items) => items.iter().any(has_content),
    }
}

/// Build the serializer for a configured format
pub fn serializer_for(
    format: OutputFormat,
    root_namespace: Option<String>,
) -> Box<dyn DocumentSerializer> {
    match format {
        OutputFormat::Xml => Box::new(XmlSerializer::new().with_root_namespace(root_namespace)),
        OutputFormat::Json => Box::new(JsonSerializer::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScalarValue;

    fn sample() -> NestedRecord {
        let mut addr = NestedRecord::new();
        addr.insert("city".into(), Node::Scalar("X".into()));
        addr.insert("photo".into(), Node::Scalar(ScalarValue::Blob(vec![0xFF, 0xD8])));
        let mut record = NestedRecord::new();
        record.insert("name".into(), Node::Scalar("A".into()));
        record.insert("note".into(), Node::Scalar("   ".into()));
        record.insert("addr".into(), Node::Record(addr));
        record.insert(
            "tag".into(),
            Node::List(vec![Node::Scalar("x".into()), Node::Scalar("y".into())]),
        );
        record
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("xml".parse::<OutputFormat>().unwrap(), OutputFormat::Xml);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("markup".parse::<OutputFormat>().unwrap(), OutputFormat::Xml);
        assert_eq!("structured".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_sniff() {
        assert_eq!(OutputFormat::sniff("{\"a\":1}"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::sniff("<item/>"), Some(OutputFormat::Xml));
        assert_eq!(OutputFormat::sniff("plain"), None);
        assert_eq!(OutputFormat::sniff(""), None);
    }

    #[test]
    fn test_both_variants_drop_blobs_and_blanks() {
        for format in [OutputFormat::Xml, OutputFormat::Json] {
            let serializer = serializer_for(format, None);
            assert_eq!(serializer.format(), format);
            let text = serializer.serialize(&sample(), "item").unwrap();
            assert!(!text.contains("photo"), "{} output kept a blob: {}", format, text);
            assert!(!text.contains("note"), "{} output kept a blank: {}", format, text);
            assert!(text.contains("city"));
        }
    }

    #[test]
    fn test_records_emptied_by_skipping_are_omitted() {
        let mut addr = NestedRecord::new();
        addr.insert("city".into(), Node::Scalar("   ".into()));
        addr.insert("photo".into(), Node::Scalar(ScalarValue::Blob(vec![1])));
        let mut record = NestedRecord::new();
        record.insert("name".into(), Node::Scalar("A".into()));
        record.insert("addr".into(), Node::Record(addr));

        let xml = serializer_for(OutputFormat::Xml, None)
            .serialize(&record, "item")
            .unwrap();
        assert_eq!(xml, "<item><name>A</name></item>");

        let json = serializer_for(OutputFormat::Json, None)
            .serialize(&record, "item")
            .unwrap();
        assert_eq!(json, r#"{"name":"A"}"#);
    }

    #[test]
    fn test_serialization_is_idempotent() {
        for format in [OutputFormat::Xml, OutputFormat::Json] {
            let serializer = serializer_for(format, None);
            let record = sample();
            let first = serializer.serialize(&record, "item").unwrap();
            let second = serializer.serialize(&record, "item").unwrap();
            assert_eq!(first.as_bytes(), second.as_bytes());
        }
    }
}
