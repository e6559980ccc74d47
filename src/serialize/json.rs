//! JSON serializer

use super::{DocumentSerializer, OutputFormat, SerializeError};
use crate::types::{NestedRecord, Node, ScalarValue};
use serde_json::{Map as JsonMap, Number, Value as JsonValue};
use tracing::{debug, info};

/// Writes a nested record as a JSON object.
///
/// The root name is not embedded in the document; it is carried by the
/// content address and collections instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indent the output
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Convert a record to a JSON object, dropping skipped values
    pub fn to_value(&self, record: &NestedRecord) -> JsonValue {
        JsonValue::Object(record_to_json(record))
    }
}

impl DocumentSerializer for JsonSerializer {
    fn serialize(&self, record: &NestedRecord, _root_name: &str) -> Result<String, SerializeError> {
        let value = self.to_value(record);
        let text = if self.pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        Ok(text)
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }
}

fn record_to_json(record: &NestedRecord) -> JsonMap<String, JsonValue> {
    let mut map = JsonMap::with_capacity(record.len());
    for (key, node) in record {
        if let Some(value) = node_to_json(key, node) {
            map.insert(key.clone(), value);
        }
    }
    map
}

fn node_to_json(key: &str, node: &Node) -> Option<JsonValue> {
    match node {
        Node::Scalar(value) => scalar_to_json(key, value),
        Node::Record(inner) => {
            let map = record_to_json(inner);
            if map.is_empty() {
                debug!("Skipping empty record, key: {}", key);
                None
            } else {
                Some(JsonValue::Object(map))
            }
        }
        Node::List(items) => {
            let values: Vec<JsonValue> = items
                .iter()
                .filter_map(|item| node_to_json(key, item))
                .collect();
            if values.is_empty() {
                None
            } else {
                Some(JsonValue::Array(values))
            }
        }
    }
}

fn scalar_to_json(key: &str, value: &ScalarValue) -> Option<JsonValue> {
    match value {
        ScalarValue::Null => None,
        ScalarValue::Blob(_) => {
            info!("Ignoring blob, key: {}", key);
            None
        }
        ScalarValue::Text(text) if text.trim().is_empty() => {
            debug!("Skipping empty value, key: {}", key);
            None
        }
        ScalarValue::Text(text) => Some(JsonValue::String(text.clone())),
        ScalarValue::Bool(b) => Some(JsonValue::Bool(*b)),
        ScalarValue::Integer(i) => Some(JsonValue::Number((*i).into())),
        ScalarValue::Float(f) => Some(
            Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(f.to_string())),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scalar(value: impl Into<ScalarValue>) -> Node {
        Node::Scalar(value.into())
    }

    #[test]
    fn test_native_types_and_nesting() {
        let mut addr = NestedRecord::new();
        addr.insert("city".into(), scalar("X"));
        let mut record = NestedRecord::new();
        record.insert("name".into(), scalar("A"));
        record.insert("age".into(), scalar(42));
        record.insert("ratio".into(), scalar(0.5));
        record.insert("active".into(), scalar(true));
        record.insert("addr".into(), Node::Record(addr));
        record.insert("total".into(), Node::List(vec![scalar(3215), scalar(1376)]));

        let text = JsonSerializer::new().serialize(&record, "item").unwrap();
        assert_eq!(
            text,
            r#"{"name":"A","age":42,"ratio":0.5,"active":true,"addr":{"city":"X"},"total":[3215,1376]}"#
        );
    }

    #[test]
    fn test_field_order_follows_insertion() {
        let mut record = NestedRecord::new();
        record.insert("zeta".into(), scalar("1"));
        record.insert("alpha".into(), scalar("2"));

        let text = JsonSerializer::new().serialize(&record, "item").unwrap();
        assert!(text.find("zeta").unwrap() < text.find("alpha").unwrap());
    }

    #[test]
    fn test_skipped_values_omitted() {
        let mut record = NestedRecord::new();
        record.insert("photo".into(), scalar(ScalarValue::Blob(vec![9])));
        record.insert("blank".into(), scalar("  "));
        record.insert("gone".into(), Node::List(vec![scalar(""), scalar(ScalarValue::Null)]));
        record.insert("kept".into(), Node::List(vec![scalar(""), scalar("v")]));

        let value = JsonSerializer::new().to_value(&record);
        assert_eq!(value, json!({"kept": ["v"]}));
    }

    #[test]
    fn test_non_finite_float_is_stringified() {
        let mut record = NestedRecord::new();
        record.insert("x".into(), scalar(f64::INFINITY));

        let value = JsonSerializer::new().to_value(&record);
        assert_eq!(value, json!({"x": "inf"}));
    }

    #[test]
    fn test_output_starts_with_brace() {
        let text = JsonSerializer::new()
            .with_pretty(true)
            .serialize(&NestedRecord::new(), "item")
            .unwrap();
        assert_eq!(OutputFormat::sniff(&text), Some(OutputFormat::Json));
    }
}
