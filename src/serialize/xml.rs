//! XML serializer built on quick-xml's event writer

use super::{has_content, DocumentSerializer, OutputFormat, SerializeError};
use crate::types::{NestedRecord, Node, ScalarValue};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::{debug, info};

/// Writes a nested record as an XML element tree
#[derive(Debug, Clone, Default)]
pub struct XmlSerializer {
    /// Default namespace declared on the root element
    root_namespace: Option<String>,
}

impl XmlSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root_namespace(mut self, namespace: Option<String>) -> Self {
        self.root_namespace = namespace.filter(|ns| !ns.trim().is_empty());
        self
    }

    fn write_record(
        &self,
        writer: &mut Writer<Vec<u8>>,
        record: &NestedRecord,
    ) -> Result<(), SerializeError> {
        for (key, node) in record {
            self.write_node(writer, key, node)?;
        }
        Ok(())
    }

    /// Lists repeat the element once per item
    fn write_node(
        &self,
        writer: &mut Writer<Vec<u8>>,
        key: &str,
        node: &Node,
    ) -> Result<(), SerializeError> {
        match node {
            Node::Scalar(value) => self.write_scalar(writer, key, value),
            Node::Record(inner) if !inner.values().any(has_content) => {
                debug!("Skipping empty record, key: {}", key);
                Ok(())
            }
            Node::Record(inner) => {
                start(writer, key)?;
                self.write_record(writer, inner)?;
                end(writer, key)
            }
            Node::List(items) => {
                for item in items {
                    self.write_node(writer, key, item)?;
                }
                Ok(())
            }
        }
    }

    fn write_scalar(
        &self,
        writer: &mut Writer<Vec<u8>>,
        key: &str,
        value: &ScalarValue,
    ) -> Result<(), SerializeError> {
        if value.is_blob() {
            info!("Ignoring blob, key: {}", key);
            return Ok(());
        }
        if value.is_blank() {
            debug!("Skipping empty value, key: {}", key);
            return Ok(());
        }
        let Some(text) = value.as_text() else {
            return Ok(());
        };
        check_text(key, &text)?;

        start(writer, key)?;
        writer
            .write_event(Event::Text(BytesText::new(&text)))
            .map_err(|e| SerializeError::Xml(e.to_string()))?;
        end(writer, key)
    }
}

impl DocumentSerializer for XmlSerializer {
    fn serialize(&self, record: &NestedRecord, root_name: &str) -> Result<String, SerializeError> {
        check_name(root_name)?;

        let mut writer = Writer::new(Vec::new());
        let mut root = BytesStart::new(root_name);
        if let Some(ref namespace) = self.root_namespace {
            root.push_attribute(("xmlns", namespace.as_str()));
        }
        writer
            .write_event(Event::Start(root))
            .map_err(|e| SerializeError::Xml(e.to_string()))?;
        self.write_record(&mut writer, record)?;
        end(&mut writer, root_name)?;

        Ok(String::from_utf8(writer.into_inner())?)
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::Xml
    }
}

fn start(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<(), SerializeError> {
    check_name(name)?;
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(|e| SerializeError::Xml(e.to_string()))
}

fn end(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<(), SerializeError> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(|e| SerializeError::Xml(e.to_string()))
}

/// Element names follow the XML Name production, without namespace prefixes
pub(crate) fn check_name(name: &str) -> Result<(), SerializeError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(SerializeError::InvalidElementName(name.to_string()))
    }
}

/// Reject characters outside the XML 1.0 `Char` production
fn check_text(element: &str, text: &str) -> Result<(), SerializeError> {
    let invalid = text.chars().find(|&c| {
        let code = c as u32;
        (code < 0x20 && !matches!(c, '\t' | '\n' | '\r')) || code == 0xFFFE || code == 0xFFFF
    });

    match invalid {
        Some(c) => Err(SerializeError::InvalidCharacter {
            element: element.to_string(),
            codepoint: c as u32,
        }),
        None => Ok(()),
    }
}
