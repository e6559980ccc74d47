//! Write units and their metadata

use crate::serialize::OutputFormat;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server-side transform applied by the store while writing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTransform {
    /// Registered transform name
    pub name: String,
    /// Parameters passed to the transform, in configured order
    pub parameters: IndexMap<String, String>,
}

/// Invalid transform configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("transform name must not be empty")]
    EmptyName,

    #[error("transform parameters must be key,value pairs; '{0}' has no value")]
    MissingValue(String),

    #[error("transform parameter keys must not be empty")]
    EmptyKey,
}

impl ServerTransform {
    pub fn new(name: impl Into<String>) -> Result<Self, TransformError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TransformError::EmptyName);
        }
        Ok(Self {
            name,
            parameters: IndexMap::new(),
        })
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Build a transform from a flattened `key,value,key,value` list.
    ///
    /// `"monster,grover,trash,oscar"` yields `{monster: grover, trash: oscar}`.
    /// An empty list yields no parameters.
    pub fn from_flattened(name: impl Into<String>, flattened: &str) -> Result<Self, TransformError> {
        let mut transform = Self::new(name)?;
        if flattened.trim().is_empty() {
            return Ok(transform);
        }

        let items: Vec<&str> = flattened.split(',').map(str::trim).collect();
        for pair in items.chunks(2) {
            match pair {
                [key, value] => {
                    if key.is_empty() {
                        return Err(TransformError::EmptyKey);
                    }
                    transform.parameters.insert(key.to_string(), value.to_string());
                }
                [dangling] => return Err(TransformError::MissingValue(dangling.to_string())),
                _ => {}
            }
        }
        Ok(transform)
    }
}

/// Metadata stored alongside every document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Collections the document is added to
    pub collections: Vec<String>,
    /// Content format of the document
    pub format: OutputFormat,
}

impl DocumentMetadata {
    /// Use the configured collections, or the root name when none are configured
    pub fn for_root(root_name: &str, collections: &[String], format: OutputFormat) -> Self {
        let collections: Vec<String> = collections
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        let collections = if collections.is_empty() {
            vec![root_name.to_string()]
        } else {
            collections
        };
        Self { collections, format }
    }
}

/// A serialized document ready for persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteUnit {
    /// Content address (storage key)
    pub uri: String,
    /// Serialized document text
    pub content: String,
    /// Collections and format
    pub metadata: DocumentMetadata,
    /// Transform to apply during the write, if configured
    pub transform: Option<ServerTransform>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flattened_parameters() {
        let transform = ServerTransform::from_flattened("simple", "monster,grover,trash,oscar").unwrap();
        assert_eq!(transform.name, "simple");
        let expected: IndexMap<String, String> = [("monster", "grover"), ("trash", "oscar")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(transform.parameters, expected);
    }

    #[test]
    fn test_empty_parameters() {
        let transform = ServerTransform::from_flattened("simple", "").unwrap();
        assert!(transform.parameters.is_empty());
    }

    #[test]
    fn test_odd_parameter_count_rejected() {
        assert_eq!(
            ServerTransform::from_flattened("simple", "monster,grover,trash"),
            Err(TransformError::MissingValue("trash".to_string()))
        );
    }

    #[test]
    fn test_empty_name_rejected() {
        assert_eq!(ServerTransform::new("  "), Err(TransformError::EmptyName));
    }

    #[test]
    fn test_collections_default_to_root_name() {
        let metadata = DocumentMetadata::for_root("customer", &[], OutputFormat::Xml);
        assert_eq!(metadata.collections, vec!["customer".to_string()]);

        let configured = vec!["a".to_string(), " b ".to_string(), "".to_string()];
        let metadata = DocumentMetadata::for_root("customer", &configured, OutputFormat::Xml);
        assert_eq!(metadata.collections, vec!["a".to_string(), "b".to_string()]);
    }
}
