//! Configuration for rowdoc

mod logging;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

use crate::columnmap::{LabelCase, ProcessorConfig};
use crate::migrate::DEFAULT_CHUNK_SIZE;
use crate::serialize::xml::check_name;
use crate::serialize::OutputFormat;
use crate::writer::{ServerTransform, DEFAULT_ROOT_NAME};
use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Upper bound on rows per chunk
pub const MAX_CHUNK_SIZE: usize = 100_000;

/// Main configuration for a migration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Relational source
    #[serde(default)]
    pub source: SourceConfig,
    /// Document output
    #[serde(default)]
    pub output: OutputConfig,
    /// Server-side transform attached to every write
    #[serde(default)]
    pub transform: TransformConfig,
    /// Chunking and limits
    #[serde(default)]
    pub job: JobConfig,
    /// Document store
    #[serde(default)]
    pub store: StoreConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Relational source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// SQLite database file
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// Query whose column aliases are slash-delimited paths
    #[serde(default)]
    pub sql: String,
}

fn default_database() -> PathBuf {
    PathBuf::from("data.db")
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            sql: String::new(),
        }
    }
}

/// Document output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Root element name and URI prefix
    #[serde(default = "default_root_name")]
    pub root_name: String,
    /// Namespace declared on the XML root element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_namespace: Option<String>,
    /// Collections for every document; a list or a comma-separated string
    #[serde(default, deserialize_with = "deserialize_collections")]
    pub collections: Vec<String>,
    /// Column used to group rows; the first column when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier_column: Option<String>,
    /// Keep the identifier column as a field of the document
    #[serde(default)]
    pub retain_identifier: bool,
    #[serde(default)]
    pub label_case: LabelCase,
}

fn default_root_name() -> String {
    DEFAULT_ROOT_NAME.to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            root_name: default_root_name(),
            root_namespace: None,
            collections: Vec::new(),
            identifier_column: None,
            retain_identifier: false,
            label_case: LabelCase::default(),
        }
    }
}

impl OutputConfig {
    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            identifier_column: self.identifier_column.clone(),
            retain_identifier: self.retain_identifier,
            label_case: self.label_case,
        }
    }
}

/// Server-side transform configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Transform name; no transform is attached when empty
    #[serde(default)]
    pub name: String,
    /// Flattened `key,value,key,value` parameter list
    #[serde(default)]
    pub parameters: String,
}

impl TransformConfig {
    /// Build the transform, if one is configured
    pub fn build(&self) -> Result<Option<ServerTransform>> {
        if self.name.trim().is_empty() {
            if !self.parameters.trim().is_empty() {
                anyhow::bail!("transform parameters are set but no transform name is given");
            }
            return Ok(None);
        }
        let transform = ServerTransform::from_flattened(self.name.trim(), &self.parameters)
            .map_err(|e| anyhow::anyhow!("Invalid transform '{}': {}", self.name, e))?;
        Ok(Some(transform))
    }
}

/// Chunking and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Rows per chunk; one store call is made per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Stop after this many documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_records: Option<usize>,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_records: None,
        }
    }
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory documents are written under
    #[serde(default = "default_store_directory")]
    pub directory: PathBuf,
}

fn default_store_directory() -> PathBuf {
    PathBuf::from("output")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: default_store_directory(),
        }
    }
}

/// Split a comma-separated collection list, dropping blanks
pub fn parse_collections(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

fn deserialize_collections<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Collections {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Collections::deserialize(deserializer)? {
        Collections::List(list) => list
            .iter()
            .flat_map(|c| parse_collections(c))
            .collect(),
        Collections::Joined(joined) => parse_collections(&joined),
    })
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// The file is only parsed here; call [`Config::validate`] once command
    /// line overrides have been applied.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Transform attached to every write, if any
    pub fn transform(&self) -> Result<Option<ServerTransform>> {
        self.transform.build()
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // Source
        if self.source.database.as_os_str().is_empty() {
            errors.push("source database must not be empty".to_string());
        }
        if self.source.sql.trim().is_empty() {
            errors.push("source sql must not be empty".to_string());
        }

        // Output
        let root = self.output.root_name.trim();
        if root.is_empty() {
            errors.push("root_name must not be empty".to_string());
        } else if root.contains('/') || root.chars().any(char::is_whitespace) {
            errors.push(format!(
                "root_name '{}' must not contain '/' or whitespace",
                root
            ));
        } else if self.output.format == OutputFormat::Xml && check_name(root).is_err() {
            errors.push(format!(
                "root_name '{}' is not a valid XML element name",
                root
            ));
        }
        if let Some(ref column) = self.output.identifier_column {
            if column.trim().is_empty() {
                errors.push("identifier_column must not be blank when set".to_string());
            }
        }

        // Transform
        if let Err(e) = self.transform.build() {
            errors.push(e.to_string());
        }

        // Job
        if self.job.chunk_size == 0 {
            errors.push("chunk_size must be positive".to_string());
        }
        if self.job.chunk_size > MAX_CHUNK_SIZE {
            errors.push(format!("chunk_size must be <= {}", MAX_CHUNK_SIZE));
        }
        if self.job.max_records == Some(0) {
            errors.push("max_records must be positive when set".to_string());
        }

        // Store
        if self.store.directory.as_os_str().is_empty() {
            errors.push("store directory must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Helper: build a valid config for mutation-based testing
    // ========================================================================

    fn valid_config() -> Config {
        let mut cfg = Config::default();
        cfg.source.sql = "SELECT id, name FROM customer ORDER BY id".to_string();
        cfg
    }

    // ========================================================================
    // Config::validate – happy path
    // ========================================================================

    #[test]
    fn valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn default_config_requires_sql() {
        let err = Config::default().validate().unwrap_err().to_string();
        assert!(err.contains("sql must not be empty"), "got: {}", err);
    }

    // ========================================================================
    // Config::validate – field errors
    // ========================================================================

    #[test]
    fn validate_rejects_zero_chunk_size() {
        let mut cfg = valid_config();
        cfg.job.chunk_size = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_oversized_chunk_size() {
        let mut cfg = valid_config();
        cfg.job.chunk_size = MAX_CHUNK_SIZE + 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_root_name_with_slash() {
        let mut cfg = valid_config();
        cfg.output.root_name = "a/b".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_invalid_xml_root_name() {
        for name in ["1item", "a:b", "it&em"] {
            let mut cfg = valid_config();
            cfg.output.root_name = name.to_string();
            let msg = cfg.validate().unwrap_err().to_string();
            assert!(msg.contains("not a valid XML element name"), "{}: {}", name, msg);
        }
    }

    #[test]
    fn validate_allows_any_uri_safe_root_name_for_json() {
        let mut cfg = valid_config();
        cfg.output.format = OutputFormat::Json;
        cfg.output.root_name = "1item".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_dangling_transform_parameter() {
        let mut cfg = valid_config();
        cfg.transform.name = "simple".to_string();
        cfg.transform.parameters = "monster,grover,trash".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_parameters_without_name() {
        let mut cfg = valid_config();
        cfg.transform.parameters = "monster,grover".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_collects_multiple_errors() {
        let mut cfg = valid_config();
        cfg.job.chunk_size = 0;
        cfg.output.root_name = String::new();
        cfg.source.sql = String::new();

        let msg = cfg.validate().unwrap_err().to_string();
        assert!(msg.contains("chunk_size must be positive"), "missing chunk_size error in: {}", msg);
        assert!(msg.contains("root_name must not be empty"), "missing root_name error in: {}", msg);
        assert!(msg.contains("sql must not be empty"), "missing sql error in: {}", msg);
    }

    // ========================================================================
    // TOML parsing
    // ========================================================================

    #[test]
    fn parses_full_toml() {
        let cfg: Config = toml::from_str(
            r#"
            [source]
            database = "shop.db"
            sql = "SELECT id, name, total AS \"invoice/total\" FROM customer ORDER BY id"

            [output]
            format = "structured"
            root_name = "customer"
            collections = "customer, finance"
            identifier_column = "id"
            label_case = "lower"

            [transform]
            name = "simple"
            parameters = "monster,grover"

            [job]
            chunk_size = 50
            max_records = 1000

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.source.database, PathBuf::from("shop.db"));
        assert_eq!(cfg.output.format, OutputFormat::Json);
        assert_eq!(cfg.output.collections, vec!["customer", "finance"]);
        assert_eq!(cfg.output.label_case, LabelCase::Lower);
        assert_eq!(cfg.job.chunk_size, 50);
        assert_eq!(cfg.job.max_records, Some(1000));
        assert_eq!(cfg.logging.level, LogLevel::Debug);
        assert_eq!(cfg.logging.format, LogFormat::Json);
        assert_eq!(cfg.store.directory, PathBuf::from("output"));

        let transform = cfg.transform().unwrap().unwrap();
        assert_eq!(transform.name, "simple");
        assert_eq!(transform.parameters.get("monster").map(String::as_str), Some("grover"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn collections_accept_list() {
        let cfg: Config = toml::from_str("[output]\ncollections = [\"a\", \" b \"]\n").unwrap();
        assert_eq!(cfg.output.collections, vec!["a", "b"]);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.output.root_name, DEFAULT_ROOT_NAME);
        assert_eq!(cfg.output.format, OutputFormat::Xml);
        assert_eq!(cfg.job.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(cfg.transform().unwrap().is_none());
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let text = valid_config().to_toml().unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.source.sql, valid_config().source.sql);
        assert_eq!(parsed.job.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(Path::new("/nonexistent/rowdoc.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn processor_config_mirrors_output() {
        let mut cfg = valid_config();
        cfg.output.identifier_column = Some("cust_id".to_string());
        cfg.output.retain_identifier = true;
        let pc = cfg.output.processor_config();
        assert_eq!(pc.identifier_column.as_deref(), Some("cust_id"));
        assert!(pc.retain_identifier);
    }
}
