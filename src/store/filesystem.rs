//! Directory-backed document store
//!
//! Each document is written at `<root>/<uri>` with a `<file>.metadata.json`
//! sidecar holding its collections, format and transform. A batch is first
//! staged under temporary names and only renamed into place once every file of
//! the batch has been written. If a rename fails, files already moved in are
//! removed again along with the remaining staged files.

use super::{DocumentStore, StoreError};
use crate::serialize::OutputFormat;
use crate::writer::{ServerTransform, WriteUnit};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

const METADATA_SUFFIX: &str = ".metadata.json";

/// Sidecar written next to every document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMetadata {
    pub uri: String,
    pub collections: Vec<String>,
    pub format: OutputFormat,
    pub transform: Option<ServerTransform>,
    pub written_at: chrono::DateTime<chrono::Utc>,
}

/// Writes documents under a root directory
#[derive(Debug, Clone)]
pub struct FileSystemStore {
    root: PathBuf,
}

impl FileSystemStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of a content address
    pub fn path_for(&self, uri: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(uri.trim_start_matches('/'));
        let safe = !relative.as_os_str().is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(StoreError::InvalidUri(uri.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Read a stored document back
    pub fn read(&self, uri: &str) -> Result<String, StoreError> {
        Ok(std::fs::read_to_string(self.path_for(uri)?)?)
    }

    /// Read a stored document's sidecar
    pub fn read_metadata(&self, uri: &str) -> Result<StoredMetadata, StoreError> {
        let path = sidecar_path(&self.path_for(uri)?);
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn stage(&self, units: &[WriteUnit], batch_id: &str, staged: &mut Vec<(PathBuf, PathBuf)>) -> Result<(), StoreError> {
        let written_at = chrono::Utc::now();
        for unit in units {
            let target = self.path_for(&unit.uri)?;
            if target.is_dir() {
                return Err(StoreError::InvalidUri(format!(
                    "{} (a directory already exists at {})",
                    unit.uri,
                    target.display()
                )));
            }
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let temp = temp_path(&target, batch_id);
            std::fs::write(&temp, &unit.content)?;
            staged.push((temp, target.clone()));

            let sidecar = StoredMetadata {
                uri: unit.uri.clone(),
                collections: unit.metadata.collections.clone(),
                format: unit.metadata.format,
                transform: unit.transform.clone(),
                written_at,
            };
            let sidecar_target = sidecar_path(&target);
            let sidecar_temp = temp_path(&sidecar_target, batch_id);
            std::fs::write(&sidecar_temp, serde_json::to_string_pretty(&sidecar)?)?;
            staged.push((sidecar_temp, sidecar_target));
        }
        Ok(())
    }
}

impl DocumentStore for FileSystemStore {
    fn write_batch(&self, units: &[WriteUnit]) -> Result<(), StoreError> {
        let batch_id = Uuid::new_v4().simple().to_string();
        let mut staged = Vec::with_capacity(units.len() * 2);

        if let Err(e) = self.stage(units, &batch_id, &mut staged) {
            remove_all(staged.iter().map(|(temp, _)| temp));
            return Err(e);
        }

        for (index, (temp, target)) in staged.iter().enumerate() {
            if let Err(e) = std::fs::rename(temp, target) {
                warn!(
                    "Rolling back batch {}: failed to move {} into place: {}",
                    batch_id,
                    target.display(),
                    e
                );
                remove_all(staged[..index].iter().map(|(_, target)| target));
                remove_all(staged[index..].iter().map(|(temp, _)| temp));
                return Err(e.into());
            }
        }
        debug!("Stored {} documents under {}", units.len(), self.root.display());
        Ok(())
    }

    fn name(&self) -> &str {
        "filesystem"
    }
}

fn remove_all<'a>(paths: impl Iterator<Item = &'a PathBuf>) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

fn sidecar_path(document: &Path) -> PathBuf {
    let mut name = document.as_os_str().to_os_string();
    name.push(METADATA_SUFFIX);
    PathBuf::from(name)
}

fn temp_path(target: &Path, batch_id: &str) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(format!(".{}.tmp", batch_id));
    PathBuf::from(name)
}
