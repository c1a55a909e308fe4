//! Snapshot loader - entity lists from JSON or YAML files
//!
//! Stands in for the data source: a snapshot is either a bare array of
//! entities or an object with an `entities` array. Names identify entities,
//! so later duplicates are dropped.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::Entity;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid JSON snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid YAML snapshot: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Unsupported snapshot format: {0}")]
    UnsupportedFormat(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Yaml,
}

impl SnapshotFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(SnapshotFormat::Json),
            "yaml" | "yml" => Some(SnapshotFormat::Yaml),
            _ => None,
        }
    }
}

/// `{ entities: [...] }` form of a snapshot
#[derive(Deserialize)]
struct Wrapped {
    entities: Vec<Entity>,
}

/// Load an entity snapshot from disk
pub fn load_snapshot(path: &Path) -> Result<Vec<Entity>, SourceError> {
    let format = SnapshotFormat::from_path(path)
        .ok_or_else(|| SourceError::UnsupportedFormat(path.to_path_buf()))?;
    let content = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let entities = parse_snapshot(&content, format)?;
    debug!("Loaded {} entities from {:?}", entities.len(), path);
    Ok(entities)
}

/// Parse snapshot text; duplicate names keep their first occurrence
pub fn parse_snapshot(content: &str, format: SnapshotFormat) -> Result<Vec<Entity>, SourceError> {
    // Pick the shape first so field errors surface as they are
    let entities: Vec<Entity> = match format {
        SnapshotFormat::Json => {
            let value: serde_json::Value = serde_json::from_str(content)?;
            if value.is_array() {
                serde_json::from_value(value)?
            } else {
                serde_json::from_value::<Wrapped>(value)?.entities
            }
        }
        SnapshotFormat::Yaml => {
            let value: serde_yaml::Value = serde_yaml::from_str(content)?;
            if value.is_sequence() {
                serde_yaml::from_value(value)?
            } else {
                serde_yaml::from_value::<Wrapped>(value)?.entities
            }
        }
    };

    let mut seen = HashSet::new();
    Ok(entities
        .into_iter()
        .filter(|e| {
            let fresh = seen.insert(e.name.clone());
            if !fresh {
                warn!("Duplicate entity '{}' in snapshot, keeping the first", e.name);
            }
            fresh
        })
        .collect())
}
