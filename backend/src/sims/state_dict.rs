//! State dictionary
//!
//! An immutable snapshot of a simulator's static parameter values, keyed
//! `module.name`, with metadata identifying the software version, creation
//! time and the simulator structure it was taken from.
//!
//! # File format
//!
//! JSON, extension `.json`:
//!
//! ```json
//! {
//!   "metadata": {
//!     "software_version": "0.1.0",
//!     "created_time": "2024-05-01T12:00:00+00:00",
//!     "structure_hash": "9f2c...",
//!     "module_order": ["sim", "lens", "cosmo", "src"]
//!   },
//!   "params": { "lens.q": 0.8, "sim.z_s": 1.5 }
//! }
//! ```

use super::params::ParamTable;
use crate::io::{self, IoError};
use crate::schema::ParamValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const STATE_EXTENSION: &str = "json";
const DEFAULT_FILE_FORMAT: &str = "%Y%m%dT%H%M%S_caustics.json";

#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error("State serialization failed: {0}")]
    Serialization(String),

    #[error("State files must have the .json extension: '{}'", .0.display())]
    InvalidExtension(PathBuf),

    #[error("State parameter '{0}' does not exist in this simulator")]
    UnknownParameter(String),

    #[error("State parameter '{0}' is dynamic in this simulator")]
    NotStatic(String),

    #[error("State was taken from a different simulator structure (expected hash {expected}, found {found})")]
    StructureMismatch { expected: String, found: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMetadata {
    pub software_version: String,
    /// RFC 3339
    pub created_time: String,
    pub structure_hash: String,
    pub module_order: Vec<String>,
}

/// Static parameter snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDict {
    metadata: StateMetadata,
    params: BTreeMap<String, f64>,
}

impl StateDict {
    pub(crate) fn from_table(table: &ParamTable) -> Result<Self, StateError> {
        let params = table
            .modules()
            .iter()
            .flat_map(|m| {
                m.iter().filter_map(move |(decl, value)| {
                    value
                        .value()
                        .map(|v| (format!("{}.{}", m.module, decl.name), v))
                })
            })
            .collect();

        Ok(Self {
            metadata: StateMetadata {
                software_version: env!("CARGO_PKG_VERSION").to_string(),
                created_time: Utc::now().to_rfc3339(),
                structure_hash: compute_structure_hash(table)?,
                module_order: table.module_names(),
            },
            params,
        })
    }

    pub fn params(&self) -> &BTreeMap<String, f64> {
        &self.params
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.params.get(key).copied()
    }

    pub fn metadata(&self) -> &StateMetadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn to_json(&self) -> Result<String, StateError> {
        serde_json::to_string_pretty(self).map_err(|e| StateError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, StateError> {
        serde_json::from_str(json).map_err(|e| StateError::Serialization(e.to_string()))
    }

    /// Write to `path`, or to a timestamped file in the current directory.
    /// Returns the absolute path written.
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf, StateError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(self.default_file_name()),
        };
        if path.extension().and_then(|e| e.to_str()) != Some(STATE_EXTENSION) {
            return Err(StateError::InvalidExtension(path));
        }
        let written = io::to_file(&path, &self.to_json()?)?;
        info!(path = %written.display(), params = self.len(), "saved state");
        Ok(written)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let path = path.as_ref();
        if path.extension().and_then(|e| e.to_str()) != Some(STATE_EXTENSION) {
            return Err(StateError::InvalidExtension(path.to_path_buf()));
        }
        Self::from_json(&io::from_file(path)?)
    }

    fn default_file_name(&self) -> String {
        let created = DateTime::parse_from_rfc3339(&self.metadata.created_time)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        created.format(DEFAULT_FILE_FORMAT).to_string()
    }

    /// Override static values in `table`.
    pub(crate) fn apply(&self, table: &mut ParamTable) -> Result<(), StateError> {
        let found = compute_structure_hash(table)?;
        if found != self.metadata.structure_hash {
            return Err(StateError::StructureMismatch {
                expected: found,
                found: self.metadata.structure_hash.clone(),
            });
        }

        for (key, value) in &self.params {
            let unknown = || StateError::UnknownParameter(key.clone());
            let (module, name) = key.split_once('.').ok_or_else(unknown)?;
            let entry = table.get_mut(module).ok_or_else(unknown)?;
            let index = entry.position(name).ok_or_else(unknown)?;
            match &mut entry.values[index] {
                ParamValue::Dynamic => return Err(StateError::NotStatic(key.clone())),
                ParamValue::Static(v) => *v = *value,
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ModuleShape<'a> {
    module: &'a str,
    kind: &'a str,
    params: Vec<&'static str>,
}

/// SHA-256 of the canonical JSON of module names, kinds and parameter
/// names, in table order.
pub fn compute_structure_hash(table: &ParamTable) -> Result<String, StateError> {
    use serde_json::Value;

    let shape: Vec<ModuleShape<'_>> = table
        .modules()
        .iter()
        .map(|m| ModuleShape {
            module: &m.module,
            kind: &m.kind,
            params: m.decls.iter().map(|d| d.name).collect(),
        })
        .collect();

    let value = serde_json::to_value(&shape)
        .map_err(|e| StateError::Serialization(format!("Structure serialization failed: {e}")))?;

    // Recursively sort all object keys for canonical representation
    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value))
        .map_err(|e| StateError::Serialization(format!("Structure serialization failed: {e}")))?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}
