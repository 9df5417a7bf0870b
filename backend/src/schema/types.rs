// Configuration record types
//
// Records are produced by the loader (or built in memory) and are immutable
// once handed to the builder.

use crate::forward::types::ForwardScript;
use crate::registry::KwargValue;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Lens kind whose records carry child lenses instead of parameters.
pub const MULTIPLANE_KIND: &str = "Multiplane";

/// A configured parameter value
///
/// `Static` values are fixed at build time; `Dynamic` parameters must be
/// supplied on every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Static(f64),
    Dynamic,
}

impl ParamValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            ParamValue::Static(v) => Some(*v),
            ParamValue::Dynamic => None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, ParamValue::Dynamic)
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParamValue::Static(v) => serializer.serialize_f64(*v),
            ParamValue::Dynamic => serializer.serialize_none(),
        }
    }
}

pub type ParamMap = BTreeMap<String, ParamValue>;
pub type KwargMap = BTreeMap<String, KwargValue>;

/// Where a record's parameter values come from
///
/// Inline values and an external file are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamSource {
    Inline(ParamMap),
    #[serde(rename = "from_file")]
    File(PathBuf),
}

impl Default for ParamSource {
    fn default() -> Self {
        ParamSource::Inline(ParamMap::new())
    }
}

impl ParamSource {
    /// Inline values; `None` until a file source has been resolved.
    pub fn inline(&self) -> Option<&ParamMap> {
        match self {
            ParamSource::Inline(map) => Some(map),
            ParamSource::File(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CosmologyConfig {
    pub name: String,
    pub kind: String,
    pub params: ParamSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LensLeafConfig {
    pub name: String,
    pub kind: String,
    pub params: ParamSource,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub kwargs: KwargMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cosmology: Option<CosmologyConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiplaneConfig {
    pub name: String,
    pub lenses: Vec<LensConfig>,
}

/// Lens record: a single plane, or an ordered stack of child lenses
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LensConfig {
    Leaf(LensLeafConfig),
    Multiplane(MultiplaneConfig),
}

impl LensConfig {
    pub fn name(&self) -> &str {
        match self {
            LensConfig::Leaf(leaf) => &leaf.name,
            LensConfig::Multiplane(multi) => &multi.name,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            LensConfig::Leaf(leaf) => &leaf.kind,
            LensConfig::Multiplane(_) => MULTIPLANE_KIND,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceConfig {
    pub name: String,
    pub kind: String,
    pub params: ParamSource,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub kwargs: KwargMap,
}

/// Forward routine selection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardSpec {
    /// A routine registered under this name
    Builtin(String),
    /// A literal expression tree evaluated by the sandboxed interpreter
    Script(ForwardScript),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatorConfig {
    pub name: String,
    pub kind: String,
    pub params: ParamMap,
    pub kwargs: KwargMap,
    pub lens: LensConfig,
    pub src: SourceConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lens_light: Option<SourceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward: Option<ForwardSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateLoad {
    pub path: PathBuf,
}

/// A complete configuration document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub simulator: SimulatorConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<StateLoad>,
    /// Directory relative paths resolve against; `None` means the current
    /// directory.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}
