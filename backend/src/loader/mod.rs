//! Configuration loading
//!
//! Reads YAML (or JSON-shaped values) into the typed records of
//! [`crate::schema`]. Extraction walks the document by hand rather than
//! through derived `Deserialize` impls so that every problem is reported
//! with its field path, and all problems in a document are reported
//! together.

pub mod template;

pub use template::{render_template, write_template};

use crate::error::{CausticsError, ParseError};
use crate::forward::ForwardScript;
use crate::io;
use crate::registry::KwargValue;
use crate::schema::{
    expr, validate_config, Config, CosmologyConfig, FieldPath, ForwardSpec, KwargMap,
    LensConfig, LensLeafConfig, MultiplaneConfig, ParamMap, ParamSource, ParamValue,
    SimulatorConfig, SourceConfig, StateLoad, ValidationError, MULTIPLANE_KIND,
};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Anything a simulator can be built from
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// A YAML file; relative paths inside resolve against its directory
    Path(PathBuf),
    /// YAML text
    Yaml(String),
    Value(Value),
    Json(serde_json::Value),
    Config(Config),
}

impl ConfigSource {
    pub fn yaml(text: impl Into<String>) -> Self {
        ConfigSource::Yaml(text.into())
    }

    /// Parse and validate.
    pub fn load(self) -> Result<Config, CausticsError> {
        let config = match self {
            ConfigSource::Path(path) => load_config(&path)?,
            ConfigSource::Yaml(text) => parse_config_str(&text)?,
            ConfigSource::Value(value) => config_from_value(&value)?,
            ConfigSource::Json(value) => config_from_json(&value)?,
            ConfigSource::Config(config) => config,
        };
        validate_config(&config)?;
        Ok(config)
    }
}

impl From<&str> for ConfigSource {
    fn from(path: &str) -> Self {
        ConfigSource::Path(PathBuf::from(path))
    }
}

impl From<String> for ConfigSource {
    fn from(path: String) -> Self {
        ConfigSource::Path(PathBuf::from(path))
    }
}

impl From<&Path> for ConfigSource {
    fn from(path: &Path) -> Self {
        ConfigSource::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for ConfigSource {
    fn from(path: PathBuf) -> Self {
        ConfigSource::Path(path)
    }
}

impl From<&PathBuf> for ConfigSource {
    fn from(path: &PathBuf) -> Self {
        ConfigSource::Path(path.clone())
    }
}

impl From<Value> for ConfigSource {
    fn from(value: Value) -> Self {
        ConfigSource::Value(value)
    }
}

impl From<serde_json::Value> for ConfigSource {
    fn from(value: serde_json::Value) -> Self {
        ConfigSource::Json(value)
    }
}

impl From<Config> for ConfigSource {
    fn from(config: Config) -> Self {
        ConfigSource::Config(config)
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Read a YAML configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, CausticsError> {
    let path = path.as_ref();
    let text = io::from_file(path)?;
    let value: Value = serde_yaml::from_str(&text)
        .map_err(|e| ParseError::from_yaml(path.display().to_string(), &e))?;
    let mut config = config_from_value(&value)?;
    config.base_dir = path.parent().map(Path::to_path_buf);
    debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

pub fn parse_config_str(text: &str) -> Result<Config, CausticsError> {
    let value: Value =
        serde_yaml::from_str(text).map_err(|e| ParseError::from_yaml("<string>", &e))?;
    config_from_value(&value)
}

pub fn config_from_json(value: &serde_json::Value) -> Result<Config, CausticsError> {
    let value = serde_yaml::to_value(value).map_err(|e| ParseError::from_yaml("<json>", &e))?;
    config_from_value(&value)
}

pub fn config_from_value(value: &Value) -> Result<Config, CausticsError> {
    let mut ex = Extractor::default();
    let root = FieldPath::default();
    let config = ex.mapping(value, &root, &["simulator", "state"]).and_then(|map| {
        let simulator = ex.required(map, "simulator", &root).and_then(|v| {
            ex.simulator(v, &FieldPath::root("simulator"))
        });
        let state = match map.get("state") {
            Some(v) => ex.state(v, &FieldPath::root("state")).map(Some),
            None => Some(None),
        };
        Some(Config {
            simulator: simulator?,
            state: state?,
            base_dir: None,
        })
    });
    ex.finish(config)
}

/// Read a YAML mapping of parameter values referenced by `from_file`.
pub fn load_param_file(path: &Path, field: &FieldPath) -> Result<ParamMap, CausticsError> {
    let text = io::from_file(path)?;
    let value: Value = serde_yaml::from_str(&text)
        .map_err(|e| ParseError::from_yaml(path.display().to_string(), &e))?;
    let mut ex = Extractor::default();
    let params = ex.param_map(&value, field);
    ex.finish(params)
}

// ============================================================================
// Extraction
// ============================================================================

const SIMULATOR_KEYS: &[&str] = &[
    "name", "kind", "params", "kwargs", "lens", "src", "lens_light", "forward",
];
const LENS_KEYS: &[&str] = &["name", "kind", "params", "from_file", "kwargs", "cosmology"];
const MULTIPLANE_KEYS: &[&str] = &["name", "kind", "lenses"];
const SOURCE_KEYS: &[&str] = &["name", "kind", "params", "from_file", "kwargs"];
const COSMOLOGY_KEYS: &[&str] = &["name", "kind", "params", "from_file"];

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{s}'"),
        Value::Sequence(_) => "a sequence".into(),
        Value::Mapping(_) => "a mapping".into(),
        Value::Tagged(tagged) => format!("a value tagged {}", tagged.tag),
    }
}

/// Walks a document, recording every problem it meets.
#[derive(Default)]
struct Extractor {
    errors: Vec<ValidationError>,
}

impl Extractor {
    fn finish<T>(self, value: Option<T>) -> Result<T, CausticsError> {
        match value {
            Some(value) if self.errors.is_empty() => Ok(value),
            _ => Err(CausticsError::Validation(self.errors)),
        }
    }

    fn error(&mut self, path: &FieldPath, expected: impl Into<String>, received: impl Into<String>) {
        self.errors.push(ValidationError::new(path, expected, received));
    }

    /// A mapping whose keys are all in `accepted`.
    fn mapping<'v>(
        &mut self,
        value: &'v Value,
        path: &FieldPath,
        accepted: &[&str],
    ) -> Option<&'v Mapping> {
        let map = self.any_mapping(value, path)?;
        self.check_keys(map, path, accepted);
        Some(map)
    }

    fn any_mapping<'v>(&mut self, value: &'v Value, path: &FieldPath) -> Option<&'v Mapping> {
        match value {
            Value::Mapping(map) => Some(map),
            other => {
                self.error(path, "a mapping", describe(other));
                None
            }
        }
    }

    fn check_keys(&mut self, map: &Mapping, path: &FieldPath, accepted: &[&str]) {
        for key in map.keys() {
            match key.as_str() {
                Some(k) if accepted.contains(&k) => {}
                Some(k) => self.error(
                    &path.field(k),
                    format!("one of the keys [{}]", accepted.join(", ")),
                    "an unknown key",
                ),
                None => self.error(path, "string keys", describe(key)),
            }
        }
    }

    fn required<'v>(&mut self, map: &'v Mapping, key: &str, path: &FieldPath) -> Option<&'v Value> {
        let value = map.get(key);
        if value.is_none() {
            self.error(&path.field(key), "a value", "nothing");
        }
        value
    }

    fn string(&mut self, map: &Mapping, key: &str, path: &FieldPath) -> Option<String> {
        match self.required(map, key, path)? {
            Value::String(s) => Some(s.clone()),
            other => {
                self.error(&path.field(key), "a string", describe(other));
                None
            }
        }
    }

    fn param_value(&mut self, value: &Value, path: &FieldPath) -> Option<ParamValue> {
        let number = match value {
            Value::Null => return Some(ParamValue::Dynamic),
            Value::Number(n) => n.as_f64(),
            Value::String(s) => match expr::evaluate(s) {
                Ok(v) => Some(v),
                Err(e) => {
                    self.error(
                        path,
                        "a number, an arithmetic expression over numbers and pi, or null",
                        format!("'{s}' ({e})"),
                    );
                    return None;
                }
            },
            _ => None,
        };
        match number.filter(|v| v.is_finite()) {
            Some(v) => Some(ParamValue::Static(v)),
            None => {
                self.error(path, "a finite number or null", describe(value));
                None
            }
        }
    }

    /// `null` reads as an empty mapping.
    fn param_map(&mut self, value: &Value, path: &FieldPath) -> Option<ParamMap> {
        if value.is_null() {
            return Some(ParamMap::new());
        }
        let map = self.any_mapping(value, path)?;
        let mut params = ParamMap::new();
        let mut ok = true;
        for (key, value) in map {
            let Some(name) = key.as_str() else {
                self.error(path, "string keys", describe(key));
                ok = false;
                continue;
            };
            match self.param_value(value, &path.field(name)) {
                Some(v) => {
                    params.insert(name.to_string(), v);
                }
                None => ok = false,
            }
        }
        ok.then_some(params)
    }

    fn kwargs(&mut self, map: &Mapping, path: &FieldPath) -> Option<KwargMap> {
        let path = path.field("kwargs");
        let value = match map.get("kwargs") {
            None | Some(Value::Null) => return Some(KwargMap::new()),
            Some(value) => value,
        };
        let map = self.any_mapping(value, &path)?;
        let mut kwargs = KwargMap::new();
        for (key, value) in map {
            let Some(name) = key.as_str() else {
                self.error(&path, "string keys", describe(key));
                continue;
            };
            let kwarg = match value {
                Value::Bool(b) => Some(KwargValue::Bool(*b)),
                Value::Number(n) => n
                    .as_i64()
                    .map(KwargValue::Int)
                    .or_else(|| n.as_f64().map(KwargValue::Float)),
                Value::String(s) => Some(KwargValue::Str(s.clone())),
                _ => None,
            };
            match kwarg {
                Some(kwarg) => {
                    kwargs.insert(name.to_string(), kwarg);
                }
                None => self.error(
                    &path.field(name),
                    "a boolean, number or string",
                    describe(value),
                ),
            }
        }
        Some(kwargs)
    }

    fn param_source(&mut self, map: &Mapping, path: &FieldPath) -> Option<ParamSource> {
        match (map.get("params"), map.get("from_file")) {
            (Some(_), Some(_)) => {
                self.error(path, "either params or from_file", "both");
                None
            }
            (Some(params), None) => self
                .param_map(params, &path.field("params"))
                .map(ParamSource::Inline),
            (None, Some(Value::String(file))) => Some(ParamSource::File(PathBuf::from(file))),
            (None, Some(other)) => {
                self.error(&path.field("from_file"), "a file path", describe(other));
                None
            }
            (None, None) => Some(ParamSource::default()),
        }
    }

    fn cosmology(&mut self, value: &Value, path: &FieldPath) -> Option<CosmologyConfig> {
        let map = self.mapping(value, path, COSMOLOGY_KEYS)?;
        let name = self.string(map, "name", path);
        let kind = self.string(map, "kind", path);
        let params = self.param_source(map, path);
        Some(CosmologyConfig {
            name: name?,
            kind: kind?,
            params: params?,
        })
    }

    fn lens(&mut self, value: &Value, path: &FieldPath) -> Option<LensConfig> {
        let map = self.any_mapping(value, path)?;
        let name = self.string(map, "name", path);
        let kind = self.string(map, "kind", path);

        if kind.as_deref() == Some(MULTIPLANE_KIND) {
            self.check_keys(map, path, MULTIPLANE_KEYS);
            let lenses = match self.required(map, "lenses", path)? {
                Value::Sequence(items) => {
                    let list = path.field("lenses");
                    let children: Vec<_> = items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| self.lens(item, &list.index(i)))
                        .collect();
                    children.into_iter().collect::<Option<Vec<_>>>()
                }
                other => {
                    self.error(&path.field("lenses"), "a sequence of lenses", describe(other));
                    None
                }
            };
            return Some(LensConfig::Multiplane(MultiplaneConfig {
                name: name?,
                lenses: lenses?,
            }));
        }

        self.check_keys(map, path, LENS_KEYS);
        let params = self.param_source(map, path);
        let kwargs = self.kwargs(map, path);
        let cosmology = match map.get("cosmology") {
            Some(v) => self.cosmology(v, &path.field("cosmology")).map(Some),
            None => Some(None),
        };
        Some(LensConfig::Leaf(LensLeafConfig {
            name: name?,
            kind: kind?,
            params: params?,
            kwargs: kwargs?,
            cosmology: cosmology?,
        }))
    }

    fn source(&mut self, value: &Value, path: &FieldPath) -> Option<SourceConfig> {
        let map = self.mapping(value, path, SOURCE_KEYS)?;
        let name = self.string(map, "name", path);
        let kind = self.string(map, "kind", path);
        let params = self.param_source(map, path);
        let kwargs = self.kwargs(map, path);
        Some(SourceConfig {
            name: name?,
            kind: kind?,
            params: params?,
            kwargs: kwargs?,
        })
    }

    fn forward(&mut self, value: &Value, path: &FieldPath) -> Option<ForwardSpec> {
        if let Value::String(name) = value {
            return Some(ForwardSpec::Builtin(name.clone()));
        }
        let map = self.mapping(value, path, &["builtin", "script"])?;
        match (map.get("builtin"), map.get("script")) {
            (Some(Value::String(name)), None) => Some(ForwardSpec::Builtin(name.clone())),
            (None, Some(script)) => match serde_yaml::from_value::<ForwardScript>(script.clone()) {
                Ok(script) => Some(ForwardSpec::Script(script)),
                Err(e) => {
                    self.error(&path.field("script"), "a forward script", e.to_string());
                    None
                }
            },
            _ => {
                self.error(
                    path,
                    "a routine name, {builtin: name} or {script: ...}",
                    describe(value),
                );
                None
            }
        }
    }

    fn simulator(&mut self, value: &Value, path: &FieldPath) -> Option<SimulatorConfig> {
        let map = self.mapping(value, path, SIMULATOR_KEYS)?;
        let name = self.string(map, "name", path);
        let kind = self.string(map, "kind", path);
        let params = match map.get("params") {
            Some(v) => self.param_map(v, &path.field("params")),
            None => Some(ParamMap::new()),
        };
        let kwargs = self.kwargs(map, path);
        let lens = self
            .required(map, "lens", path)
            .and_then(|v| self.lens(v, &path.field("lens")));
        let src = self
            .required(map, "src", path)
            .and_then(|v| self.source(v, &path.field("src")));
        let lens_light = match map.get("lens_light") {
            Some(v) => self.source(v, &path.field("lens_light")).map(Some),
            None => Some(None),
        };
        let forward = match map.get("forward") {
            Some(v) => self.forward(v, &path.field("forward")).map(Some),
            None => Some(None),
        };
        Some(SimulatorConfig {
            name: name?,
            kind: kind?,
            params: params?,
            kwargs: kwargs?,
            lens: lens?,
            src: src?,
            lens_light: lens_light?,
            forward: forward?,
        })
    }

    fn state(&mut self, value: &Value, path: &FieldPath) -> Option<StateLoad> {
        let map = self.mapping(value, path, &["load"])?;
        let load_path = path.field("load");
        let load = self.required(map, "load", path)?;
        let load = self.mapping(load, &load_path, &["path"])?;
        let file = self.string(load, "path", &load_path)?;
        Some(StateLoad {
            path: PathBuf::from(file),
        })
    }
}
