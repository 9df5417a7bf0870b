// Structural validation of configuration records
//
// Checks that hold independently of the registry: naming, nesting and
// cosmology sharing. Kind-specific checks (declared parameters and keyword
// arguments) run in the builder once kinds are resolved.
//
// All errors are collected; callers get the complete list.

use super::types::{Config, CosmologyConfig, LensConfig, SourceConfig};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// A single validation failure
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{path}: expected {expected}, received {received}")]
pub struct ValidationError {
    /// Dotted field path, list items as `lenses[1]`
    pub path: String,
    pub expected: String,
    pub received: String,
}

impl ValidationError {
    pub fn new(
        path: impl fmt::Display,
        expected: impl Into<String>,
        received: impl Into<String>,
    ) -> Self {
        Self {
            path: path.to_string(),
            expected: expected.into(),
            received: received.into(),
        }
    }
}

/// Location of a field inside a configuration document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn root(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn field(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}.{}", self.0, name))
        }
    }

    pub fn index(&self, i: usize) -> Self {
        Self(format!("{}[{}]", self.0, i))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate the structural invariants of a configuration
///
/// # Checks
///
/// 1. Names and kinds are non-empty; names contain no `.`
/// 2. Module names are unique across the document, except cosmologies that
///    share a name with an identical definition (one shared instance)
/// 3. Multiplane lenses have at least one child
/// 4. Lenses inside a Multiplane carry a cosmology
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut checker = StructureChecker::default();
    let sim = &config.simulator;
    let root = FieldPath::root("simulator");

    checker.module(&sim.name, &sim.kind, &root);
    checker.lens(&sim.lens, &root.field("lens"), false);
    checker.source(&sim.src, &root.field("src"));
    if let Some(light) = &sim.lens_light {
        checker.source(light, &root.field("lens_light"));
    }

    if checker.errors.is_empty() {
        Ok(())
    } else {
        Err(checker.errors)
    }
}

#[derive(Default)]
struct StructureChecker<'a> {
    /// Non-cosmology module names and where they were first seen
    modules: BTreeMap<&'a str, FieldPath>,
    cosmologies: BTreeMap<&'a str, (&'a CosmologyConfig, FieldPath)>,
    errors: Vec<ValidationError>,
}

impl<'a> StructureChecker<'a> {
    fn names(&mut self, name: &str, kind: &str, path: &FieldPath) -> bool {
        let mut ok = true;
        if name.is_empty() {
            self.errors
                .push(ValidationError::new(path.field("name"), "a non-empty name", "\"\""));
            ok = false;
        } else if name.contains('.') {
            self.errors.push(ValidationError::new(
                path.field("name"),
                "a name without '.'",
                format!("\"{name}\""),
            ));
            ok = false;
        }
        if kind.is_empty() {
            self.errors
                .push(ValidationError::new(path.field("kind"), "a non-empty kind", "\"\""));
        }
        ok
    }

    fn module(&mut self, name: &'a str, kind: &str, path: &FieldPath) {
        if !self.names(name, kind, path) {
            return;
        }
        if let Some(first) = self.modules.get(name) {
            self.errors.push(ValidationError::new(
                path.field("name"),
                format!("a module name not already used at {first}"),
                format!("\"{name}\""),
            ));
        } else if let Some((_, first)) = self.cosmologies.get(name) {
            self.errors.push(ValidationError::new(
                path.field("name"),
                format!("a module name not already used by the cosmology at {first}"),
                format!("\"{name}\""),
            ));
        } else {
            self.modules.insert(name, path.clone());
        }
    }

    fn cosmology(&mut self, cosmo: &'a CosmologyConfig, path: &FieldPath) {
        if !self.names(&cosmo.name, &cosmo.kind, path) {
            return;
        }
        if let Some(first) = self.modules.get(cosmo.name.as_str()) {
            self.errors.push(ValidationError::new(
                path.field("name"),
                format!("a cosmology name not already used by the module at {first}"),
                format!("\"{}\"", cosmo.name),
            ));
            return;
        }
        match self.cosmologies.get(cosmo.name.as_str()) {
            Some((existing, first)) if *existing != cosmo => {
                self.errors.push(ValidationError::new(
                    path.clone(),
                    format!(
                        "the same definition as the shared cosmology '{}' at {first}",
                        cosmo.name
                    ),
                    "a conflicting definition",
                ));
            }
            Some(_) => {}
            None => {
                self.cosmologies
                    .insert(cosmo.name.as_str(), (cosmo, path.clone()));
            }
        }
    }

    fn lens(&mut self, lens: &'a LensConfig, path: &FieldPath, in_multiplane: bool) {
        match lens {
            LensConfig::Leaf(leaf) => {
                self.module(&leaf.name, &leaf.kind, path);
                match &leaf.cosmology {
                    Some(cosmo) => self.cosmology(cosmo, &path.field("cosmology")),
                    None if in_multiplane => self.errors.push(ValidationError::new(
                        path.field("cosmology"),
                        "a cosmology record for a lens inside a Multiplane",
                        "nothing",
                    )),
                    None => {}
                }
            }
            LensConfig::Multiplane(multi) => {
                self.module(&multi.name, lens.kind(), path);
                if multi.lenses.is_empty() {
                    self.errors.push(ValidationError::new(
                        path.field("lenses"),
                        "a non-empty list of lenses",
                        "an empty list",
                    ));
                }
                for (i, child) in multi.lenses.iter().enumerate() {
                    self.lens(child, &path.field("lenses").index(i), true);
                }
            }
        }
    }

    fn source(&mut self, src: &'a SourceConfig, path: &FieldPath) {
        self.module(&src.name, &src.kind, path);
    }
}
