//! Kind registry
//!
//! Maps the `kind` string of a configuration record to a factory that
//! declares the kind's parameters and keyword arguments and knows how to
//! construct it. Forward routines live in the same registry under their own
//! namespace.
//!
//! A process-wide registry pre-loaded with the built-in kinds is available
//! through [`Registry::global`]; builders borrow a registry, so tests and
//! embedders can use private instances.

mod builtins;
mod params;

pub use params::{
    check_kwargs, check_params, resolve_kwargs, resolve_values, KwargDecl, KwargDefault,
    KwargType, KwargValue, ParamDecl,
};

use crate::forward::ForwardRoutine;
use crate::models::{Cosmology, Lens, LightSource, NumericError};
use crate::schema::KwargMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KindCategory {
    Cosmology,
    Lens,
    Source,
    Simulator,
    Forward,
}

impl fmt::Display for KindCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            KindCategory::Cosmology => "cosmology",
            KindCategory::Lens => "lens",
            KindCategory::Source => "source",
            KindCategory::Simulator => "simulator",
            KindCategory::Forward => "forward routine",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("Unknown {} '{kind}'; registered: [{}]", kind_label(.category), .known.join(", "))]
    UnknownKind {
        kind: String,
        /// `None` when resolving across all categories
        category: Option<KindCategory>,
        known: Vec<String>,
    },

    #[error("{category} kind '{kind}' is already registered")]
    Conflict { kind: String, category: KindCategory },
}

pub(crate) fn kind_label(category: &Option<KindCategory>) -> String {
    match category {
        Some(category) => format!("{category} kind"),
        None => "kind".to_string(),
    }
}

/// Everything a constructor receives besides its dependencies
#[derive(Debug, Clone)]
pub struct ModelArgs {
    pub name: String,
    /// Keyword arguments merged over declared defaults
    pub kwargs: KwargMap,
}

impl ModelArgs {
    pub fn float(&self, key: &str) -> Result<f64, NumericError> {
        self.kwargs
            .get(key)
            .and_then(KwargValue::as_f64)
            .ok_or_else(|| self.missing(key))
    }

    pub fn flag(&self, key: &str) -> Result<bool, NumericError> {
        self.kwargs
            .get(key)
            .and_then(KwargValue::as_bool)
            .ok_or_else(|| self.missing(key))
    }

    fn missing(&self, key: &str) -> NumericError {
        NumericError::InvalidKwarg {
            module: self.name.clone(),
            name: key.to_string(),
        }
    }
}

/// Already-built dependencies of a lens
#[derive(Debug, Default)]
pub struct LensDeps {
    pub cosmology: Option<Arc<dyn Cosmology>>,
    /// Children in declared order (composites only)
    pub children: Vec<Arc<dyn Lens>>,
}

pub type CosmologyCtor = fn(&ModelArgs) -> Result<Arc<dyn Cosmology>, NumericError>;
pub type LensCtor = fn(&ModelArgs, LensDeps) -> Result<Arc<dyn Lens>, NumericError>;
pub type SourceCtor = fn(&ModelArgs) -> Result<Arc<dyn LightSource>, NumericError>;

#[derive(Clone, Copy)]
pub enum Constructor {
    Cosmology(CosmologyCtor),
    Lens(LensCtor),
    Source(SourceCtor),
    /// Simulators are assembled by the builder; the factory only names the
    /// routine used when the configuration does not choose one.
    Simulator { default_forward: &'static str },
}

impl Constructor {
    pub fn category(&self) -> KindCategory {
        match self {
            Constructor::Cosmology(_) => KindCategory::Cosmology,
            Constructor::Lens(_) => KindCategory::Lens,
            Constructor::Source(_) => KindCategory::Source,
            Constructor::Simulator { .. } => KindCategory::Simulator,
        }
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constructor::Simulator { default_forward } => f
                .debug_struct("Simulator")
                .field("default_forward", default_forward)
                .finish(),
            other => write!(f, "{}Constructor", other.category()),
        }
    }
}

/// Declaration and constructor of one kind
#[derive(Debug, Clone)]
pub struct Factory {
    pub kind: String,
    pub description: &'static str,
    pub params: Vec<ParamDecl>,
    pub kwargs: Vec<KwargDecl>,
    pub constructor: Constructor,
}

impl Factory {
    pub fn category(&self) -> KindCategory {
        self.constructor.category()
    }
}

#[derive(Default)]
pub struct Registry {
    factories: RwLock<BTreeMap<String, Arc<Factory>>>,
    forwards: RwLock<BTreeMap<String, Arc<dyn ForwardRoutine>>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kinds", &self.kinds())
            .field("forwards", &self.forward_names())
            .finish()
    }
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in kinds and forward routines.
    pub fn with_builtins() -> Self {
        let factories = builtins::factories()
            .into_iter()
            .map(|f| (f.kind.clone(), Arc::new(f)))
            .collect();
        let forwards = builtins::forwards()
            .into_iter()
            .map(|r| (r.name().to_string(), r))
            .collect();
        Self {
            factories: RwLock::new(factories),
            forwards: RwLock::new(forwards),
        }
    }

    /// Process-wide registry, initialised with the built-ins on first use.
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::with_builtins)
    }

    pub fn register(&self, factory: Factory) -> Result<(), RegistryError> {
        let mut factories = self.factories.write();
        if factories.contains_key(&factory.kind) {
            return Err(RegistryError::Conflict {
                category: factory.category(),
                kind: factory.kind,
            });
        }
        debug!(kind = %factory.kind, category = %factory.category(), "registered kind");
        factories.insert(factory.kind.clone(), Arc::new(factory));
        Ok(())
    }

    pub fn resolve(&self, kind: &str) -> Result<Arc<Factory>, RegistryError> {
        let factories = self.factories.read();
        factories
            .get(kind)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownKind {
                kind: kind.to_string(),
                category: None,
                known: factories.keys().cloned().collect(),
            })
    }

    /// Resolve a kind that must belong to `category`.
    pub fn resolve_category(
        &self,
        kind: &str,
        category: KindCategory,
    ) -> Result<Arc<Factory>, RegistryError> {
        let factories = self.factories.read();
        match factories.get(kind) {
            Some(factory) if factory.category() == category => Ok(Arc::clone(factory)),
            _ => Err(RegistryError::UnknownKind {
                kind: kind.to_string(),
                category: Some(category),
                known: factories
                    .values()
                    .filter(|f| f.category() == category)
                    .map(|f| f.kind.clone())
                    .collect(),
            }),
        }
    }

    /// All registered kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }

    pub fn kinds_of(&self, category: KindCategory) -> Vec<Arc<Factory>> {
        self.factories
            .read()
            .values()
            .filter(|f| f.category() == category)
            .cloned()
            .collect()
    }

    pub fn register_forward(&self, routine: Arc<dyn ForwardRoutine>) -> Result<(), RegistryError> {
        let mut forwards = self.forwards.write();
        let name = routine.name().to_string();
        if forwards.contains_key(&name) {
            return Err(RegistryError::Conflict {
                kind: name,
                category: KindCategory::Forward,
            });
        }
        debug!(routine = %name, "registered forward routine");
        forwards.insert(name, routine);
        Ok(())
    }

    pub fn resolve_forward(&self, name: &str) -> Result<Arc<dyn ForwardRoutine>, RegistryError> {
        let forwards = self.forwards.read();
        forwards
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownKind {
                kind: name.to_string(),
                category: Some(KindCategory::Forward),
                known: forwards.keys().cloned().collect(),
            })
    }

    pub fn forward_names(&self) -> Vec<String> {
        self.forwards.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        let registry = Registry::with_builtins();
        assert_eq!(
            registry.kinds(),
            vec!["FlatLambdaCDM", "Lens_Source", "Multiplane", "Point", "SIE", "SIS", "Sersic"]
        );
        assert_eq!(
            registry.forward_names(),
            vec!["convergence", "lens_source", "unlensed"]
        );
    }

    #[test]
    fn test_register_conflict() {
        let registry = Registry::with_builtins();
        let sie = registry.resolve("SIE").unwrap();
        let err = registry.register((*sie).clone()).unwrap_err();
        assert_eq!(
            err,
            RegistryError::Conflict {
                kind: "SIE".into(),
                category: KindCategory::Lens
            }
        );
    }

    #[test]
    fn test_unknown_kind_lists_registered_kinds() {
        let registry = Registry::with_builtins();
        match registry.resolve("NFW").unwrap_err() {
            RegistryError::UnknownKind { kind, known, .. } => {
                assert_eq!(kind, "NFW");
                assert!(known.contains(&"SIE".to_string()));
                assert!(known.windows(2).all(|w| w[0] <= w[1]));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_wrong_category_is_unknown() {
        let registry = Registry::with_builtins();
        match registry
            .resolve_category("Sersic", KindCategory::Lens)
            .unwrap_err()
        {
            RegistryError::UnknownKind { known, category, .. } => {
                assert_eq!(category, Some(KindCategory::Lens));
                assert_eq!(known, vec!["Multiplane", "Point", "SIE", "SIS"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_private_registry_accepts_new_kind() {
        let registry = Registry::new();
        let sis = Registry::with_builtins().resolve("SIS").unwrap();
        let mut custom = (*sis).clone();
        custom.kind = "MySIS".into();
        registry.register(custom).unwrap();
        assert_eq!(registry.kinds(), vec!["MySIS"]);
        assert!(Registry::global().resolve("MySIS").is_err());
    }
}
