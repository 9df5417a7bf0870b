//! Input signature
//!
//! The ordered list of parameters a simulator consumes. Dynamic entries, in
//! order, define the positional call vector; named calls use the
//! `module.name` keys of the same entries.

use super::params::ParamTable;
use crate::models::Packed;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamRole {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignatureEntry {
    pub module: String,
    pub module_kind: String,
    pub name: String,
    pub role: ParamRole,
    /// Empty for scalars
    pub shape: Vec<usize>,
    /// Configured value of a static entry
    pub value: Option<f64>,
    pub description: String,
    pub unit: String,
}

impl SignatureEntry {
    /// `module.name`
    pub fn key(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct InputSignature {
    entries: Vec<SignatureEntry>,
}

impl InputSignature {
    /// Entries of consumed modules, in table order.
    pub fn from_table(table: &ParamTable) -> Self {
        let entries = table
            .modules()
            .iter()
            .filter(|m| m.consumed)
            .flat_map(|m| {
                m.iter().map(move |(decl, value)| SignatureEntry {
                    module: m.module.clone(),
                    module_kind: m.kind.clone(),
                    name: decl.name.to_string(),
                    role: if value.is_dynamic() {
                        ParamRole::Dynamic
                    } else {
                        ParamRole::Static
                    },
                    shape: Vec::new(),
                    value: value.value(),
                    description: decl.description.to_string(),
                    unit: decl.unit.to_string(),
                })
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[SignatureEntry] {
        &self.entries
    }

    pub fn dynamic(&self) -> impl Iterator<Item = &SignatureEntry> {
        self.entries
            .iter()
            .filter(|e| e.role == ParamRole::Dynamic)
    }

    /// Length of the positional call vector.
    pub fn dynamic_len(&self) -> usize {
        self.dynamic().count()
    }

    pub fn dynamic_keys(&self) -> Vec<String> {
        self.dynamic().map(SignatureEntry::key).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check `params` against the dynamic entries and pack every consumed
    /// module's values.
    pub fn pack(&self, table: &ParamTable, params: &CallParams) -> Result<Packed, SignatureMismatch> {
        let dynamic: Vec<&SignatureEntry> = self.dynamic().collect();
        let supplied: HashMap<String, f64> = match params {
            CallParams::Positional(values) => {
                if values.len() != dynamic.len() {
                    return Err(SignatureMismatch::Length {
                        expected: dynamic.len(),
                        received: values.len(),
                    });
                }
                dynamic.iter().map(|e| e.key()).zip(values.iter().copied()).collect()
            }
            CallParams::Named(map) => {
                let expected: BTreeSet<String> = dynamic.iter().map(|e| e.key()).collect();
                let missing: Vec<String> = expected
                    .iter()
                    .filter(|k| !map.contains_key(*k))
                    .cloned()
                    .collect();
                let unexpected: Vec<String> = map
                    .keys()
                    .filter(|k| !expected.contains(*k))
                    .cloned()
                    .collect();
                if !missing.is_empty() || !unexpected.is_empty() {
                    return Err(SignatureMismatch::Names {
                        missing,
                        unexpected,
                    });
                }
                map.iter().map(|(k, v)| (k.clone(), *v)).collect()
            }
        };

        // Report in signature order
        for entry in &dynamic {
            let key = entry.key();
            if let Some(value) = supplied.get(&key).filter(|v| !v.is_finite()) {
                return Err(SignatureMismatch::NotFinite { key, value: *value });
            }
        }

        let mut packed = Packed::new();
        for module in table.modules().iter().filter(|m| m.consumed) {
            let names = module.decls.iter().map(|d| d.name.to_string()).collect();
            let values = module
                .iter()
                .map(|(decl, value)| match value.value() {
                    Some(v) => Ok(v),
                    None => {
                        let key = format!("{}.{}", module.module, decl.name);
                        supplied
                            .get(&key)
                            .copied()
                            .ok_or_else(|| SignatureMismatch::Names {
                                missing: vec![key],
                                unexpected: Vec::new(),
                            })
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            packed.insert(module.module.clone(), names, values);
        }
        Ok(packed)
    }
}

/// Dynamic parameter values for one call
#[derive(Debug, Clone, PartialEq)]
pub enum CallParams {
    /// In input signature order
    Positional(Vec<f64>),
    /// Keyed `module.name`
    Named(BTreeMap<String, f64>),
}

impl CallParams {
    /// No dynamic parameters.
    pub fn none() -> Self {
        CallParams::Positional(Vec::new())
    }
}

impl From<Vec<f64>> for CallParams {
    fn from(values: Vec<f64>) -> Self {
        CallParams::Positional(values)
    }
}

impl From<&[f64]> for CallParams {
    fn from(values: &[f64]) -> Self {
        CallParams::Positional(values.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for CallParams {
    fn from(values: [f64; N]) -> Self {
        CallParams::Positional(values.to_vec())
    }
}

impl From<BTreeMap<String, f64>> for CallParams {
    fn from(values: BTreeMap<String, f64>) -> Self {
        CallParams::Named(values)
    }
}

/// Call parameters that do not fit the input signature
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SignatureMismatch {
    #[error("Expected {expected} dynamic parameters, received {received}")]
    Length { expected: usize, received: usize },

    #[error(
        "Parameter names do not match the input signature (missing: [{}], unexpected: [{}])",
        .missing.join(", "),
        .unexpected.join(", ")
    )]
    Names {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("Parameter '{key}' must be finite, received {value}")]
    NotFinite { key: String, value: f64 },
}
