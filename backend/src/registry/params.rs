// Parameter and keyword-argument declarations
//
// Every factory describes its inputs with these declarations. They drive
// validation of configuration records, the input signature, and the
// documentation comments in generated templates.

use crate::schema::{FieldPath, KwargMap, ParamMap, ParamValue, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A numeric model parameter
///
/// Parameters may be given a value in configuration (static) or left to be
/// supplied per call (dynamic). A declared default makes an omitted
/// parameter static.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamDecl {
    pub name: &'static str,
    pub default: Option<f64>,
    pub description: &'static str,
    pub unit: &'static str,
}

impl ParamDecl {
    pub const fn dynamic(name: &'static str, description: &'static str, unit: &'static str) -> Self {
        Self {
            name,
            default: None,
            description,
            unit,
        }
    }

    pub const fn with_default(
        name: &'static str,
        default: f64,
        description: &'static str,
        unit: &'static str,
    ) -> Self {
        Self {
            name,
            default: Some(default),
            description,
            unit,
        }
    }
}

/// Construction-time option value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KwargValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl KwargValue {
    /// Numeric view; integers widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            KwargValue::Float(v) => Some(*v),
            KwargValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            KwargValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            KwargValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KwargValue::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for KwargValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KwargValue::Bool(v) => write!(f, "{v}"),
            KwargValue::Int(v) => write!(f, "{v}"),
            KwargValue::Float(v) => write!(f, "{v}"),
            KwargValue::Str(v) => write!(f, "\"{v}\""),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum KwargType {
    Float,
    Int,
    Bool,
    Choice(&'static [&'static str]),
}

impl KwargType {
    fn accepts(&self, value: &KwargValue) -> bool {
        match self {
            KwargType::Float => value.as_f64().is_some(),
            KwargType::Int => value.as_i64().is_some(),
            KwargType::Bool => value.as_bool().is_some(),
            KwargType::Choice(options) => value.as_str().is_some_and(|s| options.contains(&s)),
        }
    }
}

impl fmt::Display for KwargType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KwargType::Float => write!(f, "number"),
            KwargType::Int => write!(f, "integer"),
            KwargType::Bool => write!(f, "boolean"),
            KwargType::Choice(options) => write!(f, "one of [{}]", options.join(", ")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum KwargDefault {
    Required,
    /// Absent unless given
    Optional,
    Float(f64),
    Int(i64),
    Bool(bool),
    Str(&'static str),
}

impl KwargDefault {
    pub fn value(&self) -> Option<KwargValue> {
        match self {
            KwargDefault::Required | KwargDefault::Optional => None,
            KwargDefault::Float(v) => Some(KwargValue::Float(*v)),
            KwargDefault::Int(v) => Some(KwargValue::Int(*v)),
            KwargDefault::Bool(v) => Some(KwargValue::Bool(*v)),
            KwargDefault::Str(v) => Some(KwargValue::Str((*v).to_string())),
        }
    }
}

/// A non-parameter construction option (pixel scale, core radius, ...)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KwargDecl {
    pub name: &'static str,
    pub ty: KwargType,
    pub default: KwargDefault,
    pub description: &'static str,
}

impl KwargDecl {
    pub const fn new(
        name: &'static str,
        ty: KwargType,
        default: KwargDefault,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            ty,
            default,
            description,
        }
    }
}

// ============================================================================
// Checking records against declarations
// ============================================================================

/// Report parameters that the kind does not declare.
pub fn check_params(
    decls: &[ParamDecl],
    given: &ParamMap,
    path: &FieldPath,
    errors: &mut Vec<ValidationError>,
) {
    for name in given.keys() {
        if !decls.iter().any(|d| d.name == name) {
            errors.push(ValidationError::new(
                path.field(name),
                format!(
                    "one of the declared parameters [{}]",
                    decls.iter().map(|d| d.name).collect::<Vec<_>>().join(", ")
                ),
                "an undeclared parameter",
            ));
        }
    }
}

/// Report unknown, mistyped and missing-required keyword arguments.
pub fn check_kwargs(
    decls: &[KwargDecl],
    given: &KwargMap,
    path: &FieldPath,
    errors: &mut Vec<ValidationError>,
) {
    for (name, value) in given {
        match decls.iter().find(|d| d.name == name) {
            None => errors.push(ValidationError::new(
                path.field(name),
                format!(
                    "one of the declared keyword arguments [{}]",
                    decls.iter().map(|d| d.name).collect::<Vec<_>>().join(", ")
                ),
                "an undeclared keyword argument",
            )),
            Some(decl) if !decl.ty.accepts(value) => errors.push(ValidationError::new(
                path.field(name),
                decl.ty.to_string(),
                value.to_string(),
            )),
            Some(_) => {}
        }
    }

    for decl in decls {
        if decl.default == KwargDefault::Required && !given.contains_key(decl.name) {
            errors.push(ValidationError::new(
                path.field(decl.name),
                format!("required {}", decl.ty),
                "nothing",
            ));
        }
    }
}

/// Given keyword arguments merged over declared defaults.
pub fn resolve_kwargs(decls: &[KwargDecl], given: &KwargMap) -> KwargMap {
    let mut resolved = KwargMap::new();
    for decl in decls {
        let value = given.get(decl.name).cloned().or_else(|| decl.default.value());
        if let Some(value) = value {
            // Integers given for float options are widened here once.
            let value = match (decl.ty, value) {
                (KwargType::Float, KwargValue::Int(v)) => KwargValue::Float(v as f64),
                (_, v) => v,
            };
            resolved.insert(decl.name.to_string(), value);
        }
    }
    resolved
}

/// Parameter values in declaration order; omitted parameters fall back to
/// the declared default, else become dynamic.
pub fn resolve_values(decls: &[ParamDecl], given: &ParamMap) -> Vec<ParamValue> {
    decls
        .iter()
        .map(|decl| match given.get(decl.name) {
            Some(value) => *value,
            None => decl
                .default
                .map(ParamValue::Static)
                .unwrap_or(ParamValue::Dynamic),
        })
        .collect()
}
