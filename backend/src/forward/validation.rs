// Forward script validation
//
// Checks run before a script is bound to a simulator:
// - Expression depth limits
// - Parameter reference validity
// - Constant reference validity
// - Division by a literal zero
// - Non-empty operand lists

use super::types::{Computation, ForwardScript, Layer, Value};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScriptValidationError {
    #[error("Expression depth {actual} exceeds maximum {max}")]
    ExcessiveDepth { actual: usize, max: usize },

    #[error("Parameter reference '{0}' does not name a simulator parameter")]
    InvalidParameterReference(String),

    #[error("Constant reference '{0}' not found in script constants")]
    InvalidConstantReference(String),

    #[error("Division by a literal zero")]
    DivisionByZeroRisk,

    #[error("Empty value list for {0}")]
    EmptyValueList(&'static str),

    #[error("Constant '{0}' is not a finite number")]
    NonFiniteConstant(String),
}

pub type ValidationResult = Result<(), Vec<ScriptValidationError>>;

/// Maximum allowed expression depth
pub const MAX_EXPRESSION_DEPTH: usize = 100;

/// Validate a script against the parameters the simulator defines
///
/// `known_params` holds every `module.name` key of the simulator's
/// parameter table. All errors are collected.
pub fn validate_script(script: &ForwardScript, known_params: &HashSet<String>) -> ValidationResult {
    let mut errors = Vec::new();

    for (name, value) in &script.constants {
        if !value.is_finite() {
            errors.push(ScriptValidationError::NonFiniteConstant(name.clone()));
        }
    }

    let depth = value_depth(&script.image);
    if depth > MAX_EXPRESSION_DEPTH {
        errors.push(ScriptValidationError::ExcessiveDepth {
            actual: depth,
            max: MAX_EXPRESSION_DEPTH,
        });
        // Deeper checks would walk the same oversized tree
        return Err(errors);
    }

    visit_value(&script.image, &mut |value| match value {
        Value::Param { param } if !known_params.contains(param) => {
            errors.push(ScriptValidationError::InvalidParameterReference(param.clone()))
        }
        Value::Constant { constant } if !script.constants.contains_key(constant) => {
            errors.push(ScriptValidationError::InvalidConstantReference(constant.clone()))
        }
        Value::Compute { compute } => match compute.as_ref() {
            Computation::Divide {
                right: Value::Literal { value },
                ..
            } if *value == 0.0 => errors.push(ScriptValidationError::DivisionByZeroRisk),
            Computation::Max { values } if values.is_empty() => {
                errors.push(ScriptValidationError::EmptyValueList("max"))
            }
            Computation::Min { values } if values.is_empty() => {
                errors.push(ScriptValidationError::EmptyValueList("min"))
            }
            _ => {}
        },
        _ => {}
    });

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Layers read by a script, sorted.
pub fn collect_layers(script: &ForwardScript) -> Vec<Layer> {
    let mut layers = BTreeSet::new();
    visit_value(&script.image, &mut |value| {
        if let Value::Layer { layer } = value {
            layers.insert(*layer);
        }
    });
    layers.into_iter().collect()
}

/// Parameter keys referenced by a script, sorted and deduplicated.
pub fn collect_param_refs(script: &ForwardScript) -> Vec<String> {
    let mut refs = BTreeSet::new();
    visit_value(&script.image, &mut |value| {
        if let Value::Param { param } = value {
            refs.insert(param.clone());
        }
    });
    refs.into_iter().collect()
}

fn children(computation: &Computation) -> Vec<&Value> {
    match computation {
        Computation::Add { left, right }
        | Computation::Subtract { left, right }
        | Computation::Multiply { left, right }
        | Computation::Divide { left, right } => vec![left, right],
        Computation::Max { values } | Computation::Min { values } => values.iter().collect(),
        Computation::Abs { value }
        | Computation::Sqrt { value }
        | Computation::Exp { value }
        | Computation::Log { value }
        | Computation::Sum { value }
        | Computation::Mean { value }
        | Computation::Peak { value } => vec![value],
        Computation::Clamp { value, min, max } => vec![value, min, max],
        Computation::SafeDiv {
            numerator,
            denominator,
            default,
        } => vec![numerator, denominator, default],
    }
}

fn visit_value<'a>(value: &'a Value, f: &mut dyn FnMut(&'a Value)) {
    f(value);
    if let Value::Compute { compute } = value {
        for child in children(compute) {
            visit_value(child, f);
        }
    }
}

fn value_depth(value: &Value) -> usize {
    match value {
        Value::Compute { compute } => {
            1 + children(compute)
                .into_iter()
                .map(value_depth)
                .max()
                .unwrap_or(0)
        }
        _ => 1,
    }
}
