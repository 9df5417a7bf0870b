//! Forward routines
//!
//! A forward routine turns packed parameters into an image. Routines are
//! either compiled Rust types registered by name (the built-ins here, or
//! anything an embedder registers) or forward scripts: expression trees
//! supplied as configuration and run by a sandboxed interpreter.
//!
//! Each routine declares the image layers and parameters it reads; the
//! builder derives the simulator's input signature from that declaration.

mod builtins;
mod context;
pub mod interpreter;
mod script;
pub mod types;
pub mod validation;

pub use builtins::{ConvergenceMap, LensSource, Unlensed};
pub use context::{ForwardContext, ForwardInputs};
pub use interpreter::{evaluate_computation, evaluate_value, EvalScope, Operand};
pub use script::ScriptForward;
pub use types::{Computation, ForwardScript, Layer, Value};
pub use validation::{validate_script, ScriptValidationError};

use crate::models::{Image, NumericError};
use thiserror::Error;

/// Errors raised while a forward routine runs
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ForwardError {
    #[error(transparent)]
    Numeric(#[from] NumericError),

    #[error("Division by zero in forward script")]
    DivisionByZero,

    #[error("{0} of a negative or zero value")]
    Domain(&'static str),

    #[error("Operand lengths differ: {left} vs {right}")]
    ShapeMismatch { left: usize, right: usize },

    #[error("Empty value list for {0}")]
    EmptyValueList(&'static str),

    #[error("Parameter '{0}' is not available to the forward routine")]
    UnknownParameter(String),

    #[error("Constant '{0}' not found in script constants")]
    UnknownConstant(String),

    #[error("Forward routine needs the source redshift")]
    MissingSourceRedshift,

    #[error("Forward routine produced {received} samples, expected {expected}")]
    OutputShape { expected: usize, received: usize },
}

/// A callable forward model
///
/// Implementations must be stateless with respect to a call: everything
/// they read comes through the [`ForwardContext`].
pub trait ForwardRoutine: Send + Sync {
    /// Registry name
    fn name(&self) -> &str;

    /// Image layers this routine reads. Modules behind these layers are the
    /// ones whose parameters appear in the input signature.
    fn layers(&self) -> Vec<Layer>;

    /// Individual parameters read directly, as `module.name`.
    fn param_refs(&self) -> Vec<String> {
        Vec::new()
    }

    fn run(&self, ctx: &ForwardContext<'_>) -> Result<Image, ForwardError>;
}
