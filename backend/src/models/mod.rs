//! Numeric collaborator
//!
//! CPU-only `f64` implementations of the kinds the registry ships:
//! cosmologies, lenses and light profiles. Everything above this module talks
//! to them through the [`Cosmology`], [`Lens`] and [`LightSource`] traits, so
//! alternative numeric backends can be registered without touching the
//! builder.
//!
//! All models are stateless with respect to their parameters: values arrive
//! per call through [`Packed`], keyed by module name.

pub mod cosmology;
pub mod grid;
pub mod lenses;
pub mod light;
mod packed;

pub use cosmology::{Cosmology, FlatLambdaCDM};
pub use grid::Image;
pub use lenses::{Lens, Multiplane, Point, Sie, Sis};
pub use light::{LightSource, Sersic};
pub use packed::Packed;

use thiserror::Error;

/// Errors raised by numeric model code
///
/// These pass through the simulator unwrapped as `CausticsError::Numeric`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NumericError {
    #[error("No packed parameters for module '{0}'")]
    MissingParameters(String),

    #[error("Module '{module}' has no parameter named '{name}'")]
    UnknownParameter { module: String, name: String },

    #[error("Module '{module}': {name}={value} violates {constraint}")]
    InvalidParameter {
        module: String,
        name: String,
        value: f64,
        constraint: &'static str,
    },

    #[error("Module '{module}': keyword argument '{name}' is missing or has the wrong type")]
    InvalidKwarg { module: String, name: String },

    #[error("Lens plane '{module}' at z_l={z_l} does not lie in front of the source plane z_s={z_s}")]
    InvalidRedshifts { module: String, z_l: f64, z_s: f64 },

    #[error("Lens '{0}' needs a cosmology for multi-plane raytracing")]
    MissingCosmology(String),

    #[error("Lens '{0}' has no single plane redshift")]
    MissingRedshift(String),

    #[error("Invalid sampling grid: {0}")]
    InvalidGrid(String),
}

/// Reject a parameter value that falls outside its admissible range.
pub(crate) fn require(
    module: &str,
    name: &str,
    value: f64,
    ok: bool,
    constraint: &'static str,
) -> Result<f64, NumericError> {
    if ok && value.is_finite() {
        Ok(value)
    } else {
        Err(NumericError::InvalidParameter {
            module: module.to_string(),
            name: name.to_string(),
            value,
            constraint,
        })
    }
}
