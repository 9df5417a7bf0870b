//! Light profiles

mod sersic;

pub use sersic::{Sersic, SERSIC_PARAMS};

use super::{NumericError, Packed};
use std::fmt;

pub trait LightSource: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn kind(&self) -> &str;

    /// Surface brightness at the given (source-plane) positions.
    fn brightness(&self, x: &[f64], y: &[f64], packed: &Packed) -> Result<Vec<f64>, NumericError>;
}
