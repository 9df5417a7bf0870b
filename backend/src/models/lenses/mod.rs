//! Lens models
//!
//! Angles are in arcseconds. Single plane lenses return reduced deflection
//! angles; the multi-plane composite chains them with distance ratios from
//! each plane's cosmology.

mod multiplane;
mod point;
mod sie;
mod sis;

pub use multiplane::Multiplane;
pub use point::{Point, POINT_PARAMS};
pub use sie::{Sie, SIE_PARAMS};
pub use sis::{Sis, SIS_PARAMS};

use super::{Cosmology, NumericError, Packed};
use std::fmt;
use std::sync::Arc;

pub type Deflection = (Vec<f64>, Vec<f64>);

pub trait Lens: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn kind(&self) -> &str;

    fn cosmology(&self) -> Option<&Arc<dyn Cosmology>> {
        None
    }

    fn children(&self) -> &[Arc<dyn Lens>] {
        &[]
    }

    /// Redshift of the lens plane, `None` for composites.
    fn redshift(&self, _packed: &Packed) -> Result<Option<f64>, NumericError> {
        Ok(None)
    }

    fn reduced_deflection_angle(
        &self,
        x: &[f64],
        y: &[f64],
        z_s: f64,
        packed: &Packed,
    ) -> Result<Deflection, NumericError>;

    fn convergence(
        &self,
        x: &[f64],
        y: &[f64],
        z_s: f64,
        packed: &Packed,
    ) -> Result<Vec<f64>, NumericError>;

    /// Map image-plane positions to source-plane positions.
    fn raytrace(
        &self,
        x: &[f64],
        y: &[f64],
        z_s: f64,
        packed: &Packed,
    ) -> Result<Deflection, NumericError> {
        let (ax, ay) = self.reduced_deflection_angle(x, y, z_s, packed)?;
        let bx = x.iter().zip(&ax).map(|(x, a)| x - a).collect();
        let by = y.iter().zip(&ay).map(|(y, a)| y - a).collect();
        Ok((bx, by))
    }
}

/// Shift to the lens centre and rotate by `-phi`.
pub(crate) fn translate_rotate(x: f64, y: f64, x0: f64, y0: f64, phi: f64) -> (f64, f64) {
    let (dx, dy) = (x - x0, y - y0);
    let (s, c) = phi.sin_cos();
    (dx * c + dy * s, -dx * s + dy * c)
}

/// Rotate a vector by `+phi`.
pub(crate) fn derotate(vx: f64, vy: f64, phi: f64) -> (f64, f64) {
    let (s, c) = phi.sin_cos();
    (vx * c - vy * s, vx * s + vy * c)
}

/// Lens values for `name`, checked against the expected count.
pub(crate) fn unpack<'a>(
    name: &str,
    packed: &'a Packed,
    expected: usize,
) -> Result<&'a [f64], NumericError> {
    let values = packed.module(name)?;
    if values.len() != expected {
        return Err(NumericError::MissingParameters(name.to_string()));
    }
    Ok(values)
}
