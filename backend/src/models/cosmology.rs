//! Cosmological distances
//!
//! Distances are in Mpc, densities in solar masses per cubic Mpc.

use super::{require, NumericError, Packed};
use crate::registry::ParamDecl;
use std::fmt;

/// Speed of light over 100 km/s/Mpc, i.e. the Hubble distance for h = 1.
const HUBBLE_DISTANCE_H1: f64 = 2997.92458;

/// Simpson intervals used for the comoving distance integral (even).
const INTEGRATION_STEPS: usize = 512;

/// Planck 2018 values
pub const H0_DEFAULT: f64 = 0.6766;
pub const OM0_DEFAULT: f64 = 0.30966;
pub const CRITICAL_DENSITY_0_DEFAULT: f64 = 1.270_53e11;

pub trait Cosmology: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn comoving_distance(&self, z: f64, packed: &Packed) -> Result<f64, NumericError>;

    fn critical_density(&self, z: f64, packed: &Packed) -> Result<f64, NumericError>;

    fn angular_diameter_distance(&self, z: f64, packed: &Packed) -> Result<f64, NumericError> {
        Ok(self.comoving_distance(z, packed)? / (1.0 + z))
    }

    /// Angular diameter distance between two redshifts, flat universe.
    fn angular_diameter_distance_z1z2(
        &self,
        z1: f64,
        z2: f64,
        packed: &Packed,
    ) -> Result<f64, NumericError> {
        let d1 = self.comoving_distance(z1, packed)?;
        let d2 = self.comoving_distance(z2, packed)?;
        Ok((d2 - d1) / (1.0 + z2))
    }
}

pub const FLAT_LAMBDA_CDM_PARAMS: [ParamDecl; 3] = [
    ParamDecl::with_default("h0", H0_DEFAULT, "Reduced Hubble constant", "unitless"),
    ParamDecl::with_default(
        "critical_density_0",
        CRITICAL_DENSITY_0_DEFAULT,
        "Critical density at z=0",
        "Msun/Mpc^3",
    ),
    ParamDecl::with_default("Om0", OM0_DEFAULT, "Matter density parameter at z=0", "unitless"),
];

/// Flat Lambda-CDM with matter and a cosmological constant
#[derive(Debug, Clone)]
pub struct FlatLambdaCDM {
    name: String,
}

impl FlatLambdaCDM {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn unpack(&self, packed: &Packed) -> Result<(f64, f64, f64), NumericError> {
        let values = packed.module(&self.name)?;
        let [h0, rho_c0, om0] = match values {
            [a, b, c] => [*a, *b, *c],
            _ => return Err(NumericError::MissingParameters(self.name.clone())),
        };
        let h0 = require(&self.name, "h0", h0, h0 > 0.0, "h0 > 0")?;
        let rho_c0 = require(
            &self.name,
            "critical_density_0",
            rho_c0,
            rho_c0 > 0.0,
            "critical_density_0 > 0",
        )?;
        let om0 = require(&self.name, "Om0", om0, (0.0..=1.0).contains(&om0), "0 <= Om0 <= 1")?;
        Ok((h0, rho_c0, om0))
    }

    fn e_of_z(om0: f64, z: f64) -> f64 {
        (om0 * (1.0 + z).powi(3) + (1.0 - om0)).sqrt()
    }
}

impl Cosmology for FlatLambdaCDM {
    fn name(&self) -> &str {
        &self.name
    }

    fn comoving_distance(&self, z: f64, packed: &Packed) -> Result<f64, NumericError> {
        let (h0, _, om0) = self.unpack(packed)?;
        let z = require(&self.name, "z", z, z >= 0.0, "z >= 0")?;
        if z == 0.0 {
            return Ok(0.0);
        }

        // Simpson's rule over 1/E(z)
        let step = z / INTEGRATION_STEPS as f64;
        let mut sum = 1.0 / Self::e_of_z(om0, 0.0) + 1.0 / Self::e_of_z(om0, z);
        for i in 1..INTEGRATION_STEPS {
            let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
            sum += weight / Self::e_of_z(om0, i as f64 * step);
        }

        Ok(HUBBLE_DISTANCE_H1 / h0 * sum * step / 3.0)
    }

    fn critical_density(&self, z: f64, packed: &Packed) -> Result<f64, NumericError> {
        let (_, rho_c0, om0) = self.unpack(packed)?;
        Ok(rho_c0 * Self::e_of_z(om0, z).powi(2))
    }
}
