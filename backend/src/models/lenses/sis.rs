use super::{unpack, Deflection, Lens};
use crate::models::{Cosmology, NumericError, Packed};
use crate::registry::ParamDecl;
use std::sync::Arc;

pub const SIS_PARAMS: [ParamDecl; 4] = [
    ParamDecl::dynamic("z_l", "Redshift of the lens plane", "unitless"),
    ParamDecl::dynamic("x0", "Horizontal position of the lens centre", "arcsec"),
    ParamDecl::dynamic("y0", "Vertical position of the lens centre", "arcsec"),
    ParamDecl::dynamic("th_ein", "Einstein radius", "arcsec"),
];

/// Singular isothermal sphere
#[derive(Debug, Clone)]
pub struct Sis {
    name: String,
    cosmology: Option<Arc<dyn Cosmology>>,
    s: f64,
}

impl Sis {
    pub fn new(name: impl Into<String>, cosmology: Option<Arc<dyn Cosmology>>, s: f64) -> Self {
        Self {
            name: name.into(),
            cosmology,
            s,
        }
    }

    fn radius(&self, dx: f64, dy: f64) -> f64 {
        (dx * dx + dy * dy + self.s * self.s).sqrt()
    }
}

impl Lens for Sis {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "SIS"
    }

    fn cosmology(&self) -> Option<&Arc<dyn Cosmology>> {
        self.cosmology.as_ref()
    }

    fn redshift(&self, packed: &Packed) -> Result<Option<f64>, NumericError> {
        Ok(Some(unpack(&self.name, packed, SIS_PARAMS.len())?[0]))
    }

    fn reduced_deflection_angle(
        &self,
        x: &[f64],
        y: &[f64],
        _z_s: f64,
        packed: &Packed,
    ) -> Result<Deflection, NumericError> {
        let v = unpack(&self.name, packed, SIS_PARAMS.len())?;
        let (x0, y0, th_ein) = (v[1], v[2], v[3]);

        Ok(x.iter()
            .zip(y)
            .map(|(&xi, &yi)| {
                let (dx, dy) = (xi - x0, yi - y0);
                let r = self.radius(dx, dy);
                if r == 0.0 {
                    (0.0, 0.0)
                } else {
                    (th_ein * dx / r, th_ein * dy / r)
                }
            })
            .unzip())
    }

    fn convergence(
        &self,
        x: &[f64],
        y: &[f64],
        _z_s: f64,
        packed: &Packed,
    ) -> Result<Vec<f64>, NumericError> {
        let v = unpack(&self.name, packed, SIS_PARAMS.len())?;
        let (x0, y0, th_ein) = (v[1], v[2], v[3]);

        Ok(x.iter()
            .zip(y)
            .map(|(&xi, &yi)| {
                let r = self.radius(xi - x0, yi - y0);
                if r == 0.0 {
                    0.0
                } else {
                    0.5 * th_ein / r
                }
            })
            .collect())
    }
}
