use super::{derotate, translate_rotate, unpack, Deflection, Lens};
use crate::models::{require, Cosmology, NumericError, Packed};
use crate::registry::ParamDecl;
use std::sync::Arc;

pub const SIE_PARAMS: [ParamDecl; 6] = [
    ParamDecl::dynamic("z_l", "Redshift of the lens plane", "unitless"),
    ParamDecl::dynamic("x0", "Horizontal position of the lens centre", "arcsec"),
    ParamDecl::dynamic("y0", "Vertical position of the lens centre", "arcsec"),
    ParamDecl::dynamic("q", "Axis ratio of the isodensity contours", "unitless"),
    ParamDecl::dynamic("phi", "Position angle of the major axis", "radians"),
    ParamDecl::dynamic("b", "Einstein radius", "arcsec"),
];

/// Below this flattening the elliptical formulae are replaced by their
/// spherical limit.
const SPHERICAL_LIMIT: f64 = 1e-6;

/// Singular isothermal ellipsoid with optional core radius `s`
#[derive(Debug, Clone)]
pub struct Sie {
    name: String,
    cosmology: Option<Arc<dyn Cosmology>>,
    s: f64,
}

struct SieParams {
    x0: f64,
    y0: f64,
    q: f64,
    phi: f64,
    b: f64,
}

impl Sie {
    pub fn new(name: impl Into<String>, cosmology: Option<Arc<dyn Cosmology>>, s: f64) -> Self {
        Self {
            name: name.into(),
            cosmology,
            s,
        }
    }

    fn params(&self, packed: &Packed) -> Result<SieParams, NumericError> {
        let v = unpack(&self.name, packed, SIE_PARAMS.len())?;
        Ok(SieParams {
            x0: v[1],
            y0: v[2],
            q: require(&self.name, "q", v[3], v[3] > 0.0 && v[3] <= 1.0, "0 < q <= 1")?,
            phi: v[4],
            b: require(&self.name, "b", v[5], v[5] >= 0.0, "b >= 0")?,
        })
    }

    fn psi(&self, q: f64, x: f64, y: f64) -> f64 {
        (q * q * (x * x + self.s * self.s) + y * y).sqrt()
    }
}

impl Lens for Sie {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "SIE"
    }

    fn cosmology(&self) -> Option<&Arc<dyn Cosmology>> {
        self.cosmology.as_ref()
    }

    fn redshift(&self, packed: &Packed) -> Result<Option<f64>, NumericError> {
        Ok(Some(unpack(&self.name, packed, SIE_PARAMS.len())?[0]))
    }

    fn reduced_deflection_angle(
        &self,
        x: &[f64],
        y: &[f64],
        _z_s: f64,
        packed: &Packed,
    ) -> Result<Deflection, NumericError> {
        let p = self.params(packed)?;
        let f = (1.0 - p.q * p.q).sqrt();
        let mut ax = Vec::with_capacity(x.len());
        let mut ay = Vec::with_capacity(x.len());

        for (&xi, &yi) in x.iter().zip(y) {
            let (xr, yr) = translate_rotate(xi, yi, p.x0, p.y0, p.phi);
            let psi = self.psi(p.q, xr, yr);
            let (dx, dy) = if f < SPHERICAL_LIMIT {
                // q -> 1: b * (x, y) / (psi + s)
                let denom = psi + self.s;
                if denom == 0.0 {
                    (0.0, 0.0)
                } else {
                    (p.b * xr / denom, p.b * yr / denom)
                }
            } else {
                let scale = p.b * p.q.sqrt() / f;
                let dx = scale * (f * xr / (psi + self.s)).atan();
                let dy = scale * (f * yr / (psi + p.q * p.q * self.s)).atanh();
                (
                    if dx.is_finite() { dx } else { 0.0 },
                    if dy.is_finite() { dy } else { 0.0 },
                )
            };
            let (rx, ry) = derotate(dx, dy, p.phi);
            ax.push(rx);
            ay.push(ry);
        }

        Ok((ax, ay))
    }

    fn convergence(
        &self,
        x: &[f64],
        y: &[f64],
        _z_s: f64,
        packed: &Packed,
    ) -> Result<Vec<f64>, NumericError> {
        let p = self.params(packed)?;
        Ok(x.iter()
            .zip(y)
            .map(|(&xi, &yi)| {
                let (xr, yr) = translate_rotate(xi, yi, p.x0, p.y0, p.phi);
                let psi = self.psi(p.q, xr, yr);
                if psi == 0.0 {
                    0.0
                } else {
                    0.5 * p.q.sqrt() * p.b / psi
                }
            })
            .collect())
    }
}
