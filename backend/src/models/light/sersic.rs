use super::LightSource;
use crate::models::lenses::translate_rotate;
use crate::models::{require, NumericError, Packed};
use crate::registry::ParamDecl;

pub const SERSIC_PARAMS: [ParamDecl; 7] = [
    ParamDecl::dynamic("x0", "Horizontal position of the profile centre", "arcsec"),
    ParamDecl::dynamic("y0", "Vertical position of the profile centre", "arcsec"),
    ParamDecl::dynamic("q", "Axis ratio", "unitless"),
    ParamDecl::dynamic("phi", "Position angle of the major axis", "radians"),
    ParamDecl::dynamic("n", "Sersic index", "unitless"),
    ParamDecl::dynamic("Re", "Effective (half-light) radius", "arcsec"),
    ParamDecl::dynamic("Ie", "Intensity at the effective radius", "flux"),
];

/// Elliptical Sersic profile
#[derive(Debug, Clone)]
pub struct Sersic {
    name: String,
    s: f64,
    use_lenstronomy_k: bool,
}

impl Sersic {
    pub fn new(name: impl Into<String>, s: f64, use_lenstronomy_k: bool) -> Self {
        Self {
            name: name.into(),
            s,
            use_lenstronomy_k,
        }
    }

    /// Normalisation so that `Re` encloses half the light.
    fn k(&self, n: f64) -> f64 {
        if self.use_lenstronomy_k {
            1.9992 * n - 0.3271
        } else {
            // Ciotti & Bertin (1999) asymptotic expansion
            2.0 * n - 1.0 / 3.0 + 4.0 / (405.0 * n) + 46.0 / (25515.0 * n * n)
        }
    }
}

impl LightSource for Sersic {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "Sersic"
    }

    fn brightness(&self, x: &[f64], y: &[f64], packed: &Packed) -> Result<Vec<f64>, NumericError> {
        let v = packed.module(&self.name)?;
        if v.len() != SERSIC_PARAMS.len() {
            return Err(NumericError::MissingParameters(self.name.clone()));
        }
        let (x0, y0, phi, ie) = (v[0], v[1], v[3], v[6]);
        let q = require(&self.name, "q", v[2], v[2] > 0.0 && v[2] <= 1.0, "0 < q <= 1")?;
        let n = require(&self.name, "n", v[4], v[4] > 0.0, "n > 0")?;
        let re = require(&self.name, "Re", v[5], v[5] > 0.0, "Re > 0")?;
        let k = self.k(n);
        let sqrt_q = q.sqrt();

        Ok(x.iter()
            .zip(y)
            .map(|(&xi, &yi)| {
                let (xr, yr) = translate_rotate(xi, yi, x0, y0, phi);
                let ex = xr * sqrt_q;
                let ey = yr / sqrt_q;
                let e = (ex * ex + ey * ey).sqrt() + self.s;
                ie * (-k * ((e / re).powf(1.0 / n) - 1.0)).exp()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(values: [f64; 7]) -> Packed {
        let mut packed = Packed::new();
        packed.insert(
            "src",
            SERSIC_PARAMS.iter().map(|d| d.name.to_string()).collect(),
            values.to_vec(),
        );
        packed
    }

    #[test]
    fn test_effective_radius_has_effective_intensity() {
        let src = Sersic::new("src", 0.0, false);
        let p = packed([0.0, 0.0, 1.0, 0.0, 1.5, 2.0, 3.0]);
        let b = src.brightness(&[2.0], &[0.0], &p).unwrap();
        assert!((b[0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_brightness_peaks_at_centre() {
        let src = Sersic::new("src", 0.0, true);
        let p = packed([0.1, -0.1, 0.7, 0.4, 1.0, 0.5, 1.0]);
        let b = src
            .brightness(&[0.1, 0.5, 1.0], &[-0.1, 0.0, 0.0], &p)
            .unwrap();
        assert!(b[0] > b[1] && b[1] > b[2]);
    }

    #[test]
    fn test_non_positive_index_rejected() {
        let src = Sersic::new("src", 0.0, false);
        let p = packed([0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0]);
        assert!(src.brightness(&[0.0], &[0.0], &p).is_err());
    }
}
