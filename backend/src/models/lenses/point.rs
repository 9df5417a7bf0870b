use super::{unpack, Deflection, Lens};
use crate::models::{Cosmology, NumericError, Packed};
use crate::registry::ParamDecl;
use std::sync::Arc;

pub const POINT_PARAMS: [ParamDecl; 4] = [
    ParamDecl::dynamic("z_l", "Redshift of the lens plane", "unitless"),
    ParamDecl::dynamic("x0", "Horizontal position of the point mass", "arcsec"),
    ParamDecl::dynamic("y0", "Vertical position of the point mass", "arcsec"),
    ParamDecl::dynamic("th_ein", "Einstein radius", "arcsec"),
];

/// Point mass with softening length `s`
#[derive(Debug, Clone)]
pub struct Point {
    name: String,
    cosmology: Option<Arc<dyn Cosmology>>,
    s: f64,
}

impl Point {
    pub fn new(name: impl Into<String>, cosmology: Option<Arc<dyn Cosmology>>, s: f64) -> Self {
        Self {
            name: name.into(),
            cosmology,
            s,
        }
    }
}

impl Lens for Point {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "Point"
    }

    fn cosmology(&self) -> Option<&Arc<dyn Cosmology>> {
        self.cosmology.as_ref()
    }

    fn redshift(&self, packed: &Packed) -> Result<Option<f64>, NumericError> {
        Ok(Some(unpack(&self.name, packed, POINT_PARAMS.len())?[0]))
    }

    fn reduced_deflection_angle(
        &self,
        x: &[f64],
        y: &[f64],
        _z_s: f64,
        packed: &Packed,
    ) -> Result<Deflection, NumericError> {
        let v = unpack(&self.name, packed, POINT_PARAMS.len())?;
        let (x0, y0, th_ein) = (v[1], v[2], v[3]);
        let th2 = th_ein * th_ein;

        Ok(x.iter()
            .zip(y)
            .map(|(&xi, &yi)| {
                let (dx, dy) = (xi - x0, yi - y0);
                let r2 = dx * dx + dy * dy + self.s * self.s;
                if r2 == 0.0 {
                    (0.0, 0.0)
                } else {
                    (th2 * dx / r2, th2 * dy / r2)
                }
            })
            .unzip())
    }

    /// Zero away from the centre; the mass is a delta function.
    fn convergence(
        &self,
        x: &[f64],
        _y: &[f64],
        _z_s: f64,
        packed: &Packed,
    ) -> Result<Vec<f64>, NumericError> {
        unpack(&self.name, packed, POINT_PARAMS.len())?;
        Ok(vec![0.0; x.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_deflection_falls_off_with_radius() {
        let mut packed = Packed::new();
        packed.insert(
            "pm",
            POINT_PARAMS.iter().map(|d| d.name.to_string()).collect(),
            vec![0.5, 0.0, 0.0, 1.0],
        );
        let lens = Point::new("pm", None, 0.0);
        let (ax, _) = lens
            .reduced_deflection_angle(&[1.0, 2.0], &[0.0, 0.0], 1.0, &packed)
            .unwrap();
        assert!((ax[0] - 1.0).abs() < 1e-12);
        assert!((ax[1] - 0.5).abs() < 1e-12);
    }
}
