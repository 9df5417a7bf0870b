use super::{Deflection, Lens};
use crate::models::{NumericError, Packed};
use std::sync::Arc;

/// Ordered collection of lens planes
///
/// Children keep their declared order for introspection; raytracing sorts
/// the flattened planes by redshift. Nested composites contribute their
/// planes individually.
#[derive(Debug, Clone)]
pub struct Multiplane {
    name: String,
    children: Vec<Arc<dyn Lens>>,
}

impl Multiplane {
    pub fn new(name: impl Into<String>, children: Vec<Arc<dyn Lens>>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }

    /// Single plane lenses in declared order, depth first.
    pub fn planes(&self) -> Vec<Arc<dyn Lens>> {
        fn collect(lenses: &[Arc<dyn Lens>], out: &mut Vec<Arc<dyn Lens>>) {
            for lens in lenses {
                if lens.children().is_empty() {
                    out.push(Arc::clone(lens));
                } else {
                    collect(lens.children(), out);
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.children, &mut out);
        out
    }

    fn sorted_planes(
        &self,
        z_s: f64,
        packed: &Packed,
    ) -> Result<Vec<(f64, Arc<dyn Lens>)>, NumericError> {
        let mut planes = Vec::new();
        for plane in self.planes() {
            let z_l = plane
                .redshift(packed)?
                .ok_or_else(|| NumericError::MissingRedshift(plane.name().to_string()))?;
            if !(z_l >= 0.0 && z_l < z_s) {
                return Err(NumericError::InvalidRedshifts {
                    module: plane.name().to_string(),
                    z_l,
                    z_s,
                });
            }
            if plane.cosmology().is_none() {
                return Err(NumericError::MissingCosmology(plane.name().to_string()));
            }
            planes.push((z_l, plane));
        }
        planes.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(planes)
    }
}

impl Lens for Multiplane {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "Multiplane"
    }

    fn children(&self) -> &[Arc<dyn Lens>] {
        &self.children
    }

    fn reduced_deflection_angle(
        &self,
        x: &[f64],
        y: &[f64],
        z_s: f64,
        packed: &Packed,
    ) -> Result<Deflection, NumericError> {
        let (bx, by) = self.raytrace(x, y, z_s, packed)?;
        let ax = x.iter().zip(&bx).map(|(t, b)| t - b).collect();
        let ay = y.iter().zip(&by).map(|(t, b)| t - b).collect();
        Ok((ax, ay))
    }

    /// Sum of plane convergences at the observed positions (Born
    /// approximation).
    fn convergence(
        &self,
        x: &[f64],
        y: &[f64],
        z_s: f64,
        packed: &Packed,
    ) -> Result<Vec<f64>, NumericError> {
        let mut total = vec![0.0; x.len()];
        for plane in self.planes() {
            for (t, k) in total.iter_mut().zip(plane.convergence(x, y, z_s, packed)?) {
                *t += k;
            }
        }
        Ok(total)
    }

    /// Recursive lens equation
    ///
    /// The position on plane `j` is the observed angle minus the deflections
    /// of every nearer plane `i`, each scaled by
    /// `D_ij * D_s / (D_j * D_is)` using plane `i`'s cosmology.
    fn raytrace(
        &self,
        x: &[f64],
        y: &[f64],
        z_s: f64,
        packed: &Packed,
    ) -> Result<Deflection, NumericError> {
        let planes = self.sorted_planes(z_s, packed)?;
        let mut deflections: Vec<Deflection> = Vec::with_capacity(planes.len());

        for (j, (z_j, plane_j)) in planes.iter().enumerate() {
            let mut px = x.to_vec();
            let mut py = y.to_vec();
            for (i, (z_i, plane_i)) in planes.iter().enumerate().take(j) {
                let cosmo = plane_i
                    .cosmology()
                    .ok_or_else(|| NumericError::MissingCosmology(plane_i.name().to_string()))?;
                let d_ij = cosmo.angular_diameter_distance_z1z2(*z_i, *z_j, packed)?;
                let d_s = cosmo.angular_diameter_distance(z_s, packed)?;
                let d_j = cosmo.angular_diameter_distance(*z_j, packed)?;
                let d_is = cosmo.angular_diameter_distance_z1z2(*z_i, z_s, packed)?;
                let factor = if d_j * d_is == 0.0 {
                    0.0
                } else {
                    d_ij * d_s / (d_j * d_is)
                };
                let (ax, ay) = &deflections[i];
                for k in 0..px.len() {
                    px[k] -= factor * ax[k];
                    py[k] -= factor * ay[k];
                }
            }
            deflections.push(plane_j.reduced_deflection_angle(&px, &py, z_s, packed)?);
        }

        let mut bx = x.to_vec();
        let mut by = y.to_vec();
        for (ax, ay) in &deflections {
            for k in 0..bx.len() {
                bx[k] -= ax[k];
                by[k] -= ay[k];
            }
        }
        Ok((bx, by))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cosmology::{CRITICAL_DENSITY_0_DEFAULT, H0_DEFAULT, OM0_DEFAULT};
    use crate::models::lenses::SIS_PARAMS;
    use crate::models::{Cosmology, FlatLambdaCDM, Sis};

    fn setup() -> (Packed, Arc<dyn Cosmology>) {
        let mut packed = Packed::new();
        packed.insert(
            "cosmo",
            vec!["h0".into(), "critical_density_0".into(), "Om0".into()],
            vec![H0_DEFAULT, CRITICAL_DENSITY_0_DEFAULT, OM0_DEFAULT],
        );
        let names: Vec<String> = SIS_PARAMS.iter().map(|d| d.name.to_string()).collect();
        packed.insert("near", names.clone(), vec![0.3, 0.0, 0.0, 0.5]);
        packed.insert("far", names, vec![0.8, 0.2, 0.0, 0.4]);
        (packed, Arc::new(FlatLambdaCDM::new("cosmo")))
    }

    #[test]
    fn test_single_plane_matches_plane_raytrace() {
        let (packed, cosmo) = setup();
        let near: Arc<dyn Lens> = Arc::new(Sis::new("near", Some(cosmo), 0.0));
        let multi = Multiplane::new("multi", vec![Arc::clone(&near)]);

        let x = [0.3, -1.2];
        let y = [0.9, 0.4];
        assert_eq!(
            multi.raytrace(&x, &y, 1.5, &packed).unwrap(),
            near.raytrace(&x, &y, 1.5, &packed).unwrap()
        );
    }

    #[test]
    fn test_declared_order_does_not_change_raytrace() {
        let (packed, cosmo) = setup();
        let near: Arc<dyn Lens> = Arc::new(Sis::new("near", Some(Arc::clone(&cosmo)), 0.0));
        let far: Arc<dyn Lens> = Arc::new(Sis::new("far", Some(cosmo), 0.0));
        let forward = Multiplane::new("a", vec![Arc::clone(&near), Arc::clone(&far)]);
        let reverse = Multiplane::new("b", vec![far, near]);

        let (x, y) = ([0.7], [-0.3]);
        let (fx, fy) = forward.raytrace(&x, &y, 1.5, &packed).unwrap();
        let (rx, ry) = reverse.raytrace(&x, &y, 1.5, &packed).unwrap();
        assert!((fx[0] - rx[0]).abs() < 1e-12 && (fy[0] - ry[0]).abs() < 1e-12);
        assert_eq!(forward.children()[0].name(), "near");
        assert_eq!(reverse.children()[0].name(), "far");
    }

    #[test]
    fn test_plane_behind_source_rejected() {
        let (packed, cosmo) = setup();
        let far: Arc<dyn Lens> = Arc::new(Sis::new("far", Some(cosmo), 0.0));
        let multi = Multiplane::new("multi", vec![far]);
        let err = multi.raytrace(&[0.0], &[0.0], 0.5, &packed).unwrap_err();
        assert!(matches!(err, NumericError::InvalidRedshifts { .. }));
    }

    #[test]
    fn test_plane_without_cosmology_rejected() {
        let (packed, _) = setup();
        let near: Arc<dyn Lens> = Arc::new(Sis::new("near", None, 0.0));
        let multi = Multiplane::new("multi", vec![near]);
        assert_eq!(
            multi.raytrace(&[0.0], &[0.0], 1.5, &packed).unwrap_err(),
            NumericError::MissingCosmology("near".into())
        );
    }
}
