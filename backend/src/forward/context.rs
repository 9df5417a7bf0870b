// Per-call view of a simulator for forward routines
//
// Owns the fine sampling grid and lazily computes image layers, each at
// most once per call.

use super::types::Layer;
use super::ForwardError;
use crate::models::grid::{avg_pool, convolve, crop, meshgrid};
use crate::models::{Image, Lens, LightSource, Packed};
use crate::sims::kwargs::SimulatorKwargs;
use std::cell::RefCell;
use std::collections::HashMap;

/// Everything a routine may read for one call
pub struct ForwardInputs<'a> {
    pub lens: &'a dyn Lens,
    pub source: &'a dyn LightSource,
    pub lens_light: Option<&'a dyn LightSource>,
    pub packed: &'a Packed,
    pub z_s: Option<f64>,
    pub kwargs: &'a SimulatorKwargs,
}

pub struct ForwardContext<'a> {
    inputs: ForwardInputs<'a>,
    kernel: Option<(Vec<f64>, usize)>,
    pad: usize,
    nx: usize,
    ny: usize,
    x: Vec<f64>,
    y: Vec<f64>,
    layers: RefCell<HashMap<Layer, Vec<f64>>>,
}

impl<'a> ForwardContext<'a> {
    pub fn new(inputs: ForwardInputs<'a>) -> Self {
        let kwargs = inputs.kwargs;
        let kernel = kwargs.psf_kernel();
        let pad = kwargs.pad(kernel.as_ref().map(|(_, side)| *side));
        // Sizes are bounded when the kwargs are read
        let (nx, ny) = kwargs.fine_shape(pad);
        let (x, y) = meshgrid(kwargs.fine_pixelscale(), nx, ny);

        Self {
            inputs,
            kernel,
            pad,
            nx,
            ny,
            x,
            y,
            layers: RefCell::new(HashMap::new()),
        }
    }

    /// Fine grid shape (upsampled, including PSF padding).
    pub fn fine_shape(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    /// Number of fine grid samples.
    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn packed(&self) -> &Packed {
        self.inputs.packed
    }

    /// A packed parameter by module and name.
    pub fn param(&self, module: &str, name: &str) -> Result<f64, ForwardError> {
        self.inputs
            .packed
            .get(module, name)
            .map_err(|_| ForwardError::UnknownParameter(format!("{module}.{name}")))
    }

    /// Layer samples on the fine grid.
    pub fn layer(&self, layer: Layer) -> Result<Vec<f64>, ForwardError> {
        if let Some(cached) = self.layers.borrow().get(&layer) {
            return Ok(cached.clone());
        }
        let values = self.compute_layer(layer)?;
        self.layers.borrow_mut().insert(layer, values.clone());
        Ok(values)
    }

    fn compute_layer(&self, layer: Layer) -> Result<Vec<f64>, ForwardError> {
        let ForwardInputs {
            lens,
            source,
            lens_light,
            packed,
            z_s,
            ..
        } = &self.inputs;

        let values = match layer {
            Layer::LensedSource => {
                let z_s = z_s.ok_or(ForwardError::MissingSourceRedshift)?;
                let (bx, by) = lens.raytrace(&self.x, &self.y, z_s, packed)?;
                source.brightness(&bx, &by, packed)?
            }
            Layer::LensLight => match lens_light {
                Some(light) => light.brightness(&self.x, &self.y, packed)?,
                None => vec![0.0; self.len()],
            },
            Layer::Source => source.brightness(&self.x, &self.y, packed)?,
            Layer::Convergence => {
                let z_s = z_s.ok_or(ForwardError::MissingSourceRedshift)?;
                lens.convergence(&self.x, &self.y, z_s, packed)?
            }
        };
        Ok(values)
    }

    /// Convolve with the PSF, crop the padding and pool to output pixels.
    pub fn observe(&self, fine: Vec<f64>) -> Result<Image, ForwardError> {
        self.check_len(&fine)?;
        let blurred = match &self.kernel {
            Some((kernel, side)) => convolve(&fine, self.nx, self.ny, kernel, *side),
            None => fine,
        };
        self.resample(blurred)
    }

    /// Crop and pool without the PSF.
    pub fn resample(&self, fine: Vec<f64>) -> Result<Image, ForwardError> {
        self.check_len(&fine)?;
        let kwargs = self.inputs.kwargs;
        let cropped = crop(&fine, self.nx, self.ny, self.pad);
        let pooled = avg_pool(
            &cropped,
            self.nx - 2 * self.pad,
            self.ny - 2 * self.pad,
            kwargs.upsample_factor,
        );
        Ok(Image::new(kwargs.pixels_x, kwargs.pixels_y, pooled)?)
    }

    fn check_len(&self, fine: &[f64]) -> Result<(), ForwardError> {
        if fine.len() == self.len() {
            Ok(())
        } else {
            Err(ForwardError::OutputShape {
                expected: self.len(),
                received: fine.len(),
            })
        }
    }
}
