// Built-in forward routines

use super::types::Layer;
use super::{ForwardContext, ForwardError, ForwardRoutine};
use crate::models::Image;

/// Lensed source plus lens light, observed through the PSF
///
/// Default routine of the `Lens_Source` simulator.
#[derive(Debug, Clone, Copy, Default)]
pub struct LensSource;

impl ForwardRoutine for LensSource {
    fn name(&self) -> &str {
        "lens_source"
    }

    fn layers(&self) -> Vec<Layer> {
        vec![Layer::LensedSource, Layer::LensLight]
    }

    fn run(&self, ctx: &ForwardContext<'_>) -> Result<Image, ForwardError> {
        let mut image = ctx.layer(Layer::LensedSource)?;
        for (pixel, light) in image.iter_mut().zip(ctx.layer(Layer::LensLight)?) {
            *pixel += light;
        }
        ctx.observe(image)
    }
}

/// Source brightness without lensing
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlensed;

impl ForwardRoutine for Unlensed {
    fn name(&self) -> &str {
        "unlensed"
    }

    fn layers(&self) -> Vec<Layer> {
        vec![Layer::Source]
    }

    fn run(&self, ctx: &ForwardContext<'_>) -> Result<Image, ForwardError> {
        ctx.observe(ctx.layer(Layer::Source)?)
    }
}

/// Lens convergence map; not blurred by the PSF
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvergenceMap;

impl ForwardRoutine for ConvergenceMap {
    fn name(&self) -> &str {
        "convergence"
    }

    fn layers(&self) -> Vec<Layer> {
        vec![Layer::Convergence]
    }

    fn run(&self, ctx: &ForwardContext<'_>) -> Result<Image, ForwardError> {
        ctx.resample(ctx.layer(Layer::Convergence)?)
    }
}
