use super::interpreter::evaluate_value;
use super::types::{ForwardScript, Layer};
use super::validation::{collect_layers, collect_param_refs, validate_script, ScriptValidationError};
use super::{ForwardContext, ForwardError, ForwardRoutine};
use crate::models::Image;
use std::collections::HashSet;

/// Forward routine defined by a configuration-supplied expression tree
///
/// This is the trust boundary for routines that arrive as configuration
/// text. Scripts are validated before binding and evaluated by a closed
/// interpreter: they can read declared image layers, simulator parameters
/// and their own constants, and combine them with a fixed set of arithmetic
/// operators. They cannot name files, call other routines or execute code.
#[derive(Debug, Clone)]
pub struct ScriptForward {
    script: ForwardScript,
    layers: Vec<Layer>,
    param_refs: Vec<String>,
}

impl ScriptForward {
    pub fn new(
        script: ForwardScript,
        known_params: &HashSet<String>,
    ) -> Result<Self, Vec<ScriptValidationError>> {
        validate_script(&script, known_params)?;
        Ok(Self {
            layers: collect_layers(&script),
            param_refs: collect_param_refs(&script),
            script,
        })
    }

    pub fn script(&self) -> &ForwardScript {
        &self.script
    }
}

impl ForwardRoutine for ScriptForward {
    fn name(&self) -> &str {
        "script"
    }

    fn layers(&self) -> Vec<Layer> {
        self.layers.clone()
    }

    fn param_refs(&self) -> Vec<String> {
        self.param_refs.clone()
    }

    fn run(&self, ctx: &ForwardContext<'_>) -> Result<Image, ForwardError> {
        let image = evaluate_value(&self.script.image, ctx, &self.script.constants)?;
        ctx.observe(image.into_field(ctx.len())?)
    }
}
