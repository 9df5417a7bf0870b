use super::kwargs::{SimulatorKwargs, SOURCE_REDSHIFT};
use super::params::ParamTable;
use super::signature::{CallParams, InputSignature};
use super::state_dict::{compute_structure_hash, StateDict};
use crate::error::CausticsError;
use crate::forward::{ForwardContext, ForwardInputs, ForwardRoutine};
use crate::loader::template;
use crate::models::{Cosmology, Image, Lens, LightSource};
use crate::schema::SimulatorConfig;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// A built, callable simulator
///
/// Immutable after construction: calls never change it, and
/// [`Simulator::with_state`] returns a new instance. Safe to share across
/// threads.
#[derive(Clone)]
pub struct Simulator {
    pub(super) id: Uuid,
    pub(super) name: String,
    pub(super) kind: String,
    pub(super) kwargs: SimulatorKwargs,
    pub(super) lens: Arc<dyn Lens>,
    pub(super) source: Arc<dyn LightSource>,
    pub(super) lens_light: Option<Arc<dyn LightSource>>,
    /// Distinct instances, in first-use order
    pub(super) cosmologies: Vec<Arc<dyn Cosmology>>,
    pub(super) forward: Arc<dyn ForwardRoutine>,
    pub(super) table: ParamTable,
    pub(super) signature: InputSignature,
    /// Configuration with parameter files resolved
    pub(super) config: SimulatorConfig,
    pub(super) structure_hash: String,
    pub(super) build_order: Vec<String>,
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("forward", &self.forward.name())
            .field("dynamic_params", &self.signature.dynamic_len())
            .finish()
    }
}

impl Simulator {
    /// Run the bound forward routine
    ///
    /// `params` are the dynamic parameters, positional in input signature
    /// order or named `module.param`. They are checked against the
    /// signature before any numeric code runs.
    pub fn call(&self, params: impl Into<CallParams>) -> Result<Image, CausticsError> {
        let params = params.into();
        let packed = self.signature.pack(&self.table, &params)?;
        let z_s = packed.get(&self.name, SOURCE_REDSHIFT).ok();

        let ctx = ForwardContext::new(ForwardInputs {
            lens: self.lens.as_ref(),
            source: self.source.as_ref(),
            lens_light: self.lens_light.as_deref(),
            packed: &packed,
            z_s,
            kwargs: &self.kwargs,
        });
        debug!(
            simulator = %self.name,
            routine = self.forward.name(),
            fine_grid = ?ctx.fine_shape(),
            "running forward routine"
        );
        Ok(self.forward.run(&ctx)?)
    }

    pub fn input_signature(&self) -> &InputSignature {
        &self.signature
    }

    /// Snapshot of every static parameter value.
    pub fn state_dict(&self) -> Result<StateDict, CausticsError> {
        Ok(StateDict::from_table(&self.table)?)
    }

    /// A new simulator with static values overridden from `state`.
    pub fn with_state(&self, state: &StateDict) -> Result<Simulator, CausticsError> {
        let mut next = self.clone();
        state.apply(&mut next.table)?;
        next.signature = InputSignature::from_table(&next.table);
        next.structure_hash = compute_structure_hash(&next.table)?;
        next.id = Uuid::new_v4();
        info!(simulator = %self.name, params = state.len(), "applied state");
        Ok(next)
    }

    /// Write `<name>_template.yaml` into `dir`; returns the file path.
    pub fn write_template(&self, dir: impl AsRef<Path>) -> Result<PathBuf, CausticsError> {
        template::write_template(self, dir)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn kwargs(&self) -> &SimulatorKwargs {
        &self.kwargs
    }

    pub fn lens(&self) -> &Arc<dyn Lens> {
        &self.lens
    }

    pub fn source(&self) -> &Arc<dyn LightSource> {
        &self.source
    }

    pub fn lens_light(&self) -> Option<&Arc<dyn LightSource>> {
        self.lens_light.as_ref()
    }

    pub fn cosmologies(&self) -> &[Arc<dyn Cosmology>] {
        &self.cosmologies
    }

    pub fn forward_name(&self) -> &str {
        self.forward.name()
    }

    pub fn params(&self) -> &ParamTable {
        &self.table
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn structure_hash(&self) -> &str {
        &self.structure_hash
    }

    /// Module names in construction order (dependencies first).
    pub fn build_order(&self) -> &[String] {
        &self.build_order
    }
}
