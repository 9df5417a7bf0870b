// Simulator builder
//
// Turns a configuration into a Simulator in two passes over the records:
//
// 1. Check: resolve every kind in the registry and validate params and
//    kwargs against the factory declarations, collecting all errors.
// 2. Assemble: construct bottom-up (cosmology before the lens using it,
//    children before their Multiplane), filling the parameter table in
//    signature order.
//
// The forward routine is bound last; its declared consumption decides
// which modules appear in the input signature. Any failure aborts the
// build.

use super::kwargs::SimulatorKwargs;
use super::params::{ModuleParams, ParamTable};
use super::signature::InputSignature;
use super::simulator::Simulator;
use super::state_dict::{compute_structure_hash, StateDict};
use crate::error::CausticsError;
use crate::forward::{ForwardRoutine, Layer, ScriptForward};
use crate::loader::{load_param_file, ConfigSource};
use crate::models::{Cosmology, Lens, LightSource, NumericError};
use crate::registry::{
    check_kwargs, check_params, resolve_kwargs, resolve_values, Constructor, Factory,
    KindCategory, LensDeps, ModelArgs, Registry,
};
use crate::schema::{
    validate_config, Config, CosmologyConfig, FieldPath, ForwardSpec, KwargMap, LensConfig,
    ParamMap, ParamSource, SimulatorConfig, SourceConfig, ValidationError, MULTIPLANE_KIND,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Build a simulator with the process-wide registry
///
/// Accepts a path to a YAML file, an in-memory [`Config`], or a parsed
/// YAML/JSON value (see [`ConfigSource`]).
pub fn build_simulator(config: impl Into<ConfigSource>) -> Result<Simulator, CausticsError> {
    SimulatorBuilder::new(Registry::global()).build(config)
}

/// Builds simulators against a particular registry
#[derive(Debug, Clone, Copy)]
pub struct SimulatorBuilder<'r> {
    registry: &'r Registry,
}

impl<'r> SimulatorBuilder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    pub fn build(&self, config: impl Into<ConfigSource>) -> Result<Simulator, CausticsError> {
        let config = config.into().load()?;
        let base_dir = config.base_dir.clone().unwrap_or_default();

        // Parameter files may change cosmology definitions: re-check sharing
        let sim = resolve_param_files(&config.simulator, &base_dir)?;
        validate_config(&Config {
            simulator: sim.clone(),
            state: None,
            base_dir: None,
        })?;

        let root = FieldPath::root("simulator");
        let sim_factory = self.check(&sim, &root)?;
        let kwargs = SimulatorKwargs::from_kwargs(
            &resolve_kwargs(&sim_factory.kwargs, &sim.kwargs),
            &root.field("kwargs"),
        )?;

        let mut assembly = Assembly::new(self);
        assembly.push_params(&sim.name, &sim.kind, &sim_factory, &sim.params);
        let lens = assembly.lens(&sim.lens, &root.field("lens"))?;
        let source = assembly.source(&sim.src, &root.field("src"))?;
        let lens_light = match &sim.lens_light {
            Some(light) => Some(assembly.source(light, &root.field("lens_light"))?),
            None => None,
        };
        let Assembly {
            mut table,
            build_order,
            cosmologies,
            lens_modules,
            ..
        } = assembly;

        let forward = self.bind_forward(&sim, &sim_factory, &table, &root.field("forward"))?;
        mark_consumption(&mut table, forward.as_ref(), &sim, &lens_modules);

        if let Some(state) = &config.state {
            let path = base_dir.join(&state.path);
            StateDict::load(&path)?.apply(&mut table)?;
            info!(path = %path.display(), "loaded state");
        }

        let signature = InputSignature::from_table(&table);
        let structure_hash = compute_structure_hash(&table)?;
        info!(
            simulator = %sim.name,
            kind = %sim.kind,
            forward = forward.name(),
            modules = table.modules().len(),
            dynamic = signature.dynamic_len(),
            "built simulator"
        );

        Ok(Simulator {
            id: Uuid::new_v4(),
            name: sim.name.clone(),
            kind: sim.kind.clone(),
            kwargs,
            lens,
            source,
            lens_light,
            cosmologies: cosmologies.into_iter().map(|(_, cosmo)| cosmo).collect(),
            forward,
            table,
            signature,
            structure_hash,
            build_order,
            config: sim,
        })
    }

    fn resolve(
        &self,
        kind: &str,
        category: KindCategory,
        path: &FieldPath,
    ) -> Result<Arc<Factory>, CausticsError> {
        self.registry
            .resolve_category(kind, category)
            .map_err(|e| CausticsError::from_registry(e, path.field("kind")))
    }

    // ========================================================================
    // Pass 1: check
    // ========================================================================

    fn check(
        &self,
        sim: &SimulatorConfig,
        root: &FieldPath,
    ) -> Result<Arc<Factory>, CausticsError> {
        let mut errors = Vec::new();

        let factory = self.resolve(&sim.kind, KindCategory::Simulator, root)?;
        check_params(&factory.params, &sim.params, &root.field("params"), &mut errors);
        check_kwargs(&factory.kwargs, &sim.kwargs, &root.field("kwargs"), &mut errors);

        self.check_lens(&sim.lens, &root.field("lens"), &mut errors)?;
        self.check_source(&sim.src, &root.field("src"), &mut errors)?;
        if let Some(light) = &sim.lens_light {
            self.check_source(light, &root.field("lens_light"), &mut errors)?;
        }

        if errors.is_empty() {
            Ok(factory)
        } else {
            Err(CausticsError::Validation(errors))
        }
    }

    fn check_lens(
        &self,
        lens: &LensConfig,
        path: &FieldPath,
        errors: &mut Vec<ValidationError>,
    ) -> Result<(), CausticsError> {
        match lens {
            LensConfig::Leaf(leaf) => {
                if leaf.kind == MULTIPLANE_KIND {
                    errors.push(ValidationError::new(
                        path.field("kind"),
                        "a single plane lens kind (Multiplane records carry lenses)",
                        MULTIPLANE_KIND,
                    ));
                    return Ok(());
                }
                let factory = self.resolve(&leaf.kind, KindCategory::Lens, path)?;
                check_params(&factory.params, inline(&leaf.params), &path.field("params"), errors);
                check_kwargs(&factory.kwargs, &leaf.kwargs, &path.field("kwargs"), errors);
                if let Some(cosmo) = &leaf.cosmology {
                    self.check_cosmology(cosmo, &path.field("cosmology"), errors)?;
                }
            }
            LensConfig::Multiplane(multi) => {
                self.resolve(MULTIPLANE_KIND, KindCategory::Lens, path)?;
                for (i, child) in multi.lenses.iter().enumerate() {
                    self.check_lens(child, &path.field("lenses").index(i), errors)?;
                }
            }
        }
        Ok(())
    }

    fn check_cosmology(
        &self,
        cosmo: &CosmologyConfig,
        path: &FieldPath,
        errors: &mut Vec<ValidationError>,
    ) -> Result<(), CausticsError> {
        let factory = self.resolve(&cosmo.kind, KindCategory::Cosmology, path)?;
        check_params(&factory.params, inline(&cosmo.params), &path.field("params"), errors);
        Ok(())
    }

    fn check_source(
        &self,
        src: &SourceConfig,
        path: &FieldPath,
        errors: &mut Vec<ValidationError>,
    ) -> Result<(), CausticsError> {
        let factory = self.resolve(&src.kind, KindCategory::Source, path)?;
        check_params(&factory.params, inline(&src.params), &path.field("params"), errors);
        check_kwargs(&factory.kwargs, &src.kwargs, &path.field("kwargs"), errors);
        Ok(())
    }

    // ========================================================================
    // Forward binding
    // ========================================================================

    fn bind_forward(
        &self,
        sim: &SimulatorConfig,
        factory: &Factory,
        table: &ParamTable,
        path: &FieldPath,
    ) -> Result<Arc<dyn ForwardRoutine>, CausticsError> {
        let name = match &sim.forward {
            Some(ForwardSpec::Script(script)) => {
                let routine = ScriptForward::new(script.clone(), &table.qualified_keys())
                    .map_err(|errors| {
                        CausticsError::Validation(
                            errors
                                .into_iter()
                                .map(|e| {
                                    ValidationError::new(
                                        path.field("script"),
                                        "a valid forward script",
                                        e.to_string(),
                                    )
                                })
                                .collect(),
                        )
                    })?;
                debug!(layers = ?routine.layers(), "bound forward script");
                return Ok(Arc::new(routine));
            }
            Some(ForwardSpec::Builtin(name)) => name.as_str(),
            None => match factory.constructor {
                Constructor::Simulator { default_forward } => default_forward,
                _ => {
                    return Err(category_error(
                        self.registry,
                        &factory.kind,
                        KindCategory::Simulator,
                        &FieldPath::root("simulator"),
                    ))
                }
            },
        };

        let routine = self
            .registry
            .resolve_forward(name)
            .map_err(|e| CausticsError::from_registry(e, path))?;
        debug!(routine = name, "bound forward routine");
        Ok(routine)
    }
}

/// Replace every `from_file` source with the values it names.
fn resolve_param_files(
    sim: &SimulatorConfig,
    base_dir: &Path,
) -> Result<SimulatorConfig, CausticsError> {
    fn resolve(
        params: &mut ParamSource,
        base_dir: &Path,
        path: &FieldPath,
    ) -> Result<(), CausticsError> {
        if let ParamSource::File(file) = params {
            let file = base_dir.join(&*file);
            debug!(file = %file.display(), record = %path, "reading parameter file");
            *params = ParamSource::Inline(load_param_file(&file, &path.field("from_file"))?);
        }
        Ok(())
    }

    fn resolve_lens(
        lens: &mut LensConfig,
        base_dir: &Path,
        path: &FieldPath,
    ) -> Result<(), CausticsError> {
        match lens {
            LensConfig::Leaf(leaf) => {
                resolve(&mut leaf.params, base_dir, path)?;
                if let Some(cosmo) = &mut leaf.cosmology {
                    resolve(&mut cosmo.params, base_dir, &path.field("cosmology"))?;
                }
            }
            LensConfig::Multiplane(multi) => {
                for (i, child) in multi.lenses.iter_mut().enumerate() {
                    resolve_lens(child, base_dir, &path.field("lenses").index(i))?;
                }
            }
        }
        Ok(())
    }

    let mut sim = sim.clone();
    let root = FieldPath::root("simulator");
    resolve_lens(&mut sim.lens, base_dir, &root.field("lens"))?;
    resolve(&mut sim.src.params, base_dir, &root.field("src"))?;
    if let Some(light) = &mut sim.lens_light {
        resolve(&mut light.params, base_dir, &root.field("lens_light"))?;
    }
    Ok(sim)
}

fn inline(params: &ParamSource) -> &ParamMap {
    static EMPTY: ParamMap = ParamMap::new();
    params.inline().unwrap_or(&EMPTY)
}

/// Mark the modules the routine reads.
fn mark_consumption(
    table: &mut ParamTable,
    routine: &dyn ForwardRoutine,
    sim: &SimulatorConfig,
    lens_modules: &[String],
) {
    for layer in routine.layers() {
        let modules: Vec<&str> = match layer {
            Layer::LensedSource => std::iter::once(sim.name.as_str())
                .chain(lens_modules.iter().map(String::as_str))
                .chain(std::iter::once(sim.src.name.as_str()))
                .collect(),
            Layer::Convergence => std::iter::once(sim.name.as_str())
                .chain(lens_modules.iter().map(String::as_str))
                .collect(),
            Layer::Source => vec![sim.src.name.as_str()],
            Layer::LensLight => sim.lens_light.iter().map(|l| l.name.as_str()).collect(),
        };
        for module in modules {
            table.mark_consumed(module);
        }
    }
    for key in routine.param_refs() {
        if let Some((module, _)) = key.split_once('.') {
            table.mark_consumed(module);
        }
    }
}

// ============================================================================
// Pass 2: assemble
// ============================================================================

struct Assembly<'b, 'r> {
    builder: &'b SimulatorBuilder<'r>,
    table: ParamTable,
    build_order: Vec<String>,
    /// Shared instances by name, with the definition that created them
    cosmologies: Vec<(CosmologyConfig, Arc<dyn Cosmology>)>,
    /// Every module in the lens subtree, cosmologies included
    lens_modules: Vec<String>,
}

impl<'b, 'r> Assembly<'b, 'r> {
    fn new(builder: &'b SimulatorBuilder<'r>) -> Self {
        Self {
            builder,
            table: ParamTable::new(),
            build_order: Vec::new(),
            cosmologies: Vec::new(),
            lens_modules: Vec::new(),
        }
    }

    fn push_params(&mut self, name: &str, kind: &str, factory: &Factory, params: &ParamMap) {
        self.table.push(ModuleParams {
            module: name.to_string(),
            kind: kind.to_string(),
            decls: factory.params.clone(),
            values: resolve_values(&factory.params, params),
            consumed: false,
        });
    }

    fn args(&self, name: &str, factory: &Factory, kwargs: &KwargMap) -> ModelArgs {
        ModelArgs {
            name: name.to_string(),
            kwargs: resolve_kwargs(&factory.kwargs, kwargs),
        }
    }

    fn built(&mut self, name: &str, kind: &str) {
        debug!(module = name, kind, "constructed module");
        self.build_order.push(name.to_string());
    }

    fn cosmology(
        &mut self,
        cosmo: &CosmologyConfig,
        path: &FieldPath,
    ) -> Result<Arc<dyn Cosmology>, CausticsError> {
        if let Some((definition, instance)) =
            self.cosmologies.iter().find(|(c, _)| c.name == cosmo.name)
        {
            if definition != cosmo {
                return Err(CausticsError::Validation(vec![ValidationError::new(
                    path.clone(),
                    format!("the definition of shared cosmology '{}'", cosmo.name),
                    "a conflicting definition",
                )]));
            }
            return Ok(Arc::clone(instance));
        }

        let factory = self
            .builder
            .resolve(&cosmo.kind, KindCategory::Cosmology, path)?;
        self.push_params(&cosmo.name, &cosmo.kind, &factory, inline(&cosmo.params));
        self.lens_modules.push(cosmo.name.clone());

        let Constructor::Cosmology(ctor) = factory.constructor else {
            return Err(category_error(
                self.builder.registry,
                &cosmo.kind,
                KindCategory::Cosmology,
                path,
            ));
        };
        let instance = ctor(&self.args(&cosmo.name, &factory, &KwargMap::new()))
            .map_err(|e| build_error(&cosmo.name, path, e))?;
        self.built(&cosmo.name, &cosmo.kind);
        self.cosmologies.push((cosmo.clone(), Arc::clone(&instance)));
        Ok(instance)
    }

    fn lens(&mut self, lens: &LensConfig, path: &FieldPath) -> Result<Arc<dyn Lens>, CausticsError> {
        let factory = self
            .builder
            .resolve(lens.kind(), KindCategory::Lens, path)?;
        let Constructor::Lens(ctor) = factory.constructor else {
            return Err(category_error(
                self.builder.registry,
                lens.kind(),
                KindCategory::Lens,
                path,
            ));
        };

        let (args, deps) = match lens {
            LensConfig::Leaf(leaf) => {
                self.push_params(&leaf.name, &leaf.kind, &factory, inline(&leaf.params));
                self.lens_modules.push(leaf.name.clone());
                let cosmology = match &leaf.cosmology {
                    Some(cosmo) => Some(self.cosmology(cosmo, &path.field("cosmology"))?),
                    None => None,
                };
                (
                    self.args(&leaf.name, &factory, &leaf.kwargs),
                    LensDeps {
                        cosmology,
                        children: Vec::new(),
                    },
                )
            }
            LensConfig::Multiplane(multi) => {
                self.push_params(&multi.name, MULTIPLANE_KIND, &factory, &ParamMap::new());
                self.lens_modules.push(multi.name.clone());
                let mut children = Vec::with_capacity(multi.lenses.len());
                for (i, child) in multi.lenses.iter().enumerate() {
                    children.push(self.lens(child, &path.field("lenses").index(i))?);
                }
                (
                    self.args(&multi.name, &factory, &KwargMap::new()),
                    LensDeps {
                        cosmology: None,
                        children,
                    },
                )
            }
        };

        let instance = ctor(&args, deps).map_err(|e| build_error(lens.name(), path, e))?;
        self.built(lens.name(), lens.kind());
        Ok(instance)
    }

    fn source(
        &mut self,
        src: &SourceConfig,
        path: &FieldPath,
    ) -> Result<Arc<dyn LightSource>, CausticsError> {
        let factory = self
            .builder
            .resolve(&src.kind, KindCategory::Source, path)?;
        let Constructor::Source(ctor) = factory.constructor else {
            return Err(category_error(
                self.builder.registry,
                &src.kind,
                KindCategory::Source,
                path,
            ));
        };
        self.push_params(&src.name, &src.kind, &factory, inline(&src.params));

        let instance = ctor(&self.args(&src.name, &factory, &src.kwargs))
            .map_err(|e| build_error(&src.name, path, e))?;
        self.built(&src.name, &src.kind);
        Ok(instance)
    }
}

fn category_error(
    registry: &Registry,
    kind: &str,
    category: KindCategory,
    path: &FieldPath,
) -> CausticsError {
    CausticsError::UnknownKind {
        kind: kind.to_string(),
        category: Some(category),
        path: path.field("kind").to_string(),
        known: registry
            .kinds_of(category)
            .iter()
            .map(|f| f.kind.clone())
            .collect(),
    }
}

fn build_error(name: &str, path: &FieldPath, err: NumericError) -> CausticsError {
    CausticsError::Build {
        name: name.to_string(),
        path: path.to_string(),
        source: Box::new(CausticsError::Numeric(err)),
    }
}
