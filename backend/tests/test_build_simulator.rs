//! Simulator Builder Tests
//!
//! Building simulators from YAML configurations.
//!
//! Critical invariants tested:
//! - Unknown kinds fail the build with UnknownKind, never a default
//! - Multiplane children are built before their parent, in declared order
//! - Cosmologies shared by name resolve to one instance
//! - Constructor and declaration errors abort the build
//! - Kinds and forward routines registered privately stay private

use caustics_core_rs::forward::{ForwardContext, ForwardError, Layer};
use caustics_core_rs::registry::{KwargDecl, KwargDefault, KwargType};
use caustics_core_rs::schema::ParamValue;
use caustics_core_rs::{
    build_simulator, CausticsError, ConfigSource, Factory, ForwardRoutine, Image, KindCategory,
    Registry, RegistryError, SimulatorBuilder,
};
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

const SIE_SERSIC: &str = r#"
simulator:
  name: sim
  kind: Lens_Source
  params:
    z_s: 1.0
  kwargs:
    pixelscale: 0.1
    pixels_x: 8
  lens:
    name: lens
    kind: SIE
    cosmology:
      name: cosmo
      kind: FlatLambdaCDM
    params:
      z_l: 0.5
  src:
    name: src
    kind: Sersic
"#;

const MULTIPLANE: &str = r#"
simulator:
  name: sim
  kind: Lens_Source
  params: {z_s: 2.0}
  kwargs: {pixelscale: 0.2, pixels_x: 4}
  lens:
    name: stack
    kind: Multiplane
    lenses:
      - name: far
        kind: SIS
        params: {z_l: 1.0, x0: 0.0, y0: 0.0, th_ein: 0.5}
        cosmology: {name: cosmo, kind: FlatLambdaCDM}
      - name: near
        kind: SIE
        params: {z_l: 0.3, x0: 0.1, y0: 0.0, q: 0.8, phi: 0.0, b: 1.0}
        cosmology: {name: cosmo, kind: FlatLambdaCDM}
  src:
    name: src
    kind: Sersic
    params: {x0: 0.0, y0: 0.0, q: 1.0, phi: 0.0, n: 1.0, Re: 0.5, Ie: 1.0}
"#;

fn build(yaml: &str) -> Result<caustics_core_rs::Simulator, CausticsError> {
    build_simulator(ConfigSource::yaml(yaml))
}

// ============================================================================
// Basic construction
// ============================================================================

#[test]
fn test_sie_sersic_example_builds() {
    let sim = build(SIE_SERSIC).unwrap();

    assert_eq!(sim.name(), "sim");
    assert_eq!(sim.kind(), "Lens_Source");
    assert_eq!(sim.forward_name(), "lens_source");
    assert_eq!(sim.build_order(), ["cosmo", "lens", "src"]);
    assert_eq!(sim.cosmologies().len(), 1);
    assert_eq!(sim.kwargs().pixels_y, 8);
}

#[test]
fn test_each_build_gets_a_fresh_id() {
    let a = build(SIE_SERSIC).unwrap();
    let b = build(SIE_SERSIC).unwrap();
    assert_ne!(a.id(), b.id());
}

#[test]
fn test_frozen_config_keeps_declared_values() {
    let sim = build(SIE_SERSIC).unwrap();
    assert_eq!(sim.config().params["z_s"], ParamValue::Static(1.0));
}

// ============================================================================
// Kind resolution
// ============================================================================

#[test]
fn test_unknown_lens_kind_fails() {
    let yaml = SIE_SERSIC.replace("kind: SIE", "kind: NFW");
    match build(&yaml).unwrap_err() {
        CausticsError::UnknownKind {
            kind,
            category,
            path,
            known,
        } => {
            assert_eq!(kind, "NFW");
            assert_eq!(category, Some(KindCategory::Lens));
            assert_eq!(path, "simulator.lens.kind");
            assert_eq!(known, vec!["Multiplane", "Point", "SIE", "SIS"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_kind_from_wrong_category_fails() {
    let yaml = SIE_SERSIC.replace("kind: Sersic", "kind: SIS");
    let err = build(&yaml).unwrap_err();
    assert!(matches!(
        err,
        CausticsError::UnknownKind { ref path, .. } if path == "simulator.src.kind"
    ));
    assert!(err.to_string().contains("Unknown source kind 'SIS'"));
}

#[test]
fn test_unknown_simulator_kind_fails() {
    let yaml = SIE_SERSIC.replace("kind: Lens_Source", "kind: Microlens");
    assert!(matches!(
        build(&yaml),
        Err(CausticsError::UnknownKind { .. })
    ));
}

#[test]
fn test_unknown_forward_routine_fails() {
    let yaml = format!("{SIE_SERSIC}  forward: psf_only\n");
    match build(&yaml).unwrap_err() {
        CausticsError::UnknownKind {
            kind,
            category,
            path,
            ..
        } => {
            assert_eq!(kind, "psf_only");
            assert_eq!(category, Some(KindCategory::Forward));
            assert_eq!(path, "simulator.forward");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// Declaration checks
// ============================================================================

#[test]
fn test_all_declaration_errors_collected() {
    let yaml = SIE_SERSIC
        .replace("      z_l: 0.5", "      z_l: 0.5\n      mass: 3.0")
        .replace("    pixels_x: 8", "    pixels_x: 8\n    psf_mode: fast");
    let err = build(&yaml).unwrap_err();
    let paths: Vec<_> = err
        .validation_errors()
        .unwrap()
        .iter()
        .map(|e| e.path.as_str())
        .collect();
    assert_eq!(
        paths,
        vec!["simulator.kwargs.psf_mode", "simulator.lens.params.mass"]
    );
}

#[test]
fn test_missing_required_kwarg() {
    let yaml = SIE_SERSIC.replace("    pixelscale: 0.1\n", "");
    let err = build(&yaml).unwrap_err();
    assert_eq!(
        err.validation_errors().unwrap()[0].path,
        "simulator.kwargs.pixelscale"
    );
}

#[test]
fn test_non_positive_pixel_count_rejected() {
    let yaml = SIE_SERSIC.replace("pixels_x: 8", "pixels_x: 0");
    let err = build(&yaml).unwrap_err();
    assert_eq!(
        err.validation_errors().unwrap()[0].path,
        "simulator.kwargs.pixels_x"
    );
}

#[test]
fn test_overflowing_fine_grid_rejected_at_build() {
    let yaml = SIE_SERSIC.replace(
        "pixels_x: 8",
        "pixels_x: 4294967296\n    upsample_factor: 4294967296",
    );
    let err = build(&yaml).unwrap_err();
    assert_eq!(
        err.validation_errors().unwrap()[0].path,
        "simulator.kwargs.pixels_x"
    );
}

#[test]
fn test_oversized_psf_rejected_at_build() {
    let yaml = SIE_SERSIC.replace("pixelscale: 0.1", "pixelscale: 0.000001\n    psf: 1000.0");
    let err = build(&yaml).unwrap_err();
    let paths: Vec<_> = err
        .validation_errors()
        .unwrap()
        .iter()
        .map(|e| e.path.as_str())
        .collect();
    assert_eq!(paths, vec!["simulator.kwargs.psf"]);
}

#[test]
fn test_duplicate_module_names_rejected() {
    let yaml = SIE_SERSIC.replace("    name: src", "    name: lens");
    let err = build(&yaml).unwrap_err();
    assert!(err.validation_errors().is_some());
}

// ============================================================================
// Multiplane and shared cosmologies
// ============================================================================

#[test]
fn test_multiplane_children_built_first_in_declared_order() {
    let sim = build(MULTIPLANE).unwrap();

    assert_eq!(sim.build_order(), ["cosmo", "far", "near", "stack", "src"]);
    let names: Vec<_> = sim.lens().children().iter().map(|l| l.name()).collect();
    assert_eq!(names, vec!["far", "near"]);
}

#[test]
fn test_shared_cosmology_is_one_instance() {
    let sim = build(MULTIPLANE).unwrap();
    let children = sim.lens().children();

    let far = children[0].cosmology().unwrap();
    let near = children[1].cosmology().unwrap();
    assert!(Arc::ptr_eq(far, near));
    assert_eq!(sim.cosmologies().len(), 1);
}

#[test]
fn test_conflicting_cosmology_definitions_rejected() {
    let yaml = MULTIPLANE.replacen(
        "cosmology: {name: cosmo, kind: FlatLambdaCDM}",
        "cosmology: {name: cosmo, kind: FlatLambdaCDM, params: {h0: 0.7}}",
        1,
    );
    assert!(matches!(build(&yaml), Err(CausticsError::Validation(_))));
}

#[test]
fn test_multiplane_child_without_cosmology_rejected() {
    let yaml = MULTIPLANE.replacen(
        "        cosmology: {name: cosmo, kind: FlatLambdaCDM}\n",
        "",
        1,
    );
    let err = build(&yaml).unwrap_err();
    assert!(err.validation_errors().is_some());
}

// ============================================================================
// Private registries
// ============================================================================

#[test]
fn test_private_registry_kind_is_buildable() {
    let registry = Registry::with_builtins();
    let sis = registry.resolve("SIS").unwrap();
    registry
        .register(Factory {
            kind: "SoftSIS".into(),
            description: "SIS with a required core",
            params: sis.params.clone(),
            kwargs: vec![KwargDecl::new(
                "s",
                KwargType::Float,
                KwargDefault::Required,
                "Core radius",
            )],
            constructor: sis.constructor,
        })
        .unwrap();

    let yaml = SIE_SERSIC
        .replace("kind: SIE", "kind: SoftSIS")
        .replace("      z_l: 0.5", "      z_l: 0.5\n    kwargs:\n      s: 0.1");
    let sim = SimulatorBuilder::new(&registry)
        .build(ConfigSource::yaml(yaml.as_str()))
        .unwrap();
    assert_eq!(sim.lens().kind(), "SIS");

    // The process-wide registry is untouched
    assert!(build(&yaml).is_err());
}

/// Unlensed source scaled by the lens's `b`
struct ScaledSource;

impl ForwardRoutine for ScaledSource {
    fn name(&self) -> &str {
        "scaled_source"
    }

    fn layers(&self) -> Vec<Layer> {
        vec![Layer::Source]
    }

    fn param_refs(&self) -> Vec<String> {
        vec!["lens.b".into()]
    }

    fn run(&self, ctx: &ForwardContext<'_>) -> Result<Image, ForwardError> {
        let scale = ctx.param("lens", "b")?;
        let mut image = ctx.layer(Layer::Source)?;
        for pixel in image.iter_mut() {
            *pixel *= scale;
        }
        ctx.observe(image)
    }
}

#[test]
fn test_private_registry_forward_routine_is_callable() {
    let registry = Registry::with_builtins();
    registry.register_forward(Arc::new(ScaledSource)).unwrap();
    assert_eq!(
        registry.register_forward(Arc::new(ScaledSource)),
        Err(RegistryError::Conflict {
            kind: "scaled_source".into(),
            category: KindCategory::Forward,
        })
    );

    let yaml = format!("{SIE_SERSIC}  forward: scaled_source\n");
    let sim = SimulatorBuilder::new(&registry)
        .build(ConfigSource::yaml(yaml.as_str()))
        .unwrap();
    assert_eq!(sim.forward_name(), "scaled_source");

    // Source layer plus the referenced lens parameter; no cosmology
    let dynamic = sim.input_signature().dynamic_keys();
    assert!(dynamic.iter().any(|k| k == "lens.b"));
    assert!(dynamic.iter().all(|k| k.starts_with("lens.") || k.starts_with("src.")));

    let named = |keys: Vec<String>| -> BTreeMap<String, f64> {
        keys.into_iter()
            .map(|k| {
                let value = if k == "lens.b" { 3.0 } else { 0.5 };
                (k, value)
            })
            .collect()
    };
    let scaled = sim.call(named(dynamic)).unwrap();

    let unlensed = build(&format!("{SIE_SERSIC}  forward: unlensed\n")).unwrap();
    let reference = unlensed
        .call(named(unlensed.input_signature().dynamic_keys()))
        .unwrap();

    assert_eq!((scaled.nx, scaled.ny), (reference.nx, reference.ny));
    for (s, r) in scaled.data.iter().zip(&reference.data) {
        assert!((s - 3.0 * r).abs() < 1e-12, "{s} != 3 * {r}");
    }

    // Not visible to the process-wide registry
    assert!(matches!(
        build(&yaml),
        Err(CausticsError::UnknownKind { .. })
    ));
}
